//! Recipient Resolver
//!
//! Maps a phone number (or email) typed by the sender onto a local account.
//! Phone numbers are stored in whatever format the user typed at sign-up, so
//! matching is a ranked list of strategies. The first rule that matches any
//! candidate wins; the rule is logged so every resolution is auditable.
//!
//! ```text
//! Exact → Last9 → Last8 → CountryLocal → SuffixContainment
//! ```
//!
//! `CountryLocal` and `SuffixContainment` are heuristics: on short or
//! truncated numbers they can select the wrong account. They are kept last
//! and always logged at WARN.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core_types::Account;

/// Minimum digits on the shorter side for `SuffixContainment`
const MIN_SUFFIX_DIGITS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Recipient lookup failed: {0}")]
    Remote(String),

    #[error("Recipient lookup timed out: {0}")]
    Timeout(String),
}

/// Source of candidate accounts (the `find_recipient` RPC)
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn find_recipient(&self, search_term: &str) -> Result<Vec<Account>, ResolveError>;
}

/// Which strategy matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Email,
    Exact,
    Last9,
    Last8,
    CountryLocal,
    SuffixContainment,
}

impl MatchRule {
    /// Phone strategies in precedence order
    pub const PHONE_RULES: [MatchRule; 5] = [
        MatchRule::Exact,
        MatchRule::Last9,
        MatchRule::Last8,
        MatchRule::CountryLocal,
        MatchRule::SuffixContainment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRule::Email => "email",
            MatchRule::Exact => "exact",
            MatchRule::Last9 => "last9",
            MatchRule::Last8 => "last8",
            MatchRule::CountryLocal => "country_local",
            MatchRule::SuffixContainment => "suffix_containment",
        }
    }

    /// True for the rules that may pick the wrong account
    pub fn is_heuristic(&self) -> bool {
        matches!(self, MatchRule::CountryLocal | MatchRule::SuffixContainment)
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found { account: Account, rule: MatchRule },
    NotFound,
}

impl Resolution {
    pub fn account(&self) -> Option<&Account> {
        match self {
            Resolution::Found { account, .. } => Some(account),
            Resolution::NotFound => None,
        }
    }
}

/// International dialing code for a country
pub fn dial_code(country: &str) -> Option<&'static str> {
    let code = match country.trim().to_ascii_uppercase().as_str() {
        "CM" => "237",
        "CD" => "243",
        "CG" => "242",
        "GA" => "241",
        "GQ" => "240",
        "CF" => "236",
        "TD" => "235",
        "NG" => "234",
        "GH" => "233",
        "CI" => "225",
        "BF" => "226",
        "ML" => "223",
        "NE" => "227",
        "TG" => "228",
        "BJ" => "229",
        "SN" => "221",
        "GN" => "224",
        "RW" => "250",
        "UG" => "256",
        "TZ" => "255",
        "KE" => "254",
        "BE" => "32",
        "FR" => "33",
        "CH" => "41",
        "GB" => "44",
        "DE" => "49",
        "US" | "CA" => "1",
        _ => return None,
    };
    Some(code)
}

/// Digits-only form of a phone number
pub fn digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn last_n(d: &str, n: usize) -> Option<&str> {
    if d.len() >= n {
        Some(&d[d.len() - n..])
    } else {
        None
    }
}

/// National significant number: international prefix, country dial code and
/// one trunk `0` removed.
pub fn local_number(phone: &str, country: &str) -> String {
    let mut d = digits(phone);
    if let Some(rest) = d.strip_prefix("00") {
        d = rest.to_string();
    }
    if let Some(code) = dial_code(country) {
        // Only strip when something plausible remains
        if d.len() > code.len() + 6 && d.starts_with(code) {
            d = d[code.len()..].to_string();
        }
    }
    match d.strip_prefix('0') {
        Some(rest) => rest.to_string(),
        None => d,
    }
}

fn rule_matches(rule: MatchRule, input: &str, stored: &str, country: &str) -> bool {
    match rule {
        MatchRule::Email => false,
        MatchRule::Exact => input.trim() == stored.trim(),
        MatchRule::Last9 | MatchRule::Last8 => {
            let n = if rule == MatchRule::Last9 { 9 } else { 8 };
            let (a, b) = (digits(input), digits(stored));
            match (last_n(&a, n), last_n(&b, n)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        MatchRule::CountryLocal => {
            let (a, b) = (local_number(input, country), local_number(stored, country));
            !a.is_empty() && a == b
        }
        MatchRule::SuffixContainment => {
            let (a, b) = (digits(input), digits(stored));
            let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
            short.len() >= MIN_SUFFIX_DIGITS && long.ends_with(&short)
        }
    }
}

/// First phone rule under which the two numbers are the same subscriber.
pub fn phones_match(a: &str, b: &str, country: &str) -> Option<MatchRule> {
    MatchRule::PHONE_RULES
        .into_iter()
        .find(|rule| rule_matches(*rule, a, b, country))
}

/// Resolve a phone number or email to a local account.
pub async fn resolve_recipient(
    directory: &dyn RecipientDirectory,
    phone_or_email: &str,
    country: &str,
) -> Result<Resolution, ResolveError> {
    let input = phone_or_email.trim();
    if input.is_empty() {
        return Ok(Resolution::NotFound);
    }

    if input.contains('@') {
        let found = directory
            .find_recipient(input)
            .await?
            .into_iter()
            .find(|acc| {
                acc.email
                    .as_deref()
                    .is_some_and(|e| e.trim().eq_ignore_ascii_case(input))
            });
        return Ok(match found {
            Some(account) => {
                info!(recipient = %account.id, rule = %MatchRule::Email, "Recipient resolved");
                Resolution::Found {
                    account,
                    rule: MatchRule::Email,
                }
            }
            None => Resolution::NotFound,
        });
    }

    let candidates = fetch_candidates(directory, input).await?;
    debug!(input = %input, candidates = candidates.len(), "Resolving recipient");

    for rule in MatchRule::PHONE_RULES {
        let mut matched = candidates
            .iter()
            .filter(|acc| rule_matches(rule, input, &acc.phone, country));

        if let Some(first) = matched.next() {
            let others = matched.count();
            if others > 0 {
                warn!(
                    input = %input,
                    rule = %rule,
                    candidates = others + 1,
                    chosen = %first.id,
                    "Ambiguous recipient: several accounts match, taking the first"
                );
            }
            if rule.is_heuristic() {
                warn!(
                    input = %input,
                    stored = %first.phone,
                    rule = %rule,
                    "Recipient matched by heuristic rule"
                );
            }
            info!(recipient = %first.id, rule = %rule, "Recipient resolved");
            return Ok(Resolution::Found {
                account: first.clone(),
                rule,
            });
        }
    }

    info!(input = %input, "Recipient not found");
    Ok(Resolution::NotFound)
}

/// Query with the raw input and with its last 8 digits, de-duplicated.
async fn fetch_candidates(
    directory: &dyn RecipientDirectory,
    input: &str,
) -> Result<Vec<Account>, ResolveError> {
    let mut candidates = directory.find_recipient(input).await?;

    let d = digits(input);
    if let Some(tail) = last_n(&d, 8)
        && tail != input
    {
        candidates.extend(directory.find_recipient(tail).await?);
    }

    let mut seen = HashSet::new();
    candidates.retain(|acc| seen.insert(acc.id));
    Ok(candidates)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use uuid::Uuid;

    /// Directory that returns every account it holds, in order
    pub(crate) struct StaticDirectory(pub Vec<Account>);

    #[async_trait]
    impl RecipientDirectory for StaticDirectory {
        async fn find_recipient(&self, _search_term: &str) -> Result<Vec<Account>, ResolveError> {
            Ok(self.0.clone())
        }
    }

    pub(crate) fn account(phone: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            full_name: format!("User {}", phone),
            phone: phone.to_string(),
            email: None,
            country: Some("CM".to_string()),
        }
    }

    #[test]
    fn test_local_number() {
        assert_eq!(local_number("+237 650 00 00 01", "CM"), "650000001");
        assert_eq!(local_number("00237650000001", "CM"), "650000001");
        assert_eq!(local_number("0650000001", "CM"), "650000001");
        assert_eq!(local_number("+243 0812345678", "CD"), "812345678");
    }

    #[test]
    fn test_phones_match_precedence() {
        assert_eq!(
            phones_match("+237650000001", "+237650000001", "CM"),
            Some(MatchRule::Exact)
        );
        assert_eq!(
            phones_match("+237650000001", "650000001", "CM"),
            Some(MatchRule::Last9)
        );
        assert_eq!(
            phones_match("0812345678", "+243812345678", "CD"),
            Some(MatchRule::Last9)
        );
        assert_eq!(phones_match("650000001", "650000002", "CM"), None);
    }

    #[test]
    fn test_country_local_rule() {
        // 7 local digits: too short for Last8/Last9, caught by CountryLocal
        assert!(rule_matches(MatchRule::CountryLocal, "+2410701234", "0701234", "GA"));
        assert_eq!(phones_match("+2410701234", "0701234", "GA"), Some(MatchRule::CountryLocal));
    }

    #[test]
    fn test_suffix_rule_needs_six_digits() {
        assert!(rule_matches(MatchRule::SuffixContainment, "1234567", "99991234567", "XX"));
        assert!(!rule_matches(MatchRule::SuffixContainment, "34567", "99934567", "XX"));
    }

    #[tokio::test]
    async fn test_resolve_prefers_exact_over_suffix() {
        let exact = account("650000001");
        let suffix = account("+237650000001");
        let dir = StaticDirectory(vec![suffix.clone(), exact.clone()]);

        let res = resolve_recipient(&dir, "650000001", "CM").await.unwrap();
        assert_eq!(
            res,
            Resolution::Found {
                account: exact,
                rule: MatchRule::Exact
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let dir = StaticDirectory(vec![account("+237699999999")]);
        let res = resolve_recipient(&dir, "+237650000001", "CM").await.unwrap();
        assert_eq!(res, Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_email() {
        let mut acc = account("+237650000001");
        acc.email = Some("Awa@Example.com".to_string());
        let dir = StaticDirectory(vec![acc.clone()]);

        let res = resolve_recipient(&dir, "awa@example.com", "CM").await.unwrap();
        assert_eq!(res.account().map(|a| a.id), Some(acc.id));
    }

    #[tokio::test]
    async fn test_resolve_dedups_candidates() {
        let acc = account("+237650000001");
        let dir = StaticDirectory(vec![acc.clone()]);
        // Directory returns the same account for both queries
        let res = resolve_recipient(&dir, "+237 650 000 001", "CM")
            .await
            .unwrap();
        assert!(matches!(res, Resolution::Found { rule: MatchRule::Last9, .. }));
    }

    /// Same local number stored under two countries: first in directory
    /// order wins, whatever the corridor
    #[tokio::test]
    async fn test_resolve_ambiguous_takes_first_candidate() {
        let gabon = Account {
            country: Some("GA".to_string()),
            ..account("+241650000001")
        };
        let cameroon = account("+237650000001");
        let dir = StaticDirectory(vec![gabon.clone(), cameroon]);

        let res = resolve_recipient(&dir, "650000001", "CM").await.unwrap();
        assert_eq!(
            res,
            Resolution::Found {
                account: gabon,
                rule: MatchRule::Last9
            }
        );
    }
}
