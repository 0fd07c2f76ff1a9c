//! Bill Payments
//!
//! `process-bill-payment`: debit `amount + 1.5 %`, settle the bill (mark a
//! registered bill paid, or record an ad-hoc payment in the history), and
//! optionally forward the amount to a phone number through the same
//! resolve / credit / pending-claim step transfers use. Any failure after the
//! debit refunds the full total as `bill_refund`.

pub mod error;
pub mod service;
pub mod types;

pub use error::BillPaymentError;
pub use service::BillPaymentService;
pub use types::{BillPaymentReceipt, BillPaymentRequest};
