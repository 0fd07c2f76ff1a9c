//! Momo Rails - money movement for a mobile-money platform
//!
//! # Modules
//!
//! - [`money`] - Amount parsing and currency rounding
//! - [`fee`] - Fee calculator (domestic, cross-border, bill payment)
//! - [`status`] - Closed transaction/bill status vocabulary
//! - [`ledger`] - Balance ledger seam (atomic increments, audit entries)
//! - [`resolver`] - Ranked recipient resolution by phone or email
//! - [`store`] - Persistence seam for transfers, claims and bills
//! - [`transfer`] - Transfer saga, claim codes, redeem/cancel
//! - [`bill`] - `process-bill-payment`
//! - [`backend`] - Memory, PostgREST and PostgreSQL implementations of the seams
//! - [`gateway`] - HTTP API

// Core types - must be first!
pub mod core_types;

pub mod fee;
pub mod money;
pub mod status;

pub mod ledger;
pub mod resolver;
pub mod store;

pub mod bill;
pub mod transfer;

pub mod backend;
pub mod config;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{Account, TransferId, UserId};
pub use fee::{FeeQuote, FeeSchedule, calculate_fee};
pub use status::{BillStatus, TransactionStatus};
pub use transfer::{TransferCoordinator, TransferError, TransferOutcome, TransferRequest};
