//! # Storage backend contracts
//!
//! This module defines the behaviour that database backends need to expose in order to support the marketplace
//! engine.
//!
//! * [`CommissionRateManagement`] stores commission rates and their matching rules. It is pure data access; rate
//!   selection happens in [`crate::commission`].
//! * [`PayoutManagement`] is the seller payout ledger: accounts, per-currency balances, the transaction journal and
//!   payouts. It is responsible for keeping balances non-negative and credits idempotent under concurrent access.
mod commission_rate_management;
mod data_objects;
mod payout_management;

pub use commission_rate_management::{CommissionApiError, CommissionRateManagement};
pub use data_objects::CreditOrderResult;
pub use payout_management::{LedgerError, PayoutManagement};
