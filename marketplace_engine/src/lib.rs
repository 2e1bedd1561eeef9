//! Marketplace Engine
//!
//! The marketplace engine works out how much commission a multi-vendor marketplace takes on each order, and keeps the
//! books of what the marketplace owes its sellers.
//!
//! The library is divided into these main sections:
//! 1. Commission resolution ([`mod@commission`]). Given the enabled commission rates, a currency and a set of order
//!    items and shipping methods, it picks the single best rate for each and calculates the commission line. This is
//!    pure code without any storage dependencies.
//! 2. Database management ([`mod@sqlite`] and [`mod@traits`]). Currently, SQLite is the supported backend. You should
//!    never need to access the database directly. Instead, use the public API provided by the engine. The exception is
//!    the data types used in the database. These are defined in the `db_types` module and are public.
//! 3. The engine public API ([`CommissionApi`] and [`LedgerApi`]). The commission API manages rates and resolves
//!    commissions against the stored rates. The ledger API credits sellers with the net earnings of their orders and
//!    authorizes payouts from their balances.
//!
//! The ledger also publishes events when an order is credited or a payout is created. A simple Actor framework is used
//! so that you can easily hook into these events and perform custom actions.
pub mod commission;
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
mod mkt_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mkt_api::{commission_api::CommissionApi, ledger_api::LedgerApi, ledger_objects, rate_objects};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{CommissionApiError, CommissionRateManagement, CreditOrderResult, LedgerError, PayoutManagement};
