//! # Marketplace engine public API
//!
//! The `mkt_api` module exposes the programmatic API for the marketplace engine. It is split in two, so that the
//! rate administration and the payout ledger can be backed by different databases if need be.
//!
//! * [`commission_api`] manages commission rates and resolves the commission owed on a set of order items and
//!   shipping methods.
//! * [`ledger_api`] manages seller payout accounts: crediting the net earnings of orders, authorizing payouts and
//!   reporting balances and history.
//!
//! The other submodules in this module are support types for the APIs.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend trait required by the API.
//!
//! ```rust,ignore
//! use marketplace_engine::{events::EventProducers, LedgerApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements PayoutManagement
//! let api = LedgerApi::new(db, EventProducers::default());
//! let account = api.open_account("seller-1").await?;
//! let payout = api.create_payout(account.id, 5_000.into(), "usd").await?;
//! ```

pub mod commission_api;
pub mod ledger_api;
pub mod ledger_objects;
pub mod rate_objects;
