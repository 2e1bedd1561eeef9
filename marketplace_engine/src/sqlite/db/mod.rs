//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! SQLite takes the write lock lazily, so write transactions issue a write as their first statement. Balance changes
//! are single conditional `UPDATE`s or upserts, which keeps them atomic under concurrent callers.
use std::str::FromStr;

use log::*;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

use crate::config::EngineConfig;

pub mod payouts;
pub mod rates;
pub mod transactions;

pub async fn new_pool(config: &EngineConfig) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(config.create_if_missing)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout)
        .foreign_keys(true);
    debug!("🗃️ Connecting to {} with up to {} connections", config.database_url, config.max_connections);
    let pool = SqlitePoolOptions::new().max_connections(config.max_connections).connect_with(options).await?;
    Ok(pool)
}
