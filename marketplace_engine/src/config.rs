//! Engine configuration, read from `MKT_*` environment variables.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use mkt_common::helpers::{parse_boolean_flag, parse_setting};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/marketplace.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// How long a connection waits on a locked database before giving up.
    pub busy_timeout: Duration,
    pub event_buffer_size: usize,
    pub create_if_missing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            create_if_missing: true,
        }
    }
}

fn setting_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    parse_setting(env::var(name).ok(), default).unwrap_or_else(|e| {
        warn!("🪛️ {name} is invalid. {e} Using the default, {default}, instead.");
        default
    })
}

impl EngineConfig {
    pub fn new<S: Into<String>>(database_url: S) -> Self {
        Self { database_url: database_url.into(), ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ MKT_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = setting_or_default("MKT_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS).max(1);
        let busy_timeout_ms = setting_or_default("MKT_DB_BUSY_TIMEOUT_MS", DEFAULT_BUSY_TIMEOUT_MS);
        let event_buffer_size = setting_or_default("MKT_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE).max(1);
        let create_if_missing = parse_boolean_flag(env::var("MKT_DB_CREATE_IF_MISSING").ok(), true);
        Self {
            database_url,
            max_connections,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            event_buffer_size,
            create_if_missing,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_event_buffer_size(mut self, event_buffer_size: usize) -> Self {
        self.event_buffer_size = event_buffer_size.max(1);
        self
    }
}
