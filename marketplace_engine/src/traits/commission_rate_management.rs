use thiserror::Error;

use crate::{
    db_types::{CommissionRate, CommissionRule, CommissionTarget, NewCommissionRate, NewCommissionRule},
    helpers::RateValidationError,
    rate_objects::{RateQueryFilter, UpdateCommissionRate},
};

#[derive(Debug, Clone, Error)]
pub enum CommissionApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid rate definition. {0}")]
    ValidationError(#[from] RateValidationError),
    #[error("Commission rate {0} does not exist")]
    RateNotFound(String),
    #[error("A commission rate with code '{0}' already exists")]
    CodeAlreadyExists(String),
    #[error("Commission rule {0} does not exist")]
    RuleNotFound(i64),
}

impl From<sqlx::Error> for CommissionApiError {
    fn from(e: sqlx::Error) -> Self {
        CommissionApiError::DatabaseError(e.to_string())
    }
}

/// The `CommissionRateManagement` trait defines the behaviour a backend needs to store commission rates and their
/// matching rules.
///
/// Backends are plain data access. They do not validate rate definitions (the [`crate::CommissionApi`] does that
/// before calling through) and they never choose between rates; that is the job of
/// [`crate::commission::resolver`].
///
/// Every rate returned by a backend must have its `rules` populated.
#[allow(async_fn_in_trait)]
pub trait CommissionRateManagement {
    /// Stores a new rate and its rules in a single atomic transaction.
    ///
    /// Returns [`CommissionApiError::CodeAlreadyExists`] if another rate already uses the same code.
    async fn insert_rate(&self, rate: NewCommissionRate) -> Result<CommissionRate, CommissionApiError>;

    async fn fetch_rate(&self, id: i64) -> Result<Option<CommissionRate>, CommissionApiError>;

    async fn fetch_rate_by_code(&self, code: &str) -> Result<Option<CommissionRate>, CommissionApiError>;

    /// Fetches the rates matching the filter, ordered by id.
    async fn search_rates(&self, query: RateQueryFilter) -> Result<Vec<CommissionRate>, CommissionApiError>;

    /// Fetches every enabled rate for `target` that is either priced in `currency_code` or has no currency at all.
    /// This is the candidate set for resolution.
    async fn fetch_applicable_rates(
        &self,
        target: CommissionTarget,
        currency_code: &str,
    ) -> Result<Vec<CommissionRate>, CommissionApiError> {
        let query = RateQueryFilter::default()
            .with_target(target)
            .with_currency_or_fallback(currency_code)
            .with_enabled(true);
        self.search_rates(query).await
    }

    /// Applies a partial update. If `update.rules` is present, the existing rules are replaced wholesale in the same
    /// transaction.
    async fn update_rate(&self, id: i64, update: UpdateCommissionRate) -> Result<CommissionRate, CommissionApiError>;

    async fn add_rule(&self, rate_id: i64, rule: NewCommissionRule) -> Result<CommissionRule, CommissionApiError>;

    async fn remove_rule(&self, rule_id: i64) -> Result<(), CommissionApiError>;

    /// Deletes a rate and its rules. Commission lines that were already produced by the rate are unaffected.
    async fn delete_rate(&self, id: i64) -> Result<CommissionRate, CommissionApiError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), CommissionApiError>;
}
