//! Administration of commission rates, and commission resolution against the stored rates.

use std::fmt::Debug;

use log::*;

use crate::{
    commission::{resolve_request, summarize, CommissionSummary, ResolveCommissionRequest},
    db_types::{CommissionLine, CommissionRate, CommissionRule, CommissionTarget, NewCommissionRate, NewCommissionRule},
    helpers::{normalize_currency_code, validate_new_rate, validate_rules},
    rate_objects::{RateQueryFilter, UpdateCommissionRate},
    traits::{CommissionApiError, CommissionRateManagement},
};

/// `CommissionApi` is the entry point for managing commission rates and for working out the commission owed on an
/// order.
///
/// Rate definitions are validated here before they reach the backend. Resolution loads the applicable rates from the
/// backend on every call and hands them to the pure resolver in [`crate::commission`], so rate changes take effect
/// immediately.
pub struct CommissionApi<B> {
    db: B,
}

impl<B: Debug> Debug for CommissionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommissionApi ({:?})", self.db)
    }
}

impl<B> CommissionApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> CommissionApi<B>
where B: CommissionRateManagement
{
    /// Validates and stores a new commission rate along with its rules.
    pub async fn create_rate(&self, rate: NewCommissionRate) -> Result<CommissionRate, CommissionApiError> {
        let rate = validate_new_rate(rate)?;
        let rate = self.db.insert_rate(rate).await?;
        info!("🧮️ Commission rate '{}' (#{}) created with {} rules", rate.code, rate.id, rate.rules.len());
        Ok(rate)
    }

    pub async fn rate_by_id(&self, id: i64) -> Result<Option<CommissionRate>, CommissionApiError> {
        self.db.fetch_rate(id).await
    }

    pub async fn rate_by_code(&self, code: &str) -> Result<Option<CommissionRate>, CommissionApiError> {
        self.db.fetch_rate_by_code(code).await
    }

    /// Lists the rates matching the filter. A currency in the filter is normalised before the search.
    pub async fn search_rates(&self, mut query: RateQueryFilter) -> Result<Vec<CommissionRate>, CommissionApiError> {
        if let Some(code) = query.currency_code.take() {
            query.currency_code = Some(normalize_currency_code(&code)?);
        }
        trace!("🧮️ Searching rates: {query}");
        self.db.search_rates(query).await
    }

    /// Applies a partial update to a rate. If the update carries rules, they replace the rate's current rules.
    pub async fn update_rate(
        &self,
        id: i64,
        update: UpdateCommissionRate,
    ) -> Result<CommissionRate, CommissionApiError> {
        if update.is_empty() {
            debug!("🧮️ Empty update for rate #{id}. Nothing to do");
            return self.db.fetch_rate(id).await?.ok_or_else(|| CommissionApiError::RateNotFound(id.to_string()));
        }
        let existing =
            self.db.fetch_rate(id).await?.ok_or_else(|| CommissionApiError::RateNotFound(id.to_string()))?;
        let update = update.validated(&existing)?;
        let rate = self.db.update_rate(id, update).await?;
        info!("🧮️ Commission rate '{}' (#{id}) updated", rate.code);
        Ok(rate)
    }

    pub async fn enable_rate(&self, id: i64) -> Result<CommissionRate, CommissionApiError> {
        self.update_rate(id, UpdateCommissionRate::default().with_enabled(true)).await
    }

    /// Disabled rates are kept, but are never considered during resolution.
    pub async fn disable_rate(&self, id: i64) -> Result<CommissionRate, CommissionApiError> {
        self.update_rate(id, UpdateCommissionRate::default().with_enabled(false)).await
    }

    pub async fn add_rule(&self, rate_id: i64, rule: NewCommissionRule) -> Result<CommissionRule, CommissionApiError> {
        let rule = validate_rules(std::slice::from_ref(&rule))?.into_iter().next().unwrap_or(rule);
        let rule = self.db.add_rule(rate_id, rule).await?;
        debug!("🧮️ Rule #{} ({} = {}) added to rate #{rate_id}", rule.id, rule.reference, rule.reference_id);
        Ok(rule)
    }

    pub async fn remove_rule(&self, rule_id: i64) -> Result<(), CommissionApiError> {
        self.db.remove_rule(rule_id).await?;
        debug!("🧮️ Rule #{rule_id} removed");
        Ok(())
    }

    pub async fn delete_rate(&self, id: i64) -> Result<CommissionRate, CommissionApiError> {
        let rate = self.db.delete_rate(id).await?;
        info!("🧮️ Commission rate '{}' (#{id}) deleted", rate.code);
        Ok(rate)
    }

    /// Resolves the commission lines for every item and shipping method in the request. Items come first, followed
    /// by shipping methods. Candidates that no rate applies to produce no line.
    ///
    /// The only failures are an invalid currency code and storage errors; "no match" is never an error.
    pub async fn resolve(&self, request: ResolveCommissionRequest) -> Result<Vec<CommissionLine>, CommissionApiError> {
        let (request, rates) = self.load_rates(request).await?;
        Ok(resolve_request(&rates, &request))
    }

    /// As [`Self::resolve`], with the commission totalled per target.
    pub async fn summarize(&self, request: ResolveCommissionRequest) -> Result<CommissionSummary, CommissionApiError> {
        let (request, rates) = self.load_rates(request).await?;
        Ok(summarize(&rates, &request))
    }

    async fn load_rates(
        &self,
        mut request: ResolveCommissionRequest,
    ) -> Result<(ResolveCommissionRequest, Vec<CommissionRate>), CommissionApiError> {
        request.currency_code = normalize_currency_code(&request.currency_code)?;
        let mut rates = Vec::new();
        if !request.items.is_empty() {
            rates.extend(self.db.fetch_applicable_rates(CommissionTarget::Item, &request.currency_code).await?);
        }
        if !request.shipping_methods.is_empty() {
            rates.extend(self.db.fetch_applicable_rates(CommissionTarget::Shipping, &request.currency_code).await?);
        }
        trace!("🧮️ {} candidate rates loaded for a {} request", rates.len(), request.currency_code);
        Ok((request, rates))
    }
}
