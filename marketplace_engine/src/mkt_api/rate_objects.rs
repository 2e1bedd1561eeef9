use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    db_types::{CommissionRate, CommissionTarget, CommissionType, MinorUnits, NewCommissionRule},
    helpers::{
        normalize_currency_code,
        validate_code,
        validate_min_amount,
        validate_rules,
        validate_value,
        RateValidationError,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateQueryFilter {
    pub code: Option<String>,
    pub target: Option<CommissionTarget>,
    pub currency_code: Option<String>,
    /// When filtering by currency, also include rates that have no currency.
    #[serde(default)]
    pub include_currency_fallback: bool,
    pub is_enabled: Option<bool>,
}

impl RateQueryFilter {
    pub fn with_code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_target(mut self, target: CommissionTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Only rates priced in exactly this currency.
    pub fn with_currency<S: Into<String>>(mut self, currency_code: S) -> Self {
        self.currency_code = Some(currency_code.into());
        self.include_currency_fallback = false;
        self
    }

    /// Rates priced in this currency, as well as rates without a currency.
    pub fn with_currency_or_fallback<S: Into<String>>(mut self, currency_code: S) -> Self {
        self.currency_code = Some(currency_code.into());
        self.include_currency_fallback = true;
        self
    }

    pub fn with_enabled(mut self, is_enabled: bool) -> Self {
        self.is_enabled = Some(is_enabled);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.target.is_none() && self.currency_code.is_none() && self.is_enabled.is_none()
    }
}

impl Display for RateQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(code) = &self.code {
            write!(f, "code: {code}. ")?;
        }
        if let Some(target) = &self.target {
            write!(f, "target: {target}. ")?;
        }
        if let Some(currency) = &self.currency_code {
            let fallback = if self.include_currency_fallback { " (or none)" } else { "" };
            write!(f, "currency: {currency}{fallback}. ")?;
        }
        if let Some(enabled) = &self.is_enabled {
            write!(f, "enabled: {enabled}. ")?;
        }
        Ok(())
    }
}

/// Distinguishes a field that was absent (`None`) from one that was explicitly set to `null` (`Some(None)`).
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A partial update to a commission rate. Fields left as `None` are not changed.
///
/// `currency_code` and `min_amount` are doubly optional: `Some(None)` clears the stored value. If `rules` is present,
/// it replaces all of the rate's existing rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommissionRate {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub rate_type: Option<CommissionType>,
    pub target: Option<CommissionTarget>,
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub currency_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub min_amount: Option<Option<MinorUnits>>,
    pub include_tax: Option<bool>,
    pub is_enabled: Option<bool>,
    pub priority: Option<i64>,
    pub rules: Option<Vec<NewCommissionRule>>,
}

impl UpdateCommissionRate {
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_type(mut self, rate_type: CommissionType) -> Self {
        self.rate_type = Some(rate_type);
        self
    }

    pub fn with_target(mut self, target: CommissionTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency_code: S) -> Self {
        self.currency_code = Some(Some(currency_code.into()));
        self
    }

    pub fn without_currency(mut self) -> Self {
        self.currency_code = Some(None);
        self
    }

    pub fn with_min_amount(mut self, min_amount: i64) -> Self {
        self.min_amount = Some(Some(MinorUnits::from(min_amount)));
        self
    }

    pub fn without_min_amount(mut self) -> Self {
        self.min_amount = Some(None);
        self
    }

    pub fn with_include_tax(mut self, include_tax: bool) -> Self {
        self.include_tax = Some(include_tax);
        self
    }

    pub fn with_enabled(mut self, is_enabled: bool) -> Self {
        self.is_enabled = Some(is_enabled);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_rules(mut self, rules: Vec<NewCommissionRule>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() &&
            self.code.is_none() &&
            self.rate_type.is_none() &&
            self.target.is_none() &&
            self.value.is_none() &&
            self.currency_code.is_none() &&
            self.min_amount.is_none() &&
            self.include_tax.is_none() &&
            self.is_enabled.is_none() &&
            self.priority.is_none() &&
            self.rules.is_none()
    }

    /// Checks the update against the rate it will be applied to, and returns it in canonical form.
    ///
    /// The value is checked against the rate's type after the update, so switching a percentage rate of `12.5` to a
    /// fixed rate without also changing the value is rejected.
    pub fn validated(self, existing: &CommissionRate) -> Result<Self, RateValidationError> {
        let name = match self.name {
            Some(name) if name.trim().is_empty() => return Err(RateValidationError::MissingField("name")),
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        if let Some(code) = &self.code {
            validate_code(code)?;
        }
        let rate_type = self.rate_type.unwrap_or(existing.rate_type);
        let value = self.value.unwrap_or(existing.value);
        if self.rate_type.is_some() || self.value.is_some() {
            validate_value(rate_type, value)?;
        }
        if let Some(min_amount) = self.min_amount {
            validate_min_amount(min_amount)?;
        }
        let currency_code = match self.currency_code {
            Some(Some(code)) => Some(Some(normalize_currency_code(&code)?)),
            other => other,
        };
        let rules = self.rules.as_deref().map(validate_rules).transpose()?;
        Ok(Self { name, currency_code, rules, ..self })
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    fn existing() -> CommissionRate {
        CommissionRate {
            id: 1,
            name: "Default".into(),
            code: "default".into(),
            rate_type: CommissionType::Percentage,
            target: CommissionTarget::Item,
            value: 12.5,
            currency_code: Some("usd".into()),
            min_amount: Some(MinorUnits::from(100)),
            include_tax: false,
            is_enabled: true,
            priority: 0,
            rules: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn filter_display() {
        assert_eq!(RateQueryFilter::default().to_string(), "No filters.");
        let filter =
            RateQueryFilter::default().with_target(CommissionTarget::Shipping).with_currency_or_fallback("eur");
        assert_eq!(filter.to_string(), "target: shipping. currency: eur (or none). ");
    }

    #[test]
    fn explicit_nulls_clear_values() {
        let update: UpdateCommissionRate = serde_json::from_str(r#"{"currency_code": null}"#).unwrap();
        assert_eq!(update.currency_code, Some(None));
        assert_eq!(update.min_amount, None);
        let update: UpdateCommissionRate = serde_json::from_str(r#"{"min_amount": 250}"#).unwrap();
        assert_eq!(update.min_amount, Some(Some(MinorUnits::from(250))));
        assert_eq!(update.currency_code, None);
        let update: UpdateCommissionRate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn validated_updates() {
        let update = UpdateCommissionRate::default().with_currency("EUR").with_name(" Euro ");
        let update = update.validated(&existing()).unwrap();
        assert_eq!(update.currency_code, Some(Some("eur".to_string())));
        assert_eq!(update.name.as_deref(), Some("Euro"));

        let switch_to_fixed = UpdateCommissionRate::default().with_type(CommissionType::Fixed);
        assert_eq!(switch_to_fixed.validated(&existing()), Err(RateValidationError::FractionalFixedValue(12.5)));

        let switch_with_value = UpdateCommissionRate::default().with_type(CommissionType::Fixed).with_value(300.0);
        assert!(switch_with_value.validated(&existing()).is_ok());

        let too_much = UpdateCommissionRate::default().with_value(101.0);
        assert_eq!(too_much.validated(&existing()), Err(RateValidationError::PercentageOutOfRange(101.0)));

        let negative_min = UpdateCommissionRate::default().with_min_amount(-1);
        assert!(negative_min.validated(&existing()).is_err());

        let bad_rules = UpdateCommissionRate::default().with_rules(vec![NewCommissionRule::seller("  ")]);
        assert!(bad_rules.validated(&existing()).is_err());
    }
}
