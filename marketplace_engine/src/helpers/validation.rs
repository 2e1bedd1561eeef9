//! Field-level checks for commission rate definitions.
//!
//! Every rate passes through [`validate_new_rate`] before it is stored, and every partial update runs the checks for
//! the fields it touches. The resolver can therefore assume that stored values are finite, non-negative and that
//! currency codes are lower case.
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::db_types::{CommissionType, MinorUnits, NewCommissionRate, NewCommissionRule, RuleReference};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateValidationError {
    #[error("Malformed rate definition: {0}")]
    Malformed(String),
    #[error("The '{0}' field is required")]
    MissingField(&'static str),
    #[error("'{field}' must be a finite, non-negative number, but was {value}")]
    NegativeOrInvalid { field: &'static str, value: String },
    #[error("Percentage rates must lie between 0 and 100, but was {0}")]
    PercentageOutOfRange(f64),
    #[error("Fixed rates must be a whole number of minor units, but was {0}")]
    FractionalFixedValue(f64),
    #[error("'{0}' is not a valid ISO currency code")]
    InvalidCurrencyCode(String),
    #[error("'{0}' is not a valid rate code. Codes cannot be empty or contain whitespace")]
    InvalidCode(String),
    #[error("A {0} rule must reference a non-empty id")]
    EmptyRuleReference(RuleReference),
}

fn currency_regex() -> Result<&'static Regex, RateValidationError> {
    static CURRENCY_CODE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    CURRENCY_CODE
        .get_or_init(|| Regex::new(r"^[a-z]{3}$"))
        .as_ref()
        .map_err(|e| RateValidationError::Malformed(e.to_string()))
}

fn code_regex() -> Result<&'static Regex, RateValidationError> {
    static RATE_CODE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    RATE_CODE.get_or_init(|| Regex::new(r"^\S+$")).as_ref().map_err(|e| RateValidationError::Malformed(e.to_string()))
}

/// Trims and lower-cases a currency code, and checks that it is made of three ASCII letters.
pub fn normalize_currency_code(code: &str) -> Result<String, RateValidationError> {
    let normalized = code.trim().to_ascii_lowercase();
    if currency_regex()?.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(RateValidationError::InvalidCurrencyCode(code.to_string()))
    }
}

pub fn validate_code(code: &str) -> Result<(), RateValidationError> {
    if code.is_empty() {
        return Err(RateValidationError::MissingField("code"));
    }
    if !code_regex()?.is_match(code) {
        return Err(RateValidationError::InvalidCode(code.to_string()));
    }
    Ok(())
}

pub fn validate_value(rate_type: CommissionType, value: f64) -> Result<(), RateValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(RateValidationError::NegativeOrInvalid { field: "value", value: value.to_string() });
    }
    match rate_type {
        CommissionType::Percentage if value > 100.0 => Err(RateValidationError::PercentageOutOfRange(value)),
        #[allow(clippy::cast_precision_loss)]
        CommissionType::Fixed if value.fract() != 0.0 || value > i64::MAX as f64 => {
            Err(RateValidationError::FractionalFixedValue(value))
        },
        _ => Ok(()),
    }
}

pub fn validate_min_amount(min_amount: Option<MinorUnits>) -> Result<(), RateValidationError> {
    match min_amount {
        Some(m) if m.is_negative() => {
            Err(RateValidationError::NegativeOrInvalid { field: "min_amount", value: m.to_string() })
        },
        _ => Ok(()),
    }
}

/// Checks that every rule references something, and returns the rules with their ids trimmed.
pub fn validate_rules(rules: &[NewCommissionRule]) -> Result<Vec<NewCommissionRule>, RateValidationError> {
    rules
        .iter()
        .map(|rule| {
            let reference_id = rule.reference_id.trim();
            if reference_id.is_empty() {
                Err(RateValidationError::EmptyRuleReference(rule.reference))
            } else {
                Ok(NewCommissionRule::new(rule.reference, reference_id))
            }
        })
        .collect()
}

/// Validates a new rate and returns it in canonical form (trimmed name, lower-case currency, trimmed rule ids).
pub fn validate_new_rate(rate: NewCommissionRate) -> Result<NewCommissionRate, RateValidationError> {
    let name = rate.name.trim().to_string();
    if name.is_empty() {
        return Err(RateValidationError::MissingField("name"));
    }
    validate_code(&rate.code)?;
    validate_value(rate.rate_type, rate.value)?;
    validate_min_amount(rate.min_amount)?;
    let currency_code = rate.currency_code.as_deref().map(normalize_currency_code).transpose()?;
    let rules = validate_rules(&rate.rules)?;
    Ok(NewCommissionRate { name, currency_code, rules, ..rate })
}
