use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use mkt_common::MinorUnits;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   CommissionType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommissionType {
    /// `value` is a percentage on a 0-100 scale of the candidate's base amount.
    Percentage,
    /// `value` is a flat amount in minor units, independent of the candidate's amount.
    Fixed,
}

impl Display for CommissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommissionType::Percentage => write!(f, "percentage"),
            CommissionType::Fixed => write!(f, "fixed"),
        }
    }
}

impl FromStr for CommissionType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            _ => Err(ConversionError(format!("Invalid commission type: {s}"))),
        }
    }
}

//--------------------------------------   CommissionTarget   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommissionTarget {
    Item,
    Shipping,
}

impl Display for CommissionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommissionTarget::Item => write!(f, "item"),
            CommissionTarget::Shipping => write!(f, "shipping"),
        }
    }
}

impl FromStr for CommissionTarget {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "item" => Ok(Self::Item),
            "shipping" => Ok(Self::Shipping),
            _ => Err(ConversionError(format!("Invalid commission target: {s}"))),
        }
    }
}

//--------------------------------------    RuleReference     ---------------------------------------------------------
/// The kind of candidate attribute a [`CommissionRule`] is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuleReference {
    Seller,
    Product,
    ProductType,
    ProductCategory,
    ShippingOptionType,
}

impl Display for RuleReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleReference::Seller => write!(f, "seller"),
            RuleReference::Product => write!(f, "product"),
            RuleReference::ProductType => write!(f, "product_type"),
            RuleReference::ProductCategory => write!(f, "product_category"),
            RuleReference::ShippingOptionType => write!(f, "shipping_option_type"),
        }
    }
}

impl FromStr for RuleReference {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seller" => Ok(Self::Seller),
            "product" => Ok(Self::Product),
            "product_type" => Ok(Self::ProductType),
            "product_category" => Ok(Self::ProductCategory),
            "shipping_option_type" => Ok(Self::ShippingOptionType),
            _ => Err(ConversionError(format!("Invalid rule reference: {s}"))),
        }
    }
}

//--------------------------------------    CommissionRule    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CommissionRule {
    pub id: i64,
    pub rate_id: i64,
    pub reference: RuleReference,
    pub reference_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommissionRule {
    pub reference: RuleReference,
    pub reference_id: String,
}

impl NewCommissionRule {
    pub fn new<S: Into<String>>(reference: RuleReference, reference_id: S) -> Self {
        Self { reference, reference_id: reference_id.into() }
    }

    pub fn seller<S: Into<String>>(id: S) -> Self {
        Self::new(RuleReference::Seller, id)
    }

    pub fn product<S: Into<String>>(id: S) -> Self {
        Self::new(RuleReference::Product, id)
    }

    pub fn product_type<S: Into<String>>(id: S) -> Self {
        Self::new(RuleReference::ProductType, id)
    }

    pub fn product_category<S: Into<String>>(id: S) -> Self {
        Self::new(RuleReference::ProductCategory, id)
    }

    pub fn shipping_option_type<S: Into<String>>(id: S) -> Self {
        Self::new(RuleReference::ShippingOptionType, id)
    }
}

//--------------------------------------    CommissionRate    ---------------------------------------------------------
/// A stored fee rule. The `rules` are loaded from their own table and are empty for catch-all rates.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CommissionRate {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub rate_type: CommissionType,
    pub target: CommissionTarget,
    pub value: f64,
    pub currency_code: Option<String>,
    pub min_amount: Option<MinorUnits>,
    pub include_tax: bool,
    pub is_enabled: bool,
    pub priority: i64,
    #[sqlx(skip)]
    pub rules: Vec<CommissionRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionRate {
    pub fn is_catch_all(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn with_rules(mut self, rules: Vec<CommissionRule>) -> Self {
        self.rules = rules;
        self
    }
}

fn default_enabled() -> bool {
    true
}

/// A rate definition as submitted by an administrator. Use [`crate::helpers::validate_new_rate`] (which the
/// [`crate::CommissionApi`] always calls) before persisting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCommissionRate {
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub rate_type: CommissionType,
    pub target: CommissionTarget,
    pub value: f64,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub min_amount: Option<MinorUnits>,
    #[serde(default)]
    pub include_tax: bool,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub rules: Vec<NewCommissionRule>,
}

impl NewCommissionRate {
    pub fn new<S: Into<String>>(code: S, rate_type: CommissionType, target: CommissionTarget, value: f64) -> Self {
        let code = code.into();
        Self {
            name: code.clone(),
            code,
            rate_type,
            target,
            value,
            currency_code: None,
            min_amount: None,
            include_tax: false,
            is_enabled: true,
            priority: 0,
            rules: Vec::new(),
        }
    }

    pub fn percentage<S: Into<String>>(code: S, target: CommissionTarget, value: f64) -> Self {
        Self::new(code, CommissionType::Percentage, target, value)
    }

    pub fn fixed<S: Into<String>>(code: S, target: CommissionTarget, value: i64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self::new(code, CommissionType::Fixed, target, value as f64)
    }

    /// Parses a rate definition from JSON. Unknown types or targets, missing fields and wrongly typed values are all
    /// reported as [`RateValidationError::Malformed`]. Field-level checks still need to run afterwards.
    pub fn from_json(json: &str) -> Result<Self, crate::helpers::RateValidationError> {
        serde_json::from_str(json).map_err(|e| crate::helpers::RateValidationError::Malformed(e.to_string()))
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency_code: S) -> Self {
        self.currency_code = Some(currency_code.into());
        self
    }

    pub fn with_min_amount(mut self, min_amount: i64) -> Self {
        self.min_amount = Some(MinorUnits::from(min_amount));
        self
    }

    pub fn with_tax_included(mut self) -> Self {
        self.include_tax = true;
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_rule(mut self, rule: NewCommissionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }
}

//--------------------------------------    CommissionLine    ---------------------------------------------------------
/// The commission owed on one candidate. Lines are value copies; editing the rate later never changes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionLine {
    /// The id of the line item or shipping method the commission applies to.
    pub item_id: String,
    /// The code of the rate that produced this line.
    pub code: String,
    /// The configured `value` of the rate at resolution time.
    pub rate: f64,
    pub amount: MinorUnits,
}

/// A commission line as persisted next to the order credit that consumed it.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RecordedCommissionLine {
    pub id: i64,
    pub transaction_id: i64,
    pub order_id: String,
    pub item_id: String,
    pub code: String,
    pub rate: f64,
    pub amount: MinorUnits,
    pub currency_code: String,
    pub created_at: DateTime<Utc>,
}

impl From<RecordedCommissionLine> for CommissionLine {
    fn from(line: RecordedCommissionLine) -> Self {
        Self { item_id: line.item_id, code: line.code, rate: line.rate, amount: line.amount }
    }
}

//--------------------------------------     PayoutAccount    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PayoutAccount {
    pub id: i64,
    pub seller_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The running balance of one account in one currency. The storage layer guarantees `balance >= 0`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PayoutBalance {
    pub id: i64,
    pub account_id: i64,
    pub currency_code: String,
    pub balance: MinorUnits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//-------------------------------------- TransactionReference ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionReference {
    /// Net earnings credited for a confirmed order.
    Order,
    /// Funds withdrawn by an authorized payout.
    Payout,
    /// Funds returned to the balance when a payout fails.
    PayoutReversal,
}

impl Display for TransactionReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionReference::Order => write!(f, "order"),
            TransactionReference::Payout => write!(f, "payout"),
            TransactionReference::PayoutReversal => write!(f, "payout_reversal"),
        }
    }
}

impl FromStr for TransactionReference {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(Self::Order),
            "payout" => Ok(Self::Payout),
            "payout_reversal" => Ok(Self::PayoutReversal),
            _ => Err(ConversionError(format!("Invalid transaction reference: {s}"))),
        }
    }
}

/// An append-only journal entry. Credits are positive and debits negative, so the entries for an
/// `(account_id, currency_code)` pair always sum to its balance.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PayoutTransaction {
    pub id: i64,
    pub account_id: i64,
    pub currency_code: String,
    pub amount: MinorUnits,
    pub reference: TransactionReference,
    pub reference_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayoutTransaction {
    pub account_id: i64,
    pub currency_code: String,
    pub amount: MinorUnits,
    pub reference: TransactionReference,
    pub reference_id: String,
}

impl NewPayoutTransaction {
    pub fn new<S1, S2>(
        account_id: i64,
        currency_code: S1,
        amount: MinorUnits,
        reference: TransactionReference,
        reference_id: S2,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self { account_id, currency_code: currency_code.into(), amount, reference, reference_id: reference_id.into() }
    }
}

//--------------------------------------     PayoutStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Funds have been reserved and the payout is awaiting disbursement.
    Pending,
    /// The payout was disbursed.
    Paid,
    /// Disbursement failed and the funds were returned to the balance.
    Failed,
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Paid | PayoutStatus::Failed)
    }
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::Pending => write!(f, "Pending"),
            PayoutStatus::Paid => write!(f, "Paid"),
            PayoutStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl From<String> for PayoutStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payout status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PayoutStatus::Pending
        })
    }
}

impl FromStr for PayoutStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payout status: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: i64,
    pub account_id: i64,
    pub amount: MinorUnits,
    pub currency_code: String,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      SellerOrder     ---------------------------------------------------------
/// A confirmed order for a single seller, as handed to the ledger by the order module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerOrder {
    pub order_id: String,
    pub seller_id: String,
    pub currency_code: String,
    /// The order total, in minor units of `currency_code`.
    pub total: MinorUnits,
    /// The commission lines for the order's items and shipping methods.
    #[serde(default)]
    pub commission_lines: Vec<CommissionLine>,
}

impl SellerOrder {
    pub fn new<S1, S2, S3>(order_id: S1, seller_id: S2, currency_code: S3, total: MinorUnits) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            order_id: order_id.into(),
            seller_id: seller_id.into(),
            currency_code: currency_code.into(),
            total,
            commission_lines: Vec::new(),
        }
    }

    pub fn with_commission_lines(mut self, lines: Vec<CommissionLine>) -> Self {
        self.commission_lines = lines;
        self
    }

    /// The sum of the commission lines, or `None` if it does not fit in `MinorUnits`.
    pub fn commission_total(&self) -> Option<MinorUnits> {
        self.commission_lines.iter().try_fold(MinorUnits::ZERO, |total, line| total.checked_add(line.amount))
    }

    /// What the seller keeps: the order total less all commissions. `None` on overflow.
    pub fn net_earning(&self) -> Option<MinorUnits> {
        self.total.checked_sub(self.commission_total()?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn enum_strings() {
        assert_eq!(RuleReference::ProductCategory.to_string(), "product_category");
        assert_eq!("shipping_option_type".parse::<RuleReference>().unwrap(), RuleReference::ShippingOptionType);
        assert!("category".parse::<RuleReference>().is_err());
        assert_eq!("PERCENTAGE".parse::<CommissionType>().unwrap(), CommissionType::Percentage);
        assert_eq!(TransactionReference::PayoutReversal.to_string(), "payout_reversal");
        assert_eq!(PayoutStatus::from("Paid".to_string()), PayoutStatus::Paid);
        assert_eq!(PayoutStatus::from("bogus".to_string()), PayoutStatus::Pending);
        assert!(PayoutStatus::Failed.is_terminal());
        assert!(!PayoutStatus::Pending.is_terminal());
    }

    #[test]
    fn new_rate_from_json_applies_defaults() {
        let json = r#"{"name": "Default", "code": "default", "type": "percentage", "target": "item", "value": 10}"#;
        let rate = NewCommissionRate::from_json(json).unwrap();
        assert_eq!(rate.rate_type, CommissionType::Percentage);
        assert_eq!(rate.target, CommissionTarget::Item);
        assert_eq!(rate.value, 10.0);
        assert!(rate.is_enabled);
        assert!(!rate.include_tax);
        assert_eq!(rate.priority, 0);
        assert!(rate.rules.is_empty());
        assert!(rate.currency_code.is_none());
    }

    #[test]
    fn new_rate_from_json_rejects_unknown_kinds() {
        let json = r#"{"name": "x", "code": "x", "type": "tiered", "target": "item", "value": 10}"#;
        assert!(matches!(NewCommissionRate::from_json(json), Err(crate::helpers::RateValidationError::Malformed(_))));
        let json = r#"{"name": "x", "code": "x", "type": "fixed", "target": "order", "value": 10}"#;
        assert!(NewCommissionRate::from_json(json).is_err());
        let json = r#"{"name": "x", "type": "fixed", "target": "item", "value": 10}"#;
        let err = NewCommissionRate::from_json(json).unwrap_err();
        assert!(err.to_string().contains("code"));
    }

    #[test]
    fn net_earning() {
        let line = |item_id: &str, code: &str, rate: f64, amount: i64| CommissionLine {
            item_id: item_id.into(),
            code: code.into(),
            rate,
            amount: MinorUnits::from(amount),
        };
        let lines = vec![line("item_1", "default", 10.0, 1_000), line("ship_1", "ship", 500.0, 500)];
        let order =
            SellerOrder::new("order_1", "seller_1", "usd", MinorUnits::from(12_000)).with_commission_lines(lines);
        assert_eq!(order.commission_total(), Some(MinorUnits::from(1_500)));
        assert_eq!(order.net_earning(), Some(MinorUnits::from(10_500)));

        let huge = vec![line("item_1", "all", 100.0, i64::MAX), line("item_2", "all", 100.0, i64::MAX)];
        let order = SellerOrder::new("order_2", "seller_1", "usd", MinorUnits::from(1)).with_commission_lines(huge);
        assert_eq!(order.commission_total(), None);
        assert_eq!(order.net_earning(), None);
        let order = SellerOrder::new("order_3", "seller_1", "usd", MinorUnits::from(i64::MIN))
            .with_commission_lines(vec![line("item_1", "all", 1.0, 1)]);
        assert_eq!(order.net_earning(), None);
    }
}
