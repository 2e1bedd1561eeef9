//! Decides whether a rate's rules apply to a candidate.
use crate::{
    commission::Candidate,
    db_types::{CommissionRate, CommissionRule, RuleReference},
};

/// A rate with no rules is a catch-all. Otherwise at least one of its rules must be satisfied.
pub fn matches(rate: &CommissionRate, candidate: &Candidate) -> bool {
    rate.rules.is_empty() || rate.rules.iter().any(|rule| rule_matches(rule, candidate))
}

pub fn rule_matches(rule: &CommissionRule, candidate: &Candidate) -> bool {
    let id = rule.reference_id.as_str();
    match rule.reference {
        RuleReference::Seller => candidate.seller_id() == Some(id),
        RuleReference::Product => candidate.product_id() == Some(id),
        RuleReference::ProductType => candidate.product_type_id() == Some(id),
        RuleReference::ProductCategory => candidate.category_ids().any(|c| c == id),
        RuleReference::ShippingOptionType => candidate.shipping_option_type_id() == Some(id),
    }
}
