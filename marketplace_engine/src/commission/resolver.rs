//! Selects the winning rate for each candidate and assembles the commission lines for a request.
use std::cmp::Ordering;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    commission::{calculate, matches, Candidate, ResolveCommissionRequest},
    db_types::{CommissionLine, CommissionRate, CommissionTarget, MinorUnits},
};

/// Whether a rate may be considered at all for the given target and currency. Rates without a currency are fallbacks
/// that apply to any currency.
pub fn is_eligible(rate: &CommissionRate, target: CommissionTarget, currency_code: &str) -> bool {
    rate.is_enabled &&
        rate.target == target &&
        rate.currency_code.as_deref().map(|c| c.eq_ignore_ascii_case(currency_code)).unwrap_or(true)
}

/// Orders rates so that the preferred one compares as the smallest: higher priority first, then an exact currency over
/// the `null` fallback, then the lowest (i.e. oldest) id.
fn preference(a: &CommissionRate, b: &CommissionRate) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.currency_code.is_some().cmp(&a.currency_code.is_some()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Picks the single best rate for the candidate, or `None` if no eligible rate matches it.
pub fn select_rate<'a>(
    rates: &'a [CommissionRate],
    candidate: &Candidate,
    target: CommissionTarget,
    currency_code: &str,
) -> Option<&'a CommissionRate> {
    rates
        .iter()
        .filter(|rate| is_eligible(rate, target, currency_code))
        .filter(|rate| matches(rate, candidate))
        .min_by(|a, b| preference(a, b))
}

/// Produces one commission line for every candidate that has a matching rate, in candidate order.
pub fn resolve(
    rates: &[CommissionRate],
    candidates: &[Candidate],
    currency_code: &str,
    target: CommissionTarget,
) -> Vec<CommissionLine> {
    candidates
        .iter()
        .filter_map(|candidate| match select_rate(rates, candidate, target, currency_code) {
            Some(rate) => {
                let line = calculate(rate, candidate);
                trace!("🧮️ {target} {} -> rate '{}' ({}): {}", candidate.id, rate.code, rate.value, line.amount);
                Some(line)
            },
            None => {
                trace!("🧮️ No {target} rate applies to {} in {currency_code}", candidate.id);
                None
            },
        })
        .collect()
}

/// Resolves the lines for all items, followed by the lines for all shipping methods.
pub fn resolve_request(rates: &[CommissionRate], request: &ResolveCommissionRequest) -> Vec<CommissionLine> {
    let currency = request.currency_code.as_str();
    let mut lines = resolve(rates, &request.items, currency, CommissionTarget::Item);
    lines.extend(resolve(rates, &request.shipping_methods, currency, CommissionTarget::Shipping));
    debug!(
        "🧮️ Resolved {} commission lines for {} items and {} shipping methods in {currency}",
        lines.len(),
        request.items.len(),
        request.shipping_methods.len()
    );
    lines
}

/// The commission owed on a request, split by target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionSummary {
    pub currency_code: String,
    pub lines: Vec<CommissionLine>,
    pub item_commission: MinorUnits,
    pub shipping_commission: MinorUnits,
    pub total: MinorUnits,
}

fn saturating_total(lines: &[CommissionLine]) -> MinorUnits {
    lines.iter().fold(MinorUnits::ZERO, |total, line| total.saturating_add(line.amount))
}

/// Resolves a request and totals the result. Totals beyond the range of `MinorUnits` saturate, as line amounts do.
pub fn summarize(rates: &[CommissionRate], request: &ResolveCommissionRequest) -> CommissionSummary {
    let currency = request.currency_code.as_str();
    let item_lines = resolve(rates, &request.items, currency, CommissionTarget::Item);
    let shipping_lines = resolve(rates, &request.shipping_methods, currency, CommissionTarget::Shipping);
    let item_commission = saturating_total(&item_lines);
    let shipping_commission = saturating_total(&shipping_lines);
    let mut lines = item_lines;
    lines.extend(shipping_lines);
    CommissionSummary {
        currency_code: request.currency_code.clone(),
        lines,
        item_commission,
        shipping_commission,
        total: item_commission.saturating_add(shipping_commission),
    }
}
