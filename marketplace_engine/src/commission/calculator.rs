//! Turns a resolved rate and a candidate into a commission line.
//!
//! All arithmetic is done on integer minor units. Percentages are scaled to millionths of a percent before being
//! applied, so a rate like `12.345678` is exact and the only rounding happens once, at the end.
use crate::{
    commission::Candidate,
    db_types::{CommissionLine, CommissionRate, CommissionType, MinorUnits},
};

const PERCENT_SCALE: i128 = 1_000_000;

pub fn calculate(rate: &CommissionRate, candidate: &Candidate) -> CommissionLine {
    let base = base_amount(rate, candidate);
    let raw = match rate.rate_type {
        CommissionType::Percentage => percentage_of(base, rate.value),
        #[allow(clippy::cast_possible_truncation)]
        CommissionType::Fixed => MinorUnits::from(rate.value.round() as i64),
    };
    let floor = rate.min_amount.unwrap_or(MinorUnits::ZERO);
    CommissionLine { item_id: candidate.id.clone(), code: rate.code.clone(), rate: rate.value, amount: raw.max(floor) }
}

fn base_amount(rate: &CommissionRate, candidate: &Candidate) -> i128 {
    let tax = match (rate.include_tax, candidate.tax_total) {
        (true, Some(tax)) => i128::from(tax.value()),
        _ => 0,
    };
    i128::from(candidate.subtotal.value()) + tax
}

/// `base * percent / 100`, rounded half away from zero. Results beyond the range of `MinorUnits` saturate.
///
/// For the non-negative amounts of real orders this is ordinary half-up rounding. A negative base (a refund or a
/// discount line) rounds to the mirror image of its positive counterpart, so `-15` at 10% is `-2`, not `-1`.
pub fn percentage_of(base: i128, percent: f64) -> MinorUnits {
    #[allow(clippy::cast_possible_truncation)]
    let scaled = (percent * PERCENT_SCALE as f64).round() as i128;
    let numerator = base.saturating_mul(scaled);
    let denominator = 100 * PERCENT_SCALE;
    let half = denominator / 2;
    let result = if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        -((-numerator + half) / denominator)
    };
    #[allow(clippy::cast_possible_truncation)]
    let clamped = result.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
    MinorUnits::from(clamped)
}
