//! Primitives shared by the marketplace crates.
//!
//! * [`MinorUnits`] is the money type used everywhere an amount is stored or computed. Amounts are always whole
//!   numbers of the smallest denomination of a currency (cents for USD).
//! * [`op!`] implements the arithmetic operator traits for single-field newtypes.
//! * [`helpers`] contains small parsing helpers for environment-driven configuration.
pub mod helpers;
mod minor_units;

pub mod op;

pub use minor_units::{MinorUnits, MinorUnitsConversionError};
