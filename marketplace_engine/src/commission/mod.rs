//! # Commission resolution
//!
//! Everything in this module is pure and holds no shared state. Rates are handed in by the caller, usually
//! [`crate::CommissionApi`], which loads them from a [`crate::traits::CommissionRateManagement`] backend on every
//! call.
//!
//! * [`matcher`] decides whether a rate's rules apply to a candidate.
//! * [`calculator`] turns a rate and a candidate into a [`CommissionLine`](crate::db_types::CommissionLine).
//! * [`resolver`] picks the single winning rate for each candidate and produces the lines for a whole request.
mod candidate;

pub mod calculator;
pub mod matcher;
pub mod resolver;

pub use calculator::calculate;
pub use candidate::{Candidate, CandidateProduct, IdRef, ResolveCommissionRequest, ShippingOption};
pub use matcher::matches;
pub use resolver::{resolve, resolve_request, select_rate, summarize, CommissionSummary};
