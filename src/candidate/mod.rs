//! Candidate URL construction: per-URL breakdown and run-wide aggregation.

mod breakdown;
mod set;

pub use breakdown::{breakdown, DENYLISTED_EXTENSIONS};
pub use set::CandidateSet;
