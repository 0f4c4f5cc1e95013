//! Explain Module - Human-readable reasons for a score
//!
//! Each detector has its own clause rules. A non-suspicious meter always gets
//! the fixed neutral message; a suspicious one always gets at least one clause.

pub mod engine;
pub mod types;

pub use engine::{explain_isolation_forest, explain_reconstruction, NORMAL_EXPLANATION};
pub use types::{Explanation, Severity};
