//! # tg-policy
//!
//! Policy bundle model and evaluation engine for toolgate.
//!
//! A [`Bundle`] is an ordered list of rules plus a default decision. The
//! [`PolicyEngine`] evaluates a `(tool, args)` pair against the rules in
//! declared order — first match wins — and returns Allow, Deny, or
//! Approval. [`PolicyEngine::evaluate_with_trace`] additionally records
//! every rule it skipped or checked, which drives the `policy/simulate`
//! endpoint.

pub mod args;
pub mod bundle;
pub mod diff;
pub mod engine;
pub mod error;

pub use bundle::{Bundle, Defaults, Outcome, Rule};
pub use diff::{compare, BundleDiff};
pub use engine::{Decision, Evaluation, PolicyEngine, PredicateCheck, TraceStep};
pub use error::PolicyError;
