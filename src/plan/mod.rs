//! Path planning.

/// Worker-encoder budgets.
pub mod budget;
/// The per-attempt decision function.
pub mod planner;
