//! Session outcome ledger and the statistics derived from it.

/// Grouped summaries and encoder recommendation.
pub mod stats;
/// Bounded ring persisted to the session store.
pub mod store;
