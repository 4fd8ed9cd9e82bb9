//! Memoized runtime capability detection.

pub mod probe;
