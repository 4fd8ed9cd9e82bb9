//! Conversion lifecycle: requests in, results or typed failures out.

/// The orchestrator itself.
pub mod engine;
/// Request, options and result types.
pub mod request;
/// Status snapshot and lifecycle phases.
pub mod status;
