//! Weighted phase progress.
//!
//! Each phase owns a slice of the 0–100 range proportional to its weight; per-phase fractions
//! are mapped into that slice. Reported progress never moves backwards within one reporter.

use parking_lot::Mutex;

use crate::foundation::error::{ConvoyError, ConvoyResult};
use crate::orchestrator::request::{ProgressCallback, StatusCallback};

/// Progress-bearing phases, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Initializing,
    Analyzing,
    Converting,
    Finalizing,
}

impl ProgressPhase {
    pub const ALL: [ProgressPhase; 4] = [
        Self::Initializing,
        Self::Analyzing,
        Self::Converting,
        Self::Finalizing,
    ];
}

/// Relative phase weights. Only ratios matter.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PhaseWeights {
    pub initializing: f64,
    pub analyzing: f64,
    pub converting: f64,
    pub finalizing: f64,
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self {
            initializing: 5.0,
            analyzing: 10.0,
            converting: 80.0,
            finalizing: 5.0,
        }
    }
}

impl PhaseWeights {
    pub fn weight(&self, phase: ProgressPhase) -> f64 {
        match phase {
            ProgressPhase::Initializing => self.initializing,
            ProgressPhase::Analyzing => self.analyzing,
            ProgressPhase::Converting => self.converting,
            ProgressPhase::Finalizing => self.finalizing,
        }
    }

    fn total(&self) -> f64 {
        ProgressPhase::ALL.iter().map(|p| self.weight(*p)).sum()
    }

    pub fn validate(&self) -> ConvoyResult<()> {
        for phase in ProgressPhase::ALL {
            let w = self.weight(phase);
            if !w.is_finite() || w < 0.0 {
                return Err(ConvoyError::validation(format!(
                    "progress weight for {phase:?} must be finite and >= 0"
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(ConvoyError::validation(
                "progress weights must not all be zero",
            ));
        }
        Ok(())
    }

    /// Overall percentage for `fraction` of `phase` done.
    pub fn overall(&self, phase: ProgressPhase, fraction: f64) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let before: f64 = ProgressPhase::ALL
            .iter()
            .take_while(|p| **p != phase)
            .map(|p| self.weight(*p))
            .sum();
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        ((before + self.weight(phase) * fraction) / total * 100.0).clamp(0.0, 100.0)
    }
}

/// Emits normalized progress and status messages for one attempt.
pub struct PhaseProgress {
    weights: PhaseWeights,
    last: Mutex<f64>,
    on_progress: Option<ProgressCallback>,
    on_status: Option<StatusCallback>,
}

impl PhaseProgress {
    pub fn new(
        weights: PhaseWeights,
        on_progress: Option<ProgressCallback>,
        on_status: Option<StatusCallback>,
    ) -> Self {
        Self {
            weights,
            last: Mutex::new(0.0),
            on_progress,
            on_status,
        }
    }

    /// Advance to `fraction` of `phase` and return the (monotonic) overall percentage.
    /// The progress callback only fires when the value moves.
    pub fn advance(&self, phase: ProgressPhase, fraction: f64) -> f64 {
        let target = self.weights.overall(phase, fraction);
        let (value, moved) = {
            let mut last = self.last.lock();
            if target > *last {
                *last = target;
                (target, true)
            } else {
                (*last, false)
            }
        };
        if moved && let Some(cb) = &self.on_progress {
            cb(value);
        }
        value
    }

    pub fn current(&self) -> f64 {
        *self.last.lock()
    }

    pub fn status(&self, message: &str) {
        if let Some(cb) = &self.on_status {
            cb(message);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/progress/reporter.rs"]
mod tests;
