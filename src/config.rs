use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::error::{ConvoyError, ConvoyResult};
use crate::history::store::HistoryConfig;
use crate::plan::budget::PlannerBudgets;
use crate::progress::reporter::PhaseWeights;

/// Engine tuning. Every section defaults to the tuned values, so a partial JSON document only
/// overrides what it names.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history: HistoryConfig,
    pub planner: PlannerBudgets,
    pub progress: PhaseWeights,
}

impl EngineConfig {
    /// Parse from a JSON reader and validate.
    pub fn from_reader<R: std::io::Read>(r: R) -> ConvoyResult<Self> {
        let cfg: EngineConfig = serde_json::from_reader(r)
            .map_err(|e| ConvoyError::validation(format!("parse engine config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(s: &str) -> ConvoyResult<Self> {
        Self::from_reader(s.as_bytes())
    }

    /// Parse from a JSON file on disk and validate.
    pub fn from_path(path: impl AsRef<Path>) -> ConvoyResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            ConvoyError::validation(format!("open engine config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> ConvoyResult<()> {
        self.history.validate()?;
        self.planner.validate()?;
        self.progress.validate()
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
