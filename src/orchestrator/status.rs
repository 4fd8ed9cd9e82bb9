/// Lifecycle of one conversion attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionPhase {
    Idle,
    Initializing,
    Analyzing,
    Converting,
    Complete,
    Cancelled,
    Error,
}

impl ConversionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Analyzing => "analyzing",
            Self::Converting => "converting",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Initializing | Self::Analyzing | Self::Converting)
    }
}

impl std::fmt::Display for ConversionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned by `get_status`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConversionStatus {
    pub is_converting: bool,
    /// Normalized 0–100.
    pub progress: f64,
    pub status_message: String,
    pub phase: ConversionPhase,
}

impl Default for ConversionStatus {
    fn default() -> Self {
        Self {
            is_converting: false,
            progress: 0.0,
            status_message: "Idle".to_string(),
            phase: ConversionPhase::Idle,
        }
    }
}

impl ConversionStatus {
    pub(crate) fn started() -> Self {
        Self {
            is_converting: true,
            progress: 0.0,
            status_message: "Preparing conversion".to_string(),
            phase: ConversionPhase::Initializing,
        }
    }

    pub(crate) fn enter(&mut self, phase: ConversionPhase, message: impl Into<String>) {
        self.phase = phase;
        self.is_converting = phase.is_active();
        self.status_message = message.into();
        if phase == ConversionPhase::Complete {
            self.progress = 100.0;
        }
    }
}
