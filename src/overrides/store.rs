//! Developer-only execution overrides.
//!
//! Production builds never construct an [`OverrideStore`]; the orchestrator takes it as an
//! `Option`. Values are persisted as loose JSON strings and sanitized against the enum
//! whitelists on every read, so a stale or hand-edited entry degrades to "auto".

use std::sync::Arc;

use crate::foundation::core::{CaptureMode, CodecFamily, ConversionPath, GifEncoder};
use crate::foundation::error::{ConvoyError, ConvoyResult};
use crate::storage::kv::SessionStore;

/// Session store key holding the raw override set.
pub const OVERRIDES_KEY: &str = "convoy.dev_overrides";

/// Sanitized overrides. `None` means auto.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct OverrideSet {
    pub forced_path: Option<ConversionPath>,
    pub forced_encoder: Option<GifEncoder>,
    pub forced_capture_mode: Option<CaptureMode>,
    /// Plan as if the input were this codec.
    pub forced_strategy_codec: Option<CodecFamily>,
    /// Turn fallbacks into hard failures.
    pub disable_fallback: bool,
}

impl OverrideSet {
    /// `true` when the planner must bypass its heuristics.
    pub fn forces_execution(&self) -> bool {
        self.forced_path.is_some() || self.forced_encoder.is_some()
    }

    pub fn is_auto(&self) -> bool {
        *self == Self::default()
    }

    fn to_raw(&self) -> RawOverrides {
        RawOverrides {
            forced_path: self.forced_path.map(|p| p.as_str().to_string()),
            forced_encoder: self.forced_encoder.map(|e| e.as_str().to_string()),
            forced_capture_mode: self.forced_capture_mode.map(|m| m.as_str().to_string()),
            forced_strategy_codec: self.forced_strategy_codec.map(|c| c.as_str().to_string()),
            disable_fallback: Some(serde_json::Value::Bool(self.disable_fallback)),
        }
    }
}

/// Persisted shape: every field is free-form until sanitized.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct RawOverrides {
    forced_path: Option<String>,
    forced_encoder: Option<String>,
    forced_capture_mode: Option<String>,
    forced_strategy_codec: Option<String>,
    disable_fallback: Option<serde_json::Value>,
}

impl RawOverrides {
    fn sanitize(&self) -> OverrideSet {
        OverrideSet {
            forced_path: whitelist(&self.forced_path, |s| {
                ConversionPath::from_name(s).filter(|p| *p != ConversionPath::Unsupported)
            }),
            forced_encoder: whitelist(&self.forced_encoder, GifEncoder::from_name),
            forced_capture_mode: whitelist(&self.forced_capture_mode, CaptureMode::from_name),
            forced_strategy_codec: whitelist(&self.forced_strategy_codec, |s| {
                CodecFamily::from_name(s).filter(|c| *c != CodecFamily::Unknown)
            }),
            disable_fallback: matches!(self.disable_fallback, Some(serde_json::Value::Bool(true))),
        }
    }
}

fn whitelist<T>(raw: &Option<String>, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let s = raw.as_deref()?.trim();
    if s.is_empty() || s == "auto" {
        return None;
    }
    let parsed = parse(s);
    if parsed.is_none() {
        tracing::warn!(value = s, "ignoring unknown override value");
    }
    parsed
}

/// Override set persisted in a session store.
pub struct OverrideStore {
    store: Arc<dyn SessionStore>,
}

impl OverrideStore {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Current overrides; anything unreadable is auto.
    pub fn get(&self) -> OverrideSet {
        match self.read_raw() {
            Ok(raw) => raw.sanitize(),
            Err(e) => {
                tracing::warn!(error = %e, "override set unreadable; using auto");
                OverrideSet::default()
            }
        }
    }

    /// Persist `set`. Failures are logged and swallowed.
    pub fn set(&self, set: &OverrideSet) {
        if let Err(e) = self.write_raw(&set.to_raw()) {
            tracing::warn!(error = %e, "override set not persisted");
        } else if !set.is_auto() {
            tracing::info!(?set, "developer overrides updated");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(OVERRIDES_KEY) {
            tracing::warn!(error = %e, "override set not cleared");
        }
    }

    fn read_raw(&self) -> ConvoyResult<RawOverrides> {
        match self.store.get(OVERRIDES_KEY)? {
            None => Ok(RawOverrides::default()),
            Some(text) => serde_json::from_str(&text)
                .map_err(|e| ConvoyError::serde(format!("decode overrides: {e}"))),
        }
    }

    fn write_raw(&self, raw: &RawOverrides) -> ConvoyResult<()> {
        let text = serde_json::to_string(raw)
            .map_err(|e| ConvoyError::telemetry(format!("encode overrides: {e}")))?;
        self.store
            .set(OVERRIDES_KEY, &text)
            .map_err(|e| ConvoyError::telemetry(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/overrides/store.rs"]
mod tests;
