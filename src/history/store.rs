use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::foundation::core::{
    CaptureMode, CodecFamily, ConversionPath, EncoderBackend, OutputFormat,
};
use crate::foundation::error::{ConvoyError, ConvoyResult};
use crate::history::stats::{
    EncoderRecommendation, RecommendationConfig, SummaryEntry, recommend_encoder, summarize,
};
use crate::storage::kv::SessionStore;

/// Session store key holding the serialized ring.
pub const HISTORY_KEY: &str = "convoy.outcome_history";

/// Terminal outcome of an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
    Cancelled,
}

/// Per-phase wall-clock breakdown of an attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PhaseTimings {
    pub init_ms: u64,
    pub analysis_ms: u64,
    pub conversion_ms: u64,
    pub total_ms: u64,
}

/// One finished attempt.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutcomeRecord {
    pub timestamp_ms: u64,
    pub codec: CodecFamily,
    pub format: OutputFormat,
    pub planned_path: ConversionPath,
    pub executed_path: ConversionPath,
    #[serde(default)]
    pub encoder: Option<EncoderBackend>,
    #[serde(default)]
    pub capture_mode: Option<CaptureMode>,
    #[serde(default)]
    pub timings: PhaseTimings,
    #[serde(default)]
    pub output_bytes: Option<u64>,
    pub outcome: Outcome,
    #[serde(default)]
    pub error: Option<String>,
}

/// History sizing and recommendation tuning.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Ring capacity; the oldest record is evicted first.
    pub capacity: usize,
    pub recommendation: RecommendationConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            recommendation: RecommendationConfig::default(),
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> ConvoyResult<()> {
        if self.capacity == 0 {
            return Err(ConvoyError::validation("history capacity must be > 0"));
        }
        let rec = &self.recommendation;
        if rec.window == 0 || rec.min_samples == 0 {
            return Err(ConvoyError::validation(
                "recommendation window and min_samples must be > 0",
            ));
        }
        if !(0.0..=1.0).contains(&rec.success_delta) {
            return Err(ConvoyError::validation(
                "recommendation success_delta must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Bounded, append-only ledger of conversion outcomes for the current session.
///
/// Every `record` persists the whole ring to the injected [`SessionStore`]. Persistence is
/// best-effort: failures are logged and never reach the caller.
pub struct OutcomeHistory {
    records: Mutex<VecDeque<OutcomeRecord>>,
    store: Arc<dyn SessionStore>,
    cfg: HistoryConfig,
}

impl OutcomeHistory {
    /// Empty history that persists into `store`.
    pub fn new(store: Arc<dyn SessionStore>, cfg: HistoryConfig) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(cfg.capacity)),
            store,
            cfg,
        }
    }

    /// History restored from `store`. Unreadable payloads start an empty ring.
    pub fn load(store: Arc<dyn SessionStore>, cfg: HistoryConfig) -> Self {
        let history = Self::new(store, cfg);
        match history.read_persisted() {
            Ok(restored) => {
                let mut ring = history.records.lock();
                let skip = restored.len().saturating_sub(cfg.capacity);
                ring.extend(restored.into_iter().skip(skip));
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable outcome history");
            }
        }
        history
    }

    /// In-memory history, mostly for tests.
    pub fn in_memory(cfg: HistoryConfig) -> Self {
        Self::new(Arc::new(crate::storage::kv::MemoryStore::new()), cfg)
    }

    /// Append, evict beyond capacity, persist.
    pub fn record(&self, entry: OutcomeRecord) {
        let snapshot = {
            let mut ring = self.records.lock();
            ring.push_back(entry);
            while ring.len() > self.cfg.capacity {
                ring.pop_front();
            }
            ring.iter().cloned().collect::<Vec<_>>()
        };
        if let Err(e) = self.persist(&snapshot) {
            tracing::warn!(error = %e, "outcome history not persisted");
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Oldest first.
    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
        if let Err(e) = self.store.remove(HISTORY_KEY) {
            tracing::warn!(error = %e, "outcome history not cleared from store");
        }
    }

    pub fn summary(&self) -> Vec<SummaryEntry> {
        let ring = self.records.lock();
        summarize(ring.iter())
    }

    /// Palette vs worker advice for `codec` on the hardware GIF path.
    pub fn encoder_recommendation(&self, codec: CodecFamily) -> Option<EncoderRecommendation> {
        let ring = self.records.lock();
        let samples: Vec<&OutcomeRecord> = ring
            .iter()
            .filter(|r| {
                r.codec == codec
                    && r.format == OutputFormat::Gif
                    && r.executed_path == ConversionPath::Hardware
                    && r.encoder.and_then(|e| e.gif_encoder()).is_some()
            })
            .collect();
        recommend_encoder(&samples, &self.cfg.recommendation)
    }

    pub fn export_json(&self) -> ConvoyResult<String> {
        serde_json::to_string_pretty(&self.records())
            .map_err(|e| ConvoyError::serde(format!("encode outcome history: {e}")))
    }

    fn persist(&self, snapshot: &[OutcomeRecord]) -> ConvoyResult<()> {
        let text = serde_json::to_string(snapshot)
            .map_err(|e| ConvoyError::telemetry(format!("encode outcome history: {e}")))?;
        self.store
            .set(HISTORY_KEY, &text)
            .map_err(|e| ConvoyError::telemetry(e.to_string()))
    }

    fn read_persisted(&self) -> ConvoyResult<Vec<OutcomeRecord>> {
        match self.store.get(HISTORY_KEY)? {
            None => Ok(Vec::new()),
            Some(text) => serde_json::from_str(&text)
                .map_err(|e| ConvoyError::serde(format!("decode outcome history: {e}"))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/history/store.rs"]
mod tests;
