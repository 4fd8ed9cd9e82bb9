//! Memory and frame budgets gating the worker GIF encoder.
//!
//! The defaults are device tuning, not contract; all of them are configurable through
//! [`crate::EngineConfig`].

use crate::capability::probe::Capabilities;
use crate::foundation::core::{CodecFamily, GifEncoder, QualityTier};
use crate::foundation::error::{ConvoyError, ConvoyResult};

/// One value per quality tier.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PerQuality<T> {
    pub low: T,
    pub medium: T,
    pub high: T,
}

impl<T: Copy> PerQuality<T> {
    pub fn get(&self, tier: QualityTier) -> T {
        match tier {
            QualityTier::Low => self.low,
            QualityTier::Medium => self.medium,
            QualityTier::High => self.high,
        }
    }
}

/// Fraction of the heap ceiling raw frames may occupy, by output scale.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HeapRatioByScale {
    /// Scale <= 0.5.
    pub half: f64,
    /// Scale <= 0.75.
    pub three_quarters: f64,
    /// Anything larger.
    pub full: f64,
}

impl HeapRatioByScale {
    pub fn get(&self, scale: f64) -> f64 {
        if scale <= 0.5 {
            self.half
        } else if scale <= 0.75 {
            self.three_quarters
        } else {
            self.full
        }
    }
}

/// Codec + encoder pair known to fail together, and the encoder to use instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UnreliableCombo {
    pub codec: CodecFamily,
    pub encoder: GifEncoder,
    pub substitute: GifEncoder,
}

/// Tunables for fast-encoder eligibility.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlannerBudgets {
    /// Longest clip (after the duration cap) the worker encoder may take.
    pub max_duration_secs: PerQuality<f64>,
    /// Most frames the worker encoder may buffer.
    pub max_frames: PerQuality<u64>,
    /// GIF/WebP frame rate used when the request does not set one.
    pub target_fps: PerQuality<f64>,
    pub heap_ratio: HeapRatioByScale,
    /// Heap ceiling assumed when the platform does not report one.
    pub fallback_heap_bytes: u64,
    /// Devices reporting this much memory or less are low-memory.
    pub low_memory_gb: f64,
    /// Fewest logical cores on which the worker encoder still pays off.
    pub min_worker_cores: u32,
    /// Codec whose worker path must be backed by session history before it is attempted.
    pub history_gated_codec: Option<CodecFamily>,
    pub unreliable_combos: Vec<UnreliableCombo>,
}

impl Default for PlannerBudgets {
    fn default() -> Self {
        Self {
            max_duration_secs: PerQuality {
                low: 30.0,
                medium: 20.0,
                high: 12.0,
            },
            max_frames: PerQuality {
                low: 450,
                medium: 300,
                high: 180,
            },
            target_fps: PerQuality {
                low: 10.0,
                medium: 15.0,
                high: 20.0,
            },
            heap_ratio: HeapRatioByScale {
                half: 0.5,
                three_quarters: 0.35,
                full: 0.25,
            },
            fallback_heap_bytes: 2 << 30,
            low_memory_gb: 4.0,
            min_worker_cores: 2,
            history_gated_codec: Some(CodecFamily::Av1),
            unreliable_combos: vec![UnreliableCombo {
                codec: CodecFamily::Av1,
                encoder: GifEncoder::Worker,
                substitute: GifEncoder::Palette,
            }],
        }
    }
}

/// Raw frame buffer footprint of one conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameBufferEstimate {
    pub duration_secs: f64,
    pub fps: f64,
    pub frames: u64,
    /// RGBA bytes for all frames at output scale.
    pub bytes: u64,
}

impl FrameBufferEstimate {
    pub fn new(width: u32, height: u32, duration_secs: f64, fps: f64, scale: f64) -> Self {
        let scaled = |v: u32| ((v as f64) * scale).round().max(1.0) as u64;
        let frames = (duration_secs.max(0.0) * fps.max(0.0)).ceil() as u64;
        let bytes = scaled(width)
            .saturating_mul(scaled(height))
            .saturating_mul(4)
            .saturating_mul(frames);
        Self {
            duration_secs,
            fps,
            frames,
            bytes,
        }
    }
}

impl PlannerBudgets {
    pub fn validate(&self) -> ConvoyResult<()> {
        for (name, v) in [
            ("half", self.heap_ratio.half),
            ("three_quarters", self.heap_ratio.three_quarters),
            ("full", self.heap_ratio.full),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(ConvoyError::validation(format!(
                    "planner heap_ratio.{name} must be in (0, 1]"
                )));
            }
        }
        for tier in [QualityTier::Low, QualityTier::Medium, QualityTier::High] {
            let fps = self.target_fps.get(tier);
            if !fps.is_finite() || fps <= 0.0 {
                return Err(ConvoyError::validation(format!(
                    "planner target_fps.{} must be finite and > 0",
                    tier.as_str()
                )));
            }
        }
        if self.fallback_heap_bytes == 0 {
            return Err(ConvoyError::validation(
                "planner fallback_heap_bytes must be > 0",
            ));
        }
        Ok(())
    }

    /// Heap bytes the worker encoder may fill at `scale`.
    pub fn heap_budget_bytes(&self, caps: &Capabilities, scale: f64) -> u64 {
        let ceiling = caps.heap_limit_bytes.unwrap_or(self.fallback_heap_bytes);
        (ceiling as f64 * self.heap_ratio.get(scale)) as u64
    }

    /// Every budget the estimate exceeds, as human-readable reasons. Empty means within budget.
    pub fn violations(
        &self,
        est: &FrameBufferEstimate,
        quality: QualityTier,
        scale: f64,
        caps: &Capabilities,
    ) -> Vec<String> {
        let mut out = Vec::new();
        let max_dur = self.max_duration_secs.get(quality);
        if est.duration_secs > max_dur {
            out.push(format!(
                "duration {:.1}s exceeds {max_dur:.1}s {} budget",
                est.duration_secs,
                quality.as_str()
            ));
        }
        let max_frames = self.max_frames.get(quality);
        if est.frames > max_frames {
            out.push(format!(
                "{} frames exceed {max_frames} {} budget",
                est.frames,
                quality.as_str()
            ));
        }
        let heap = self.heap_budget_bytes(caps, scale);
        if est.bytes > heap {
            out.push(format!(
                "frame buffers {} MiB exceed {} MiB heap budget at scale {scale}",
                est.bytes >> 20,
                heap >> 20
            ));
        }
        out
    }

    pub fn substitute_for(&self, codec: CodecFamily, encoder: GifEncoder) -> Option<GifEncoder> {
        self.unreliable_combos
            .iter()
            .find(|c| c.codec == codec && c.encoder == encoder)
            .map(|c| c.substitute)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/plan/budget.rs"]
mod tests;
