use std::collections::BTreeMap;

use crate::foundation::core::{CodecFamily, ConversionPath, GifEncoder, OutputFormat};
use crate::history::store::{Outcome, OutcomeRecord};

/// Aggregated outcomes for one `{codec, format, path}` group.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SummaryEntry {
    pub codec: CodecFamily,
    pub format: OutputFormat,
    pub path: ConversionPath,
    pub count: u64,
    pub success_count: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
}

/// Group records by codec, format and executed path, ordered by their names.
pub fn summarize<'a>(records: impl IntoIterator<Item = &'a OutcomeRecord>) -> Vec<SummaryEntry> {
    let mut groups: BTreeMap<(&'static str, &'static str, &'static str), Vec<&OutcomeRecord>> =
        BTreeMap::new();
    for r in records {
        groups
            .entry((r.codec.as_str(), r.format.as_str(), r.executed_path.as_str()))
            .or_default()
            .push(r);
    }

    groups
        .into_values()
        .map(|rs| {
            let first = rs[0];
            let count = rs.len() as u64;
            let success_count = rs.iter().filter(|r| r.outcome == Outcome::Success).count() as u64;
            let total: u64 = rs.iter().map(|r| r.timings.total_ms).sum();
            SummaryEntry {
                codec: first.codec,
                format: first.format,
                path: first.executed_path,
                count,
                success_count,
                success_rate: success_count as f64 / count as f64,
                avg_duration_ms: total as f64 / count as f64,
                min_duration_ms: rs.iter().map(|r| r.timings.total_ms).min().unwrap_or(0),
                max_duration_ms: rs.iter().map(|r| r.timings.total_ms).max().unwrap_or(0),
            }
        })
        .collect()
}

/// Nearest-rank percentile of `values`; `None` when empty.
pub fn percentile(values: &[u64], pct: f64) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

/// Recommendation tuning.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Most recent samples considered.
    pub window: usize,
    /// Samples needed before anything is recommended.
    pub min_samples: usize,
    /// Success-rate gap that decides on its own, before latency is compared.
    pub success_delta: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            window: 12,
            min_samples: 3,
            success_delta: 0.2,
        }
    }
}

/// Advisory encoder choice derived from recent session outcomes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EncoderRecommendation {
    pub encoder: GifEncoder,
    /// In `[0, 1]`; never a guarantee.
    pub confidence: f64,
    pub reason: String,
}

#[derive(Default)]
struct EncoderSamples {
    count: usize,
    successes: usize,
    success_ms: Vec<u64>,
}

impl EncoderSamples {
    fn success_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.successes as f64 / self.count as f64
        }
    }

    fn p90(&self) -> Option<u64> {
        percentile(&self.success_ms, 90.0)
    }
}

/// Compare palette and worker over the most recent samples.
///
/// `samples` must already be restricted to one codec on the hardware GIF path, oldest first.
pub fn recommend_encoder(
    samples: &[&OutcomeRecord],
    cfg: &RecommendationConfig,
) -> Option<EncoderRecommendation> {
    let window: Vec<&OutcomeRecord> = samples
        .iter()
        .rev()
        .take(cfg.window.max(1))
        .copied()
        .collect();
    if window.len() < cfg.min_samples.max(1) {
        return None;
    }

    let mut palette = EncoderSamples::default();
    let mut worker = EncoderSamples::default();
    for r in &window {
        let s = match r.encoder.and_then(|e| e.gif_encoder()) {
            Some(GifEncoder::Palette) => &mut palette,
            Some(GifEncoder::Worker) => &mut worker,
            None => continue,
        };
        s.count += 1;
        if r.outcome == Outcome::Success {
            s.successes += 1;
            s.success_ms.push(r.timings.total_ms);
        }
    }

    let fill = (window.len() as f64 / cfg.window.max(1) as f64).min(1.0);
    let confidence = |s: &EncoderSamples| (fill * 0.6 + s.success_rate() * 0.4).clamp(0.0, 1.0);

    let (encoder, conf, reason) = match (palette.count, worker.count) {
        (0, 0) => return None,
        (0, n) => (
            GifEncoder::Worker,
            confidence(&worker) * 0.5,
            format!("only worker has samples ({n})"),
        ),
        (n, 0) => (
            GifEncoder::Palette,
            confidence(&palette) * 0.5,
            format!("only palette has samples ({n})"),
        ),
        _ => {
            let delta = worker.success_rate() - palette.success_rate();
            if delta.abs() > cfg.success_delta {
                let (enc, s) = if delta > 0.0 {
                    (GifEncoder::Worker, &worker)
                } else {
                    (GifEncoder::Palette, &palette)
                };
                (
                    enc,
                    confidence(s),
                    format!(
                        "success rate palette {:.2} vs worker {:.2}",
                        palette.success_rate(),
                        worker.success_rate()
                    ),
                )
            } else {
                let enc = match (palette.p90(), worker.p90()) {
                    (Some(p), Some(w)) if w < p => GifEncoder::Worker,
                    (None, Some(_)) => GifEncoder::Worker,
                    _ => GifEncoder::Palette,
                };
                let s = if enc == GifEncoder::Worker {
                    &worker
                } else {
                    &palette
                };
                (
                    enc,
                    confidence(s),
                    format!(
                        "p90 latency palette {} vs worker {}",
                        fmt_ms(palette.p90()),
                        fmt_ms(worker.p90())
                    ),
                )
            }
        }
    };

    Some(EncoderRecommendation {
        encoder,
        confidence: conf.clamp(0.0, 1.0),
        reason,
    })
}

fn fmt_ms(v: Option<u64>) -> String {
    v.map(|ms| format!("{ms}ms"))
        .unwrap_or_else(|| "n/a".to_string())
}
