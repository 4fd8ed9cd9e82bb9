//! Ordered rule table mapping codec, format and capabilities to a preferred path.
//!
//! Scale, fps and quality adjustments are not decided here; they belong to ancillary encoder
//! resolution in the planner.

use crate::capability::probe::Capabilities;
use crate::codec::classify::{capability, effective_capability, is_complex};
use crate::foundation::core::{
    CodecFamily, ContainerKind, ConversionPath, DecodeCapability, OutputFormat,
};

/// How strongly the registry believes in its choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Inputs to a strategy lookup.
#[derive(Clone, Copy, Debug)]
pub struct StrategyQuery<'a> {
    pub codec: CodecFamily,
    pub format: OutputFormat,
    pub container: Option<ContainerKind>,
    pub capabilities: &'a Capabilities,
    pub duration_secs: Option<f64>,
}

/// Preferred path for a query.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Strategy {
    pub preferred_path: ConversionPath,
    pub confidence: Confidence,
    pub reason: String,
}

/// A path the registry considered and did not pick.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Alternative {
    pub path: ConversionPath,
    pub rejected_because: String,
}

/// Diagnostic explanation of a lookup. Never consumed for control flow.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StrategyReasoning {
    pub strategy: Strategy,
    pub matched_rule: &'static str,
    pub factors: Vec<(String, String)>,
    pub alternatives: Vec<Alternative>,
}

struct Rule {
    name: &'static str,
    applies: fn(&StrategyQuery<'_>) -> bool,
    decide: fn(&StrategyQuery<'_>) -> Strategy,
}

const RULES: &[Rule] = &[
    Rule {
        name: "native-fast-format",
        applies: |q| q.format.requires_native_fast(),
        decide: |q| Strategy {
            preferred_path: ConversionPath::NativeFast,
            confidence: Confidence::High,
            reason: format!("{} output is produced by the native encoder only", q.format),
        },
    },
    Rule {
        name: "hardware-only-codec",
        applies: |q| capability(q.codec) == DecodeCapability::HardwareOnly,
        decide: |q| Strategy {
            preferred_path: ConversionPath::Hardware,
            confidence: Confidence::High,
            reason: format!("{} can only be decoded on the hardware path", q.codec),
        },
    },
    Rule {
        name: "complex-codec-hardware",
        applies: |q| is_complex(q.codec) && q.capabilities.hardware_decode,
        decide: |q| Strategy {
            preferred_path: ConversionPath::Hardware,
            confidence: Confidence::Medium,
            reason: format!(
                "{} software decode is slow; hardware decode is available",
                q.codec
            ),
        },
    },
    Rule {
        name: "complex-codec-software",
        applies: |q| is_complex(q.codec),
        decide: |q| Strategy {
            preferred_path: ConversionPath::Software,
            confidence: Confidence::Low,
            reason: match q.duration_secs {
                Some(d) => format!(
                    "{} without hardware decode; software transcode of {d:.1}s will be slow",
                    q.codec
                ),
                None => format!("{} without hardware decode; software transcode", q.codec),
            },
        },
    },
    Rule {
        name: "common-codec-direct",
        applies: |q| {
            matches!(q.codec, CodecFamily::H264 | CodecFamily::Vp8) && q.format.is_gif_like()
        },
        decide: |q| Strategy {
            preferred_path: ConversionPath::Software,
            confidence: if q.codec == CodecFamily::H264 {
                Confidence::High
            } else {
                Confidence::Medium
            },
            reason: format!(
                "direct software transcode of {} to {} beats hardware decode plus frame encode",
                q.codec, q.format
            ),
        },
    },
];

const DEFAULT_RULE: &str = "default-software";

fn default_strategy(q: &StrategyQuery<'_>) -> Strategy {
    Strategy {
        preferred_path: ConversionPath::Software,
        confidence: Confidence::Low,
        reason: format!(
            "no specific rule for {} to {}; software transcoder accepts most inputs",
            q.codec, q.format
        ),
    }
}

/// Stateless rule table lookup.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrategyRegistry;

impl StrategyRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn get_strategy(&self, q: &StrategyQuery<'_>) -> Strategy {
        self.lookup(q).1
    }

    pub fn get_strategy_reasoning(&self, q: &StrategyQuery<'_>) -> StrategyReasoning {
        let (rule, strategy) = self.lookup(q);
        let caps = q.capabilities;

        let mut factors = vec![
            ("codec".to_string(), q.codec.to_string()),
            ("format".to_string(), q.format.to_string()),
            (
                "codec_capability".to_string(),
                format!("{:?}", capability(q.codec)),
            ),
            (
                "effective_capability".to_string(),
                format!("{:?}", effective_capability(q.codec, caps)),
            ),
            (
                "hardware_decode".to_string(),
                caps.hardware_decode.to_string(),
            ),
            (
                "threading".to_string(),
                caps.threading_available().to_string(),
            ),
        ];
        if let Some(c) = q.container {
            factors.push(("container".to_string(), c.as_str().to_string()));
        }
        if let Some(d) = q.duration_secs {
            factors.push(("duration_secs".to_string(), format!("{d:.2}")));
        }

        let alternatives = [
            ConversionPath::Hardware,
            ConversionPath::Software,
            ConversionPath::NativeFast,
        ]
        .into_iter()
        .filter(|p| *p != strategy.preferred_path)
        .map(|path| Alternative {
            path,
            rejected_because: rejection(path, q, &strategy),
        })
        .collect();

        StrategyReasoning {
            strategy,
            matched_rule: rule,
            factors,
            alternatives,
        }
    }

    fn lookup(&self, q: &StrategyQuery<'_>) -> (&'static str, Strategy) {
        RULES
            .iter()
            .find(|r| (r.applies)(q))
            .map(|r| (r.name, (r.decide)(q)))
            .unwrap_or_else(|| (DEFAULT_RULE, default_strategy(q)))
    }
}

fn rejection(path: ConversionPath, q: &StrategyQuery<'_>, chosen: &Strategy) -> String {
    let cap = capability(q.codec);
    match path {
        ConversionPath::NativeFast if !q.format.requires_native_fast() => {
            format!("native encoder only produces mp4, not {}", q.format)
        }
        ConversionPath::Hardware | ConversionPath::Software if q.format.requires_native_fast() => {
            format!("{} has no frame-encoder path", q.format)
        }
        ConversionPath::Software if !cap.allows_software() => {
            format!("{} has no software decoder", q.codec)
        }
        ConversionPath::Hardware if !q.capabilities.hardware_decode => {
            "hardware decode unavailable in this runtime".to_string()
        }
        _ => format!(
            "lower preference than {} ({:?} confidence)",
            chosen.preferred_path, chosen.confidence
        ),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/strategy/registry.rs"]
mod tests;
