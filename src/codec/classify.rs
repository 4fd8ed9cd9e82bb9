//! Codec string normalization.
//!
//! Everything here is total: unrecognized input classifies as [`CodecFamily::Unknown`].

use crate::capability::probe::Capabilities;
use crate::foundation::core::{CodecFamily, DecodeCapability};

/// Prefix/substring table, checked in order. Prefixes catch fourCC/profile strings
/// (`avc1.64001f`, `vp09.00.10.08`), substrings catch human names (`H.264 / AVC`).
const PREFIXES: &[(&str, CodecFamily)] = &[
    ("avc1", CodecFamily::H264),
    ("avc3", CodecFamily::H264),
    ("hvc1", CodecFamily::Hevc),
    ("hev1", CodecFamily::Hevc),
    ("vp09", CodecFamily::Vp9),
    ("vp08", CodecFamily::Vp8),
    ("av01", CodecFamily::Av1),
];

const SUBSTRINGS: &[(&str, CodecFamily)] = &[
    ("h264", CodecFamily::H264),
    ("h.264", CodecFamily::H264),
    ("avc", CodecFamily::H264),
    ("hevc", CodecFamily::Hevc),
    ("h265", CodecFamily::Hevc),
    ("h.265", CodecFamily::Hevc),
    ("vp9", CodecFamily::Vp9),
    ("vp8", CodecFamily::Vp8),
    ("av1", CodecFamily::Av1),
];

/// Map a raw codec identifier onto a codec family.
pub fn normalize(codec: &str) -> CodecFamily {
    let lower = codec.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return CodecFamily::Unknown;
    }
    if let Some((_, family)) = PREFIXES.iter().find(|(p, _)| lower.starts_with(p)) {
        return *family;
    }
    SUBSTRINGS
        .iter()
        .find(|(s, _)| lower.contains(s))
        .map(|(_, family)| *family)
        .unwrap_or(CodecFamily::Unknown)
}

/// Static decode capability of a codec family.
///
/// Unknown codecs are optimistic (`Both`): the software transcoder accepts most inputs.
pub fn capability(family: CodecFamily) -> DecodeCapability {
    match family {
        CodecFamily::Av1 => DecodeCapability::HardwareOnly,
        CodecFamily::H264
        | CodecFamily::Hevc
        | CodecFamily::Vp8
        | CodecFamily::Vp9
        | CodecFamily::Unknown => DecodeCapability::Both,
    }
}

/// Codecs whose decode is expensive enough to need accurate duration and memory budgeting.
pub fn is_complex(family: CodecFamily) -> bool {
    matches!(
        family,
        CodecFamily::Av1 | CodecFamily::Vp9 | CodecFamily::Hevc
    )
}

/// Capability narrowed by what the runtime actually offers. Diagnostic only.
pub fn effective_capability(family: CodecFamily, caps: &Capabilities) -> DecodeCapability {
    match (capability(family), caps.hardware_decode) {
        (cap, true) => cap,
        (DecodeCapability::HardwareOnly, false) => DecodeCapability::Unsupported,
        (DecodeCapability::Both, false) => DecodeCapability::SoftwareOnly,
        (cap, false) => cap,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/classify.rs"]
mod tests;
