use super::*;
use crate::foundation::core::GifEncoder;
use crate::history::stats::percentile;
use crate::storage::kv::MemoryStore;

fn rec(
    codec: CodecFamily,
    path: ConversionPath,
    encoder: Option<EncoderBackend>,
    outcome: Outcome,
    total_ms: u64,
) -> OutcomeRecord {
    OutcomeRecord {
        timestamp_ms: 1,
        codec,
        format: OutputFormat::Gif,
        planned_path: path,
        executed_path: path,
        encoder,
        capture_mode: None,
        timings: PhaseTimings {
            total_ms,
            ..Default::default()
        },
        output_bytes: None,
        outcome,
        error: None,
    }
}

fn hw(encoder: GifEncoder, outcome: Outcome, total_ms: u64) -> OutcomeRecord {
    rec(
        CodecFamily::Av1,
        ConversionPath::Hardware,
        Some(encoder.into()),
        outcome,
        total_ms,
    )
}

#[test]
fn ring_keeps_most_recent_capacity_records() {
    let history = OutcomeHistory::in_memory(HistoryConfig::default());
    for i in 0..60u64 {
        history.record(rec(
            CodecFamily::H264,
            ConversionPath::Software,
            None,
            Outcome::Success,
            i,
        ));
    }
    let records = history.records();
    assert_eq!(records.len(), 50);
    assert_eq!(records.first().unwrap().timings.total_ms, 10);
    assert_eq!(records.last().unwrap().timings.total_ms, 59);
}

#[test]
fn summary_aggregates_two_successes() {
    let history = OutcomeHistory::in_memory(HistoryConfig::default());
    for ms in [5000, 7000] {
        history.record(rec(
            CodecFamily::H264,
            ConversionPath::Software,
            None,
            Outcome::Success,
            ms,
        ));
    }
    let summary = history.summary();
    assert_eq!(summary.len(), 1);
    let e = &summary[0];
    assert_eq!(e.count, 2);
    assert_eq!(e.success_count, 2);
    assert_eq!(e.avg_duration_ms, 6000.0);
    assert_eq!(e.min_duration_ms, 5000);
    assert_eq!(e.max_duration_ms, 7000);
    assert_eq!(e.success_rate, 1.0);
}

#[test]
fn summary_is_sorted_by_codec_format_path_names() {
    let history = OutcomeHistory::in_memory(HistoryConfig::default());
    history.record(rec(
        CodecFamily::Vp9,
        ConversionPath::Software,
        None,
        Outcome::Error,
        10,
    ));
    history.record(rec(
        CodecFamily::Av1,
        ConversionPath::Hardware,
        None,
        Outcome::Success,
        10,
    ));
    history.record(rec(
        CodecFamily::H264,
        ConversionPath::Software,
        None,
        Outcome::Success,
        10,
    ));
    history.record(rec(
        CodecFamily::H264,
        ConversionPath::Hardware,
        None,
        Outcome::Success,
        10,
    ));
    let keys: Vec<_> = history
        .summary()
        .iter()
        .map(|e| (e.codec, e.path))
        .collect();
    assert_eq!(
        keys,
        vec![
            (CodecFamily::Av1, ConversionPath::Hardware),
            (CodecFamily::H264, ConversionPath::Hardware),
            (CodecFamily::H264, ConversionPath::Software),
            (CodecFamily::Vp9, ConversionPath::Software),
        ]
    );
    let vp9 = history.summary().pop().unwrap();
    assert_eq!(vp9.success_rate, 0.0);
}

#[test]
fn recommendation_needs_minimum_samples() {
    let history = OutcomeHistory::in_memory(HistoryConfig::default());
    history.record(hw(GifEncoder::Worker, Outcome::Success, 100));
    history.record(hw(GifEncoder::Palette, Outcome::Success, 200));
    assert_eq!(history.encoder_recommendation(CodecFamily::Av1), None);
    history.record(hw(GifEncoder::Worker, Outcome::Success, 100));
    assert!(history.encoder_recommendation(CodecFamily::Av1).is_some());
}

#[test]
fn recommendation_ignores_other_codecs_and_paths() {
    let history = OutcomeHistory::in_memory(HistoryConfig::default());
    for _ in 0..5 {
        history.record(rec(
            CodecFamily::Vp9,
            ConversionPath::Hardware,
            Some(EncoderBackend::Worker),
            Outcome::Success,
            100,
        ));
        history.record(rec(
            CodecFamily::Av1,
            ConversionPath::Software,
            Some(EncoderBackend::Transcoder),
            Outcome::Success,
            100,
        ));
    }
    assert_eq!(history.encoder_recommendation(CodecFamily::Av1), None);
    assert!(history.encoder_recommendation(CodecFamily::Vp9).is_some());
}

#[test]
fn success_rate_gap_wins_over_latency() {
    let history = OutcomeHistory::in_memory(HistoryConfig::default());
    for _ in 0..3 {
        history.record(hw(GifEncoder::Palette, Outcome::Success, 9000));
        history.record(hw(GifEncoder::Worker, Outcome::Error, 100));
    }
    let r = history.encoder_recommendation(CodecFamily::Av1).unwrap();
    assert_eq!(r.encoder, GifEncoder::Palette);
    assert!(r.reason.contains("success rate"));
}

#[test]
fn similar_success_rates_fall_back_to_p90_latency() {
    let history = OutcomeHistory::in_memory(HistoryConfig::default());
    for _ in 0..3 {
        history.record(hw(GifEncoder::Palette, Outcome::Success, 9000));
        history.record(hw(GifEncoder::Worker, Outcome::Success, 3000));
    }
    let r = history.encoder_recommendation(CodecFamily::Av1).unwrap();
    assert_eq!(r.encoder, GifEncoder::Worker);
    assert!(r.reason.contains("p90"));
    assert!((0.0..=1.0).contains(&r.confidence));
}

#[test]
fn single_encoder_samples_get_reduced_confidence() {
    let history = OutcomeHistory::in_memory(HistoryConfig::default());
    for _ in 0..12 {
        history.record(hw(GifEncoder::Worker, Outcome::Success, 1000));
    }
    let only = history.encoder_recommendation(CodecFamily::Av1).unwrap();
    assert_eq!(only.encoder, GifEncoder::Worker);
    assert!(only.confidence <= 0.5);

    let both = OutcomeHistory::in_memory(HistoryConfig::default());
    for _ in 0..6 {
        both.record(hw(GifEncoder::Worker, Outcome::Success, 1000));
        both.record(hw(GifEncoder::Palette, Outcome::Success, 5000));
    }
    let full = both.encoder_recommendation(CodecFamily::Av1).unwrap();
    assert!(full.confidence > only.confidence);
}

#[test]
fn recommendation_tracks_recent_window_only() {
    let history = OutcomeHistory::in_memory(HistoryConfig::default());
    for _ in 0..20 {
        history.record(hw(GifEncoder::Worker, Outcome::Error, 100));
    }
    for _ in 0..6 {
        history.record(hw(GifEncoder::Worker, Outcome::Success, 1000));
        history.record(hw(GifEncoder::Palette, Outcome::Success, 4000));
    }
    let r = history.encoder_recommendation(CodecFamily::Av1).unwrap();
    assert_eq!(r.encoder, GifEncoder::Worker);
}

#[test]
fn persisted_history_is_restored() {
    let store = Arc::new(MemoryStore::new());
    let a = OutcomeHistory::new(store.clone(), HistoryConfig::default());
    a.record(hw(GifEncoder::Palette, Outcome::Success, 10));
    a.record(hw(GifEncoder::Worker, Outcome::Cancelled, 20));

    let b = OutcomeHistory::load(store.clone(), HistoryConfig::default());
    assert_eq!(b.records(), a.records());

    b.clear();
    assert!(b.is_empty());
    assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
}

#[test]
fn restore_trims_to_smaller_capacity() {
    let store = Arc::new(MemoryStore::new());
    let a = OutcomeHistory::new(store.clone(), HistoryConfig::default());
    for i in 0..10 {
        a.record(hw(GifEncoder::Palette, Outcome::Success, i));
    }
    let cfg = HistoryConfig {
        capacity: 4,
        ..Default::default()
    };
    let b = OutcomeHistory::load(store, cfg);
    let ms: Vec<u64> = b.records().iter().map(|r| r.timings.total_ms).collect();
    assert_eq!(ms, vec![6, 7, 8, 9]);
}

#[test]
fn corrupt_payload_loads_empty() {
    let store = Arc::new(MemoryStore::new());
    store.set(HISTORY_KEY, "[{\"broken\":").unwrap();
    let h = OutcomeHistory::load(store, HistoryConfig::default());
    assert!(h.is_empty());
}

#[test]
fn storage_failures_are_swallowed() {
    let store = Arc::new(MemoryStore::with_quota(8));
    let h = OutcomeHistory::new(store.clone(), HistoryConfig::default());
    h.record(hw(GifEncoder::Palette, Outcome::Success, 10));
    assert_eq!(h.len(), 1);
    assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
}

#[test]
fn percentile_uses_nearest_rank() {
    assert_eq!(percentile(&[], 90.0), None);
    assert_eq!(percentile(&[5], 90.0), Some(5));
    let v: Vec<u64> = (1..=10).collect();
    assert_eq!(percentile(&v, 90.0), Some(9));
    assert_eq!(percentile(&v, 100.0), Some(10));
}

#[test]
fn export_json_round_trips_records() {
    let h = OutcomeHistory::in_memory(HistoryConfig::default());
    h.record(hw(GifEncoder::Worker, Outcome::Success, 42));
    let json = h.export_json().unwrap();
    let back: Vec<OutcomeRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, h.records());
}

#[test]
fn config_validation() {
    assert!(HistoryConfig::default().validate().is_ok());
    let bad = HistoryConfig {
        capacity: 0,
        ..Default::default()
    };
    assert!(bad.validate().is_err());
}
