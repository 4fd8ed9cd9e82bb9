use super::*;
use crate::foundation::core::CodecFamily;

#[test]
fn empty_document_is_the_default() {
    let cfg = EngineConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, EngineConfig::default());
    assert_eq!(cfg.history.capacity, 50);
    assert_eq!(cfg.history.recommendation.window, 12);
}

#[test]
fn partial_sections_override_only_what_they_name() {
    let cfg = EngineConfig::from_json_str(
        r#"{
            "history": { "capacity": 10 },
            "planner": { "low_memory_gb": 2.0, "history_gated_codec": null },
            "progress": { "converting": 60.0 }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.history.capacity, 10);
    assert_eq!(cfg.history.recommendation.min_samples, 3);
    assert_eq!(cfg.planner.low_memory_gb, 2.0);
    assert_eq!(cfg.planner.history_gated_codec, None);
    assert_eq!(cfg.progress.converting, 60.0);
    assert_eq!(cfg.progress.initializing, 5.0);
}

#[test]
fn invalid_values_are_rejected() {
    let err = EngineConfig::from_json_str(r#"{ "history": { "capacity": 0 } }"#).unwrap_err();
    assert!(err.to_string().contains("capacity"));

    let err = EngineConfig::from_json_str(
        r#"{ "planner": { "heap_ratio": { "half": 0.0, "three_quarters": 0.3, "full": 0.2 } } }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("heap_ratio"));

    assert!(EngineConfig::from_json_str("not json").is_err());
}

#[test]
fn from_path_reads_a_file() {
    let dir = std::env::temp_dir().join(format!("convoy-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("engine.json");
    std::fs::write(&path, r#"{ "planner": { "history_gated_codec": "vp9" } }"#).unwrap();
    let cfg = EngineConfig::from_path(&path).unwrap();
    assert_eq!(cfg.planner.history_gated_codec, Some(CodecFamily::Vp9));
    std::fs::remove_dir_all(&dir).unwrap();

    let err = EngineConfig::from_path(dir.join("missing.json")).unwrap_err();
    assert!(err.to_string().contains("open engine config"));
}
