use super::*;

fn query<'a>(codec: CodecFamily, format: OutputFormat, caps: &'a Capabilities) -> StrategyQuery<'a> {
    StrategyQuery {
        codec,
        format,
        container: Some(ContainerKind::Mp4),
        capabilities: caps,
        duration_secs: Some(10.0),
    }
}

fn with_hw() -> Capabilities {
    Capabilities {
        hardware_decode: true,
        ..Capabilities::conservative()
    }
}

#[test]
fn h264_gif_prefers_software_direct() {
    let caps = with_hw();
    let s = StrategyRegistry::new().get_strategy(&query(CodecFamily::H264, OutputFormat::Gif, &caps));
    assert_eq!(s.preferred_path, ConversionPath::Software);
    assert_eq!(s.confidence, Confidence::High);
    assert!(!s.reason.is_empty());
}

#[test]
fn av1_routes_to_hardware_regardless_of_capabilities() {
    let none = Capabilities::conservative();
    for caps in [none, with_hw()] {
        for format in [OutputFormat::Gif, OutputFormat::Webp] {
            let s = StrategyRegistry::new().get_strategy(&query(CodecFamily::Av1, format, &caps));
            assert_eq!(s.preferred_path, ConversionPath::Hardware);
            assert_eq!(s.confidence, Confidence::High);
        }
    }
}

#[test]
fn mp4_always_routes_to_native_fast() {
    let caps = with_hw();
    for codec in CodecFamily::ALL {
        let s = StrategyRegistry::new().get_strategy(&query(codec, OutputFormat::Mp4, &caps));
        assert_eq!(s.preferred_path, ConversionPath::NativeFast);
    }
}

#[test]
fn complex_codecs_follow_hardware_availability() {
    let hw = with_hw();
    let s = StrategyRegistry::new().get_strategy(&query(CodecFamily::Hevc, OutputFormat::Gif, &hw));
    assert_eq!(s.preferred_path, ConversionPath::Hardware);
    assert_eq!(s.confidence, Confidence::Medium);

    let none = Capabilities::conservative();
    let s = StrategyRegistry::new().get_strategy(&query(CodecFamily::Vp9, OutputFormat::Webp, &none));
    assert_eq!(s.preferred_path, ConversionPath::Software);
    assert_eq!(s.confidence, Confidence::Low);
    assert!(s.reason.contains("10.0s"));
}

#[test]
fn vp8_and_unknown_use_software() {
    let caps = with_hw();
    let vp8 = StrategyRegistry::new().get_strategy(&query(CodecFamily::Vp8, OutputFormat::Webp, &caps));
    assert_eq!(vp8.preferred_path, ConversionPath::Software);
    assert_eq!(vp8.confidence, Confidence::Medium);

    let unknown =
        StrategyRegistry::new().get_strategy(&query(CodecFamily::Unknown, OutputFormat::Gif, &caps));
    assert_eq!(unknown.preferred_path, ConversionPath::Software);
    assert_eq!(unknown.confidence, Confidence::Low);
}

#[test]
fn reasoning_lists_rule_factors_and_alternatives() {
    let caps = Capabilities::conservative();
    let r = StrategyRegistry::new()
        .get_strategy_reasoning(&query(CodecFamily::Av1, OutputFormat::Gif, &caps));
    assert_eq!(r.matched_rule, "hardware-only-codec");
    assert_eq!(r.strategy.preferred_path, ConversionPath::Hardware);
    assert!(r.factors.iter().any(|(k, v)| k == "codec" && v == "av1"));
    assert!(r.factors.iter().any(|(k, _)| k == "container"));
    assert_eq!(r.alternatives.len(), 2);
    let sw = r
        .alternatives
        .iter()
        .find(|a| a.path == ConversionPath::Software)
        .unwrap();
    assert!(sw.rejected_because.contains("no software decoder"));
}

#[test]
fn reasoning_matches_strategy() {
    let caps = with_hw();
    let reg = StrategyRegistry::new();
    for codec in CodecFamily::ALL {
        for format in OutputFormat::ALL {
            let q = query(codec, format, &caps);
            assert_eq!(reg.get_strategy_reasoning(&q).strategy, reg.get_strategy(&q));
        }
    }
}
