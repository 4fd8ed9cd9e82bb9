use super::*;

fn roomy_caps() -> Capabilities {
    Capabilities {
        heap_limit_bytes: Some(4 << 30),
        ..Capabilities::conservative()
    }
}

#[test]
fn estimate_counts_frames_and_scaled_bytes() {
    let est = FrameBufferEstimate::new(1280, 720, 10.0, 15.0, 0.5);
    assert_eq!(est.frames, 150);
    assert_eq!(est.bytes, 640 * 360 * 4 * 150);
}

#[test]
fn estimate_rounds_partial_frames_up() {
    let est = FrameBufferEstimate::new(100, 100, 1.05, 10.0, 1.0);
    assert_eq!(est.frames, 11);
}

#[test]
fn short_small_clip_is_within_budget() {
    let b = PlannerBudgets::default();
    let est = FrameBufferEstimate::new(640, 360, 5.0, 15.0, 0.5);
    assert!(
        b.violations(&est, QualityTier::Medium, 0.5, &roomy_caps())
            .is_empty()
    );
}

#[test]
fn long_clip_violates_duration_and_frames() {
    let b = PlannerBudgets::default();
    let est = FrameBufferEstimate::new(320, 240, 40.0, 20.0, 0.5);
    let v = b.violations(&est, QualityTier::High, 0.5, &roomy_caps());
    assert_eq!(v.len(), 2);
    assert!(v[0].contains("duration"));
    assert!(v[1].contains("frames"));
}

#[test]
fn large_frames_violate_heap_budget() {
    let b = PlannerBudgets::default();
    let caps = Capabilities {
        heap_limit_bytes: Some(512 << 20),
        ..Capabilities::conservative()
    };
    let est = FrameBufferEstimate::new(3840, 2160, 10.0, 15.0, 1.0);
    let v = b.violations(&est, QualityTier::Medium, 1.0, &caps);
    assert!(v.iter().any(|r| r.contains("heap budget")));
}

#[test]
fn heap_ratio_depends_on_scale() {
    let b = PlannerBudgets::default();
    let caps = roomy_caps();
    assert!(b.heap_budget_bytes(&caps, 0.5) > b.heap_budget_bytes(&caps, 1.0));
    assert_eq!(b.heap_ratio.get(0.75), 0.35);
}

#[test]
fn av1_worker_is_substituted_by_default() {
    let b = PlannerBudgets::default();
    assert_eq!(
        b.substitute_for(CodecFamily::Av1, GifEncoder::Worker),
        Some(GifEncoder::Palette)
    );
    assert_eq!(b.substitute_for(CodecFamily::Vp9, GifEncoder::Worker), None);
}

#[test]
fn validate_rejects_bad_ratios() {
    let mut b = PlannerBudgets::default();
    assert!(b.validate().is_ok());
    b.heap_ratio.full = 0.0;
    assert!(b.validate().is_err());
}
