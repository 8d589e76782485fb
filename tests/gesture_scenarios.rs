mod common;

use std::time::{Duration, Instant};

use common::{one_hand, pinch, video_frame, FailingEstimator, MockCompositor};
use pinch_reveal::config::AppConfig;
use pinch_reveal::detect::{DetectionDriver, DetectionMode};
use pinch_reveal::estimator::{NoHands, ReplayEstimator};
use pinch_reveal::tracker::{DecayRule, MaskPolicy};
use pinch_reveal::{DetectionResult, FrameOrchestrator, Keypoint, TickKind};

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

fn orchestrator(script: Vec<DetectionResult>, config: &AppConfig) -> FrameOrchestrator<MockCompositor> {
    let detector = DetectionDriver::inline(Box::new(ReplayEstimator::from_frames(script)));
    FrameOrchestrator::new(MockCompositor::new(), detector, config)
}

#[test]
fn pinch_then_decay_then_recompute() {
    let config = AppConfig::default();
    let script = vec![pinch((100.0, 100.0), (140.0, 100.0)), pinch((200.0, 200.0), (260.0, 200.0))];
    let mut orch = orchestrator(script, &config);
    let frame = video_frame(320, 240);

    let t0 = orch.tick(&frame).unwrap();
    assert_eq!(t0.kind, TickKind::Detect);
    assert!(t0.detection_ran);
    assert_eq!(t0.state.center, Keypoint::new(120.0, 100.0));
    assert_eq!(t0.state.radius, 20.0);

    let t1 = orch.tick(&frame).unwrap();
    assert_eq!(t1.kind, TickKind::Decay);
    assert!(close(t1.state.radius, 18.0));
    assert_eq!(t1.state.center, Keypoint::new(120.0, 100.0));

    let mut expected = t1.state.radius;
    for _ in 2..5 {
        let t = orch.tick(&frame).unwrap();
        assert_eq!(t.kind, TickKind::Decay);
        expected *= 0.9;
        assert!(close(t.state.radius, expected));
    }

    let t5 = orch.tick(&frame).unwrap();
    assert_eq!(t5.kind, TickKind::Detect);
    assert_eq!(t5.state.center, Keypoint::new(230.0, 200.0));
    assert_eq!(t5.state.radius, 30.0);

    // the compositor saw the tracker's radius on every tick
    let radii = &orch.compositor().radii;
    assert_eq!(radii.len(), 6);
    assert_eq!(radii[0], 20.0);
    assert_eq!(radii[5], 30.0);
    assert_eq!(orch.ticks(), 6);
}

#[test]
fn radius_below_threshold_snaps_to_zero() {
    let config = AppConfig::default();
    let mut orch = orchestrator(vec![pinch((0.0, 50.0), (19.0, 50.0))], &config);
    let frame = video_frame(64, 64);

    let t0 = orch.tick(&frame).unwrap();
    assert_eq!(t0.state.radius, 9.5);
    let t1 = orch.tick(&frame).unwrap();
    assert_eq!(t1.state.radius, 0.0);
    assert_eq!(t1.state.center, t0.state.center);
}

#[test]
fn decay_reaches_rest_within_bound() {
    let mut config = AppConfig::default();
    config.detection.cadence = Some(1000);
    let mut orch = orchestrator(vec![pinch((0.0, 0.0), (200.0, 0.0))], &config);
    let frame = video_frame(16, 16);

    let r0 = orch.tick(&frame).unwrap().state.radius;
    assert_eq!(r0, 100.0);
    let bound = DecayRule::default().ticks_to_rest(r0);

    let mut prev = r0;
    let mut ticks = 0;
    while orch.state().radius > 0.0 {
        let r = orch.tick(&frame).unwrap().state.radius;
        assert!(r <= prev, "radius grew from {prev} to {r}");
        prev = r;
        ticks += 1;
        assert!(ticks <= bound, "still {r} after {ticks} decay ticks");
    }
    assert_eq!(orch.state().radius, 0.0);
}

#[test]
fn single_hand_on_detect_tick_decays() {
    let config = AppConfig::default();
    let script = vec![pinch((0.0, 0.0), (40.0, 0.0)), one_hand((5.0, 5.0))];
    let mut orch = orchestrator(script, &config);
    let frame = video_frame(32, 32);

    orch.tick(&frame).unwrap();
    for _ in 1..5 {
        orch.tick(&frame).unwrap();
    }
    let before = orch.state().radius;
    let t5 = orch.tick(&frame).unwrap();
    assert_eq!(t5.kind, TickKind::Detect);
    assert!(t5.detection_ran);
    assert!(close(t5.state.radius, before * 0.9));
    assert_eq!(t5.state.center, Keypoint::new(20.0, 0.0));
}

#[test]
fn estimator_failure_is_not_fatal() {
    let config = AppConfig::default();
    let detector = DetectionDriver::inline(Box::new(FailingEstimator));
    let mut orch = FrameOrchestrator::new(MockCompositor::new(), detector, &config);

    let report = orch.tick(&video_frame(8, 8)).unwrap();
    assert!(report.detection_ran);
    assert_eq!(report.state.radius, 0.0);
}

#[test]
fn frame_size_change_resizes_before_the_tick() {
    let config = AppConfig::default();
    let detector = DetectionDriver::inline(Box::new(NoHands));
    let mut orch = FrameOrchestrator::new(MockCompositor::new(), detector, &config);

    orch.tick(&video_frame(40, 30)).unwrap();
    assert_eq!(orch.compositor().size, (40, 30));
    orch.tick(&video_frame(40, 30)).unwrap();
    assert_eq!(orch.compositor().resizes, 1);

    orch.tick(&video_frame(80, 60)).unwrap();
    assert_eq!(orch.compositor().size, (80, 60));
    assert_eq!(orch.compositor().resizes, 2);
    assert_eq!((orch.mask().width, orch.mask().height), (80, 60));
    assert_eq!((orch.display().width, orch.display().height), (80, 60));
}

#[test]
fn display_without_post_blur_is_the_compositor_output() {
    let mut config = AppConfig::default();
    config.display.post_blur_radius = 0;
    let detector = DetectionDriver::inline(Box::new(NoHands));
    let mut orch = FrameOrchestrator::new(MockCompositor::new(), detector, &config);

    let frame = video_frame(24, 12);
    orch.tick(&frame).unwrap();
    assert_eq!(orch.display(), &frame);
}

#[test]
fn decay_mask_is_cleared_once_radius_is_zero() {
    let config = AppConfig::default();
    let mut orch = orchestrator(vec![pinch((10.0, 16.0), (26.0, 16.0))], &config);
    let frame = video_frame(32, 32);

    orch.tick(&frame).unwrap();
    assert!(orch.mask().get(18, 16) >> 24 > 0);
    orch.tick(&frame).unwrap(); // 8 -> 0
    assert!(orch.mask().pixels.iter().all(|&px| px == 0));
}

#[test]
fn snapshot_policy_holds_radius_and_mask_between_detections() {
    let mut config = AppConfig::default();
    config.tracker.policy = MaskPolicy::Snapshot;
    let script = vec![pinch((10.0, 32.0), (50.0, 32.0)), DetectionResult::empty()];
    let mut orch = orchestrator(script, &config);
    let frame = video_frame(64, 64);
    assert_eq!(orch.cadence(), 3);

    let t0 = orch.tick(&frame).unwrap();
    assert_eq!(t0.state.radius, 20.0);
    let mask_after_detect = orch.mask().clone();
    assert!(mask_after_detect.get(30, 32) >> 24 > 0);

    for _ in 1..3 {
        let t = orch.tick(&frame).unwrap();
        assert_eq!(t.state.radius, 20.0);
        assert_eq!(orch.mask(), &mask_after_detect);
    }

    // tick 3 detects nothing: radius kept, mask cleared
    let t3 = orch.tick(&frame).unwrap();
    assert_eq!(t3.kind, TickKind::Detect);
    assert_eq!(t3.state.radius, 20.0);
    assert!(orch.mask().pixels.iter().all(|&px| px == 0));
}

#[test]
fn background_detection_eventually_drives_the_tracker() {
    let mut config = AppConfig::default();
    config.detection.cadence = Some(1);
    let detector = DetectionDriver::new(
        DetectionMode::Background,
        Box::new(ReplayEstimator::from_frames(vec![pinch((0.0, 0.0), (30.0, 40.0))])),
    );
    let mut orch = FrameOrchestrator::new(MockCompositor::new(), detector, &config);
    let frame = video_frame(16, 16);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut locked = None;
    while Instant::now() < deadline {
        let report = orch.tick(&frame).unwrap();
        if report.detection_ran && report.state.radius > 0.0 {
            locked = Some(report.state);
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    let state = locked.expect("background detector never delivered");
    assert_eq!(state.center, Keypoint::new(15.0, 20.0));
    assert_eq!(state.radius, 25.0);
}
