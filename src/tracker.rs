//! Gesture tracker: turns two-hand keypoint detections into one reveal circle.
//!
//! Detection only runs on some ticks and often finds fewer than two hands, so
//! the tracker either recomputes the circle from a fresh pinch or falls back to
//! the policy's rule for "nothing usable this tick".

use serde::{Deserialize, Serialize};

use crate::types::{DetectionResult, Keypoint, MaskState};

/// Landmark index of the index-finger tip in a 21-point hand model.
pub const INDEX_FINGER_TIP: usize = 8;

/// How the circle behaves between usable detections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskPolicy {
    /// Shrink every tick without a usable detection; the mask is redrawn each tick.
    #[default]
    Decay,
    /// Keep the last circle until a new usable detection replaces it; the mask
    /// is only redrawn (halo + core) on ticks where detection ran.
    Snapshot,
}

/// Per-tick decay rule: below `snap_below` the radius drops to 0, otherwise it
/// is multiplied by `factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayRule {
    pub factor: f32,
    pub snap_below: f32,
}

impl Default for DecayRule {
    fn default() -> Self {
        Self { factor: 0.9, snap_below: 10.0 }
    }
}

impl DecayRule {
    pub fn apply(&self, radius: f32) -> f32 {
        if radius < self.snap_below { 0.0 } else { radius * self.factor }
    }

    /// Upper bound on DECAY ticks needed to bring `r0` to exactly zero.
    pub fn ticks_to_rest(&self, r0: f32) -> u32 {
        if r0 <= 0.0 {
            return 0;
        }
        if r0 < self.snap_below {
            return 1;
        }
        // smallest k with r0 * factor^k < snap_below, then one tick to snap
        let k = ((self.snap_below / r0).ln() / self.factor.ln()).floor().max(0.0) as u32 + 1;
        k + 1
    }
}

/// The circle two fingertips span: centered between them, touching both.
pub fn pinch_circle(p1: Keypoint, p2: Keypoint) -> MaskState {
    let center = p1.midpoint(p2);
    MaskState { center, radius: center.distance(p1) }
}

/// Fingertips of the first two hands, if both hands carry that landmark.
pub fn fingertips(detection: &DetectionResult) -> Option<(Keypoint, Keypoint)> {
    if detection.hands.len() < 2 {
        return None;
    }
    let p1 = *detection.hands[0].keypoints.get(INDEX_FINGER_TIP)?;
    let p2 = *detection.hands[1].keypoints.get(INDEX_FINGER_TIP)?;
    Some((p1, p2))
}

#[derive(Debug, Clone)]
pub struct GestureTracker {
    policy: MaskPolicy,
    rule: DecayRule,
    state: MaskState,
    locked: bool,
}

impl GestureTracker {
    /// Starts at rest: radius 0 at the origin.
    pub fn new(policy: MaskPolicy, rule: DecayRule) -> Self {
        Self { policy, rule, state: MaskState::default(), locked: false }
    }

    pub fn policy(&self) -> MaskPolicy {
        self.policy
    }

    pub fn state(&self) -> MaskState {
        self.state
    }

    /// True when the latest update came from a usable detection.
    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn update(&mut self, detection_ran: bool, detection: Option<&DetectionResult>) -> MaskState {
        let pinch = if detection_ran { detection.and_then(fingertips) } else { None };

        match pinch {
            Some((p1, p2)) => {
                self.state = pinch_circle(p1, p2);
                self.locked = true;
            }
            None => {
                self.locked = false;
                if self.policy == MaskPolicy::Decay {
                    self.state.radius = self.rule.apply(self.state.radius);
                }
            }
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hand;

    fn hand_with_tip(x: f32, y: f32) -> Hand {
        let mut keypoints = vec![Keypoint::default(); 21];
        keypoints[INDEX_FINGER_TIP] = Keypoint::new(x, y);
        Hand { keypoints }
    }

    fn two_hands(a: (f32, f32), b: (f32, f32)) -> DetectionResult {
        DetectionResult { hands: vec![hand_with_tip(a.0, a.1), hand_with_tip(b.0, b.1)] }
    }

    fn tracker() -> GestureTracker {
        GestureTracker::new(MaskPolicy::Decay, DecayRule::default())
    }

    #[test]
    fn pinch_defines_center_and_radius() {
        let mut t = tracker();
        let s = t.update(true, Some(&two_hands((100.0, 100.0), (140.0, 100.0))));
        assert_eq!(s.center, Keypoint::new(120.0, 100.0));
        assert_eq!(s.radius, 20.0);
        assert!(t.locked());
    }

    #[test]
    fn radius_is_distance_from_center_to_first_tip() {
        let p1 = Keypoint::new(13.0, 7.0);
        let p2 = Keypoint::new(-3.5, 41.25);
        let s = pinch_circle(p1, p2);
        assert_eq!(s.center, p1.midpoint(p2));
        assert_eq!(s.radius, s.center.distance(p1));
    }

    #[test]
    fn extra_hands_are_ignored() {
        let mut d = two_hands((0.0, 0.0), (0.0, 30.0));
        d.hands.push(hand_with_tip(500.0, 500.0));
        let s = tracker().update(true, Some(&d));
        assert_eq!(s.center, Keypoint::new(0.0, 15.0));
        assert_eq!(s.radius, 15.0);
    }

    #[test]
    fn decay_multiplies_and_keeps_center() {
        let mut t = tracker();
        t.update(true, Some(&two_hands((100.0, 100.0), (140.0, 100.0))));
        let s = t.update(false, None);
        assert!((s.radius - 18.0).abs() < 1e-4);
        assert_eq!(s.center, Keypoint::new(120.0, 100.0));
        assert!(!t.locked());
    }

    #[test]
    fn below_threshold_snaps_to_zero() {
        let rule = DecayRule::default();
        assert_eq!(rule.apply(9.5), 0.0);
        assert_eq!(rule.apply(0.0), 0.0);
        assert!((rule.apply(10.0) - 9.0).abs() < 1e-5);
    }

    #[test]
    fn one_hand_or_none_is_treated_as_no_detection() {
        let mut t = tracker();
        t.update(true, Some(&two_hands((0.0, 0.0), (200.0, 0.0))));

        let one = DetectionResult { hands: vec![hand_with_tip(5.0, 5.0)] };
        let s = t.update(true, Some(&one));
        assert!((s.radius - 90.0).abs() < 1e-3);

        let s = t.update(true, Some(&DetectionResult::empty()));
        assert!((s.radius - 81.0).abs() < 1e-3);

        let s = t.update(true, None);
        assert!((s.radius - 72.9).abs() < 1e-3);
    }

    #[test]
    fn hand_missing_the_fingertip_is_unusable() {
        let short = Hand { keypoints: vec![Keypoint::new(1.0, 1.0); INDEX_FINGER_TIP] };
        let d = DetectionResult { hands: vec![short, hand_with_tip(10.0, 10.0)] };
        assert!(fingertips(&d).is_none());
        let s = tracker().update(true, Some(&d));
        assert_eq!(s.radius, 0.0);
    }

    #[test]
    fn detection_passed_on_a_skipped_tick_is_ignored() {
        let mut t = tracker();
        let s = t.update(false, Some(&two_hands((0.0, 0.0), (100.0, 0.0))));
        assert_eq!(s.radius, 0.0);
    }

    #[test]
    fn decay_run_is_monotonic_and_reaches_zero_in_bound() {
        let rule = DecayRule::default();
        for r0 in [10.0_f32, 20.0, 55.5, 100.0, 480.0, 1500.0] {
            let mut t = tracker();
            t.state.radius = r0;
            let bound = rule.ticks_to_rest(r0);
            let mut prev = r0;
            let mut ticks = 0;
            while t.state().radius > 0.0 {
                let r = t.update(false, None).radius;
                assert!(r <= prev);
                prev = r;
                ticks += 1;
                assert!(ticks <= bound, "r0={r0} took more than {bound} ticks");
            }
            assert_eq!(t.state().radius, 0.0);
        }
    }

    #[test]
    fn rest_bound_matches_worked_example() {
        // 20 * 0.9^7 ≈ 9.57 < 10, then one snap
        assert_eq!(DecayRule::default().ticks_to_rest(20.0), 8);
        assert_eq!(DecayRule::default().ticks_to_rest(9.5), 1);
        assert_eq!(DecayRule::default().ticks_to_rest(0.0), 0);
    }

    #[test]
    fn snapshot_policy_holds_radius_without_detection() {
        let mut t = GestureTracker::new(MaskPolicy::Snapshot, DecayRule::default());
        t.update(true, Some(&two_hands((0.0, 0.0), (60.0, 0.0))));
        for _ in 0..10 {
            assert_eq!(t.update(false, None).radius, 30.0);
        }
        assert_eq!(t.update(true, Some(&DetectionResult::empty())).radius, 30.0);
        assert!(!t.locked());

        let s = t.update(true, Some(&two_hands((0.0, 0.0), (20.0, 0.0))));
        assert_eq!(s.radius, 10.0);
    }
}
