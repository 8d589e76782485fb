//! Hand pose estimators.
//!
//! The real landmark model is an external collaborator; the pipeline only sees
//! the [`HandEstimator`] trait. The implementations here are stand-ins that let
//! the effect run and be tested without one.

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::INDEX_FINGER_TIP;
use crate::types::{DetectionResult, FrameBuffer, Hand, Keypoint};

/// Number of landmarks per hand in the 21-point model.
pub const HAND_LANDMARKS: usize = 21;

/// Black-box pose estimator: finds hands in one frame.
pub trait HandEstimator: Send {
    fn estimate_hands(&mut self, frame: &FrameBuffer) -> Result<Vec<Hand>>;
}

/// Which stand-in estimator the binary builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    /// Mouse-driven pinch: press, hold and drag.
    #[default]
    Pointer,
    /// Recorded detections from a JSON file.
    Replay,
    /// Never finds any hands.
    None,
}

/// A hand whose every landmark sits on the given fingertip position.
pub fn hand_at(tip: Keypoint) -> Hand {
    Hand { keypoints: vec![tip; HAND_LANDMARKS] }
}

/// Never reports any hands.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHands;

impl HandEstimator for NoHands {
    fn estimate_hands(&mut self, _frame: &FrameBuffer) -> Result<Vec<Hand>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PointerState {
    anchor: Option<Keypoint>,
    cursor: Option<Keypoint>,
}

/// Shared handle the window loop uses to feed mouse input to a [`PointerPinch`].
#[derive(Debug, Clone, Default)]
pub struct PointerHandle {
    state: Arc<Mutex<PointerState>>,
}

impl PointerHandle {
    /// Record this frame's mouse state. Pressing sets the anchor (first
    /// fingertip); releasing clears it.
    pub fn update(&self, cursor: Option<(f32, f32)>, pressed: bool) {
        let Ok(mut state) = self.state.lock() else { return };
        let cursor = cursor.map(|(x, y)| Keypoint::new(x, y));
        state.cursor = cursor;
        match (pressed, state.anchor) {
            (true, None) => state.anchor = cursor,
            (false, _) => state.anchor = None,
            (true, Some(_)) => {}
        }
    }

    fn fingertips(&self) -> Option<(Keypoint, Keypoint)> {
        let state = self.state.lock().ok()?;
        Some((state.anchor?, state.cursor?))
    }
}

/// Stand-in estimator driven by the mouse: while the left button is held,
/// hand 0's fingertip is where the press started and hand 1's follows the cursor.
#[derive(Debug, Clone, Default)]
pub struct PointerPinch {
    handle: PointerHandle,
}

impl PointerPinch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> PointerHandle {
        self.handle.clone()
    }
}

impl HandEstimator for PointerPinch {
    fn estimate_hands(&mut self, _frame: &FrameBuffer) -> Result<Vec<Hand>> {
        Ok(match self.handle.fingertips() {
            Some((a, b)) => vec![hand_at(a), hand_at(b)],
            None => Vec::new(),
        })
    }
}

/// Plays back recorded detections, one per call, looping at the end.
///
/// File format: a JSON array of frames; each frame an array of hands; each hand
/// an array of `[x, y]` landmarks.
#[derive(Debug, Clone)]
pub struct ReplayEstimator {
    frames: Vec<DetectionResult>,
    next: usize,
}

type RecordedFrames = Vec<Vec<Vec<[f32; 2]>>>;

impl ReplayEstimator {
    pub fn from_frames(frames: Vec<DetectionResult>) -> Self {
        Self { frames, next: 0 }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let recorded: RecordedFrames =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("replay file: {e}")))?;
        let frames = recorded
            .into_iter()
            .map(|hands| DetectionResult {
                hands: hands
                    .into_iter()
                    .map(|points| Hand {
                        keypoints: points.into_iter().map(|[x, y]| Keypoint::new(x, y)).collect(),
                    })
                    .collect(),
            })
            .collect();
        Ok(Self::from_frames(frames))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let replay = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), frames = replay.frames.len(), "Loaded replayed detections");
        Ok(replay)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl HandEstimator for ReplayEstimator {
    fn estimate_hands(&mut self, _frame: &FrameBuffer) -> Result<Vec<Hand>> {
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        let hands = self.frames[self.next].hands.clone();
        self.next = (self.next + 1) % self.frames.len();
        Ok(hands)
    }
}

/// Fingertip of a stand-in hand, for logging.
pub fn tip_of(hand: &Hand) -> Option<Keypoint> {
    hand.keypoints.get(INDEX_FINGER_TIP).copied()
}
