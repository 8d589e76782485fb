//! Pinch reveal: a two-hand pinch opens a glitchy reveal circle over a live
//! webcam feed.

pub mod camera;
pub mod compositor;
pub mod config;
pub mod detect;
pub mod draw;
pub mod error;
pub mod estimator;
pub mod mask;
pub mod noise;
pub mod orchestrator;
pub mod rng;
pub mod texture;
pub mod tracker;
pub mod types;
pub mod vision;

pub use compositor::{FrameCompositor, GpuCompositor};
pub use error::{Error, Result};
pub use orchestrator::{FrameOrchestrator, TickKind, TickReport};
pub use types::{DetectionResult, FrameBuffer, Hand, Keypoint, MaskState};
