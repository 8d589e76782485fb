#![allow(dead_code)]

use pinch_reveal::compositor::{FrameCompositor, GpuCompositor};
use pinch_reveal::estimator::{hand_at, HandEstimator};
use pinch_reveal::texture::TexturePolicy;
use pinch_reveal::{DetectionResult, Error, FrameBuffer, Hand, Keypoint, Result};

/// CPU stand-in for the GPU compositor: echoes the video frame and records
/// every call.
#[derive(Default)]
pub struct MockCompositor {
    pub size: (u32, u32),
    pub resizes: usize,
    pub radii: Vec<f32>,
    pub masks: Vec<FrameBuffer>,
    output: FrameBuffer,
}

impl MockCompositor {
    pub fn new() -> Self {
        Self { output: FrameBuffer::new(0, 0), ..Default::default() }
    }
}

impl FrameCompositor for MockCompositor {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.resizes += 1;
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn process(&mut self, mask: &FrameBuffer, video: &FrameBuffer, radius: f32) -> Result<()> {
        assert_eq!((mask.width as u32, mask.height as u32), self.size, "mask not resized");
        assert!(mask.same_size(video));
        self.radii.push(radius);
        self.masks.push(mask.clone());
        self.output.copy_from(video);
        Ok(())
    }

    fn output_surface(&self) -> &FrameBuffer {
        &self.output
    }
}

/// Always fails, like a crashed landmark model.
pub struct FailingEstimator;

impl HandEstimator for FailingEstimator {
    fn estimate_hands(&mut self, _frame: &FrameBuffer) -> Result<Vec<Hand>> {
        Err(Error::Detection("model unavailable".into()))
    }
}

/// Two hands whose index fingertips sit at `a` and `b`.
pub fn pinch(a: (f32, f32), b: (f32, f32)) -> DetectionResult {
    DetectionResult {
        hands: vec![hand_at(Keypoint::new(a.0, a.1)), hand_at(Keypoint::new(b.0, b.1))],
    }
}

pub fn one_hand(a: (f32, f32)) -> DetectionResult {
    DetectionResult { hands: vec![hand_at(Keypoint::new(a.0, a.1))] }
}

/// An opaque video frame with a horizontal gradient.
pub fn video_frame(width: usize, height: usize) -> FrameBuffer {
    let mut fb = FrameBuffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = (x * 255 / width.max(1)) as u32;
            fb.pixels[y * width + x] = 0xFF00_0000 | (v << 16) | (v << 8) | v;
        }
    }
    fb
}

/// A compositor on a headless adapter, or None when the machine has no GPU.
pub fn try_gpu_compositor(policy: TexturePolicy) -> Option<GpuCompositor> {
    match GpuCompositor::new(policy) {
        Ok(compositor) => Some(compositor),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}
