// Core types shared by the tracker, the mask rasterizer and the compositor.

/// A CPU-side image. Each entry is 0xAARRGGBB.
///
/// Camera frames arrive opaque (alpha 0xFF); the mask surface uses alpha for
/// coverage. minifb ignores the top byte, so a frame can be presented as-is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameBuffer {
    pub width: usize,     // how wide the frame is on screen (pixels)
    pub height: usize,    // how tall the frame is on screen (pixels)
    pub pixels: Vec<u32>, // row-major, width * height entries
}

impl FrameBuffer {
    /// A fully transparent black surface.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn same_size(&self, other: &FrameBuffer) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Reallocate to a new size; contents become transparent black.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width * height, 0);
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Copy `src` into this buffer, resizing first if needed.
    pub fn copy_from(&mut self, src: &FrameBuffer) {
        if !self.same_size(src) {
            self.resize(src.width, src.height);
        }
        self.pixels.copy_from_slice(&src.pixels);
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }
}

/// Pack 8-bit channels as 0xAARRGGBB.
#[inline]
pub fn pack_argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Split 0xAARRGGBB into (a, r, g, b).
#[inline]
pub fn unpack_argb(px: u32) -> (u8, u8, u8, u8) {
    ((px >> 24) as u8, (px >> 16) as u8, (px >> 8) as u8, px as u8)
}

/// One landmark from the pose estimator, in video-pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Keypoint) -> Keypoint {
        Keypoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn distance(self, other: Keypoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One detected hand: landmarks in the estimator's fixed order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Hand {
    pub keypoints: Vec<Keypoint>,
}

/// Everything one estimator call returned.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DetectionResult {
    pub hands: Vec<Hand>,
}

impl DetectionResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The current reveal circle, in video-pixel coordinates. Radius is never negative.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct MaskState {
    pub center: Keypoint,
    pub radius: f32,
}
