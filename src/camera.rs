// Video sources: the webcam, or a still image looped as video.
// Either way the loop gets a FrameBuffer of opaque 0xFFRRGGBB pixels.

use std::path::Path;

use tracing::info;

use crate::error::Error;
use crate::types::{pack_argb, FrameBuffer};

// Bring in nokhwa types for camera control.
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

// `image` decodes still frames and gives us typed RGB buffers.
use image::RgbImage;

/// Anything that can feed frames to the orchestrator.
pub trait FrameSource {
    /// Native size of the frames this source delivers.
    fn resolution(&self) -> (u32, u32);

    /// Next frame. May block until one is available.
    fn next_frame(&mut self) -> Result<FrameBuffer, Error>;
}

/// Pack an RGB image as opaque ARGB pixels.
pub fn rgb_to_frame(img: &RgbImage) -> FrameBuffer {
    let (w, h) = img.dimensions();
    let pixels = img
        .pixels()
        .map(|p| pack_argb(0xFF, p[0], p[1], p[2]))
        .collect();
    FrameBuffer { width: w as usize, height: h as usize, pixels }
}

// A small wrapper around nokhwa::Camera so the main loop stays clean.
pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Open camera `index` near the requested resolution and frame rate.
    pub fn new(index: u32, width: u32, height: u32, fps: u32) -> Result<Self, Error> {
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            fps,
        );

        // Ask for RGB frames, as close as the device allows to our request.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // The stream may settle on a slightly different resolution.
        let actual = cam.resolution();
        info!(index, width = actual.width(), height = actual.height(), "Camera stream open");

        Ok(Self {
            cam,
            width: actual.width(),
            height: actual.height(),
        })
    }
}

impl FrameSource for CameraCapture {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
        // Blocks until the camera has a new frame.
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        let rgb_img = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        let out = rgb_to_frame(&rgb_img);
        // Devices occasionally renegotiate; track what actually arrives.
        self.width = out.width as u32;
        self.height = out.height as u32;
        Ok(out)
    }
}

/// Serves the same decoded image on every call.
pub struct StillImageSource {
    frame: FrameBuffer,
}

impl StillImageSource {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let img = image::open(path)
            .map_err(|e| Error::CameraInit(format!("Open still image {}: {e}", path.display())))?
            .to_rgb8();
        let frame = rgb_to_frame(&img);
        info!(path = %path.display(), width = frame.width, height = frame.height, "Using still image as video");
        Ok(Self { frame })
    }

    pub fn from_frame(frame: FrameBuffer) -> Self {
        Self { frame }
    }
}

impl FrameSource for StillImageSource {
    fn resolution(&self) -> (u32, u32) {
        (self.frame.width as u32, self.frame.height as u32)
    }

    fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
        Ok(self.frame.clone())
    }
}
