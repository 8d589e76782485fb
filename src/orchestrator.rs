//! Frame orchestrator: one tick per video frame.
//!
//! Each tick snapshots the frame, runs detection when the cadence says so,
//! updates the tracker, redraws the mask, renders through the compositor and
//! softens the result onto the visible surface.

use tracing::{info, trace};

use crate::compositor::FrameCompositor;
use crate::config::AppConfig;
use crate::detect::DetectionDriver;
use crate::error::Result;
use crate::mask::{MaskRasterizer, MaskRefresh};
use crate::tracker::GestureTracker;
use crate::types::{FrameBuffer, MaskState};
use crate::vision::{box_blur_argb, composite_over_black};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// Detection is requested on this tick.
    Detect,
    /// The tracker is fed "no usable detection".
    Decay,
}

/// Tick `index` is a DETECT tick when it is a multiple of `cadence`.
pub fn tick_kind(index: u64, cadence: u64) -> TickKind {
    if index % cadence.max(1) == 0 { TickKind::Detect } else { TickKind::Decay }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub index: u64,
    pub kind: TickKind,
    /// A detection result reached the tracker this tick.
    pub detection_ran: bool,
    /// The tracker's state after the update.
    pub state: MaskState,
}

pub struct FrameOrchestrator<C: FrameCompositor> {
    compositor: C,
    detector: DetectionDriver,
    tracker: GestureTracker,
    rasterizer: MaskRasterizer,
    cadence: u64,
    tick: u64,
    post_blur_radius: usize,

    capture: FrameBuffer, // this tick's video frame, as the estimator sees it
    mask: FrameBuffer,
    screen: FrameBuffer, // what the window shows
    blur_tmp: FrameBuffer,
    blurred: FrameBuffer,
}

impl<C: FrameCompositor> FrameOrchestrator<C> {
    pub fn new(compositor: C, detector: DetectionDriver, config: &AppConfig) -> Self {
        let cadence = config.cadence();
        info!(
            cadence,
            policy = ?config.tracker.policy,
            mode = ?detector.mode(),
            "Orchestrator ready"
        );
        Self {
            compositor,
            detector,
            tracker: GestureTracker::new(config.tracker.policy, config.tracker.decay_rule()),
            rasterizer: MaskRasterizer::new(config.tracker.policy, config.mask.blur_radius, config.mask.halo_scale),
            cadence,
            tick: 0,
            post_blur_radius: config.display.post_blur_radius,
            capture: FrameBuffer::new(0, 0),
            mask: FrameBuffer::new(0, 0),
            screen: FrameBuffer::new(0, 0),
            blur_tmp: FrameBuffer::new(0, 0),
            blurred: FrameBuffer::new(0, 0),
        }
    }

    /// Resize every surface and the compositor.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.capture.resize(width, height);
        self.mask.resize(width, height);
        self.screen.resize(width, height);
        self.compositor.set_size(width as u32, height as u32);
        info!(width, height, "Surfaces resized");
    }

    pub fn tick(&mut self, video: &FrameBuffer) -> Result<TickReport> {
        if !self.capture.same_size(video) {
            self.resize(video.width, video.height);
        }
        self.capture.copy_from(video);

        let index = self.tick;
        let kind = tick_kind(index, self.cadence);
        let detection = self.detector.poll(&self.capture, kind == TickKind::Detect);
        let state = self.tracker.update(detection.ran(), detection.result());

        let refresh = MaskRefresh { detection_ran: detection.ran(), locked: self.tracker.locked() };
        self.rasterizer.draw(&mut self.mask, state, refresh)?;

        self.compositor.process(&self.mask, &self.capture, state.radius)?;
        self.present_output()?;

        self.tick += 1;
        trace!(
            tick = index,
            kind = ?kind,
            ran = detection.ran(),
            x = state.center.x,
            y = state.center.y,
            radius = state.radius,
            "Tick"
        );
        Ok(TickReport { index, kind, detection_ran: detection.ran(), state })
    }

    /// Soft-blur the compositor output onto the visible surface.
    fn present_output(&mut self) -> Result<()> {
        let output = self.compositor.output_surface();
        if !self.blurred.same_size(output) {
            self.blurred.resize(output.width, output.height);
            self.blur_tmp.resize(output.width, output.height);
        }
        box_blur_argb(output, &mut self.blur_tmp, &mut self.blurred, self.post_blur_radius)?;
        composite_over_black(&self.blurred, &mut self.screen);
        Ok(())
    }

    /// The visible surface after the latest tick.
    pub fn display(&self) -> &FrameBuffer {
        &self.screen
    }

    pub fn mask(&self) -> &FrameBuffer {
        &self.mask
    }

    pub fn state(&self) -> MaskState {
        self.tracker.state()
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }
}
