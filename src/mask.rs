// Mask rasterizer: draws the reveal circle into the mask surface the shader
// samples as `u_effectMask`.
//
// Channel layout the shader relies on:
//   red   = core (full effect)
//   green = halo (soft glowing rim, snapshot policy only)
//   alpha = coverage
use crate::error::Result;
use crate::tracker::MaskPolicy;
use crate::types::{FrameBuffer, MaskState};
use crate::vision::{box_blur_argb, fill_circle};

pub const CORE_COLOR: u32 = 0xFFFF_0000;
pub const HALO_COLOR: u32 = 0xFF00_FF00;

/// What happened on this tick, as far as the mask is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRefresh {
    /// A detection result was delivered this tick.
    pub detection_ran: bool,
    /// That result held a usable pinch.
    pub locked: bool,
}

pub struct MaskRasterizer {
    policy: MaskPolicy,
    blur_radius: usize,
    halo_scale: f32,
    sharp: FrameBuffer, // hard-edged shapes before blurring
    tmp: FrameBuffer,   // blur scratch
}

impl MaskRasterizer {
    pub fn new(policy: MaskPolicy, blur_radius: usize, halo_scale: f32) -> Self {
        Self {
            policy,
            blur_radius,
            halo_scale,
            sharp: FrameBuffer::new(0, 0),
            tmp: FrameBuffer::new(0, 0),
        }
    }

    /// Redraw `mask` for this tick. Under the snapshot policy the surface is
    /// left untouched on ticks where no detection was delivered.
    pub fn draw(&mut self, mask: &mut FrameBuffer, state: MaskState, refresh: MaskRefresh) -> Result<()> {
        if !self.sharp.same_size(mask) {
            self.sharp.resize(mask.width, mask.height);
            self.tmp.resize(mask.width, mask.height);
        }

        self.sharp.clear();
        match self.policy {
            MaskPolicy::Decay => {
                fill_circle(&mut self.sharp, state.center, state.radius, CORE_COLOR);
            }
            MaskPolicy::Snapshot => {
                if !refresh.detection_ran {
                    return Ok(());
                }
                if refresh.locked {
                    fill_circle(&mut self.sharp, state.center, state.radius * self.halo_scale, HALO_COLOR);
                    fill_circle(&mut self.sharp, state.center, state.radius, CORE_COLOR);
                }
            }
        }

        box_blur_argb(&self.sharp, &mut self.tmp, mask, self.blur_radius)
    }
}
