// Window utilities: the on-screen surface the effect is presented to,
// plus the mouse and keyboard state the loop reads.

use crate::error::Error;
use crate::types::FrameBuffer;
use minifb::{Key, MouseButton, MouseMode, Window, WindowOptions};

pub struct Drawer {
    window: Window, // the on-screen window you see
}

impl Drawer {
    /// Create a window sized to the video's native resolution.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, Error> {
        let window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        Ok(Self { window })
    }

    /// Cap how often `present` lets the loop run. 0 disables the cap.
    pub fn set_target_fps(&mut self, fps: usize) {
        self.window.set_target_fps(fps);
    }

    /// Push the pixels for this frame to the screen.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), Error> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// Returns false once the user closes the window.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Mouse position in window pixels, clamped to the window.
    pub fn mouse_pos(&self) -> Option<(f32, f32)> {
        self.window
            .get_mouse_pos(MouseMode::Clamp)
            .map(|(x, y)| (x.max(0.0), y.max(0.0)))
    }

    pub fn left_mouse_down(&self) -> bool {
        self.window.get_mouse_down(MouseButton::Left)
    }
}
