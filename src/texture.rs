//! Texture binder: uploads CPU images into GPU textures the effect samples.
//!
//! Every texture uses the same sampling: clamp-to-edge, nearest filtering,
//! a single mip level.

use serde::{Deserialize, Serialize};

use crate::types::FrameBuffer;

/// Texture format matching [`FrameBuffer`]'s 0xAARRGGBB pixels: in
/// little-endian memory each pixel is laid out B, G, R, A.
pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;

/// The three inputs of the effect, each bound at a fixed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRole {
    Mask,
    Noise,
    Video,
}

impl TextureRole {
    pub const ALL: [TextureRole; 3] = [TextureRole::Mask, TextureRole::Noise, TextureRole::Video];

    /// Binding slot in the effect's bind group.
    pub fn binding(self) -> u32 {
        match self {
            TextureRole::Mask => 1,
            TextureRole::Noise => 2,
            TextureRole::Video => 3,
        }
    }

    /// Name of the texture in the shader source.
    pub fn shader_name(self) -> &'static str {
        match self {
            TextureRole::Mask => "u_effectMask",
            TextureRole::Noise => "u_noise",
            TextureRole::Video => "u_video",
        }
    }

    fn index(self) -> usize {
        self.binding() as usize - 1
    }
}

/// Whether role textures are recreated on every call or kept between frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TexturePolicy {
    /// Create three textures per `process` call and release them after the draw.
    #[default]
    PerCall,
    /// Keep one texture per role; reallocate only when the image size changes.
    Pooled,
}

/// The fixed sampler shared by all three roles.
pub fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Effect Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// One uploaded image. Dropping it releases the GPU texture.
pub struct TextureBinding {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    role: TextureRole,
    width: u32,
    height: u32,
}

impl TextureBinding {
    /// Allocate a texture the size of `image` and upload it.
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, role: TextureRole, image: &FrameBuffer) -> Self {
        // wgpu rejects zero-sized textures; an empty image becomes one transparent texel
        let width = (image.width as u32).max(1);
        let height = (image.height as u32).max(1);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(role.shader_name()),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let binding = Self { texture, view, role, width, height };
        binding.write(queue, image);
        binding
    }

    /// Overwrite the texture contents. `image` must match the texture size.
    pub fn write(&self, queue: &wgpu::Queue, image: &FrameBuffer) {
        if image.is_empty() {
            queue.write_texture(
                self.copy_target(),
                &[0u8; 4],
                wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(4), rows_per_image: Some(1) },
                wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
            );
            return;
        }

        queue.write_texture(
            self.copy_target(),
            bytemuck::cast_slice(&image.pixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 4),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d { width: self.width, height: self.height, depth_or_array_layers: 1 },
        );
    }

    fn copy_target(&self) -> wgpu::TexelCopyTextureInfo<'_> {
        wgpu::TexelCopyTextureInfo {
            texture: &self.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn role(&self) -> TextureRole {
        self.role
    }

    pub fn fits(&self, image: &FrameBuffer) -> bool {
        self.width == (image.width as u32).max(1) && self.height == (image.height as u32).max(1)
    }
}

impl Drop for TextureBinding {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

/// One reusable texture per role.
#[derive(Default)]
pub struct TexturePool {
    slots: [Option<TextureBinding>; 3],
    allocations: usize,
}

impl TexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload `image` into the role's texture, allocating only when the size changed.
    pub fn bind(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, role: TextureRole, image: &FrameBuffer) -> &TextureBinding {
        let slot = &mut self.slots[role.index()];
        let binding = match slot.take() {
            Some(binding) if binding.fits(image) => {
                binding.write(queue, image);
                binding
            }
            _ => {
                self.allocations += 1;
                TextureBinding::upload(device, queue, role, image)
            }
        };
        slot.insert(binding)
    }

    /// How many textures this pool has allocated so far.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}
