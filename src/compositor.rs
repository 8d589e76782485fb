//! GPU compositor: one full-viewport quad that blends the mask, the noise
//! bitmap and the video frame through the effect shader.
//!
//! Renders offscreen and reads the result back into a CPU surface, which the
//! orchestrator then presents.

use std::time::{Duration, Instant};

use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::error::{Error, Result};
use crate::rng::Rng32;
use crate::texture::{create_sampler, TextureBinding, TexturePolicy, TexturePool, TextureRole, SURFACE_FORMAT};
use crate::types::FrameBuffer;

/// Size used until the first `set_size`.
pub const DEFAULT_SIZE: (u32, u32) = (360, 240);

/// Texture coordinates paired with [`full_viewport_rect`], vertex for vertex.
pub const QUAD_TEXCOORDS: [[f32; 2]; 6] = [
    [0.0, 0.0],
    [1.0, 0.0],
    [0.0, 1.0],
    [0.0, 1.0],
    [1.0, 0.0],
    [1.0, 1.0],
];

/// Two triangles covering `width` x `height` pixels, origin top-left.
pub fn full_viewport_rect(width: u32, height: u32) -> [[f32; 2]; 6] {
    let (x1, y1) = (0.0, 0.0);
    let (x2, y2) = (width as f32, height as f32);
    [[x1, y1], [x2, y1], [x1, y2], [x1, y2], [x2, y1], [x2, y2]]
}

/// Per-frame uniform block. Field order and padding match `Uniforms` in
/// `effect.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShaderUniforms {
    /// Output size in pixels (`u_resolution`).
    pub resolution: [f32; 2],
    /// Seconds since the compositor was created (`u_time`).
    pub time: f32,
    /// Current reveal radius in pixels (`u_radius`).
    pub radius: f32,
    /// Fresh value in [0,1) every frame (`u_random`).
    pub random: f32,
    _pad: [f32; 3],
}

impl ShaderUniforms {
    pub fn new(resolution: (u32, u32), time: f32, radius: f32, random: f32) -> Self {
        Self {
            resolution: [resolution.0 as f32, resolution.1 as f32],
            time,
            radius,
            random,
            _pad: [0.0; 3],
        }
    }
}

/// The renderer the frame orchestrator drives.
pub trait FrameCompositor {
    /// Resize the output surface and the quad. Never rebuilds the shader program.
    fn set_size(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    /// Render one frame into the output surface.
    fn process(&mut self, mask: &FrameBuffer, video: &FrameBuffer, radius: f32) -> Result<()>;

    /// The most recently rendered frame.
    fn output_surface(&self) -> &FrameBuffer;
}

/// Device and queue owned by the compositor.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquire an adapter and device without any window surface.
    pub fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| Error::GpuInit(format!("no adapter: {e}")))?;

            let info = adapter.get_info();
            info!(adapter = %info.name, backend = ?info.backend, "GPU adapter selected");

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("Compositor Device"),
                    ..Default::default()
                })
                .await
                .map_err(|e| Error::GpuInit(format!("no device: {e}")))?;

            Ok(Self { device, queue })
        })
    }
}

/// Offscreen render target plus the buffer its pixels are copied into.
struct OutputTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    bytes_per_row: u32,
    width: u32,
    height: u32,
}

impl OutputTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Compositor Output"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bytes_per_row = (width * 4 + 255) & !255; // Align to 256
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Compositor Readback"),
            size: (bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self { texture, view, readback, bytes_per_row, width, height }
    }
}

pub struct GpuCompositor {
    gpu: GpuContext,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    position_buffer: wgpu::Buffer,
    texcoord_buffer: wgpu::Buffer,
    target: OutputTarget,
    width: u32,
    height: u32,
    noise: Option<FrameBuffer>,
    texture_policy: TexturePolicy,
    pool: TexturePool,
    started: Instant,
    rng: Rng32,
    output: FrameBuffer,
}

impl GpuCompositor {
    /// Acquire a headless GPU context and compile the effect.
    pub fn new(texture_policy: TexturePolicy) -> Result<Self> {
        Self::with_context(GpuContext::headless()?, texture_policy)
    }

    pub fn with_context(gpu: GpuContext, texture_policy: TexturePolicy) -> Result<Self> {
        let device = &gpu.device;
        let (width, height) = DEFAULT_SIZE;

        let bind_group_layout = create_bind_group_layout(device);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = create_pipeline(device, &bind_group_layout);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::ShaderCompile(err.to_string()));
        }

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Effect Uniforms"),
            contents: bytemuck::bytes_of(&ShaderUniforms::new(DEFAULT_SIZE, 0.0, 0.0, 0.0)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let position_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("a_position"),
            contents: bytemuck::cast_slice(&full_viewport_rect(width, height)),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let texcoord_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("a_texCoord"),
            contents: bytemuck::cast_slice(&QUAD_TEXCOORDS),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let sampler = create_sampler(device);
        let target = OutputTarget::new(device, width, height);
        info!(texture_policy = ?texture_policy, "Compositor ready");

        Ok(Self {
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            position_buffer,
            texcoord_buffer,
            target,
            gpu,
            width,
            height,
            noise: None,
            texture_policy,
            pool: TexturePool::new(),
            started: Instant::now(),
            rng: Rng32::from_seed(0xC0FFEE),
            output: FrameBuffer::new(width as usize, height as usize),
        })
    }

    /// Hand over the noise bitmap. Must happen before the first `process`.
    pub fn load_noise(&mut self, noise: FrameBuffer) {
        debug!(width = noise.width, height = noise.height, "Noise bitmap loaded");
        self.noise = Some(noise);
    }

    pub fn noise_loaded(&self) -> bool {
        self.noise.is_some()
    }

    /// The effect pipeline, built once at construction.
    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    /// The GPU-side output surface.
    pub fn output_texture(&self) -> &wgpu::Texture {
        &self.target.texture
    }

    /// Textures allocated by the pooled policy so far.
    pub fn pooled_allocations(&self) -> usize {
        self.pool.allocations()
    }

    /// Render with explicit uniforms instead of the clock and RNG.
    pub fn render_with_uniforms(&mut self, mask: &FrameBuffer, video: &FrameBuffer, uniforms: ShaderUniforms) -> Result<()> {
        let noise = self.noise.as_ref().ok_or(Error::NoiseNotLoaded)?;
        let device = &self.gpu.device;
        let queue = &self.gpu.queue;

        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        // Per-call textures live until the end of this function; dropping them
        // releases the GPU memory on every path out, errors included.
        let inputs = [mask, noise, video];
        let mut per_call: Vec<TextureBinding> = Vec::new();
        let views: Vec<wgpu::TextureView> = match self.texture_policy {
            TexturePolicy::PerCall => {
                for (role, image) in TextureRole::ALL.into_iter().zip(inputs) {
                    per_call.push(TextureBinding::upload(device, queue, role, image));
                }
                per_call.iter().map(|b| b.view().clone()).collect()
            }
            TexturePolicy::Pooled => TextureRole::ALL
                .into_iter()
                .zip(inputs)
                .map(|(role, image)| self.pool.bind(device, queue, role, image).view().clone())
                .collect(),
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.uniform_buffer.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: TextureRole::Mask.binding(),
                    resource: wgpu::BindingResource::TextureView(&views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: TextureRole::Noise.binding(),
                    resource: wgpu::BindingResource::TextureView(&views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: TextureRole::Video.binding(),
                    resource: wgpu::BindingResource::TextureView(&views[2]),
                },
                wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Compositor Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Effect Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, self.position_buffer.slice(..));
            pass.set_vertex_buffer(1, self.texcoord_buffer.slice(..));
            pass.draw(0..6, 0..1);
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.target.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.target.bytes_per_row),
                    rows_per_image: Some(self.target.height),
                },
            },
            wgpu::Extent3d { width: self.target.width, height: self.target.height, depth_or_array_layers: 1 },
        );

        queue.submit(std::iter::once(encoder.finish()));
        drop(bind_group);
        drop(per_call);

        self.read_back()
    }

    /// Copy the readback buffer into `self.output`.
    fn read_back(&mut self) -> Result<()> {
        let slice = self.target.readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.gpu
            .device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: Some(Duration::from_secs(10)) })
            .map_err(|e| Error::GpuReadback(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| Error::GpuReadback(e.to_string()))?
            .map_err(|e| Error::GpuReadback(e.to_string()))?;

        let (w, h) = (self.target.width as usize, self.target.height as usize);
        if self.output.width != w || self.output.height != h {
            self.output.resize(w, h);
        }
        {
            let data = slice.get_mapped_range();
            for y in 0..h {
                let row = &data[y * self.target.bytes_per_row as usize..][..w * 4];
                let out = &mut self.output.pixels[y * w..(y + 1) * w];
                for (px, bgra) in out.iter_mut().zip(row.chunks_exact(4)) {
                    *px = u32::from_le_bytes([bgra[0], bgra[1], bgra[2], bgra[3]]);
                }
            }
        }
        self.target.readback.unmap();
        Ok(())
    }
}

impl FrameCompositor for GpuCompositor {
    fn set_size(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.target = OutputTarget::new(&self.gpu.device, width, height);
        self.gpu
            .queue
            .write_buffer(&self.position_buffer, 0, bytemuck::cast_slice(&full_viewport_rect(width, height)));
        self.output.resize(self.target.width as usize, self.target.height as usize);
        debug!(width, height, "Compositor resized");
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn process(&mut self, mask: &FrameBuffer, video: &FrameBuffer, radius: f32) -> Result<()> {
        if self.noise.is_none() {
            return Err(Error::NoiseNotLoaded);
        }
        let uniforms = ShaderUniforms::new(
            (self.target.width, self.target.height),
            self.started.elapsed().as_secs_f32(),
            radius,
            self.rng.next_f32(),
        );
        self.render_with_uniforms(mask, video, uniforms)
    }

    fn output_surface(&self) -> &FrameBuffer {
        &self.output
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Effect Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture_entry(TextureRole::Mask.binding()),
            texture_entry(TextureRole::Noise.binding()),
            texture_entry(TextureRole::Video.binding()),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn vec2_layout(location: u32) -> [wgpu::VertexAttribute; 1] {
    [wgpu::VertexAttribute { format: wgpu::VertexFormat::Float32x2, offset: 0, shader_location: location }]
}

fn create_pipeline(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Effect Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("effect.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Effect Pipeline Layout"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    let position_attrs = vec2_layout(0); // a_position
    let texcoord_attrs = vec2_layout(1); // a_texCoord
    let stride = std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress;

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Effect Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[
                wgpu::VertexBufferLayout {
                    array_stride: stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &position_attrs,
                },
                wgpu::VertexBufferLayout {
                    array_stride: stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &texcoord_attrs,
                },
            ],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: SURFACE_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
