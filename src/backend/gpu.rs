//! A [`Backend`] rendering into an offscreen `wgpu` texture.

use std::num::{NonZeroU32, NonZeroU64};

use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::{Backend, Capabilities};
use crate::{
    math::{Pixels, ScreenTransformation, Size},
    shader::{
        sprite_shader, TextureSelection, FIRST_TEXTURE_BINDING, FRAGMENT_ENTRY, SAMPLER_BINDING,
        UNIFORM_BINDING, VERTEX_ENTRY,
    },
    vertex::{QUAD_BYTES, VERTEX_BYTES},
    Color, Error, Texture,
};

/// The format of the render target.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const INDEXED_FEATURES: wgpu::Features = wgpu::Features::TEXTURE_BINDING_ARRAY.union(
    wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING,
);

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x2,
    1 => Float32x4,
    2 => Float32x2,
    3 => Float32,
];

struct Program {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    selection: TextureSelection,
}

struct Slot {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl Slot {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: extent(width, height),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Size<u32, Pixels>,
}

impl Target {
    fn new(device: &wgpu::Device, size: Size<u32, Pixels>) -> Self {
        let size = Size::new(size.width.max(1), size.height.max(1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("quadbatch target"),
            size: extent(size.width, size.height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            size,
        }
    }
}

/// Renders sprite batches into a texture owned by the backend. The target's
/// contents can be read back with [`WgpuBackend::read_pixels()`].
///
/// If the device supports non-uniform indexing of texture binding arrays, the
/// fragment stage indexes a single array of textures. Otherwise every texture
/// unit has its own binding and the fragment stage branches on the unit.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Target,
    uniforms: wgpu::Buffer,
    sampler: wgpu::Sampler,
    placeholder: Slot,
    program: Option<Program>,
    indices: Option<wgpu::Buffer>,
    vertices: Option<wgpu::Buffer>,
    slots: Vec<Option<Slot>>,
    bindings: Option<wgpu::BindGroup>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("size", &self.target.size)
            .field("selection", &self.program.as_ref().map(|p| p.selection))
            .field("slots", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Requests a device from the default adapter and creates a backend
    /// rendering into a target of `size`. Blocks until the device is ready.
    pub fn offscreen(size: Size<u32, Pixels>) -> crate::Result<Self> {
        pollster::block_on(Self::request(size))
    }

    /// Requests a device from the default adapter and creates a backend
    /// rendering into a target of `size`.
    pub async fn request(size: Size<u32, Pixels>) -> crate::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(Error::AdapterNotFound)?;

        let info = adapter.get_info();
        tracing::debug!(
            adapter = %info.name,
            backend = ?info.backend,
            "requesting device"
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("quadbatch device"),
                    required_features: adapter.features() & INDEXED_FEATURES,
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        Ok(Self::with_device(device, queue, size))
    }

    /// Creates a backend on an existing device rendering into a target of
    /// `size`.
    #[must_use]
    pub fn with_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        size: Size<u32, Pixels>,
    ) -> Self {
        let target = Target::new(&device, size);

        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quadbatch uniforms"),
            contents: bytemuck::cast_slice(&ScreenTransformation::for_surface(size).into_array()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quadbatch sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let placeholder = Slot::new(
            &device,
            &queue,
            "quadbatch placeholder",
            1,
            1,
            &[255, 255, 255, 255],
        );

        Self {
            device,
            queue,
            target,
            uniforms,
            sampler,
            placeholder,
            program: None,
            indices: None,
            vertices: None,
            slots: Vec::new(),
            bindings: None,
        }
    }

    /// Returns the device this backend renders with.
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns the queue this backend submits to.
    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the render target.
    #[must_use]
    pub const fn target(&self) -> &wgpu::Texture {
        &self.target.texture
    }

    /// Returns how the compiled program selects textures, if it has been
    /// created.
    #[must_use]
    pub fn texture_selection(&self) -> Option<TextureSelection> {
        self.program.as_ref().map(|program| program.selection)
    }

    /// Copies the render target into an image. Colors are premultiplied by
    /// alpha.
    pub fn read_pixels(&self) -> crate::Result<RgbaImage> {
        let Size { width, height, .. } = self.target.size;
        let unpadded_row = width * 4;
        let padded_row = unpadded_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quadbatch readback"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quadbatch readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|err| Error::Readback(err.to_string()))?
            .map_err(|err| Error::Readback(err.to_string()))?;

        let mut pixels = Vec::with_capacity(unpadded_row as usize * height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_row as usize]);
            }
        }
        staging.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| Error::Readback(String::from("readback size mismatch")))
    }

    fn program(&self) -> crate::Result<&Program> {
        self.program
            .as_ref()
            .ok_or_else(|| Error::Gpu(String::from("the sprite program has not been created")))
    }

    fn selection(&self) -> TextureSelection {
        if self.device.features().contains(INDEXED_FEATURES) {
            TextureSelection::Indexed
        } else {
            TextureSelection::Branching
        }
    }

    fn scoped<T>(&self, work: impl FnOnce(&Self) -> T) -> Result<T, wgpu::Error> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = work(self);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    fn build_program(&self, texture_units: u32) -> Program {
        let selection = self.selection();
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("quadbatch sprite shader"),
                source: wgpu::ShaderSource::Wgsl(sprite_shader(texture_units, selection).into()),
            });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: UNIFORM_BINDING,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<[f32; 16]>() as u64),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        let texture = wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        };
        match selection {
            TextureSelection::Indexed => entries.push(wgpu::BindGroupLayoutEntry {
                binding: FIRST_TEXTURE_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: texture,
                count: NonZeroU32::new(texture_units),
            }),
            TextureSelection::Branching => {
                entries.extend((0..texture_units).map(|unit| wgpu::BindGroupLayoutEntry {
                    binding: FIRST_TEXTURE_BINDING + unit,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: texture,
                    count: None,
                }));
            }
        }

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("quadbatch bindings"),
                entries: &entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("quadbatch pipeline layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("quadbatch pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some(VERTEX_ENTRY),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: VERTEX_BYTES as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRIBUTES,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(FRAGMENT_ENTRY),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        Program {
            pipeline,
            layout,
            selection,
        }
    }

    fn bind_group(&self, program: &Program) -> wgpu::BindGroup {
        let views: Vec<&wgpu::TextureView> = self
            .slots
            .iter()
            .map(|slot| slot.as_ref().map_or(&self.placeholder.view, |slot| &slot.view))
            .collect();

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: UNIFORM_BINDING,
                resource: self.uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        match program.selection {
            TextureSelection::Indexed => entries.push(wgpu::BindGroupEntry {
                binding: FIRST_TEXTURE_BINDING,
                resource: wgpu::BindingResource::TextureViewArray(&views),
            }),
            TextureSelection::Branching => {
                entries.extend(views.iter().enumerate().map(|(unit, view)| {
                    wgpu::BindGroupEntry {
                        binding: FIRST_TEXTURE_BINDING + unit as u32,
                        resource: wgpu::BindingResource::TextureView(view),
                    }
                }));
            }
        }

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quadbatch bindings"),
            layout: &program.layout,
            entries: &entries,
        })
    }

    fn submit_pass(
        &self,
        load: wgpu::LoadOp<wgpu::Color>,
        draw: Option<(&Program, &wgpu::BindGroup, u32)>,
    ) -> crate::Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quadbatch pass"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quadbatch pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some((program, bindings, index_count)) = draw {
                let (Some(vertices), Some(indices)) = (&self.vertices, &self.indices) else {
                    return Err(Error::Gpu(String::from(
                        "draw issued before vertex and index data were uploaded",
                    )));
                };
                pass.set_pipeline(&program.pipeline);
                pass.set_bind_group(0, bindings, &[]);
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..index_count, 0, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl Backend for WgpuBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_texture_units: self.device.limits().max_sampled_textures_per_shader_stage,
        }
    }

    fn create_program(&mut self, texture_units: u32) -> crate::Result<()> {
        let program = self
            .scoped(|backend| backend.build_program(texture_units))
            .map_err(|err| Error::ShaderCompilation {
                log: err.to_string(),
            })?;
        tracing::debug!(
            texture_units,
            selection = ?program.selection,
            "created sprite program"
        );

        self.slots = (0..texture_units).map(|_| None).collect();
        self.bindings = None;
        self.program = Some(program);
        Ok(())
    }

    fn upload_indices(&mut self, indices: &[u16]) -> crate::Result<()> {
        self.indices = Some(
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("quadbatch indices"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
        );
        Ok(())
    }

    fn upload_vertices(&mut self, vertices: &[u8]) -> crate::Result<()> {
        let needed = vertices.len() as u64;
        if self
            .vertices
            .as_ref()
            .map_or(true, |buffer| buffer.size() < needed)
        {
            let size = needed.max(QUAD_BYTES as u64).next_power_of_two();
            tracing::debug!(bytes = size, "allocating vertex buffer");
            self.vertices = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("quadbatch vertices"),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if let Some(buffer) = &self.vertices {
            self.queue.write_buffer(buffer, 0, vertices);
        }
        Ok(())
    }

    fn upload_texture(&mut self, unit: u32, texture: &Texture) -> crate::Result<()> {
        let units = self.slots.len() as u32;
        let slot = self
            .slots
            .get_mut(unit as usize)
            .ok_or(Error::TextureUnitsExhausted { units })?;

        let image = texture.image();
        let mut pixels = image.as_raw().clone();
        premultiply(&mut pixels);
        *slot = Some(Slot::new(
            &self.device,
            &self.queue,
            "quadbatch texture",
            image.width(),
            image.height(),
            &pixels,
        ));
        self.bindings = None;
        Ok(())
    }

    fn set_projection(
        &mut self,
        size: Size<u32, Pixels>,
        projection: &ScreenTransformation,
    ) -> crate::Result<()> {
        let size = Size::new(size.width.max(1), size.height.max(1));
        if size != self.target.size {
            tracing::debug!(width = size.width, height = size.height, "resizing target");
            self.target = Target::new(&self.device, size);
        }
        self.queue.write_buffer(
            &self.uniforms,
            0,
            bytemuck::cast_slice(&projection.into_array()),
        );
        Ok(())
    }

    fn clear(&mut self, color: Color) -> crate::Result<()> {
        let [r, g, b, a] = color.premultiplied();
        let clear = wgpu::Color {
            r: f64::from(r),
            g: f64::from(g),
            b: f64::from(b),
            a: f64::from(a),
        };
        self.scoped(|backend| backend.submit_pass(wgpu::LoadOp::Clear(clear), None))
            .map_err(|err| Error::Gpu(err.to_string()))?
    }

    fn draw_indexed(&mut self, index_count: u32) -> crate::Result<()> {
        let bindings = match self.bindings.take() {
            Some(bindings) => bindings,
            None => self.bind_group(self.program()?),
        };
        let result = self.program().and_then(|program| {
            self.scoped(|backend| {
                backend.submit_pass(wgpu::LoadOp::Load, Some((program, &bindings, index_count)))
            })
            .map_err(|err| Error::Gpu(err.to_string()))
            .and_then(|drawn| drawn)
        });
        self.bindings = Some(bindings);
        result
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn premultiply(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        let alpha = u16::from(pixel[3]);
        for channel in &mut pixel[..3] {
            *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
        }
    }
}
