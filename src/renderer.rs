use crate::{
    error::{CompileError, InitError, RenderError},
    session::RenderBackend,
    uniform::{RuntimeUniforms, UNIFORM_GROUP_ID},
};
use anyhow::Result;
use futures::executor::block_on;
use std::{borrow::Cow, num::NonZeroU32};
use wgpu::util::DeviceExt;

const VERTEX_SHADER: &str = include_str!("assets/vert.wgsl");

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
}

// Fullscreen quad, clockwise-wound triangles, drawn with back culling.
const QUAD_VERTICES: [Vertex; 4] = [
    Vertex {
        position: [-1.0, 1.0, 0.0],
    },
    Vertex {
        position: [1.0, 1.0, 0.0],
    },
    Vertex {
        position: [-1.0, -1.0, 0.0],
    },
    Vertex {
        position: [1.0, -1.0, 0.0],
    },
];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 1, 3, 2];

/// Owns every GPU object. Static resources (device, surface, quad
/// geometry, sampler) are created once; the pipeline, its layout and the
/// uniform buffer are dynamic and torn down on every successful rebuild.
/// Texture bind groups live independently of the pipeline.
pub struct Renderer {
    device: wgpu::Device,
    format: wgpu::TextureFormat,
    frame: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
    index_buffer: wgpu::Buffer,
    pipeline: wgpu::RenderPipeline,
    queue: wgpu::Queue,
    sampler: wgpu::Sampler,
    size: (u32, u32),
    surface: wgpu::Surface,
    texture_bind_groups: Vec<(wgpu::BindGroupLayout, wgpu::BindGroup)>,
    uniform_bind_group: wgpu::BindGroup,
    uniform_bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    vertex_module: wgpu::ShaderModule,
}

impl Renderer {
    pub fn new<W>(w: &W, width: u32, height: u32, fragment_source: &str) -> Result<Self, InitError>
    where
        W: raw_window_handle::HasRawWindowHandle + raw_window_handle::HasRawDisplayHandle,
    {
        let default_backend = wgpu::Backends::PRIMARY;
        let backend = wgpu::util::backend_bits_from_env().unwrap_or(default_backend);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: backend,
            ..Default::default()
        });
        let surface = unsafe { instance.create_surface(w) }?;

        let adapter = block_on(wgpu::util::initialize_adapter_from_env_or_default(
            &instance,
            backend,
            Some(&surface),
        ))
        .ok_or(InitError::NoAdapter)?;

        let format = surface
            .get_capabilities(&adapter)
            .formats
            .first()
            .copied()
            .ok_or(InitError::NoSurfaceFormat)?;

        let (device, queue) = block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Device Descriptor"),
                features: wgpu::Features::empty(),
                limits: wgpu::Limits::default(),
            },
            None,
        ))?;

        log::info!("Using adapter: {:?}", adapter.get_info());

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::from(VERTEX_SHADER)),
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let (uniform_buffer, uniform_bind_group_layout, uniform_bind_group) =
            create_uniform_resources(&device);
        let pipeline = build_pipeline(
            &device,
            &vertex_module,
            fragment_source,
            &[&uniform_bind_group_layout],
            format,
        );

        if let Some(error) = block_on(device.pop_error_scope()) {
            return Err(InitError::DefaultShader(CompileError {
                message: error.to_string(),
            }));
        }

        let mut renderer = Self {
            device,
            format,
            frame: None,
            index_buffer,
            pipeline,
            queue,
            sampler,
            size: (0, 0),
            surface,
            texture_bind_groups: vec![],
            uniform_bind_group,
            uniform_bind_group_layout,
            uniform_buffer,
            vertex_buffer,
            vertex_module,
        };

        renderer.configure_surface(width, height);

        Ok(renderer)
    }

    pub fn device_ref(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Acquires the frame to render into and opens the per-frame
    /// validation error scope, closed again by [`Self::frame_finish`].
    pub fn frame_start(&mut self) -> Result<(), RenderError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.frame = Some((frame, view));

        Ok(())
    }

    /// Runs the UI pass against the current frame. Submitted after the
    /// shader pass so the overlay composites on top.
    pub fn render_overlay<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue, &wgpu::TextureView) -> Result<()>,
    {
        let (_, view) = self.frame.as_ref().ok_or(RenderError::FrameNotStarted)?;

        f(&self.device, &self.queue, view)
    }

    /// Waits for the submitted work to finish, closes the validation
    /// error scope and presents. Presentation is skipped when the window
    /// went away mid-frame.
    pub fn frame_finish(&mut self, present: bool) -> Option<wgpu::Error> {
        self.device.poll(wgpu::Maintain::Wait);
        let error = block_on(self.device.pop_error_scope());

        if let Some((frame, _)) = self.frame.take() {
            if present {
                frame.present();
            }
        }

        error
    }

    fn configure_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == self.size {
            return;
        }

        self.size = (width, height);
        self.surface.configure(
            &self.device,
            &wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format: self.format,
                width,
                height,
                present_mode: wgpu::PresentMode::AutoVsync,
                alpha_mode: wgpu::CompositeAlphaMode::Auto,
                view_formats: vec![],
            },
        );
    }
}

impl RenderBackend for Renderer {
    /// Builds the new shader module, layout, pipeline and uniform buffer
    /// as locals first. The swap into `self` happens only after the
    /// validation scope confirms the build; on failure the locals drop
    /// here and the active set is untouched.
    fn rebuild(&mut self, fragment_source: &str) -> Result<(), CompileError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let (uniform_buffer, uniform_bind_group_layout, uniform_bind_group) =
            create_uniform_resources(&self.device);

        let mut bind_group_layouts = vec![&uniform_bind_group_layout];
        for (layout, _) in &self.texture_bind_groups {
            bind_group_layouts.push(layout);
        }

        let pipeline = build_pipeline(
            &self.device,
            &self.vertex_module,
            fragment_source,
            &bind_group_layouts,
            self.format,
        );

        if let Some(error) = block_on(self.device.pop_error_scope()) {
            return Err(CompileError {
                message: error.to_string(),
            });
        }

        self.pipeline = pipeline;
        self.uniform_buffer = uniform_buffer;
        self.uniform_bind_group = uniform_bind_group;
        self.uniform_bind_group_layout = uniform_bind_group_layout;

        Ok(())
    }

    fn add_texture(&mut self, width: u32, height: u32, data: &[u8]) {
        self.texture_bind_groups.push(create_texture(
            &self.device,
            &self.queue,
            &self.sampler,
            width,
            height,
            data,
        ));
    }

    fn clear_textures(&mut self) {
        self.texture_bind_groups.clear();
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.configure_surface(width, height);
    }

    fn draw(&mut self, uniforms: &RuntimeUniforms) -> Result<(), RenderError> {
        let (_, view) = self.frame.as_ref().ok_or(RenderError::FrameNotStarted)?;

        self.queue
            .write_buffer(&self.uniform_buffer, 0, uniforms.as_bytes());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shader Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(UNIFORM_GROUP_ID, &self.uniform_bind_group, &[]);
            for (index, (_, bind_group)) in self.texture_bind_groups.iter().enumerate() {
                render_pass.set_bind_group(index as u32 + 1, bind_group, &[]);
            }
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
        }

        self.queue.submit(Some(encoder.finish()));

        Ok(())
    }

    fn finish(&mut self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    fn max_texture_slots(&self) -> u32 {
        self.device.limits().max_bind_groups - 1
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    vertex_module: &wgpu::ShaderModule,
    fragment_source: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    texture_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Pipeline Layout"),
        bind_group_layouts,
        push_constant_ranges: &[],
    });

    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Fragment Shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::from(fragment_source)),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Render Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: "main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x3],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: "main",
            targets: &[Some(wgpu::ColorTargetState {
                format: texture_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Cw,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    buffer: &[u8],
) -> (wgpu::BindGroupLayout, wgpu::BindGroup) {
    let texture_size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        size: texture_size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        label: Some("Bound Texture"),
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        buffer,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: NonZeroU32::new(4 * width),
            rows_per_image: NonZeroU32::new(height),
        },
        texture_size,
    );

    let texture_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("Texture Bind Group Layout"),
        });

    let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &texture_bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("Texture Bind Group"),
    });

    (texture_bind_group_layout, texture_bind_group)
}

fn create_uniform_resources(
    device: &wgpu::Device,
) -> (wgpu::Buffer, wgpu::BindGroupLayout, wgpu::BindGroup) {
    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Uniform Buffer"),
        contents: RuntimeUniforms::default().as_bytes(),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let uniform_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

    let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Uniform Bind Group"),
        layout: &uniform_bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }],
    });

    (uniform_buffer, uniform_bind_group_layout, uniform_bind_group)
}
