//! wgpu implementation of [`Backend`] plus the window surface that feeds it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use asset::ProgramData;
use asset::mesh::VertexDecl;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, CompareFunction, DepthBiasState, DepthStencilState, Device,
    DeviceDescriptor, ErrorFilter, Extent3d, Face, Features, FragmentState, FrontFace,
    IndexFormat, Instance, InstanceDescriptor, Limits, LoadOp, Operations,
    PipelineLayoutDescriptor, PowerPreference, PresentMode, PrimitiveState, PrimitiveTopology,
    Queue, RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, ShaderModule, ShaderModuleDescriptor,
    ShaderSource, ShaderStages, StoreOp, Surface, SurfaceConfiguration, SurfaceError,
    TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor, VertexState,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::backend::{
    Backend, BackendError, BackendResult, DrawCall, IndexBufferHandle, ProgramHandle,
    RenderState, Slots, VertexBufferHandle, ViewId, ViewSettings,
};
use crate::layout::VertexLayout;

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Per-draw uniforms (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DrawUniform {
    mvp: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
}

const DRAW_UNIFORM_SIZE: u64 = std::mem::size_of::<DrawUniform>() as u64;

struct GpuVertexBuffer {
    buffer: Buffer,
    layout: VertexLayout,
}

struct GpuIndexBuffer {
    buffer: Buffer,
    count: u32,
}

struct GpuProgram {
    name: String,
    vs: ShaderModule,
    fs: ShaderModule,
}

type PipelineKey = (ProgramHandle, VertexLayout, RenderState);

/// Draws are queued by [`Backend::submit`] and encoded by [`WgpuBackend::frame`],
/// one render pass per view in ascending view order.
///
/// Programs are WGSL; the vertex stage must export `vs_main` and the fragment
/// stage `fs_main`. Both see the per-draw uniform at group 0, binding 0.
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    color_format: TextureFormat,

    vertex_buffers: Slots<GpuVertexBuffer>,
    index_buffers: Slots<GpuIndexBuffer>,
    programs: Slots<GpuProgram>,
    // `None` marks a combination that failed validation.
    pipelines: HashMap<PipelineKey, Option<RenderPipeline>>,

    views: BTreeMap<ViewId, ViewSettings>,
    draws: Vec<DrawCall>,

    uniform_bgl: BindGroupLayout,
    uniform_buf: Buffer,
    uniform_bg: BindGroup,
    uniform_stride: u64,
    uniform_capacity: u64,
}

impl WgpuBackend {
    pub fn new(device: Device, queue: Queue, color_format: TextureFormat) -> Self {
        let align = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_stride = DRAW_UNIFORM_SIZE.div_ceil(align) * align;

        let uniform_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Draw BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(DRAW_UNIFORM_SIZE),
                },
                count: None,
            }],
        });
        let uniform_capacity = 64;
        let (uniform_buf, uniform_bg) =
            create_uniforms(&device, &uniform_bgl, uniform_stride, uniform_capacity);

        Self {
            device,
            queue,
            color_format,
            vertex_buffers: Slots::default(),
            index_buffers: Slots::default(),
            programs: Slots::default(),
            pipelines: HashMap::new(),
            views: BTreeMap::new(),
            draws: Vec::new(),
            uniform_bgl,
            uniform_buf,
            uniform_bg,
            uniform_stride,
            uniform_capacity,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Encode and submit everything queued since the last frame.
    pub fn frame(&mut self, target: &TextureView, depth: &TextureView) {
        let draws = std::mem::take(&mut self.draws);

        for d in &draws {
            self.ensure_pipeline(d);
        }
        self.upload_uniforms(&draws);

        let mut view_ids: Vec<ViewId> = self.views.keys().copied().collect();
        view_ids.extend(draws.iter().map(|d| d.view));
        view_ids.sort_unstable();
        view_ids.dedup();

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("FrameEncoder"),
            });

        for id in view_ids {
            let settings = self.views.get(&id).copied().unwrap_or_default();
            let color_load = match settings.clear_rgba {
                Some(rgba) => LoadOp::Clear(clear_color(rgba)),
                None => LoadOp::Load,
            };
            let depth_load = match settings.clear_rgba {
                Some(_) => LoadOp::Clear(settings.clear_depth),
                None => LoadOp::Load,
            };

            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("ViewPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: Operations {
                        load: color_load,
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(Operations {
                        load: depth_load,
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for (i, d) in draws.iter().enumerate().filter(|(_, d)| d.view == id) {
                let (Some(vb), Some(ib)) = (
                    self.vertex_buffers.get(d.vertex_buffer.0),
                    self.index_buffers.get(d.index_buffer.0),
                ) else {
                    log::warn!("Draw references a destroyed buffer; skipped");
                    continue;
                };
                if ib.count == 0 {
                    continue;
                }
                let key = (d.program, vb.layout.clone(), d.state);
                let Some(Some(pipeline)) = self.pipelines.get(&key) else {
                    continue;
                };
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, &self.uniform_bg, &[(i as u64 * self.uniform_stride) as u32]);
                rpass.set_vertex_buffer(0, vb.buffer.slice(..));
                rpass.set_index_buffer(ib.buffer.slice(..), IndexFormat::Uint16);
                rpass.draw_indexed(0..ib.count, 0, 0..1);
            }
        }

        self.queue.submit(Some(encoder.finish()));
    }

    fn upload_uniforms(&mut self, draws: &[DrawCall]) {
        let needed = draws.len() as u64;
        if needed > self.uniform_capacity {
            let capacity = needed.next_power_of_two();
            let (buf, bg) =
                create_uniforms(&self.device, &self.uniform_bgl, self.uniform_stride, capacity);
            self.uniform_buf.destroy();
            self.uniform_buf = buf;
            self.uniform_bg = bg;
            self.uniform_capacity = capacity;
        }
        if draws.is_empty() {
            return;
        }

        let stride = self.uniform_stride as usize;
        let mut staging = vec![0u8; stride * draws.len()];
        for (i, d) in draws.iter().enumerate() {
            let settings = self.views.get(&d.view).copied().unwrap_or_default();
            let u = DrawUniform {
                mvp: (settings.proj * settings.view * d.transform).to_cols_array_2d(),
                model: d.transform.to_cols_array_2d(),
            };
            let at = i * stride;
            staging[at..at + DRAW_UNIFORM_SIZE as usize].copy_from_slice(bytemuck::bytes_of(&u));
        }
        self.queue.write_buffer(&self.uniform_buf, 0, &staging);
    }

    fn ensure_pipeline(&mut self, draw: &DrawCall) {
        let Some(vb) = self.vertex_buffers.get(draw.vertex_buffer.0) else {
            return;
        };
        let key = (draw.program, vb.layout.clone(), draw.state);
        if self.pipelines.contains_key(&key) {
            return;
        }
        let pipeline = self.create_pipeline(&key);
        self.pipelines.insert(key, pipeline);
    }

    fn create_pipeline(&self, (program, layout, state): &PipelineKey) -> Option<RenderPipeline> {
        let Some(prog) = self.programs.get(program.0) else {
            log::error!("Draw with destroyed program {}", program.index());
            return None;
        };
        if !layout.is_valid() {
            log::error!(
                "Vertex stride {} can't be used by wgpu (program '{}')",
                layout.stride,
                prog.name
            );
            return None;
        }
        for attrib in &layout.skipped {
            log::warn!("Attribute {attrib:?} has no wgpu vertex format; not bound");
        }

        let pipeline_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Draw PipelineLayout"),
            bind_group_layouts: &[&self.uniform_bgl],
            push_constant_ranges: &[],
        });

        self.device.push_error_scope(ErrorFilter::Validation);
        let pipeline = self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(prog.name.as_str()),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &prog.vs,
                entry_point: Some("vs_main"),
                buffers: &[layout.as_wgpu()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &prog.fs,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: self.color_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: color_writes(*state),
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: primitive_state(*state),
            depth_stencil: Some(depth_stencil_state(*state)),
            // MSAA is accepted but targets are single-sampled.
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => {
                log::error!("Pipeline for program '{}' rejected: {err}", prog.name);
                None
            }
            None => {
                log::debug!("Created pipeline for program '{}' ({:?})", prog.name, state);
                Some(pipeline)
            }
        }
    }

    fn compile(&self, name: &str, code: &[u8]) -> BackendResult<ShaderModule> {
        let source = std::str::from_utf8(code).map_err(|e| BackendError::ShaderCompile {
            name: name.to_owned(),
            message: e.to_string(),
        })?;
        self.device.push_error_scope(ErrorFilter::Validation);
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(BackendError::ShaderCompile {
                name: name.to_owned(),
                message: err.to_string(),
            }),
            None => Ok(module),
        }
    }
}

impl Backend for WgpuBackend {
    fn create_vertex_buffer(&mut self, data: &[u8], decl: &VertexDecl) -> VertexBufferHandle {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh VB"),
            contents: data,
            usage: BufferUsages::VERTEX,
        });
        VertexBufferHandle(self.vertex_buffers.insert(GpuVertexBuffer {
            buffer,
            layout: VertexLayout::from_decl(decl),
        }))
    }

    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle) {
        match self.vertex_buffers.remove(handle.0) {
            Some(vb) => vb.buffer.destroy(),
            None => log::error!("Destroying vertex buffer {} which is not alive", handle.index()),
        }
    }

    fn create_index_buffer(&mut self, indices: &[u16]) -> IndexBufferHandle {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh IB"),
            contents: bytemuck::cast_slice(indices),
            usage: BufferUsages::INDEX,
        });
        IndexBufferHandle(self.index_buffers.insert(GpuIndexBuffer {
            buffer,
            count: indices.len() as u32,
        }))
    }

    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle) {
        match self.index_buffers.remove(handle.0) {
            Some(ib) => ib.buffer.destroy(),
            None => log::error!("Destroying index buffer {} which is not alive", handle.index()),
        }
    }

    fn create_program(&mut self, program: &ProgramData) -> BackendResult<ProgramHandle> {
        let vs = self.compile(&program.vertex.name, &program.vertex.code)?;
        let fs = self.compile(&program.fragment.name, &program.fragment.code)?;
        let name = format!("{}+{}", program.vertex.name, program.fragment.name);
        log::info!("Created program '{name}'");
        Ok(ProgramHandle(self.programs.insert(GpuProgram { name, vs, fs })))
    }

    fn destroy_program(&mut self, handle: ProgramHandle) {
        if self.programs.remove(handle.0).is_none() {
            log::error!("Destroying program {} which is not alive", handle.index());
            return;
        }
        self.pipelines.retain(|(program, _, _), _| *program != handle);
    }

    fn set_view_clear(&mut self, view: ViewId, rgba: u32, depth: f32) {
        let v = self.views.entry(view).or_default();
        v.clear_rgba = Some(rgba);
        v.clear_depth = depth;
    }

    fn set_view_transform(&mut self, view: ViewId, view_mtx: Mat4, proj: Mat4) {
        let v = self.views.entry(view).or_default();
        v.view = view_mtx;
        v.proj = proj;
    }

    fn submit(&mut self, draw: DrawCall) {
        self.draws.push(draw);
    }
}

fn create_uniforms(
    device: &Device,
    layout: &BindGroupLayout,
    stride: u64,
    capacity: u64,
) -> (Buffer, BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw UBO"),
        size: stride * capacity,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Draw BG"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(DRAW_UNIFORM_SIZE),
            }),
        }],
    });
    (buffer, bind_group)
}

/// `0xRRGGBBAA` to a linear wgpu color.
fn clear_color(rgba: u32) -> wgpu::Color {
    let c = |shift: u32| f64::from((rgba >> shift) & 0xff) / 255.0;
    wgpu::Color {
        r: c(24),
        g: c(16),
        b: c(8),
        a: c(0),
    }
}

fn color_writes(state: RenderState) -> ColorWrites {
    let mut writes = ColorWrites::empty();
    if state.contains(RenderState::WRITE_RGB) {
        writes |= ColorWrites::COLOR;
    }
    if state.contains(RenderState::WRITE_A) {
        writes |= ColorWrites::ALPHA;
    }
    writes
}

fn primitive_state(state: RenderState) -> PrimitiveState {
    let cull_mode = if state.contains(RenderState::CULL_CW) {
        Some(Face::Back)
    } else if state.contains(RenderState::CULL_CCW) {
        Some(Face::Front)
    } else {
        None
    };
    PrimitiveState {
        topology: PrimitiveTopology::TriangleList,
        front_face: FrontFace::Ccw,
        cull_mode,
        ..Default::default()
    }
}

fn depth_stencil_state(state: RenderState) -> DepthStencilState {
    DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: state.contains(RenderState::WRITE_Z),
        depth_compare: if state.contains(RenderState::DEPTH_TEST_LESS) {
            CompareFunction::Less
        } else {
            CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: DepthBiasState::default(),
    }
}

/// Window surface, depth buffer and the backend drawing into them.
pub struct GpuState {
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    depth_view: TextureView,
    backend: WgpuBackend,
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, backends: wgpu::Backends) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        let instance = Instance::new(InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        log::info!("Using adapter {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("Svarog3D Device"),
                    required_features: Features::empty(),
                    required_limits: Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("request_device failed")?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no formats")?;

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);
        let backend = WgpuBackend::new(device, queue, surface_format);

        Ok(Self {
            surface,
            surface_config,
            depth_view,
            backend,
            width,
            height,
        })
    }

    pub fn backend(&mut self) -> &mut WgpuBackend {
        &mut self.backend
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(self.backend.device(), &self.surface_config);
        self.depth_view = create_depth_view(self.backend.device(), &self.surface_config);
    }

    /// Draw everything submitted this frame and present.
    pub fn render(&mut self) -> Result<(), SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());
        self.backend.frame(&view, &self.depth_view);
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}
