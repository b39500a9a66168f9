//! Platform layer: windowing, the frame loop and the example contract.
//!
//! An [`Example`] sees only a [`Backend`], so the same code runs in a window
//! ([`run`]) or against the recording backend ([`run_headless`]).

mod timer;
mod window;

use anyhow::Result;
use renderer::{Backend, HeadlessBackend};

pub use timer::{FrameTimer, Tick};
pub use window::run;

/// Window and frame loop settings.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub backends: wgpu::Backends,
    /// Log frame rate once per second.
    pub show_stats: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            title: "Svarog3D".into(),
            width: 1280,
            height: 720,
            backends: wgpu::Backends::all(),
            show_stats: false,
        }
    }
}

/// Per-frame input handed to [`Example::update`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    /// Seconds since the loop started.
    pub time: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
    pub frame: u64,
    pub width: u32,
    pub height: u32,
}

impl FrameContext {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// A program driven by the frame loop.
pub trait Example {
    /// Create resources. Called once before the first frame.
    fn init(&mut self, backend: &mut dyn Backend) -> Result<()>;

    /// Submit the frame's draws.
    fn update(&mut self, backend: &mut dyn Backend, ctx: &FrameContext);

    /// Release resources. Called once after the last frame.
    fn shutdown(&mut self, backend: &mut dyn Backend);
}

/// Drive `example` for `frames` frames of `frame_time` seconds each.
pub fn run_headless(
    example: &mut dyn Example,
    backend: &mut HeadlessBackend,
    frames: u32,
    frame_time: f32,
    (width, height): (u32, u32),
) -> Result<()> {
    example.init(backend)?;
    for i in 0..frames {
        let ctx = FrameContext {
            time: (i + 1) as f32 * frame_time,
            delta: frame_time,
            frame: u64::from(i) + 1,
            width,
            height,
        };
        example.update(backend, &ctx);
        let draws = backend.frame();
        log::debug!("Headless frame {}: {} draws", ctx.frame, draws);
    }
    example.shutdown(backend);
    Ok(())
}

#[cfg(test)]
mod tests {
    use asset::mesh::VertexDecl;
    use glam::Mat4;
    use renderer::{DrawCall, Mesh, ProgramHandle, RenderState};

    use super::*;

    #[derive(Default)]
    struct Counter {
        buffers: Option<(renderer::VertexBufferHandle, renderer::IndexBufferHandle)>,
        program: Option<ProgramHandle>,
        times: Vec<f32>,
        shut_down: bool,
    }

    impl Example for Counter {
        fn init(&mut self, backend: &mut dyn Backend) -> Result<()> {
            let vb = backend.create_vertex_buffer(&[], &VertexDecl::default());
            let ib = backend.create_index_buffer(&[0, 1, 2]);
            self.buffers = Some((vb, ib));
            let stage = |name: &str| asset::ShaderData {
                name: name.into(),
                code: b"//".to_vec(),
            };
            self.program = Some(backend.create_program(&asset::ProgramData {
                vertex: stage("vs"),
                fragment: stage("fs"),
            })?);
            Ok(())
        }

        fn update(&mut self, backend: &mut dyn Backend, ctx: &FrameContext) {
            self.times.push(ctx.time);
            let (Some((vb, ib)), Some(program)) = (self.buffers, self.program) else {
                return;
            };
            backend.submit(DrawCall {
                view: 0,
                program,
                transform: Mat4::IDENTITY,
                state: RenderState::DEFAULT,
                vertex_buffer: vb,
                index_buffer: ib,
            });
        }

        fn shutdown(&mut self, backend: &mut dyn Backend) {
            if let Some((vb, ib)) = self.buffers.take() {
                backend.destroy_vertex_buffer(vb);
                backend.destroy_index_buffer(ib);
            }
            if let Some(p) = self.program.take() {
                backend.destroy_program(p);
            }
            self.shut_down = true;
        }
    }

    #[test]
    fn headless_loop_runs_every_stage() {
        let mut example = Counter::default();
        let mut backend = HeadlessBackend::new();
        run_headless(&mut example, &mut backend, 3, 0.5, (640, 480)).unwrap();

        assert_eq!(example.times, vec![0.5, 1.0, 1.5]);
        assert!(example.shut_down);
        assert_eq!(backend.frames(), 3);
        assert!(backend.draws().is_empty());
        assert_eq!(backend.live_vertex_buffers(), 0);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn empty_mesh_example_is_harmless() {
        struct Empty(Option<Mesh>);
        impl Example for Empty {
            fn init(&mut self, backend: &mut dyn Backend) -> Result<()> {
                self.0 = Some(Mesh::upload(backend, &Default::default()));
                Ok(())
            }
            fn update(&mut self, _: &mut dyn Backend, _: &FrameContext) {}
            fn shutdown(&mut self, backend: &mut dyn Backend) {
                if let Some(m) = self.0.take() {
                    m.unload(backend);
                }
            }
        }
        let mut backend = HeadlessBackend::new();
        run_headless(&mut Empty(None), &mut backend, 1, 0.016, (1, 1)).unwrap();
        assert_eq!(backend.invalid_destroys(), 0);
    }

    #[test]
    fn aspect_handles_zero_height() {
        let ctx = FrameContext {
            time: 0.0,
            delta: 0.0,
            frame: 1,
            width: 800,
            height: 0,
        };
        assert_eq!(ctx.aspect(), 800.0);
    }
}
