use std::sync::Arc;

use anyhow::{Result, anyhow};
use renderer::GpuState;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::{Example, FrameContext, FrameTimer, RunConfig};

/// Open a window and drive `example` until the window is closed.
pub fn run(config: RunConfig, example: Box<dyn Example>) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|e| anyhow!("Failed to create event loop: {e:?}"))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        config,
        example,
        window: None,
        gpu: None,
        timer: FrameTimer::new(),
        shut_down: false,
        error: None,
    };
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    config: RunConfig,
    example: Box<dyn Example>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    timer: FrameTimer,
    shut_down: bool,
    error: Option<anyhow::Error>,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| anyhow!("Failed to create window: {e}"))?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let mut gpu = pollster::block_on(GpuState::new(window.clone(), self.config.backends))?;
        self.example.init(gpu.backend())?;

        self.timer = FrameTimer::new();
        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let tick = self.timer.tick();
        if let Some(fps) = tick.fps.filter(|_| self.config.show_stats) {
            log::info!("{fps:.1} fps ({:.2} ms)", 1000.0 / fps);
        }

        let (width, height) = gpu.size();
        let ctx = FrameContext {
            time: tick.time,
            delta: tick.delta,
            frame: tick.frame,
            width,
            height,
        };
        self.example.update(gpu.backend(), &ctx);

        match gpu.render() {
            Ok(()) => {}
            Err(e) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface lost/outdated: {e:?}; reconfiguring");
                gpu.recreate_surface();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow!("Out of GPU memory"));
                return;
            }
            Err(e) => log::warn!("Frame skipped: {e:?}"),
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if let Some(gpu) = self.gpu.as_mut() {
            self.example.shutdown(gpu.backend());
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.shutdown();
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::info!("Resized: {}x{}", size.width, size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::info!("Scale factor changed: {scale_factor:.3}");
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}
