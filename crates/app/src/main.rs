//! Vulkraft - Main Entry Point
//!
//! Opens a window and clears it every frame to a slowly cycling color.

mod color;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use vulkraft_core::{AppConfig, FrameStats};
use vulkraft_platform::Window;
use vulkraft_renderer::{Renderer, RendererConfig};

use crate::color::ColorCycle;

const STATS_INTERVAL: Duration = Duration::from_secs(1);

struct App {
    config: AppConfig,
    window: Option<Window>,
    renderer: Option<Renderer>,
    colors: ColorCycle,
    stats: FrameStats,
    /// First fatal error, returned from `main` after the loop exits.
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let colors = ColorCycle::new(config.color_step);
        Self {
            config,
            window: None,
            renderer: None,
            colors,
            stats: FrameStats::new(STATS_INTERVAL),
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(event_loop, &self.config).context("Failed to create window")?;
        let renderer = Renderer::new(&window, &RendererConfig::from(&self.config))
            .context("Failed to create renderer")?;

        info!(
            "Initialization complete ({} frame slots, {:?}), entering main loop",
            renderer.slot_count(),
            renderer.format()
        );
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    /// Renders one tick. An empty frame is skipped silently.
    fn tick(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let mut frame = renderer.try_get_frame()?;
        if !frame.is_valid() {
            self.stats.record_skipped();
            return Ok(());
        }

        self.colors.advance();
        frame.begin(self.colors.rgba())?;
        frame.end()?;
        frame.submit_and_present()?;
        self.stats.record_presented();

        if let Some(report) = self.stats.take_report() {
            info!(
                "{:.1} fps, {} skipped frames",
                report.fps(),
                report.skipped
            );
        }
        Ok(())
    }

    /// Tears the renderer down before the window it presents to.
    fn shutdown(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.deinit();
        }
        self.window = None;
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{:#}", e);
        self.error.get_or_insert(e);
        self.shutdown();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none()
            && let Err(e) = self.init(event_loop)
        {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                if let Some(ref mut window) = self.window {
                    window.request_close();
                }
            }
            WindowEvent::Resized(size) => {
                // The swapchain picks the new size up on the next acquire.
                debug!("Window resized to {}x{}", size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.tick() {
                    self.fail(event_loop, e.context("Render error"));
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let close = self.window.as_ref().is_some_and(Window::close_requested);
        if close {
            self.shutdown();
            event_loop.exit();
        } else if let Some(ref window) = self.window {
            let flow = control_flow_for(window.drawable_size());
            event_loop.set_control_flow(flow);
            // A minimised window sleeps until the next event (a resize).
            if flow == ControlFlow::Poll {
                window.request_redraw();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

/// Render continuously unless the window has no drawable area.
fn control_flow_for((width, height): (u32, u32)) -> ControlFlow {
    if width == 0 || height == 0 {
        ControlFlow::Wait
    } else {
        ControlFlow::Poll
    }
}

fn main() -> Result<()> {
    vulkraft_core::init_logging();

    let config = AppConfig::from_env()?;
    info!(
        "Starting {} ({}x{}, validation {})",
        config.title,
        config.width,
        config.height,
        if config.enable_validation { "on" } else { "off" }
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
