//! Dedicated render thread.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use super::renderer::OverlayRenderer;
use super::surface::PresentationSurface;
use crate::capture::{CapturedFrame, FrameRelay};
use crate::display::PixelRect;

/// Messages from the control context to the render thread.
pub enum RenderCommand {
    Resize { width: u32, height: u32 },
    RebindRelay(Arc<FrameRelay<CapturedFrame>>),
    Cursor { x: f32, y: f32 },
    SetScissor(Option<PixelRect>),
    SetVisible(bool),
    Shutdown,
}

/// Runs an [`OverlayRenderer`] on its own thread at a fixed tick rate.
pub struct RenderLoop {
    commands: Sender<RenderCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl RenderLoop {
    pub fn spawn<S>(renderer: OverlayRenderer, surface: S, target_fps: u32) -> std::io::Result<Self>
    where
        S: PresentationSurface + 'static,
    {
        let (commands, command_receiver) = crossbeam_channel::unbounded();
        let interval = Duration::from_secs_f64(1.0 / target_fps.max(1) as f64);

        let thread_handle = std::thread::Builder::new()
            .name("overlay-render".to_string())
            .spawn(move || {
                Self::render_thread(renderer, surface, command_receiver, interval);
            })?;

        Ok(Self {
            commands,
            thread_handle: Some(thread_handle),
        })
    }

    /// Queue a command. Returns `false` if the render thread has exited.
    pub fn send(&self, command: RenderCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(&mut self) {
        let _ = self.commands.send(RenderCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Render thread panicked");
            }
        }
    }

    fn render_thread<S: PresentationSurface>(
        mut renderer: OverlayRenderer,
        mut surface: S,
        commands: Receiver<RenderCommand>,
        interval: Duration,
    ) {
        log::info!("Render thread started ({:.1} ms/tick)", interval.as_secs_f64() * 1000.0);
        let ticker = crossbeam_channel::tick(interval);

        loop {
            crossbeam_channel::select! {
                recv(commands) -> command => match command {
                    Ok(RenderCommand::Shutdown) | Err(_) => break,
                    Ok(RenderCommand::Resize { width, height }) => surface.resize(width, height),
                    Ok(RenderCommand::RebindRelay(relay)) => renderer.rebind_relay(relay),
                    Ok(RenderCommand::Cursor { x, y }) => renderer.set_cursor(x, y),
                    Ok(RenderCommand::SetScissor(rect)) => renderer.set_scissor(rect),
                    Ok(RenderCommand::SetVisible(visible)) => surface.set_visible(visible),
                },
                recv(ticker) -> _ => {
                    if let Err(e) = renderer.render_tick(&mut surface) {
                        log::warn!("Render tick failed: {}", e);
                    }
                }
            }
        }

        log::info!("Render thread stopped");
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameSink;
    use crate::effects::DEFAULT_EFFECT_SOURCE;
    use crate::gpu::surface::HeadlessSurface;
    use crate::gpu::{GpuContext, PipelineCompiler, WgpuBackend};
    use crate::metrics::Metrics;
    use std::time::Instant;

    #[tokio::test]
    async fn test_render_loop_presents_and_shuts_down() {
        let ctx = match GpuContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => return,
        };

        let surface = HeadlessSurface::new(ctx.device.clone(), ctx.queue.clone(), 8, 8);
        let snapshots = surface.snapshots();
        let backend = WgpuBackend::new(ctx.device.clone(), surface.format());
        let layout = backend.bind_group_layout();
        let mut compiler = PipelineCompiler::new(backend);
        compiler.set_active_source(Some(DEFAULT_EFFECT_SOURCE)).unwrap();

        let relay = Arc::new(FrameRelay::new());
        let metrics = Arc::new(Metrics::new());
        let renderer = OverlayRenderer::new(
            ctx.device.clone(),
            ctx.queue.clone(),
            layout,
            compiler.live(),
            relay.clone(),
            metrics.clone(),
        );
        let sink = FrameSink::new(relay, metrics);
        let image = crate::capture::FrameImage::transparent(8, 8).unwrap();
        sink.deliver(image, Instant::now());

        let mut render_loop = RenderLoop::spawn(renderer, surface, 120).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !snapshots.is_pending() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(snapshots.is_pending());

        render_loop.shutdown();
        assert!(!render_loop.is_running());
        assert!(!render_loop.send(RenderCommand::SetVisible(false)));
    }
}
