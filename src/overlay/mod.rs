//! Application wiring.
//!
//! [`Overlay`] connects a capture source, the effect controller, the render
//! thread and display tracking. It lives on the control context; the caller
//! forwards UI edits and OS notifications to it and calls [`Overlay::poll`]
//! regularly (every few tens of milliseconds) to drive its timers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::{
    CaptureController, CaptureSettings, CaptureSource, CaptureStartError, CapturedFrame,
    FrameRelay, FrameSink,
};
use crate::config::{AppConfig, ConfigError, ConfigStore};
use crate::controller::{EffectController, OverlayState};
use crate::display::{
    Debouncer, DisplayInfo, DisplayProvider, DisplayReconfigure, DisplaySurfaceManager,
};
use crate::effects::Effects;
use crate::gpu::{
    GpuContext, OverlayRenderer, PresentationSurface, RenderCommand, RenderLoop, WgpuBackend,
};
use crate::metrics::Metrics;

/// How often metrics windows are closed and logged.
pub const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Quiet period after an edit before the configuration is saved.
pub const CONFIG_SAVE_DELAY: Duration = Duration::from_secs(1);

/// Errors raised while assembling the overlay.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to spawn render thread: {0}")]
    RenderThread(#[from] std::io::Error),
}

/// Everything the display rebuild sequence touches.
struct OverlayCore<S: CaptureSource> {
    controller: EffectController<WgpuBackend>,
    capture: CaptureController<S>,
    render_loop: RenderLoop,
    relay: Arc<FrameRelay<CapturedFrame>>,
    metrics: Arc<Metrics>,
    state: OverlayState,
    capture_error: Option<CaptureStartError>,
}

impl<S: CaptureSource> OverlayCore<S> {
    fn sink(&self) -> FrameSink {
        FrameSink::new(Arc::clone(&self.relay), Arc::clone(&self.metrics))
    }

    fn apply_state(&mut self, state: OverlayState) {
        self.state = state;
        self.render_loop.send(RenderCommand::SetVisible(state.visible));
        let sink = self.sink();
        let result = self.capture.set_capturing(state.capturing, sink);
        self.record_capture_result(result);
    }

    /// Capture failures are kept apart from compile errors; the capture
    /// controller has already logged them.
    fn record_capture_result(&mut self, result: Result<(), CaptureStartError>) {
        self.capture_error = result.err();
    }
}

impl<S: CaptureSource> DisplayReconfigure for OverlayCore<S> {
    fn stop_capture(&mut self) {
        self.capture.stop();
    }

    fn rebuild_surface(&mut self, display: &DisplayInfo) {
        let (width, height) = (display.physical_width(), display.physical_height());
        self.render_loop.send(RenderCommand::Resize { width, height });
        self.render_loop
            .send(RenderCommand::SetScissor(display.visible_area));

        let settings = CaptureSettings {
            width,
            height,
            ..self.capture.settings().clone()
        };
        self.capture.set_settings(settings);
    }

    fn rebind_frame_relay(&mut self) {
        self.relay = Arc::new(FrameRelay::new());
        self.render_loop
            .send(RenderCommand::RebindRelay(Arc::clone(&self.relay)));
    }

    fn reload_active_effect(&mut self) {
        self.controller.reload_active_effect();
    }

    fn start_capture(&mut self) {
        if !self.state.capturing {
            return;
        }
        let sink = self.sink();
        let result = self.capture.start(sink).map(|_| ());
        self.record_capture_result(result);
    }
}

/// The running overlay.
pub struct Overlay<S: CaptureSource, D: DisplayProvider> {
    core: OverlayCore<S>,
    displays: DisplaySurfaceManager,
    provider: D,
    store: Box<dyn ConfigStore + Send>,
    target_fps: u32,
    save_debounce: Debouncer,
    next_metrics_at: Instant,
}

impl<S: CaptureSource, D: DisplayProvider> Overlay<S, D> {
    /// Load configuration, start the render thread and apply the initial
    /// overlay state.
    pub fn new<P>(
        ctx: &GpuContext,
        mut surface: P,
        source: S,
        provider: D,
        store: Box<dyn ConfigStore + Send>,
    ) -> Result<Self, OverlayError>
    where
        P: PresentationSurface + 'static,
    {
        let config = store.load()?;
        let target_fps = config.frame_rate();

        let mut displays = DisplaySurfaceManager::default();
        let mut settings = CaptureSettings {
            target_fps,
            ..Default::default()
        };
        if let Some(display) = provider.primary_display() {
            settings.width = display.physical_width();
            settings.height = display.physical_height();
            surface.resize(settings.width, settings.height);
            displays = displays.with_display(display);
        } else {
            log::warn!("No primary display reported, using {}x{}", settings.width, settings.height);
        }

        let backend = WgpuBackend::new(Arc::clone(&ctx.device), surface.format());
        let layout = backend.bind_group_layout();
        let controller = EffectController::new(
            Effects::from_snapshot(&config.effects),
            backend,
            config.visibility,
        );

        let relay = Arc::new(FrameRelay::new());
        let metrics = Arc::new(Metrics::new());
        let mut renderer = OverlayRenderer::new(
            Arc::clone(&ctx.device),
            Arc::clone(&ctx.queue),
            layout,
            controller.compiler().live(),
            Arc::clone(&relay),
            Arc::clone(&metrics),
        );
        renderer.set_scissor(displays.current().and_then(|d| d.visible_area));
        let render_loop = RenderLoop::spawn(renderer, surface, target_fps)?;

        let mut core = OverlayCore {
            controller,
            capture: CaptureController::new(source, settings),
            render_loop,
            relay,
            metrics,
            state: OverlayState {
                visible: false,
                capturing: false,
            },
            capture_error: None,
        };
        let state = core.controller.refresh_config();
        core.controller.take_dirty();
        core.apply_state(state);

        log::info!(
            "Overlay started with {} effects at {} fps",
            core.controller.effects().len(),
            target_fps
        );

        Ok(Self {
            core,
            displays,
            provider,
            store,
            target_fps,
            save_debounce: Debouncer::new(CONFIG_SAVE_DELAY),
            next_metrics_at: Instant::now() + METRICS_INTERVAL,
        })
    }

    pub fn controller(&self) -> &EffectController<WgpuBackend> {
        &self.core.controller
    }

    /// Registry access for the editing UI. Call [`Self::refresh_config`]
    /// after any edit.
    pub fn effects_mut(&mut self) -> &mut Effects {
        self.core.controller.effects_mut()
    }

    /// Recompile the active effect and apply the resulting overlay state.
    pub fn refresh_config(&mut self) -> OverlayState {
        let state = self.core.controller.refresh_config();
        self.core.apply_state(state);
        state
    }

    /// Menu-bar toggle: all off, or the default effect on.
    pub fn toggle_any(&mut self) -> OverlayState {
        let state = self.core.controller.toggle_any();
        self.core.apply_state(state);
        state
    }

    /// Latest effect compile error, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.core.controller.errors().message()
    }

    /// Why the last capture start failed, until capture starts or is turned
    /// off.
    pub fn capture_error(&self) -> Option<&CaptureStartError> {
        self.core.capture_error.as_ref()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.core.metrics
    }

    pub fn state(&self) -> OverlayState {
        self.core.state
    }

    pub fn is_capturing(&self) -> bool {
        self.core.capture.is_capturing()
    }

    pub fn capture_source(&self) -> &S {
        self.core.capture.source()
    }

    pub fn current_display(&self) -> Option<&DisplayInfo> {
        self.displays.current()
    }

    pub fn set_cursor(&self, x: f32, y: f32) {
        self.core.render_loop.send(RenderCommand::Cursor { x, y });
    }

    /// OS display configuration changed. Applied after the debounce period.
    pub fn on_display_change_signal(&mut self) {
        self.displays.on_display_change_signal();
    }

    /// Drive timers: display debounce, metrics interval and delayed saves.
    pub fn poll(&mut self, now: Instant) {
        self.displays.poll_at(now, &self.provider, &mut self.core);

        if now >= self.next_metrics_at {
            self.core.metrics.update_stats_at(now);
            self.core.metrics.log_stats();
            self.next_metrics_at = now + METRICS_INTERVAL;
        }

        if self.core.controller.take_dirty() {
            self.save_debounce.signal_at(now);
        }
        if self.save_debounce.poll_at(now) {
            if let Err(e) = self.save_config() {
                log::warn!("Failed to save configuration: {}", e);
            }
        }
    }

    pub fn config(&self) -> AppConfig {
        AppConfig {
            effects: self.core.controller.snapshot(),
            target_fps: self.target_fps,
            visibility: self.core.controller.policy(),
            ..Default::default()
        }
    }

    pub fn save_config(&self) -> Result<(), ConfigError> {
        self.store.save(&self.config())
    }

    /// Stop capture and the render thread, flushing unsaved edits.
    pub fn shutdown(mut self) -> Result<(), ConfigError> {
        self.core.capture.stop();
        self.core.render_loop.shutdown();
        if self.save_debounce.is_pending() || self.core.controller.take_dirty() {
            self.save_config()?;
        }
        log::info!("Overlay stopped");
        Ok(())
    }
}
