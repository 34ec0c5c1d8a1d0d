//! Screen Shader Core
//!
//! Live screen-effects overlay: captured screen frames are transformed by a
//! user-authored WGSL effect on the GPU and composited onto a transparent,
//! always-on-top surface.
//!
//! # Features
//!
//! - Effect registry with at-most-one-active semantics
//! - Latest-wins frame relay between the capture and render threads
//! - Effect compilation through a fixed WGSL harness, validated with naga
//! - Render thread drawing into a window surface or an offscreen target
//! - Debounced display reconfiguration
//! - Rolling capture/render rate and latency metrics
//! - JSON configuration persistence

pub mod capture;
pub mod config;
pub mod controller;
pub mod display;
pub mod effects;
pub mod gpu;
pub mod metrics;
pub mod overlay;

// Re-export commonly used types
pub use capture::{
    CaptureController, CaptureSettings, CaptureSource, CaptureStartError, CapturedFrame,
    FrameImage, FrameRelay, FrameSink, SyntheticCapture,
};
pub use config::{AppConfig, ConfigError, ConfigStore, JsonConfigStore, MemoryConfigStore};
pub use controller::{EffectController, ErrorChannel, OverlayState, VisibilityPolicy};
pub use display::{
    DisplayInfo, DisplayProvider, DisplayReconfigure, DisplaySurfaceManager, StaticDisplay,
};
pub use effects::{Effect, EffectId, Effects, Preset, DEFAULT_EFFECT_SOURCE};
pub use gpu::{
    CompileError, CompileErrorKind, GpuContext, GpuError, HeadlessSurface, OverlayRenderer,
    PipelineCompiler, RenderLoop, ValidateOnly, WgpuBackend, WindowSurface,
};
pub use metrics::{Metrics, MetricsSnapshot};
pub use overlay::{Overlay, OverlayError};
