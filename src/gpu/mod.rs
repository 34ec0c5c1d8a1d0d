//! GPU compilation and rendering using wgpu.
//!
//! Effects are WGSL functions spliced into a fixed harness, validated with
//! naga and built into render pipelines. The render context draws the latest
//! captured frame through the live pipeline onto a transparent presentation
//! surface, either a window or an offscreen target.

pub mod compiler;
pub mod context;
pub mod harness;
pub mod layouts;
pub mod pipelines;
pub mod render_loop;
pub mod renderer;
pub mod surface;
pub mod textures;

pub use compiler::{CompiledPipeline, LivePipeline, PipelineBackend, PipelineCompiler, ValidateOnly, WgpuBackend};
pub use context::{GpuContext, GpuError};
pub use harness::{CompileError, CompileErrorKind, HarnessUniforms, ValidatedEffect};
pub use render_loop::{RenderCommand, RenderLoop};
pub use renderer::{OverlayRenderer, RenderError, TickReport};
pub use surface::{Drawable, HeadlessSurface, PresentationSurface, WindowSurface};
