//! Effect compilation and the live pipeline slot.
//!
//! [`PipelineCompiler`] turns effect sources into [`CompiledPipeline`]s
//! through a [`PipelineBackend`] and publishes the result in a
//! [`LivePipeline`] the render context reads from. A failed build never
//! touches the live slot.

use std::sync::Arc;

use parking_lot::RwLock;
use wgpu::{BindGroupLayout, Device, PipelineLayout, RenderPipeline, TextureFormat};

use super::harness::{self, CompileError, ValidatedEffect};
use super::{layouts, pipelines};

/// Creates the executable form of a validated effect.
pub trait PipelineBackend {
    type Pipeline: Send + Sync + 'static;

    fn create_pipeline(&self, effect: &ValidatedEffect) -> Result<Self::Pipeline, CompileError>;
}

/// Backend that stops after front-end validation.
///
/// Used headless and wherever no GPU device is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOnly;

impl PipelineBackend for ValidateOnly {
    type Pipeline = ();

    fn create_pipeline(&self, _effect: &ValidatedEffect) -> Result<(), CompileError> {
        Ok(())
    }
}

/// Builds real render pipelines against the shared effect bind group layout.
pub struct WgpuBackend {
    device: Arc<Device>,
    bind_group_layout: Arc<BindGroupLayout>,
    pipeline_layout: PipelineLayout,
    format: TextureFormat,
}

impl WgpuBackend {
    pub fn new(device: Arc<Device>, format: TextureFormat) -> Self {
        let bind_group_layout = Arc::new(layouts::create_effect_layout(&device));
        let pipeline_layout = pipelines::create_pipeline_layout(
            &device,
            "effect_pipeline_layout",
            &[bind_group_layout.as_ref()],
        );
        Self {
            device,
            bind_group_layout,
            pipeline_layout,
            format,
        }
    }

    /// Layout the renderer must create its bind groups against.
    pub fn bind_group_layout(&self) -> Arc<BindGroupLayout> {
        Arc::clone(&self.bind_group_layout)
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Change the render target format. Takes effect on the next build.
    pub fn set_format(&mut self, format: TextureFormat) {
        self.format = format;
    }
}

impl PipelineBackend for WgpuBackend {
    type Pipeline = RenderPipeline;

    /// Validation errors raised by the device are captured in an error scope
    /// and returned instead of reaching the uncaptured error handler.
    fn create_pipeline(&self, effect: &ValidatedEffect) -> Result<RenderPipeline, CompileError> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("effect_shader"),
                source: wgpu::ShaderSource::Wgsl(effect.wrapped.as_str().into()),
            });
        let pipeline = pipelines::EffectPipelineBuilder::new(&self.pipeline_layout, &shader)
            .label("effect_pipeline")
            .format(self.format)
            .build(&self.device);

        match pollster::block_on(scope.pop()) {
            Some(error) => Err(CompileError::compile(error.to_string(), None)),
            None => Ok(pipeline),
        }
    }
}

/// An effect compiled for a backend. Immutable once built.
#[derive(Debug)]
pub struct CompiledPipeline<P> {
    pub source_used: String,
    pub handle: P,
}

/// Slot holding the pipeline the render context draws with.
///
/// The lock is only held to clone or swap the `Arc`. A replaced pipeline is
/// released when the last render tick still holding it finishes.
#[derive(Debug)]
pub struct LivePipeline<P> {
    slot: RwLock<Option<Arc<CompiledPipeline<P>>>>,
}

impl<P> Default for LivePipeline<P> {
    fn default() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }
}

impl<P> LivePipeline<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current pipeline, if any.
    pub fn load(&self) -> Option<Arc<CompiledPipeline<P>>> {
        self.slot.read().clone()
    }

    /// Replace the current pipeline, returning the previous one.
    pub fn store(&self, pipeline: Option<Arc<CompiledPipeline<P>>>) -> Option<Arc<CompiledPipeline<P>>> {
        std::mem::replace(&mut *self.slot.write(), pipeline)
    }

    pub fn is_empty(&self) -> bool {
        self.slot.read().is_none()
    }
}

/// Compiles effects and owns the live pipeline slot.
///
/// Driven from the control context only.
pub struct PipelineCompiler<B: PipelineBackend> {
    backend: B,
    live: Arc<LivePipeline<B::Pipeline>>,
}

impl<B: PipelineBackend> PipelineCompiler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            live: Arc::new(LivePipeline::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Shared handle for the render context.
    pub fn live(&self) -> Arc<LivePipeline<B::Pipeline>> {
        Arc::clone(&self.live)
    }

    /// The pipeline currently being drawn with.
    pub fn current(&self) -> Option<Arc<CompiledPipeline<B::Pipeline>>> {
        self.live.load()
    }

    /// Source of the current pipeline.
    pub fn active_source(&self) -> Option<String> {
        self.live.load().map(|pipeline| pipeline.source_used.clone())
    }

    /// Wrap, validate and build `source` without publishing it.
    pub fn build(&self, source: &str) -> Result<CompiledPipeline<B::Pipeline>, CompileError> {
        let effect = harness::validate_effect(source)?;
        let handle = self.backend.create_pipeline(&effect)?;
        Ok(CompiledPipeline {
            source_used: effect.source,
            handle,
        })
    }

    /// Make `source` the live effect, or clear it with `None`.
    ///
    /// On failure the live pipeline is left as it was.
    pub fn set_active_source(&mut self, source: Option<&str>) -> Result<(), CompileError> {
        let Some(source) = source else {
            if self.live.store(None).is_some() {
                log::info!("Effect cleared, overlay is pass-through");
            }
            return Ok(());
        };

        match self.build(source) {
            Ok(pipeline) => {
                self.live.store(Some(Arc::new(pipeline)));
                log::info!("Effect pipeline rebuilt ({} bytes of source)", source.len());
                Ok(())
            }
            Err(e) => {
                log::warn!("Effect failed to compile, keeping previous pipeline: {}", e.kind);
                log::debug!("{}", e.message);
                Err(e)
            }
        }
    }
}
