//! Per-tick overlay rendering.

use std::sync::Arc;
use std::time::Instant;

use wgpu::{BindGroup, BindGroupLayout, Buffer, Device, Queue, RenderPipeline, Sampler};

use super::compiler::LivePipeline;
use super::harness::HarnessUniforms;
use super::layouts::{SCREEN_SAMPLER_BINDING, SCREEN_TEXTURE_BINDING, UNIFORMS_BINDING};
use super::surface::PresentationSurface;
use super::textures::FrameTexture;
use crate::capture::{CapturedFrame, FrameRelay};
use crate::display::PixelRect;
use crate::metrics::Metrics;

/// Errors raised while rendering or presenting a tick.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error("Surface ran out of memory")]
    OutOfMemory,
    #[error("Readback failed: {0}")]
    Readback(String),
}

/// What a render tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// A drawable was acquired and presented.
    pub presented: bool,
    /// The live effect was drawn (otherwise the drawable was only cleared).
    pub drew_effect: bool,
    /// Id of the captured frame consumed this tick.
    pub frame_id: Option<u64>,
}

/// Draws the latest captured frame through the live effect pipeline.
///
/// Owned by the render context. It only reads shared state: the frame relay,
/// the live pipeline slot and the metrics aggregator.
pub struct OverlayRenderer {
    device: Arc<Device>,
    queue: Arc<Queue>,
    live: Arc<LivePipeline<RenderPipeline>>,
    relay: Arc<FrameRelay<CapturedFrame>>,
    metrics: Arc<Metrics>,
    bind_group_layout: Arc<BindGroupLayout>,
    sampler: Sampler,
    uniform_buffer: Buffer,
    frame_texture: Option<FrameTexture>,
    bind_group: Option<BindGroup>,
    cursor: [f32; 2],
    scissor: Option<PixelRect>,
    started_at: Instant,
}

impl OverlayRenderer {
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        bind_group_layout: Arc<BindGroupLayout>,
        live: Arc<LivePipeline<RenderPipeline>>,
        relay: Arc<FrameRelay<CapturedFrame>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("screen_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("effect_uniforms"),
            size: std::mem::size_of::<HarnessUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            device,
            queue,
            live,
            relay,
            metrics,
            bind_group_layout,
            sampler,
            uniform_buffer,
            frame_texture: None,
            bind_group: None,
            cursor: [0.0, 0.0],
            scissor: None,
            started_at: Instant::now(),
        }
    }

    /// Consume frames from a new relay. The current frame texture is dropped.
    pub fn rebind_relay(&mut self, relay: Arc<FrameRelay<CapturedFrame>>) {
        self.relay = relay;
        self.frame_texture = None;
        self.bind_group = None;
    }

    /// Cursor position in physical pixels, top-left origin.
    pub fn set_cursor(&mut self, x: f32, y: f32) {
        self.cursor = [x, y];
    }

    /// Limit drawing to `rect`, e.g. the display area outside OS chrome.
    pub fn set_scissor(&mut self, rect: Option<PixelRect>) {
        self.scissor = rect;
    }

    pub fn has_frame(&self) -> bool {
        self.frame_texture.is_some()
    }

    fn upload(&mut self, frame: &CapturedFrame) {
        let image = &frame.image;
        let reuse = self
            .frame_texture
            .as_ref()
            .is_some_and(|texture| texture.matches(image));
        if !reuse {
            log::debug!("Frame texture resized to {}x{}", image.width(), image.height());
            let texture = FrameTexture::new(&self.device, image.width(), image.height());
            self.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("effect_bind_group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: SCREEN_TEXTURE_BINDING,
                        resource: wgpu::BindingResource::TextureView(texture.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: SCREEN_SAMPLER_BINDING,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: UNIFORMS_BINDING,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                ],
            }));
            self.frame_texture = Some(texture);
        }
        if let Some(texture) = &self.frame_texture {
            texture.upload(&self.queue, image);
        }
    }

    /// Scissor clamped to the drawable, or `None` if it covers nothing.
    fn clamped_scissor(&self, width: u32, height: u32) -> Option<PixelRect> {
        let rect = self.scissor.unwrap_or(PixelRect {
            x: 0,
            y: 0,
            width,
            height,
        });
        let x = rect.x.min(width);
        let y = rect.y.min(height);
        let clamped = PixelRect {
            x,
            y,
            width: rect.width.min(width - x),
            height: rect.height.min(height - y),
        };
        (clamped.width > 0 && clamped.height > 0).then_some(clamped)
    }

    /// Render one display tick.
    ///
    /// Takes the freshest captured frame (if any), clears the drawable to
    /// transparent and draws the live effect over it. With no live pipeline
    /// the overlay stays fully transparent.
    pub fn render_tick(
        &mut self,
        surface: &mut dyn PresentationSurface,
    ) -> Result<TickReport, RenderError> {
        let mut report = TickReport::default();

        if let Some(frame) = self.relay.take() {
            report.frame_id = Some(frame.frame_id);
            if surface.is_visible() {
                self.upload(&frame);
            }
        }

        let Some(drawable) = surface.acquire()? else {
            return Ok(report);
        };

        let (width, height) = surface.size();
        let uniforms = HarnessUniforms {
            resolution: [width as f32, height as f32],
            cursor: self.cursor,
            time: self.started_at.elapsed().as_secs_f32(),
            ..Default::default()
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let pipeline = self.live.load();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("overlay_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("overlay_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: drawable.view(),
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let (Some(pipeline), Some(bind_group), Some(rect)) = (
                pipeline.as_ref(),
                self.bind_group.as_ref(),
                self.clamped_scissor(width, height),
            ) {
                render_pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
                render_pass.set_pipeline(&pipeline.handle);
                render_pass.set_bind_group(0, bind_group, &[]);
                // Full-screen triangle generated from the vertex index.
                render_pass.draw(0..3, 0..1);
                report.drew_effect = true;
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface.present(drawable)?;
        report.presented = true;

        if let Some(frame_id) = report.frame_id {
            self.metrics.record_render(frame_id);
        }
        log::trace!("Render tick {:?}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameSink;
    use crate::effects::Preset;
    use crate::gpu::surface::HeadlessSurface;
    use crate::gpu::{GpuContext, PipelineCompiler, WgpuBackend};

    struct Fixture {
        compiler: PipelineCompiler<WgpuBackend>,
        renderer: OverlayRenderer,
        surface: HeadlessSurface,
        sink: FrameSink,
        metrics: Arc<Metrics>,
    }

    async fn fixture(width: u32, height: u32) -> Option<Fixture> {
        let ctx = GpuContext::new().await.ok()?;
        let surface = HeadlessSurface::new(ctx.device.clone(), ctx.queue.clone(), width, height);
        let backend = WgpuBackend::new(ctx.device.clone(), surface.format());
        let layout = backend.bind_group_layout();
        let compiler = PipelineCompiler::new(backend);
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
        Some(Fixture {
            compiler,
            renderer,
            surface,
            sink: FrameSink::new(relay, metrics.clone()),
            metrics,
        })
    }

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> crate::capture::FrameImage {
        let pixels = rgba.repeat((width * height) as usize);
        crate::capture::FrameImage::new(width, height, pixels).unwrap()
    }

    #[tokio::test]
    async fn test_no_pipeline_presents_transparent() {
        let Some(mut f) = fixture(16, 16).await else {
            return;
        };

        f.sink.deliver(solid(16, 16, [255, 0, 0, 255]), Instant::now());
        let report = f.renderer.render_tick(&mut f.surface).unwrap();
        assert!(report.presented);
        assert!(!report.drew_effect);

        let image = f.surface.snapshot().unwrap();
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn test_swap_red_blue_effect() {
        let Some(mut f) = fixture(16, 16).await else {
            return;
        };

        f.compiler
            .set_active_source(Some(Preset::SwapRedBlue.source()))
            .unwrap();
        f.sink.deliver(solid(16, 16, [255, 0, 0, 255]), Instant::now());
        let report = f.renderer.render_tick(&mut f.surface).unwrap();
        assert!(report.drew_effect);

        let image = f.surface.snapshot().unwrap();
        let center = image.get_pixel(8, 8).0;
        assert!(center[0] < 8, "red channel was {}", center[0]);
        assert!(center[2] > 247, "blue channel was {}", center[2]);
    }

    #[tokio::test]
    async fn test_render_records_latency() {
        let Some(mut f) = fixture(8, 8).await else {
            return;
        };

        f.compiler
            .set_active_source(Some(Preset::GreyScale.source()))
            .unwrap();
        let frame_id = f.sink.deliver(solid(8, 8, [10, 20, 30, 255]), Instant::now());
        let report = f.renderer.render_tick(&mut f.surface).unwrap();
        assert_eq!(report.frame_id, Some(frame_id));
        assert_eq!(f.metrics.pending_captures(), 0);

        // Nothing new to consume, the previous frame is redrawn.
        let report = f.renderer.render_tick(&mut f.surface).unwrap();
        assert_eq!(report.frame_id, None);
        assert!(report.drew_effect);
    }

    #[tokio::test]
    async fn test_scissor_limits_drawing() {
        let Some(mut f) = fixture(16, 16).await else {
            return;
        };

        f.compiler
            .set_active_source(Some(crate::effects::DEFAULT_EFFECT_SOURCE))
            .unwrap();
        f.renderer.set_scissor(Some(PixelRect {
            x: 0,
            y: 4,
            width: 16,
            height: 12,
        }));
        f.sink.deliver(solid(16, 16, [0, 255, 0, 255]), Instant::now());
        f.renderer.render_tick(&mut f.surface).unwrap();

        let image = f.surface.snapshot().unwrap();
        assert_eq!(image.get_pixel(8, 1).0, [0, 0, 0, 0]);
        assert_eq!(image.get_pixel(8, 10).0[1], 255);
    }
}
