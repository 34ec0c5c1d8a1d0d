//! Presentation surfaces the overlay renders into.

use std::sync::Arc;

use image::RgbaImage;
use wgpu::{Device, Queue, Surface, TextureFormat, TextureView};

use super::renderer::RenderError;
use super::textures::{ReadbackBuffer, RenderTarget};
use crate::capture::FrameRelay;

/// A texture acquired from a surface for one tick.
pub struct Drawable {
    view: TextureView,
    frame: Option<wgpu::SurfaceTexture>,
}

impl Drawable {
    pub fn view(&self) -> &TextureView {
        &self.view
    }
}

/// Something the renderer can draw into and present.
pub trait PresentationSurface: Send {
    fn format(&self) -> TextureFormat;

    /// Size in physical pixels.
    fn size(&self) -> (u32, u32);

    /// Next drawable, or `None` when nothing should be drawn this tick.
    fn acquire(&mut self) -> Result<Option<Drawable>, RenderError>;

    /// Show a drawable after its commands were submitted.
    fn present(&mut self, drawable: Drawable) -> Result<(), RenderError>;

    fn resize(&mut self, width: u32, height: u32);

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;
}

/// Window-backed surface supplied by the windowing layer.
pub struct WindowSurface {
    surface: Surface<'static>,
    device: Arc<Device>,
    config: wgpu::SurfaceConfiguration,
    visible: bool,
}

impl WindowSurface {
    /// Configure `surface` for transparent presentation at `width`x`height`.
    pub fn new(
        surface: Surface<'static>,
        adapter: &wgpu::Adapter,
        device: Arc<Device>,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let caps = surface.get_capabilities(adapter);
        let alpha_mode = [
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ]
        .into_iter()
        .find(|mode| caps.alpha_modes.contains(mode))
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 1,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        log::info!(
            "Window surface configured {}x{} {:?} ({:?})",
            config.width,
            config.height,
            format,
            alpha_mode
        );

        Self {
            surface,
            device,
            config,
            visible: true,
        }
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

impl PresentationSurface for WindowSurface {
    fn format(&self) -> TextureFormat {
        self.config.format
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn acquire(&mut self) -> Result<Option<Drawable>, RenderError> {
        if !self.visible {
            return Ok(None);
        }
        match self.surface.get_current_texture() {
            Ok(frame) => {
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(Some(Drawable {
                    view,
                    frame: Some(frame),
                }))
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(RenderError::OutOfMemory),
            Err(e) => {
                log::debug!("Drawable unavailable ({}), reconfiguring surface", e);
                self.reconfigure();
                Ok(None)
            }
        }
    }

    fn present(&mut self, drawable: Drawable) -> Result<(), RenderError> {
        if let Some(frame) = drawable.frame {
            frame.present();
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.reconfigure();
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Offscreen surface that reads every presented image back to the CPU.
pub struct HeadlessSurface {
    device: Arc<Device>,
    queue: Arc<Queue>,
    format: TextureFormat,
    target: RenderTarget,
    readback: ReadbackBuffer,
    snapshots: Arc<FrameRelay<RgbaImage>>,
    presented: u64,
    visible: bool,
}

impl HeadlessSurface {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, width: u32, height: u32) -> Self {
        let format = TextureFormat::Rgba8Unorm;
        let (width, height) = (width.max(1), height.max(1));
        let target = RenderTarget::for_output(&device, "headless_surface", width, height, format);
        let readback = ReadbackBuffer::new(&device, width, height);
        Self {
            device,
            queue,
            format,
            target,
            readback,
            snapshots: Arc::new(FrameRelay::new()),
            presented: 0,
            visible: true,
        }
    }

    /// Latest presented image, shared with other threads.
    pub fn snapshots(&self) -> Arc<FrameRelay<RgbaImage>> {
        Arc::clone(&self.snapshots)
    }

    /// Take the latest presented image.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        self.snapshots.take()
    }

    pub fn presented_count(&self) -> u64 {
        self.presented
    }
}

impl PresentationSurface for HeadlessSurface {
    fn format(&self) -> TextureFormat {
        self.format
    }

    fn size(&self) -> (u32, u32) {
        self.target.size()
    }

    fn acquire(&mut self) -> Result<Option<Drawable>, RenderError> {
        if !self.visible {
            return Ok(None);
        }
        let view = self
            .target
            .texture()
            .create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Some(Drawable { view, frame: None }))
    }

    fn present(&mut self, _drawable: Drawable) -> Result<(), RenderError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("headless_readback"),
            });
        self.readback.copy_from(&mut encoder, &self.target);
        self.queue.submit(std::iter::once(encoder.finish()));

        let pixels = self.readback.read_pixels(&self.device)?;
        let (width, height) = self.target.size();
        let image = RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Readback("readback size mismatch".to_string()))?;
        self.snapshots.push(image);
        self.presented += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if self.target.size() == (width, height) {
            return;
        }
        self.target =
            RenderTarget::for_output(&self.device, "headless_surface", width, height, self.format);
        self.readback = ReadbackBuffer::new(&self.device, width, height);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}
