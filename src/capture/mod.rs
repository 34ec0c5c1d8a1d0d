//! Screen capture plumbing.
//!
//! The OS capture API is consumed through the [`CaptureSource`] trait: it is
//! started with a [`FrameSink`] and delivers timestamped RGBA images from its
//! own thread. The sink stamps each image with a frame id, records the capture
//! in [`Metrics`] and hands it to the render context through a [`FrameRelay`].

pub mod controller;
pub mod relay;
pub mod synthetic;

pub use controller::{CaptureController, CaptureState};
pub use relay::FrameRelay;
pub use synthetic::SyntheticCapture;

use std::sync::Arc;
use std::time::Instant;

use crate::metrics::Metrics;

/// Errors reported when a capture source fails to start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureStartError {
    #[error("Screen capture permission denied")]
    PermissionDenied,
    #[error("No display available for capture")]
    NoDisplay,
    #[error("Capture backend failed to start: {0}")]
    Backend(String),
}

/// Tightly packed RGBA8 image with non-zero dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameImage {
    /// Wrap pixel data, checking it matches the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        (width > 0 && height > 0 && pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A fully transparent image.
    pub fn transparent(width: u32, height: u32) -> Option<Self> {
        Self::new(width, height, vec![0; width as usize * height as usize * 4])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * 4
    }
}

/// A captured image in flight from the capture context to the render context.
///
/// Owned by exactly one side at a time; the relay moves it, never copies it.
#[derive(Debug)]
pub struct CapturedFrame {
    pub image: FrameImage,
    pub captured_at: Instant,
    pub frame_id: u64,
}

/// Parameters a capture source is started with.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Capture width in physical pixels.
    pub width: u32,
    /// Capture height in physical pixels.
    pub height: u32,
    pub target_fps: u32,
    /// Native window ids to leave out of the capture (the overlay itself).
    pub excluded_window_ids: Vec<u64>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            target_fps: 60,
            excluded_window_ids: Vec::new(),
        }
    }
}

/// Receives frames from a capture source.
#[derive(Clone)]
pub struct FrameSink {
    relay: Arc<FrameRelay<CapturedFrame>>,
    metrics: Arc<Metrics>,
}

impl FrameSink {
    pub fn new(relay: Arc<FrameRelay<CapturedFrame>>, metrics: Arc<Metrics>) -> Self {
        Self { relay, metrics }
    }

    /// Hand over a freshly captured image. Never blocks.
    pub fn deliver(&self, image: FrameImage, captured_at: Instant) -> u64 {
        let frame_id = self.metrics.next_frame_id();
        self.metrics.record_capture_at(frame_id, captured_at);
        self.relay.push(CapturedFrame {
            image,
            captured_at,
            frame_id,
        });
        frame_id
    }
}

/// An external screen capture API.
pub trait CaptureSource: Send {
    /// Begin delivering frames to `sink` from the source's own thread.
    fn start(&mut self, settings: &CaptureSettings, sink: FrameSink)
        -> Result<(), CaptureStartError>;

    /// Stop delivering frames. Must be safe to call when not started.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_image_rejects_wrong_length() {
        assert!(FrameImage::new(2, 2, vec![0; 16]).is_some());
        assert!(FrameImage::new(2, 2, vec![0; 15]).is_none());
        assert!(FrameImage::new(0, 2, Vec::new()).is_none());
    }

    #[test]
    fn test_zero_size_transparent_is_rejected() {
        assert!(FrameImage::transparent(0, 0).is_none());
        assert!(FrameImage::transparent(3, 0).is_none());
        assert_eq!(FrameImage::transparent(3, 1).unwrap().pixels().len(), 12);
    }

    #[test]
    fn test_sink_assigns_increasing_ids_and_records_capture() {
        let relay = Arc::new(FrameRelay::new());
        let metrics = Arc::new(Metrics::new());
        let sink = FrameSink::new(relay.clone(), metrics.clone());

        let now = Instant::now();
        let image = FrameImage::transparent(4, 4).unwrap();
        let first = sink.deliver(image.clone(), now);
        let second = sink.deliver(image, now);
        assert!(second > first);
        assert_eq!(metrics.pending_captures(), 2);

        let frame = relay.take().unwrap();
        assert_eq!(frame.frame_id, second);
        assert!(relay.take().is_none());
    }
}
