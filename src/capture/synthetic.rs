//! Test-pattern capture source.
//!
//! Produces a scrolling colour gradient on a background thread at the target
//! frame rate. Stands in for the OS capture API in demos, tests and benches.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{CaptureSettings, CaptureSource, CaptureStartError, FrameImage, FrameSink};

/// Capture source generating synthetic frames.
#[derive(Default)]
pub struct SyntheticCapture {
    running: Arc<AtomicBool>,
    frames_delivered: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyntheticCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total frames delivered across all runs.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }

    /// Render one test-pattern frame. `None` for a zero-sized frame.
    pub fn pattern(width: u32, height: u32, frame_index: u64) -> Option<FrameImage> {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        let shift = (frame_index % 256) as u32;
        for y in 0..height {
            for x in 0..width {
                let r = ((x * 255 / width.max(1) + shift) % 256) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                let b = 255 - r;
                pixels.extend_from_slice(&[r, g, b, 255]);
            }
        }
        FrameImage::new(width, height, pixels)
    }

    fn capture_thread(
        settings: CaptureSettings,
        sink: FrameSink,
        running: Arc<AtomicBool>,
        frames_delivered: Arc<AtomicU64>,
    ) {
        let interval = Duration::from_secs_f64(1.0 / settings.target_fps.max(1) as f64);
        let mut next_frame = Instant::now();
        let mut frame_index = 0u64;

        while running.load(Ordering::Acquire) {
            let Some(image) = Self::pattern(settings.width, settings.height, frame_index) else {
                log::warn!(
                    "Synthetic capture stopped: invalid frame size {}x{}",
                    settings.width,
                    settings.height
                );
                break;
            };
            sink.deliver(image, Instant::now());
            frames_delivered.fetch_add(1, Ordering::Relaxed);
            frame_index += 1;

            next_frame += interval;
            let now = Instant::now();
            if next_frame > now {
                std::thread::sleep(next_frame - now);
            } else {
                // Fell behind; don't try to catch up with a burst.
                next_frame = now;
            }
        }
        log::debug!("Synthetic capture thread exiting after {} frames", frame_index);
    }
}

impl CaptureSource for SyntheticCapture {
    fn start(
        &mut self,
        settings: &CaptureSettings,
        sink: FrameSink,
    ) -> Result<(), CaptureStartError> {
        if settings.width == 0 || settings.height == 0 {
            return Err(CaptureStartError::NoDisplay);
        }
        // A previous run may still be winding down.
        self.stop();

        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let frames_delivered = self.frames_delivered.clone();
        let settings = settings.clone();

        let handle = std::thread::Builder::new()
            .name("synthetic-capture".to_string())
            .spawn(move || Self::capture_thread(settings, sink, running, frames_delivered))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                CaptureStartError::Backend(format!("Failed to spawn capture thread: {}", e))
            })?;
        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::warn!("Synthetic capture thread panicked");
            }
        }
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameRelay;
    use crate::metrics::Metrics;

    #[test]
    fn test_pattern_dimensions() {
        let image = SyntheticCapture::pattern(16, 8, 3).unwrap();
        assert_eq!(image.pixels().len(), 16 * 8 * 4);
        assert!(image.pixels().chunks(4).all(|p| p[3] == 255));
        assert!(SyntheticCapture::pattern(0, 8, 3).is_none());
    }

    #[test]
    fn test_delivers_frames_until_stopped() {
        let relay = Arc::new(FrameRelay::new());
        let metrics = Arc::new(Metrics::new());
        let mut capture = SyntheticCapture::new();
        let settings = CaptureSettings {
            width: 8,
            height: 8,
            target_fps: 200,
            ..Default::default()
        };

        capture
            .start(&settings, FrameSink::new(relay.clone(), metrics))
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        capture.stop();

        let delivered = capture.frames_delivered();
        assert!(delivered > 0);
        let frame = relay.take().expect("latest frame should be waiting");
        assert_eq!(frame.image.width(), 8);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(capture.frames_delivered(), delivered);
    }

    #[test]
    fn test_zero_size_fails_to_start() {
        let mut capture = SyntheticCapture::new();
        let settings = CaptureSettings {
            width: 0,
            ..Default::default()
        };
        let sink = FrameSink::new(Arc::new(FrameRelay::new()), Arc::new(Metrics::new()));
        assert_eq!(
            capture.start(&settings, sink),
            Err(CaptureStartError::NoDisplay)
        );
    }
}
