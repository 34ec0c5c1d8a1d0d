//! Rolling capture/render performance metrics.
//!
//! Capture timestamps are keyed by frame id; a render of a known frame adds
//! its capture-to-render latency to the current window. `update_stats` turns
//! the window into rates and an average latency, then starts a new window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Derived metrics for the last completed window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub capture_fps: f64,
    pub render_fps: f64,
    pub average_latency_ms: f64,
}

#[derive(Debug)]
struct MetricsWindow {
    started_at: Instant,
    capture_timestamps: HashMap<u64, Instant>,
    capture_count: u64,
    render_count: u64,
    total_latency: Duration,
}

impl MetricsWindow {
    fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            capture_timestamps: HashMap::new(),
            capture_count: 0,
            render_count: 0,
            total_latency: Duration::ZERO,
        }
    }
}

/// Thread-safe metrics aggregator shared by the capture, render and control
/// contexts. All mutation goes through one lock.
#[derive(Debug)]
pub struct Metrics {
    next_frame_id: AtomicU64,
    window: Mutex<MetricsWindow>,
    latest: Mutex<MetricsSnapshot>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create an aggregator whose first window begins at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            next_frame_id: AtomicU64::new(0),
            window: Mutex::new(MetricsWindow::new(start)),
            latest: Mutex::new(MetricsSnapshot::default()),
        }
    }

    /// Allocate the next frame id.
    pub fn next_frame_id(&self) -> u64 {
        self.next_frame_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn record_capture(&self, frame_id: u64) {
        self.record_capture_at(frame_id, Instant::now());
    }

    pub fn record_capture_at(&self, frame_id: u64, captured_at: Instant) {
        let mut window = self.window.lock();
        window.capture_timestamps.insert(frame_id, captured_at);
        window.capture_count += 1;
    }

    pub fn record_render(&self, frame_id: u64) {
        self.record_render_at(frame_id, Instant::now());
    }

    /// Record that `frame_id` reached the screen at `rendered_at`.
    ///
    /// Frames whose capture is not in the current window are ignored.
    pub fn record_render_at(&self, frame_id: u64, rendered_at: Instant) {
        let mut window = self.window.lock();
        let Some(captured_at) = window.capture_timestamps.remove(&frame_id) else {
            return;
        };
        window.total_latency += rendered_at.saturating_duration_since(captured_at);
        window.render_count += 1;
    }

    pub fn update_stats(&self) -> MetricsSnapshot {
        self.update_stats_at(Instant::now())
    }

    /// Close the current window at `now` and publish its rates.
    pub fn update_stats_at(&self, now: Instant) -> MetricsSnapshot {
        let snapshot = {
            let mut window = self.window.lock();
            let elapsed = now.saturating_duration_since(window.started_at).as_secs_f64();
            let rate = |count: u64| {
                if elapsed > 0.0 {
                    count as f64 / elapsed
                } else {
                    0.0
                }
            };
            let average_latency_ms = if window.render_count == 0 {
                0.0
            } else {
                window.total_latency.as_secs_f64() / window.render_count as f64 * 1000.0
            };

            let snapshot = MetricsSnapshot {
                capture_fps: rate(window.capture_count),
                render_fps: rate(window.render_count),
                average_latency_ms,
            };
            *window = MetricsWindow::new(now);
            snapshot
        };

        *self.latest.lock() = snapshot;
        snapshot
    }

    /// Rates from the last completed window.
    pub fn latest(&self) -> MetricsSnapshot {
        *self.latest.lock()
    }

    /// Captures in the current window not yet matched by a render.
    pub fn pending_captures(&self) -> usize {
        self.window.lock().capture_timestamps.len()
    }

    /// Log the last completed window.
    pub fn log_stats(&self) {
        let stats = self.latest();
        log::info!(
            "Screen capture FPS: {:.1}, render FPS: {:.1}, average latency: {:.2} ms",
            stats.capture_fps,
            stats.render_fps,
            stats.average_latency_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_frame_ids_increase() {
        let metrics = Metrics::new();
        let a = metrics.next_frame_id();
        let b = metrics.next_frame_id();
        assert!(b > a);
    }

    #[test]
    fn test_window_arithmetic() {
        let start = Instant::now();
        let metrics = Metrics::starting_at(start);
        let latencies = [10, 20, 30, 40, 50, 60, 70, 80];

        let ids: Vec<u64> = (0..10).map(|_| metrics.next_frame_id()).collect();
        for (i, &id) in ids.iter().enumerate() {
            metrics.record_capture_at(id, start + ms(i as u64 * 150));
        }
        for (i, &latency) in latencies.iter().enumerate() {
            metrics.record_render_at(ids[i], start + ms(i as u64 * 150 + latency));
        }

        let stats = metrics.update_stats_at(start + Duration::from_secs(2));
        assert!((stats.capture_fps - 5.0).abs() < 1e-9);
        assert!((stats.render_fps - 4.0).abs() < 1e-9);
        assert!((stats.average_latency_ms - 45.0).abs() < 1e-6);
        assert_eq!(metrics.latest(), stats);

        assert_eq!(metrics.pending_captures(), 0);
        let empty = metrics.update_stats_at(start + Duration::from_secs(4));
        assert_eq!(empty.capture_fps, 0.0);
        assert_eq!(empty.render_fps, 0.0);
        assert_eq!(empty.average_latency_ms, 0.0);
    }

    #[test]
    fn test_unmatched_render_is_ignored() {
        let start = Instant::now();
        let metrics = Metrics::starting_at(start);
        metrics.record_render_at(42, start + ms(5));
        let stats = metrics.update_stats_at(start + Duration::from_secs(1));
        assert_eq!(stats.render_fps, 0.0);
        assert_eq!(stats.average_latency_ms, 0.0);
    }

    #[test]
    fn test_render_after_reset_is_ignored() {
        let start = Instant::now();
        let metrics = Metrics::starting_at(start);
        let id = metrics.next_frame_id();
        metrics.record_capture_at(id, start);
        metrics.update_stats_at(start + Duration::from_secs(1));

        metrics.record_render_at(id, start + Duration::from_secs(1) + ms(5));
        let stats = metrics.update_stats_at(start + Duration::from_secs(2));
        assert_eq!(stats.render_fps, 0.0);
    }

    #[test]
    fn test_zero_length_window() {
        let start = Instant::now();
        let metrics = Metrics::starting_at(start);
        metrics.record_capture_at(metrics.next_frame_id(), start);
        let stats = metrics.update_stats_at(start);
        assert_eq!(stats.capture_fps, 0.0);
    }
}
