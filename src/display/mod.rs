//! Display tracking and debounced reconfiguration.
//!
//! Display-change notifications arrive in bursts (sleep/wake, monitor
//! reflow). [`DisplaySurfaceManager`] debounces them and, when the primary
//! display's signature actually changed, walks a [`DisplayReconfigure`]
//! implementation through the rebuild sequence.

pub mod debounce;

pub use debounce::Debouncer;

use std::time::{Duration, Instant};

/// Default quiet period before a display change is applied.
pub const DISPLAY_CHANGE_DEBOUNCE: Duration = Duration::from_millis(300);

/// Rectangle in physical pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The primary display as reported by the OS.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    /// Stable OS identifier of the display.
    pub id: u64,
    /// Size in logical points.
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
    /// Area not covered by OS chrome (menu bar, dock), in physical pixels.
    pub visible_area: Option<PixelRect>,
}

impl DisplayInfo {
    pub fn physical_width(&self) -> u32 {
        ((self.width as f64 * self.scale_factor).round() as u32).max(1)
    }

    pub fn physical_height(&self) -> u32 {
        ((self.height as f64 * self.scale_factor).round() as u32).max(1)
    }

    /// Identity + resolution + scale, used to detect real changes.
    pub fn signature(&self) -> String {
        format!(
            "{}:{}x{}@{:.3}",
            self.id, self.width, self.height, self.scale_factor
        )
    }
}

/// Source of the current primary display.
pub trait DisplayProvider {
    fn primary_display(&self) -> Option<DisplayInfo>;
}

/// A fixed display, for headless use and tests.
#[derive(Debug, Clone)]
pub struct StaticDisplay(pub DisplayInfo);

impl DisplayProvider for StaticDisplay {
    fn primary_display(&self) -> Option<DisplayInfo> {
        Some(self.0.clone())
    }
}

/// Receives the rebuild sequence when the display changes.
///
/// Called in order: stop capture, rebuild surface, rebind relay, reload the
/// active effect, restart capture.
pub trait DisplayReconfigure {
    fn stop_capture(&mut self);
    fn rebuild_surface(&mut self, display: &DisplayInfo);
    fn rebind_frame_relay(&mut self);
    fn reload_active_effect(&mut self);
    fn start_capture(&mut self);
}

/// Tracks the active display and debounces change notifications.
#[derive(Debug)]
pub struct DisplaySurfaceManager {
    current_signature: Option<String>,
    current: Option<DisplayInfo>,
    debouncer: Debouncer,
}

impl Default for DisplaySurfaceManager {
    fn default() -> Self {
        Self::new(DISPLAY_CHANGE_DEBOUNCE)
    }
}

impl DisplaySurfaceManager {
    pub fn new(debounce: Duration) -> Self {
        Self {
            current_signature: None,
            current: None,
            debouncer: Debouncer::new(debounce),
        }
    }

    /// Adopt `display` as current without running the rebuild sequence.
    pub fn with_display(mut self, display: DisplayInfo) -> Self {
        self.current_signature = Some(display.signature());
        self.current = Some(display);
        self
    }

    pub fn current(&self) -> Option<&DisplayInfo> {
        self.current.as_ref()
    }

    pub fn current_signature(&self) -> Option<&str> {
        self.current_signature.as_deref()
    }

    pub fn on_display_change_signal(&mut self) {
        self.on_display_change_signal_at(Instant::now());
    }

    pub fn on_display_change_signal_at(&mut self, now: Instant) {
        log::debug!("Display change signalled");
        self.debouncer.signal_at(now);
    }

    /// Apply a pending change once its debounce period has elapsed.
    ///
    /// Returns `true` when resources were rebuilt.
    pub fn poll_at(
        &mut self,
        now: Instant,
        provider: &dyn DisplayProvider,
        target: &mut dyn DisplayReconfigure,
    ) -> bool {
        if self.debouncer.poll_at(now) {
            self.apply_change(provider, target)
        } else {
            false
        }
    }

    /// Rebuild resources if the primary display's signature changed.
    ///
    /// Returns `true` when the rebuild sequence ran.
    pub fn apply_change(
        &mut self,
        provider: &dyn DisplayProvider,
        target: &mut dyn DisplayReconfigure,
    ) -> bool {
        let Some(display) = provider.primary_display() else {
            log::warn!("Display change ignored: no primary display");
            return false;
        };

        let signature = display.signature();
        if self.current_signature.as_deref() == Some(signature.as_str()) {
            log::debug!("Display signature unchanged ({}), nothing to rebuild", signature);
            return false;
        }

        log::info!(
            "Display changed to {} ({}x{} physical)",
            signature,
            display.physical_width(),
            display.physical_height()
        );
        target.stop_capture();
        target.rebuild_surface(&display);
        target.rebind_frame_relay();
        target.reload_active_effect();
        target.start_capture();

        self.current_signature = Some(signature);
        self.current = Some(display);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingTarget {
        calls: Vec<String>,
    }

    impl DisplayReconfigure for RecordingTarget {
        fn stop_capture(&mut self) {
            self.calls.push("stop".into());
        }
        fn rebuild_surface(&mut self, display: &DisplayInfo) {
            self.calls
                .push(format!("surface {}x{}", display.physical_width(), display.physical_height()));
        }
        fn rebind_frame_relay(&mut self) {
            self.calls.push("relay".into());
        }
        fn reload_active_effect(&mut self) {
            self.calls.push("effect".into());
        }
        fn start_capture(&mut self) {
            self.calls.push("start".into());
        }
    }

    struct SwappableDisplay(RefCell<DisplayInfo>);

    impl DisplayProvider for SwappableDisplay {
        fn primary_display(&self) -> Option<DisplayInfo> {
            Some(self.0.borrow().clone())
        }
    }

    fn laptop() -> DisplayInfo {
        DisplayInfo {
            id: 1,
            width: 1440,
            height: 900,
            scale_factor: 2.0,
            visible_area: None,
        }
    }

    #[test]
    fn test_signature_tracks_resolution_and_scale() {
        let a = laptop();
        let mut b = laptop();
        b.scale_factor = 1.0;
        assert_ne!(a.signature(), b.signature());
        assert_eq!(a.signature(), laptop().signature());
        assert_eq!(a.physical_width(), 2880);
    }

    #[test]
    fn test_rebuild_sequence_order() {
        let mut manager = DisplaySurfaceManager::default();
        let mut target = RecordingTarget::default();
        assert!(manager.apply_change(&StaticDisplay(laptop()), &mut target));
        assert_eq!(
            target.calls,
            vec!["stop", "surface 2880x1800", "relay", "effect", "start"]
        );
    }

    #[test]
    fn test_apply_change_is_idempotent() {
        let mut manager = DisplaySurfaceManager::default();
        let mut target = RecordingTarget::default();
        let provider = StaticDisplay(laptop());

        assert!(manager.apply_change(&provider, &mut target));
        assert!(!manager.apply_change(&provider, &mut target));
        assert_eq!(target.calls.iter().filter(|c| c.starts_with("surface")).count(), 1);
    }

    #[test]
    fn test_known_display_needs_no_rebuild() {
        let mut manager = DisplaySurfaceManager::default().with_display(laptop());
        let mut target = RecordingTarget::default();
        assert!(!manager.apply_change(&StaticDisplay(laptop()), &mut target));
        assert!(target.calls.is_empty());
    }

    #[test]
    fn test_signal_burst_applies_once() {
        let start = Instant::now();
        let mut manager = DisplaySurfaceManager::new(Duration::from_millis(300));
        let mut target = RecordingTarget::default();
        let provider = SwappableDisplay(RefCell::new(laptop()));

        let mut applied = 0;
        for i in 0..5 {
            let now = start + Duration::from_millis(i * 25);
            manager.on_display_change_signal_at(now);
            if manager.poll_at(now, &provider, &mut target) {
                applied += 1;
            }
        }
        for step in 0..100 {
            let now = start + Duration::from_millis(100 + step * 10);
            if manager.poll_at(now, &provider, &mut target) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(target.calls.len(), 5);
    }

    #[test]
    fn test_resolution_change_triggers_rebuild() {
        let mut manager = DisplaySurfaceManager::default().with_display(laptop());
        let mut target = RecordingTarget::default();
        let provider = SwappableDisplay(RefCell::new(laptop()));

        provider.0.borrow_mut().width = 1920;
        provider.0.borrow_mut().height = 1080;
        assert!(manager.apply_change(&provider, &mut target));
        assert_eq!(manager.current().map(|d| d.width), Some(1920));
    }
}
