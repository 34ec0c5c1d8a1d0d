//! Start/stop serialisation for a capture source.

use super::{CaptureSettings, CaptureSource, CaptureStartError, FrameSink};

/// Lifecycle of a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Drives a [`CaptureSource`] through {Idle, Starting, Active, Stopping}.
///
/// A start is only honoured from `Idle`; a failed start returns to `Idle` so
/// it can be retried.
pub struct CaptureController<S: CaptureSource> {
    source: S,
    state: CaptureState,
    settings: CaptureSettings,
}

impl<S: CaptureSource> CaptureController<S> {
    pub fn new(source: S, settings: CaptureSettings) -> Self {
        Self {
            source,
            state: CaptureState::Idle,
            settings,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == CaptureState::Active
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Replace the settings used by the next start.
    pub fn set_settings(&mut self, settings: CaptureSettings) {
        self.settings = settings;
    }

    /// Start capturing into `sink`.
    ///
    /// Returns `Ok(false)` when a start is not allowed in the current state.
    pub fn start(&mut self, sink: FrameSink) -> Result<bool, CaptureStartError> {
        if self.state != CaptureState::Idle {
            log::debug!("Ignoring capture start in state {:?}", self.state);
            return Ok(false);
        }

        self.state = CaptureState::Starting;
        match self.source.start(&self.settings, sink) {
            Ok(()) => {
                self.state = CaptureState::Active;
                log::info!(
                    "Started screen capture ({}x{} @ {} fps)",
                    self.settings.width,
                    self.settings.height,
                    self.settings.target_fps
                );
                Ok(true)
            }
            Err(e) => {
                self.state = CaptureState::Idle;
                log::warn!("Failed to start screen capture: {}", e);
                Err(e)
            }
        }
    }

    /// Stop capturing. No-op when idle.
    pub fn stop(&mut self) {
        if self.state == CaptureState::Idle {
            return;
        }
        self.state = CaptureState::Stopping;
        self.source.stop();
        self.state = CaptureState::Idle;
        log::info!("Stopped screen capture");
    }

    /// Start or stop to match `capturing`.
    pub fn set_capturing(
        &mut self,
        capturing: bool,
        sink: FrameSink,
    ) -> Result<(), CaptureStartError> {
        if capturing {
            self.start(sink).map(|_| ())
        } else {
            self.stop();
            Ok(())
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: CaptureSource> Drop for CaptureController<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameRelay;
    use crate::metrics::Metrics;
    use std::sync::Arc;

    #[derive(Default)]
    struct ScriptedSource {
        fail_next_start: bool,
        starts: usize,
        stops: usize,
    }

    impl CaptureSource for ScriptedSource {
        fn start(
            &mut self,
            _settings: &CaptureSettings,
            _sink: FrameSink,
        ) -> Result<(), CaptureStartError> {
            self.starts += 1;
            if std::mem::take(&mut self.fail_next_start) {
                return Err(CaptureStartError::PermissionDenied);
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    fn sink() -> FrameSink {
        FrameSink::new(Arc::new(FrameRelay::new()), Arc::new(Metrics::new()))
    }

    #[test]
    fn test_start_then_stop() {
        let mut controller = CaptureController::new(ScriptedSource::default(), Default::default());
        assert_eq!(controller.start(sink()), Ok(true));
        assert_eq!(controller.state(), CaptureState::Active);
        controller.stop();
        assert_eq!(controller.state(), CaptureState::Idle);
        assert_eq!(controller.source().stops, 1);
    }

    #[test]
    fn test_second_start_is_ignored() {
        let mut controller = CaptureController::new(ScriptedSource::default(), Default::default());
        assert_eq!(controller.start(sink()), Ok(true));
        assert_eq!(controller.start(sink()), Ok(false));
        assert_eq!(controller.source().starts, 1);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut controller = CaptureController::new(ScriptedSource::default(), Default::default());
        controller.stop();
        assert_eq!(controller.source().stops, 0);
    }

    #[test]
    fn test_failed_start_allows_retry() {
        let source = ScriptedSource {
            fail_next_start: true,
            ..Default::default()
        };
        let mut controller = CaptureController::new(source, Default::default());

        assert_eq!(controller.start(sink()), Err(CaptureStartError::PermissionDenied));
        assert_eq!(controller.state(), CaptureState::Idle);

        assert_eq!(controller.start(sink()), Ok(true));
        assert!(controller.is_capturing());
    }

    #[test]
    fn test_set_capturing_toggles() {
        let mut controller = CaptureController::new(ScriptedSource::default(), Default::default());
        controller.set_capturing(true, sink()).unwrap();
        assert!(controller.is_capturing());
        controller.set_capturing(false, sink()).unwrap();
        assert_eq!(controller.state(), CaptureState::Idle);
    }
}
