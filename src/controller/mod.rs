//! Control context: effect edits, activation and compile error reporting.
//!
//! The editing UI mutates the registry through [`EffectController::effects_mut`]
//! and then calls [`EffectController::refresh_config`], which recompiles the
//! active effect and reports the outcome on the [`ErrorChannel`].

use serde::{Deserialize, Serialize};

use crate::effects::{Effects, EffectsSnapshot};
use crate::gpu::{PipelineBackend, PipelineCompiler};

type ErrorListener = Box<dyn FnMut(Option<&str>) + Send>;

/// Single optional error message with replace-or-clear semantics.
#[derive(Default)]
pub struct ErrorChannel {
    message: Option<String>,
    listener: Option<ErrorListener>,
}

impl std::fmt::Debug for ErrorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorChannel")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the new message whenever it changes.
    pub fn subscribe(&mut self, listener: impl FnMut(Option<&str>) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.message.as_deref() == Some(message.as_str()) {
            return;
        }
        self.message = Some(message);
        self.notify();
    }

    pub fn clear(&mut self) {
        if self.message.take().is_some() {
            self.notify();
        }
    }

    fn notify(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener(self.message.as_deref());
        }
    }
}

/// Whether the overlay and capture follow effect activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityPolicy {
    /// Overlay shown and capture running regardless of activation.
    #[default]
    AlwaysVisible,
    /// Overlay shown and capture running only while an effect is active.
    FollowActiveEffect,
}

/// Desired overlay state after a configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayState {
    pub visible: bool,
    pub capturing: bool,
}

/// Registry, compiler and error channel driven from the control context.
pub struct EffectController<B: PipelineBackend> {
    effects: Effects,
    compiler: PipelineCompiler<B>,
    errors: ErrorChannel,
    policy: VisibilityPolicy,
    dirty: bool,
}

impl<B: PipelineBackend> EffectController<B> {
    pub fn new(effects: Effects, backend: B, policy: VisibilityPolicy) -> Self {
        Self {
            effects,
            compiler: PipelineCompiler::new(backend),
            errors: ErrorChannel::new(),
            policy,
            dirty: false,
        }
    }

    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    /// Mutable registry access. Call [`Self::refresh_config`] afterwards.
    pub fn effects_mut(&mut self) -> &mut Effects {
        &mut self.effects
    }

    pub fn compiler(&self) -> &PipelineCompiler<B> {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut PipelineCompiler<B> {
        &mut self.compiler
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorChannel {
        &mut self.errors
    }

    pub fn policy(&self) -> VisibilityPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: VisibilityPolicy) {
        self.policy = policy;
        self.dirty = true;
    }

    /// Overlay state implied by the policy and the registry.
    pub fn overlay_state(&self) -> OverlayState {
        let on = match self.policy {
            VisibilityPolicy::AlwaysVisible => true,
            VisibilityPolicy::FollowActiveEffect => self.effects.any_active(),
        };
        OverlayState {
            visible: on,
            capturing: on,
        }
    }

    /// Recompile the active effect after an edit and mark the configuration
    /// for saving.
    pub fn refresh_config(&mut self) -> OverlayState {
        self.reload_active_effect();
        self.dirty = true;
        self.overlay_state()
    }

    /// Recompile the active effect (or clear the pipeline if none is active).
    ///
    /// Returns `true` on success. Failures are reported on the error channel.
    pub fn reload_active_effect(&mut self) -> bool {
        let source = self
            .effects
            .active_effect()
            .map(|effect| effect.source.clone());
        match self.compiler.set_active_source(source.as_deref()) {
            Ok(()) => {
                self.errors.clear();
                true
            }
            Err(e) => {
                self.errors.set(e.to_string());
                false
            }
        }
    }

    /// Turn everything off if any effect is active, else activate the
    /// default effect.
    pub fn toggle_any(&mut self) -> OverlayState {
        if self.effects.any_active() {
            self.effects.deactivate_all();
        } else {
            self.effects.activate_default();
        }
        self.refresh_config()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear and return the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn snapshot(&self) -> EffectsSnapshot {
        self.effects.snapshot()
    }
}
