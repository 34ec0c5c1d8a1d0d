//! User-authored screen effects.
//!
//! This module provides:
//! - The effect registry, which keeps effects in insertion order and
//!   enforces that at most one of them is active
//! - Persistable snapshots of the registry
//! - The built-in WGSL sources new and seeded effects start from

pub mod presets;
pub mod registry;

pub use presets::{Preset, DEFAULT_EFFECT_SOURCE};
pub use registry::{Effect, EffectId, EffectRecord, Effects, EffectsSnapshot};
