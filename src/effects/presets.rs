//! Built-in effect sources.
//!
//! Provides the pass-through source new effects start from and the presets
//! seeded into an empty configuration.

/// Source given to every newly created effect.
pub const DEFAULT_EFFECT_SOURCE: &str = include_str!("shaders/passthrough.wgsl");

/// Effects shipped with the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    SwapRedBlue,
    GreyScale,
}

impl Preset {
    /// Display name given to the seeded effect.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SwapRedBlue => "Swap red-blue channels",
            Self::GreyScale => "Grey scale",
        }
    }

    /// WGSL body of the preset.
    pub fn source(&self) -> &'static str {
        match self {
            Self::SwapRedBlue => include_str!("shaders/swap_red_blue.wgsl"),
            Self::GreyScale => include_str!("shaders/grey_scale.wgsl"),
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::SwapRedBlue, Self::GreyScale]
    }
}
