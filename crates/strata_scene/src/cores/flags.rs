//! Render mode flags.

use glam::Vec3;
use serde::Deserialize;
use strata_core::{Category, ConfigError};

use super::{BindingHasher, RgbParam, decode_params, parse_choice};

/// Winding of front-facing triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    Ccw,
    Cw,
}

impl FrontFace {
    const CHOICES: [(&'static str, FrontFace); 2] = [("ccw", FrontFace::Ccw), ("cw", FrontFace::Cw)];
}

/// Per-subtree render switches.
///
/// `enabled` and `picking` decide which drawables exist at all; they are not
/// hashed because changing them always recompiles the affected branch.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagsState {
    pub picking: bool,
    pub clipping: bool,
    pub enabled: bool,
    pub transparent: bool,
    pub backfaces: bool,
    pub frontface: FrontFace,
    pub reflective: bool,
    pub solid: bool,
    pub solid_color: Vec3,
    pub skybox: bool,
}

impl Default for FlagsState {
    fn default() -> Self {
        Self {
            picking: true,
            clipping: true,
            enabled: true,
            transparent: false,
            backfaces: true,
            frontface: FrontFace::Ccw,
            reflective: true,
            solid: false,
            solid_color: Vec3::ONE,
            skybox: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FlagValues {
    picking: Option<bool>,
    clipping: Option<bool>,
    enabled: Option<bool>,
    transparent: Option<bool>,
    backfaces: Option<bool>,
    frontface: Option<String>,
    reflective: Option<bool>,
    solid: Option<bool>,
    solid_color: Option<RgbParam>,
    skybox: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlagsParams {
    flags: FlagValues,
}

impl FlagsState {
    #[must_use]
    pub fn transparent() -> Self {
        Self {
            transparent: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Decodes `{ "flags": { ... } }`; the `flags` object is optional.
    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let FlagsParams { flags: f } = decode_params("flags", params)?;
        let d = Self::default();
        Ok(Self {
            picking: f.picking.unwrap_or(d.picking),
            clipping: f.clipping.unwrap_or(d.clipping),
            enabled: f.enabled.unwrap_or(d.enabled),
            transparent: f.transparent.unwrap_or(d.transparent),
            backfaces: f.backfaces.unwrap_or(d.backfaces),
            frontface: match f.frontface.as_deref() {
                Some(v) => parse_choice(Category::Flags, "frontface", v, &FrontFace::CHOICES)?,
                None => d.frontface,
            },
            reflective: f.reflective.unwrap_or(d.reflective),
            solid: f.solid.unwrap_or(d.solid),
            solid_color: f.solid_color.map_or(d.solid_color, |c| c.or(d.solid_color)),
            skybox: f.skybox.unwrap_or(d.skybox),
        })
    }

    /// Whether drawables below are emitted for picking.
    #[inline]
    #[must_use]
    pub fn is_pickable(&self) -> bool {
        self.picking && self.enabled
    }

    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        BindingHasher::new(Category::Flags)
            .flag(self.clipping)
            .flag(self.transparent)
            .flag(self.backfaces)
            .tag(self.frontface as u8)
            .flag(self.reflective)
            .flag(self.solid)
            .flag(self.skybox)
            .finish()
    }
}
