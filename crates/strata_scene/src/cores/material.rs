//! Material state.

use glam::Vec3;
use serde::Deserialize;
use strata_core::{Category, ConfigError};

use super::{BindingHasher, RgbParam, check_range, decode_params};

/// Surface reflectance properties.
///
/// All fields are uniform values, so the binding hash is constant: recolouring
/// a material never re-sorts the display list.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialState {
    pub base_color: Vec3,
    pub specular_color: Vec3,
    pub specular: f32,
    pub shine: f32,
    pub alpha: f32,
    pub emit: f32,
    pub emit_color: Vec3,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            base_color: Vec3::ONE,
            specular_color: Vec3::ONE,
            specular: 1.0,
            shine: 70.0,
            alpha: 1.0,
            emit: 0.0,
            emit_color: Vec3::ONE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MaterialParams {
    color: Option<RgbParam>,
    base_color: Option<RgbParam>,
    specular_color: Option<RgbParam>,
    specular: Option<f32>,
    shine: Option<f32>,
    alpha: Option<f32>,
    emit: Option<f32>,
    emit_color: Option<RgbParam>,
}

impl MaterialState {
    #[must_use]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.base_color = color;
        self
    }

    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let p: MaterialParams = decode_params("material", params)?;
        let defaults = Self::default();
        let state = Self {
            base_color: p.base_color.or(p.color).map_or(defaults.base_color, |c| c.or(defaults.base_color)),
            specular_color: p.specular_color.map_or(defaults.specular_color, |c| c.or(defaults.specular_color)),
            specular: p.specular.unwrap_or(defaults.specular),
            shine: p.shine.unwrap_or(defaults.shine),
            alpha: p.alpha.unwrap_or(defaults.alpha),
            emit: p.emit.unwrap_or(defaults.emit),
            emit_color: p.emit_color.map_or(defaults.emit_color, |c| c.or(defaults.emit_color)),
        };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(Category::Material, "alpha", self.alpha, 0.0, 1.0)?;
        check_range(Category::Material, "shine", self.shine, 0.0, f32::MAX)?;
        check_range(Category::Material, "specular", self.specular, 0.0, f32::MAX)?;
        check_range(Category::Material, "emit", self.emit, 0.0, f32::MAX)
    }

    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        BindingHasher::new(Category::Material).finish()
    }
}
