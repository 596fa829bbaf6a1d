//! Distance fog.

use glam::Vec3;
use serde::Deserialize;
use strata_core::{Category, ConfigError};

use super::{BindingHasher, RgbParam, check_range, decode_params, parse_choice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FogMode {
    #[default]
    Disabled,
    Constant,
    Linear,
    Exp,
    Exp2,
}

impl FogMode {
    const CHOICES: [(&'static str, FogMode); 5] = [
        ("disabled", FogMode::Disabled),
        ("constant", FogMode::Constant),
        ("linear", FogMode::Linear),
        ("exp", FogMode::Exp),
        ("exp2", FogMode::Exp2),
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct FogState {
    pub mode: FogMode,
    pub color: Vec3,
    pub density: f32,
    pub start: f32,
    pub end: f32,
}

impl Default for FogState {
    fn default() -> Self {
        Self {
            mode: FogMode::Disabled,
            color: Vec3::splat(0.5),
            density: 1.0,
            start: 0.0,
            end: 1.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FogParams {
    mode: Option<String>,
    color: Option<RgbParam>,
    density: Option<f32>,
    start: Option<f32>,
    end: Option<f32>,
}

impl FogState {
    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let p: FogParams = decode_params("fog", params)?;
        let d = Self::default();
        let state = Self {
            mode: match p.mode.as_deref() {
                Some(v) => parse_choice(Category::Fog, "mode", v, &FogMode::CHOICES)?,
                None => FogMode::Exp,
            },
            color: p.color.map_or(d.color, |c| c.or(d.color)),
            density: p.density.unwrap_or(d.density),
            start: p.start.unwrap_or(d.start),
            end: p.end.unwrap_or(d.end),
        };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(Category::Fog, "density", self.density, 0.0, f32::MAX)?;
        if self.mode == FogMode::Linear && self.end <= self.start {
            return Err(ConfigError::InvalidValue {
                category: Category::Fog,
                field: "end",
                reason: format!("linear fog needs end ({}) > start ({})", self.end, self.start),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        BindingHasher::new(Category::Fog).tag(self.mode as u8).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declared_fog_defaults_to_exponential() {
        let state = FogState::from_params(&json!({ "density": 0.2 })).unwrap();
        assert_eq!(state.mode, FogMode::Exp);
        assert_eq!(state.density, 0.2);
    }

    #[test]
    fn inverted_linear_range_is_rejected() {
        let err = FogState::from_params(&json!({ "mode": "linear", "start": 10.0, "end": 5.0 })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "end", .. }));
    }
}
