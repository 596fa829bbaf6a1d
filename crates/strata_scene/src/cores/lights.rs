//! Light sources.

use glam::Vec3;
use serde::Deserialize;
use smallvec::SmallVec;
use strata_core::{Category, ConfigError};

use super::{BindingHasher, RgbParam, XyzParam, decode_params, parse_choice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightMode {
    Ambient,
    Dir,
    Point,
    Spot,
}

impl LightMode {
    const CHOICES: [(&'static str, LightMode); 4] = [
        ("ambient", LightMode::Ambient),
        ("dir", LightMode::Dir),
        ("point", LightMode::Point),
        ("spot", LightMode::Spot),
    ];
}

/// Coordinate space of a light's position and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightSpace {
    View,
    World,
}

impl LightSpace {
    const CHOICES: [(&'static str, LightSpace); 2] = [("view", LightSpace::View), ("world", LightSpace::World)];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub mode: LightMode,
    pub color: Vec3,
    pub diffuse: bool,
    pub specular: bool,
    pub pos: Vec3,
    pub dir: Vec3,
    pub space: LightSpace,
    /// Constant, linear, quadratic.
    pub attenuation: Vec3,
}

impl Light {
    #[must_use]
    pub fn ambient(color: Vec3) -> Self {
        Self {
            mode: LightMode::Ambient,
            color,
            diffuse: true,
            specular: false,
            pos: Vec3::ZERO,
            dir: Vec3::Z,
            space: LightSpace::World,
            attenuation: Vec3::ZERO,
        }
    }

    #[must_use]
    pub fn directional(color: Vec3, dir: Vec3) -> Self {
        Self {
            mode: LightMode::Dir,
            diffuse: true,
            specular: true,
            dir,
            ..Self::ambient(color)
        }
    }

    #[must_use]
    pub fn point(color: Vec3, pos: Vec3) -> Self {
        Self {
            mode: LightMode::Point,
            diffuse: true,
            specular: true,
            pos,
            ..Self::ambient(color)
        }
    }
}

/// Set of lights illuminating a subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct LightsState {
    pub lights: SmallVec<[Light; 4]>,
}

impl Default for LightsState {
    fn default() -> Self {
        let mut fill = Light::directional(Vec3::ONE, Vec3::new(1.0, -0.9, -0.7));
        fill.diffuse = false;
        fill.space = LightSpace::View;
        let mut key = Light::directional(Vec3::ONE, Vec3::new(-0.5, -0.5, -1.0));
        key.space = LightSpace::View;
        Self {
            lights: SmallVec::from_vec(vec![Light::ambient(Vec3::new(0.7, 0.7, 0.8)), key, fill]),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LightParams {
    mode: Option<String>,
    color: Option<RgbParam>,
    diffuse: Option<bool>,
    specular: Option<bool>,
    pos: Option<XyzParam>,
    dir: Option<XyzParam>,
    space: Option<String>,
    constant_attenuation: Option<f32>,
    linear_attenuation: Option<f32>,
    quadratic_attenuation: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LightsParams {
    lights: Option<Vec<LightParams>>,
}

impl LightsState {
    #[must_use]
    pub fn new(lights: impl IntoIterator<Item = Light>) -> Self {
        Self {
            lights: lights.into_iter().collect(),
        }
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let c = Category::Lights;
        let LightsParams { lights } = decode_params("lights", params)?;
        let lights = lights.ok_or(ConfigError::MissingField { category: c, field: "lights" })?;

        let mut out = SmallVec::with_capacity(lights.len());
        for cfg in lights {
            let mode = match cfg.mode.as_deref() {
                Some(v) => parse_choice(c, "mode", v, &LightMode::CHOICES)?,
                None => LightMode::Dir,
            };
            let space = match cfg.space.as_deref() {
                Some(v) => parse_choice(c, "space", v, &LightSpace::CHOICES)?,
                None => LightSpace::World,
            };
            // Ambient lights always contribute diffuse and never specular.
            let ambient = mode == LightMode::Ambient;
            out.push(Light {
                mode,
                color: cfg.color.unwrap_or_default().or(Vec3::ONE),
                diffuse: ambient || cfg.diffuse.unwrap_or(true),
                specular: !ambient && cfg.specular.unwrap_or(true),
                pos: cfg.pos.unwrap_or_default().or(Vec3::ZERO),
                dir: cfg.dir.unwrap_or_default().or(Vec3::Z),
                space,
                attenuation: Vec3::new(
                    cfg.constant_attenuation.unwrap_or(0.0),
                    cfg.linear_attenuation.unwrap_or(0.0),
                    cfg.quadratic_attenuation.unwrap_or(0.0),
                ),
            });
        }
        let state = Self { lights: out };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for light in &self.lights {
            if light.mode == LightMode::Dir && light.dir.length_squared() == 0.0 {
                return Err(ConfigError::InvalidValue {
                    category: Category::Lights,
                    field: "dir",
                    reason: "directional light needs a non-zero direction".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Light layout: per light its mode, contributions and space.
    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        let mut h = BindingHasher::new(Category::Lights);
        h.count(self.lights.len());
        for light in &self.lights {
            h.tag(light.mode as u8)
                .flag(light.specular)
                .flag(light.diffuse)
                .tag(light.space as u8);
        }
        h.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lights_attribute_is_mandatory() {
        let err = LightsState::from_params(&json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "lights", .. }));
    }

    #[test]
    fn ambient_lights_are_diffuse_only() {
        let state =
            LightsState::from_params(&json!({ "lights": [{ "mode": "ambient", "specular": true, "diffuse": false }] }))
                .unwrap();
        assert!(state.lights[0].diffuse);
        assert!(!state.lights[0].specular);
    }

    #[test]
    fn unsupported_mode_is_rejected() {
        let err = LightsState::from_params(&json!({ "lights": [{ "mode": "area" }] })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "mode", .. }));
    }

    #[test]
    fn colour_changes_keep_the_hash() {
        let mut state = LightsState::new([Light::point(Vec3::ONE, Vec3::Y)]);
        let before = state.binding_hash();
        state.lights[0].color = Vec3::X;
        assert_eq!(before, state.binding_hash());
        state.lights.push(Light::ambient(Vec3::ONE));
        assert_ne!(before, state.binding_hash());
    }
}
