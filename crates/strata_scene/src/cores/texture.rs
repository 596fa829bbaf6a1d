//! Texture layer state.
//!
//! A texture core describes one layer: its image source, how texture
//! coordinates are derived, which material channel it modulates and the
//! sampler configuration. Layer placement (`apply_from`, `apply_to`,
//! `blend_mode`) and the presence of a coordinate transform select the shader
//! variant and therefore feed the binding hash; the image, blend factor and
//! transform values do not.

use glam::{Mat4, Quat, Vec2, Vec3};
use serde::Deserialize;
use strata_core::{Category, ConfigError};

use super::{BindingHasher, ConfigKey, ImageData, ImageSource, decode_params, parse_choice};

/// Source of texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplyFrom {
    #[default]
    Uv,
    Uv2,
    Normal,
    Geometry,
}

impl ApplyFrom {
    const CHOICES: [(&'static str, ApplyFrom); 4] = [
        ("uv", ApplyFrom::Uv),
        ("uv2", ApplyFrom::Uv2),
        ("normal", ApplyFrom::Normal),
        ("geometry", ApplyFrom::Geometry),
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ApplyFrom::Uv => "uv",
            ApplyFrom::Uv2 => "uv2",
            ApplyFrom::Normal => "normal",
            ApplyFrom::Geometry => "geometry",
        }
    }
}

/// Material channel modulated by the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplyTo {
    #[default]
    BaseColor,
    Specular,
    Emit,
    Alpha,
    Normals,
    Shine,
}

impl ApplyTo {
    // "color" is accepted as an alias of "baseColor".
    const CHOICES: [(&'static str, ApplyTo); 7] = [
        ("baseColor", ApplyTo::BaseColor),
        ("color", ApplyTo::BaseColor),
        ("specular", ApplyTo::Specular),
        ("emit", ApplyTo::Emit),
        ("alpha", ApplyTo::Alpha),
        ("normals", ApplyTo::Normals),
        ("shine", ApplyTo::Shine),
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ApplyTo::BaseColor => "baseColor",
            ApplyTo::Specular => "specular",
            ApplyTo::Emit => "emit",
            ApplyTo::Alpha => "alpha",
            ApplyTo::Normals => "normals",
            ApplyTo::Shine => "shine",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    Add,
    #[default]
    Multiply,
}

impl BlendMode {
    const CHOICES: [(&'static str, BlendMode); 2] = [("add", BlendMode::Add), ("multiply", BlendMode::Multiply)];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Add => "add",
            BlendMode::Multiply => "multiply",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl FilterMode {
    const CHOICES: [(&'static str, FilterMode); 6] = [
        ("nearest", FilterMode::Nearest),
        ("linear", FilterMode::Linear),
        ("nearestMipmapNearest", FilterMode::NearestMipmapNearest),
        ("linearMipmapNearest", FilterMode::LinearMipmapNearest),
        ("nearestMipmapLinear", FilterMode::NearestMipmapLinear),
        ("linearMipmapLinear", FilterMode::LinearMipmapLinear),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

impl WrapMode {
    const CHOICES: [(&'static str, WrapMode); 3] = [
        ("repeat", WrapMode::Repeat),
        ("clampToEdge", WrapMode::ClampToEdge),
        ("mirroredRepeat", WrapMode::MirroredRepeat),
    ];
}

/// Sampler configuration of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerParams {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub flip_y: bool,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::LinearMipmapNearest,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            flip_y: true,
        }
    }
}

/// Texture coordinate transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureTransform {
    pub translate: Vec2,
    pub scale: Vec2,
    /// Rotation about the texture origin, degrees.
    pub rotate: f32,
}

impl Default for TextureTransform {
    fn default() -> Self {
        Self {
            translate: Vec2::ZERO,
            scale: Vec2::ONE,
            rotate: 0.0,
        }
    }
}

impl TextureTransform {
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Translate * rotate * scale, or `None` for the identity.
    #[must_use]
    pub fn matrix(&self) -> Option<Mat4> {
        if self.is_identity() {
            return None;
        }
        Some(Mat4::from_scale_rotation_translation(
            self.scale.extend(1.0),
            Quat::from_rotation_z(self.rotate.to_radians()),
            Vec3::new(self.translate.x, self.translate.y, 0.0),
        ))
    }
}

/// One texture layer. The default (no source) is the "untextured" core.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureState {
    pub source: Option<ImageSource>,
    /// Pixels once available. Inline sources start populated.
    pub image: Option<ImageData>,
    pub apply_from: ApplyFrom,
    pub apply_to: ApplyTo,
    pub blend_mode: BlendMode,
    pub blend_factor: f32,
    pub sampler: SamplerParams,
    pub transform: TextureTransform,
}

impl Default for TextureState {
    fn default() -> Self {
        Self {
            source: None,
            image: None,
            apply_from: ApplyFrom::default(),
            apply_to: ApplyTo::default(),
            blend_mode: BlendMode::default(),
            blend_factor: 1.0,
            sampler: SamplerParams::default(),
            transform: TextureTransform::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Vec2Param {
    x: Option<f32>,
    y: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TextureParams {
    src: Option<String>,
    target: Option<String>,
    apply_from: Option<String>,
    apply_to: Option<String>,
    blend_mode: Option<String>,
    blend_factor: Option<f32>,
    translate: Option<Vec2Param>,
    scale: Option<Vec2Param>,
    rotate: Option<f32>,
    min_filter: Option<String>,
    mag_filter: Option<String>,
    wrap_s: Option<String>,
    wrap_t: Option<String>,
    flip_y: Option<bool>,
}

impl TextureState {
    /// Layer loading its pixels from `uri`.
    #[must_use]
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            source: Some(ImageSource::Uri(uri.into())),
            ..Self::default()
        }
    }

    /// Layer with inline pixels.
    #[must_use]
    pub fn from_image(image: ImageData) -> Self {
        Self {
            source: Some(ImageSource::Image(image.clone())),
            image: Some(image),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_apply_to(mut self, apply_to: ApplyTo) -> Self {
        self.apply_to = apply_to;
        self
    }

    #[must_use]
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let p: TextureParams = decode_params("texture", params)?;
        let c = Category::Texture;

        let source = match (p.src, p.target) {
            (Some(src), _) => ImageSource::Uri(src),
            (None, Some(target)) => ImageSource::Target(target),
            (None, None) => return Err(ConfigError::MissingField { category: c, field: "src" }),
        };

        let mut sampler = SamplerParams::default();
        if let Some(v) = p.min_filter.as_deref() {
            sampler.min_filter = parse_choice(c, "minFilter", v, &FilterMode::CHOICES)?;
        }
        if let Some(v) = p.mag_filter.as_deref() {
            sampler.mag_filter = parse_choice(c, "magFilter", v, &FilterMode::CHOICES)?;
        }
        if let Some(v) = p.wrap_s.as_deref() {
            sampler.wrap_s = parse_choice(c, "wrapS", v, &WrapMode::CHOICES)?;
        }
        if let Some(v) = p.wrap_t.as_deref() {
            sampler.wrap_t = parse_choice(c, "wrapT", v, &WrapMode::CHOICES)?;
        }
        if let Some(flip_y) = p.flip_y {
            sampler.flip_y = flip_y;
        }

        let mut transform = TextureTransform::default();
        if let Some(t) = p.translate {
            transform.translate = Vec2::new(t.x.unwrap_or(0.0), t.y.unwrap_or(0.0));
        }
        if let Some(s) = p.scale {
            transform.scale = Vec2::new(s.x.unwrap_or(1.0), s.y.unwrap_or(1.0));
        }
        transform.rotate = p.rotate.unwrap_or(0.0);

        let state = Self {
            source: Some(source),
            image: None,
            apply_from: match p.apply_from.as_deref() {
                Some(v) => parse_choice(c, "applyFrom", v, &ApplyFrom::CHOICES)?,
                None => ApplyFrom::default(),
            },
            apply_to: match p.apply_to.as_deref() {
                Some(v) => parse_choice(c, "applyTo", v, &ApplyTo::CHOICES)?,
                None => ApplyTo::default(),
            },
            blend_mode: match p.blend_mode.as_deref() {
                Some(v) => parse_choice(c, "blendMode", v, &BlendMode::CHOICES)?,
                None => BlendMode::default(),
            },
            blend_factor: p.blend_factor.unwrap_or(1.0),
            sampler,
            transform,
        };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.blend_factor.is_finite() {
            return Err(ConfigError::InvalidValue {
                category: Category::Texture,
                field: "blendFactor",
                reason: "must be finite".to_string(),
            });
        }
        if let Some(ImageSource::Image(image)) = &self.source
            && !image.is_consistent()
        {
            return Err(ConfigError::InvalidValue {
                category: Category::Texture,
                field: "image",
                reason: format!(
                    "{} bytes do not match a {}x{} RGBA image",
                    image.pixels.len(),
                    image.width,
                    image.height
                ),
            });
        }
        Ok(())
    }

    /// The URI still being loaded, if any.
    #[must_use]
    pub fn pending_uri(&self) -> Option<&str> {
        match (&self.source, &self.image) {
            (Some(ImageSource::Uri(uri)), None) => Some(uri),
            _ => None,
        }
    }

    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        let mut h = BindingHasher::new(Category::Texture);
        if self.source.is_none() {
            return h.finish();
        }
        h.text(self.apply_from.name())
            .text(self.apply_to.name())
            .text(self.blend_mode.name())
            .flag(!self.transform.is_identity());
        h.finish()
    }

    /// Declared source identity plus every binding parameter.
    #[must_use]
    pub fn content_key(&self) -> Option<ConfigKey> {
        let identity = self.source.as_ref()?.identity()?;
        let s = &self.sampler;
        let t = &self.transform;
        Some(ConfigKey::Content(format!(
            "{identity};from={};to={};blend={};factor={:08x};min={:?};mag={:?};wrap={:?}/{:?};flipY={};t={:08x},{:08x};s={:08x},{:08x};r={:08x}",
            self.apply_from.name(),
            self.apply_to.name(),
            self.blend_mode.name(),
            self.blend_factor.to_bits(),
            s.min_filter,
            s.mag_filter,
            s.wrap_s,
            s.wrap_t,
            s.flip_y,
            t.translate.x.to_bits(),
            t.translate.y.to_bits(),
            t.scale.x.to_bits(),
            t.scale.y.to_bits(),
            t.rotate.to_bits(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unsupported_apply_from_is_a_config_error() {
        let err = TextureState::from_params(&json!({ "src": "a.png", "applyFrom": "uv3" })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "applyFrom", .. }));
    }

    #[test]
    fn color_is_an_alias_of_base_color() {
        let state = TextureState::from_params(&json!({ "src": "a.png", "applyTo": "color" })).unwrap();
        assert_eq!(state.apply_to, ApplyTo::BaseColor);
        assert_eq!(state.blend_mode, BlendMode::Multiply);
        assert_eq!(state.blend_factor, 1.0);
    }

    #[test]
    fn missing_source_is_reported() {
        let err = TextureState::from_params(&json!({ "applyTo": "specular" })).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingField {
                category: Category::Texture,
                field: "src"
            }
        );
    }

    #[test]
    fn same_uri_and_params_give_equal_content_keys() {
        let a = TextureState::from_params(&json!({ "src": "brick.png" })).unwrap();
        let b = TextureState::from_params(&json!({ "src": "brick.png" })).unwrap();
        let c = TextureState::from_params(&json!({ "src": "brick.png", "blendMode": "add" })).unwrap();
        assert_eq!(a.content_key(), b.content_key());
        assert_ne!(a.content_key(), c.content_key());
    }

    #[test]
    fn inline_images_do_not_share_by_content() {
        let state = TextureState::from_image(ImageData::solid([255, 0, 0, 255]));
        assert!(state.content_key().is_none());
        assert!(state.pending_uri().is_none());
    }

    #[test]
    fn transform_presence_changes_hash_but_values_do_not() {
        let mut state = TextureState::from_uri("a.png");
        let plain = state.binding_hash();
        state.transform.rotate = 45.0;
        let rotated = state.binding_hash();
        state.transform.rotate = 90.0;
        assert_ne!(plain, rotated);
        assert_eq!(rotated, state.binding_hash());
        assert!(state.transform.matrix().is_some());
    }
}
