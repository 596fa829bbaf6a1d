//! State cores.
//!
//! A state core is the shareable, reference-counted bundle of render state a
//! state-defining node contributes to its subtree. Category payloads live in
//! the submodules; [`CoreData`] is the closed union over them and
//! [`StateCore`] adds the bookkeeping the registry and the renderer need.
//!
//! # Binding hash
//!
//! Every payload computes a structural fingerprint of the fields that change
//! how the backend binds it (shader variant, pipeline state). Pure uniform
//! values such as colours or matrices never feed the hash, so mutating them
//! only requires re-submission of the display list.

pub mod clips;
pub mod flags;
pub mod fog;
pub mod geometry;
pub mod image;
pub mod layer;
pub mod lights;
pub mod material;
pub mod region_map;
pub mod shader;
pub mod texture;
pub mod xform;

pub use clips::{ClipMode, ClipPlane, ClipsState};
pub use flags::{FlagsState, FrontFace};
pub use fog::{FogMode, FogState};
pub use geometry::{GeometryState, Primitive};
pub use image::{ImageData, ImageSource};
pub use layer::LayerState;
pub use lights::{Light, LightMode, LightSpace, LightsState};
pub use material::MaterialState;
pub use region_map::{RegionMapState, RegionMode};
pub use shader::{ShaderParam, ShaderStage, ShaderState};
pub use texture::{ApplyFrom, ApplyTo, BlendMode, FilterMode, SamplerParams, TextureState, TextureTransform, WrapMode};
pub use xform::{XformKind, XformState};

use glam::{Vec3, Vec4};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use strata_core::{Category, ConfigError, CoreKey, CoreVersion, GpuHandle, StateId};
use xxhash_rust::xxh3::Xxh3;

// ============================================================================
// Configuration keys
// ============================================================================

/// Registration key of a shareable core.
///
/// Two nodes share a core iff they request the same category with equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Explicit `coreId` given by the author.
    CoreId(String),
    /// Canonical description of a resource-backed configuration
    /// (declared source identity plus binding parameters).
    Content(String),
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigKey::CoreId(id) => write!(f, "coreId:{id}"),
            ConfigKey::Content(desc) => write!(f, "content:{desc}"),
        }
    }
}

// ============================================================================
// Binding hash
// ============================================================================

/// Order-fixed digest of named binding fields.
pub struct BindingHasher(Xxh3);

impl BindingHasher {
    #[must_use]
    pub fn new(category: Category) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(category.name().as_bytes());
        Self(hasher)
    }

    pub fn flag(&mut self, value: bool) -> &mut Self {
        self.0.update(&[u8::from(value)]);
        self
    }

    pub fn int(&mut self, value: i32) -> &mut Self {
        self.0.update(&value.to_le_bytes());
        self
    }

    pub fn tag(&mut self, value: u8) -> &mut Self {
        self.0.update(&[value]);
        self
    }

    pub fn count(&mut self, value: usize) -> &mut Self {
        self.0.update(&(value as u64).to_le_bytes());
        self
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        self.count(value.len());
        self.0.update(value.as_bytes());
        self
    }

    #[must_use]
    pub fn finish(&self) -> u64 {
        self.0.digest()
    }
}

// ============================================================================
// Core payload union
// ============================================================================

/// Category-specific payload of a state core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreData {
    Material(MaterialState),
    Texture(TextureState),
    Flags(FlagsState),
    Lights(LightsState),
    Fog(FogState),
    Clips(ClipsState),
    RegionMap(RegionMapState),
    Shader(ShaderState),
    Layer(LayerState),
    Xform(XformState),
    Geometry(GeometryState),
}

impl CoreData {
    /// Payload of the category's default core.
    #[must_use]
    pub fn default_for(category: Category) -> Self {
        match category {
            Category::Material => CoreData::Material(MaterialState::default()),
            Category::Texture => CoreData::Texture(TextureState::default()),
            Category::Flags => CoreData::Flags(FlagsState::default()),
            Category::Lights => CoreData::Lights(LightsState::default()),
            Category::Fog => CoreData::Fog(FogState::default()),
            Category::Clips => CoreData::Clips(ClipsState::default()),
            Category::RegionMap => CoreData::RegionMap(RegionMapState::default()),
            Category::Shader => CoreData::Shader(ShaderState::default()),
            Category::Layer => CoreData::Layer(LayerState::default()),
            Category::Xform => CoreData::Xform(XformState::default()),
            Category::Geometry => CoreData::Geometry(GeometryState::default()),
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            CoreData::Material(_) => Category::Material,
            CoreData::Texture(_) => Category::Texture,
            CoreData::Flags(_) => Category::Flags,
            CoreData::Lights(_) => Category::Lights,
            CoreData::Fog(_) => Category::Fog,
            CoreData::Clips(_) => Category::Clips,
            CoreData::RegionMap(_) => Category::RegionMap,
            CoreData::Shader(_) => Category::Shader,
            CoreData::Layer(_) => Category::Layer,
            CoreData::Xform(_) => Category::Xform,
            CoreData::Geometry(_) => Category::Geometry,
        }
    }

    /// Structural fingerprint of the GPU-binding fields.
    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        match self {
            CoreData::Material(s) => s.binding_hash(),
            CoreData::Texture(s) => s.binding_hash(),
            CoreData::Flags(s) => s.binding_hash(),
            CoreData::Lights(s) => s.binding_hash(),
            CoreData::Fog(s) => s.binding_hash(),
            CoreData::Clips(s) => s.binding_hash(),
            CoreData::RegionMap(s) => s.binding_hash(),
            CoreData::Shader(s) => s.binding_hash(),
            CoreData::Layer(s) => s.binding_hash(),
            CoreData::Xform(s) => s.binding_hash(),
            CoreData::Geometry(s) => s.binding_hash(),
        }
    }

    /// Checks the payload invariants. Typed payloads built in code go through
    /// the same checks as decoded ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            CoreData::Material(s) => s.validate(),
            CoreData::Texture(s) => s.validate(),
            CoreData::Lights(s) => s.validate(),
            CoreData::Fog(s) => s.validate(),
            CoreData::Shader(s) => s.validate(),
            CoreData::Layer(s) => s.validate(),
            CoreData::Xform(s) => s.validate(),
            CoreData::Geometry(s) => s.validate(),
            CoreData::Flags(_) | CoreData::Clips(_) | CoreData::RegionMap(_) => Ok(()),
        }
    }

    /// Canonical key for payloads that share by content.
    #[must_use]
    pub fn content_key(&self) -> Option<ConfigKey> {
        match self {
            CoreData::Texture(s) => s.content_key(),
            CoreData::Shader(s) => s.content_key(),
            _ => None,
        }
    }

    /// URI of an image the payload still waits for.
    #[must_use]
    pub fn pending_uri(&self) -> Option<&str> {
        match self {
            CoreData::Texture(s) => s.pending_uri(),
            CoreData::RegionMap(s) => s.pending_uri(),
            _ => None,
        }
    }

    /// Stores a loaded image. Returns `false` when the payload takes none.
    pub fn apply_image(&mut self, image: ImageData) -> bool {
        match self {
            CoreData::Texture(s) => {
                s.image = Some(image);
                true
            }
            CoreData::RegionMap(s) => {
                s.image = Some(image);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn as_material(&self) -> Option<&MaterialState> {
        match self {
            CoreData::Material(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_texture(&self) -> Option<&TextureState> {
        match self {
            CoreData::Texture(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_flags(&self) -> Option<&FlagsState> {
        match self {
            CoreData::Flags(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_layer(&self) -> Option<&LayerState> {
        match self {
            CoreData::Layer(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_xform(&self) -> Option<&XformState> {
        match self {
            CoreData::Xform(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_geometry(&self) -> Option<&GeometryState> {
        match self {
            CoreData::Geometry(s) => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// Registered core
// ============================================================================

/// GPU-side status of a core.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GpuSlot {
    /// Resolvable, not allocated yet.
    #[default]
    Unallocated,
    /// Waiting for an asset; drawn with the default core meanwhile.
    Awaiting,
    /// Backend resource exists.
    Ready(GpuHandle),
    /// Loading or allocation failed; drawn with the default core.
    Failed(String),
}

impl GpuSlot {
    /// Whether the core may be allocated or bound.
    #[inline]
    #[must_use]
    pub fn is_resolvable(&self) -> bool {
        matches!(self, GpuSlot::Unallocated | GpuSlot::Ready(_))
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<GpuHandle> {
        match self {
            GpuSlot::Ready(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// A registered core.
#[derive(Debug)]
pub struct StateCore {
    pub(crate) key: CoreKey,
    pub(crate) category: Category,
    pub(crate) state_id: StateId,
    pub(crate) config_key: Option<ConfigKey>,
    pub(crate) data: CoreData,
    pub(crate) hash: u64,
    pub(crate) use_count: u32,
    pub(crate) version: CoreVersion,
    pub(crate) gpu: GpuSlot,
    pub(crate) pinned: bool,
}

impl StateCore {
    #[inline]
    #[must_use]
    pub fn key(&self) -> CoreKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[inline]
    #[must_use]
    pub fn state_id(&self) -> StateId {
        self.state_id
    }

    #[inline]
    #[must_use]
    pub fn config_key(&self) -> Option<&ConfigKey> {
        self.config_key.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &CoreData {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    /// Bumped on every value mutation.
    #[inline]
    #[must_use]
    pub fn version(&self) -> CoreVersion {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn gpu(&self) -> &GpuSlot {
        &self.gpu
    }

    /// Default cores are pinned and never released.
    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.pinned
    }
}

// ============================================================================
// Parameter decoding helpers
// ============================================================================

/// Decodes node parameters, mapping decoder failures to [`ConfigError::Malformed`].
pub(crate) fn decode_params<T: DeserializeOwned>(type_name: &str, params: &serde_json::Value) -> Result<T, ConfigError> {
    let value = if params.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|e| ConfigError::Malformed {
        type_name: type_name.to_string(),
        reason: e.to_string(),
    })
}

/// `{ "r": .., "g": .., "b": .. }` with per-component defaults.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct RgbParam {
    r: Option<f32>,
    g: Option<f32>,
    b: Option<f32>,
    a: Option<f32>,
}

impl RgbParam {
    pub(crate) fn or(self, default: Vec3) -> Vec3 {
        Vec3::new(
            self.r.unwrap_or(default.x),
            self.g.unwrap_or(default.y),
            self.b.unwrap_or(default.z),
        )
    }

    pub(crate) fn or_rgba(self, default: Vec4) -> Vec4 {
        self.or(default.truncate()).extend(self.a.unwrap_or(default.w))
    }
}

/// `{ "x": .., "y": .., "z": .. }` with per-component defaults.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct XyzParam {
    x: Option<f32>,
    y: Option<f32>,
    z: Option<f32>,
}

impl XyzParam {
    pub(crate) fn or(self, default: Vec3) -> Vec3 {
        Vec3::new(
            self.x.unwrap_or(default.x),
            self.y.unwrap_or(default.y),
            self.z.unwrap_or(default.z),
        )
    }
}

/// Range check shared by the payload validators.
pub(crate) fn check_range(
    category: Category,
    field: &'static str,
    value: f32,
    min: f32,
    max: f32,
) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            category,
            field,
            reason: format!("{value} is outside [{min}, {max}]"),
        })
    }
}

/// Maps a declared string onto one of the accepted choices.
pub(crate) fn parse_choice<T: Copy>(
    category: Category,
    field: &'static str,
    value: &str,
    choices: &[(&str, T)],
) -> Result<T, ConfigError> {
    choices
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, choice)| *choice)
        .ok_or_else(|| {
            let accepted: Vec<&str> = choices.iter().map(|(name, _)| *name).collect();
            ConfigError::InvalidValue {
                category,
                field,
                reason: format!("'{value}' should be one of: {}", accepted.join(", ")),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_payloads_match_their_category() {
        for category in Category::ALL {
            let data = CoreData::default_for(category);
            assert_eq!(data.category(), category);
            assert!(data.validate().is_ok(), "default {category} must validate");
        }
    }

    #[test]
    fn hasher_is_order_sensitive() {
        let a = BindingHasher::new(Category::Flags).flag(true).flag(false).finish();
        let b = BindingHasher::new(Category::Flags).flag(false).flag(true).finish();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_params_become_config_errors() {
        let err = decode_params::<XyzParam>("translate", &serde_json::json!({ "x": "far" })).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }
}
