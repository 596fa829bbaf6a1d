//! Node types.
//!
//! A node type turns declarative parameters into a state core. Traversal
//! behaviour (push, compile children, pop, destroy) is the same for every
//! type and lives in the scene and the compiler; a type only provides the
//! capabilities that differ:
//!
//! - which [`Category`] it defines state for (if any),
//! - the configuration key its cores share under,
//! - how to build and validate the core payload.
//!
//! Built-in types cover every category. Applications register their own
//! types through [`NodeTypeRegistry::register`].

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use strata_core::{Category, ConfigError};

use crate::cores::{
    ClipsState, ConfigKey, CoreData, FlagsState, FogState, GeometryState, LayerState, LightsState,
    MaterialState, RegionMapState, ShaderState, TextureState, XformState,
};

/// Capabilities of a node type.
pub trait NodeType: Send + Sync {
    /// Name used in descriptions (`"type": "material"`).
    fn type_name(&self) -> &str;

    /// Category the type defines state for; `None` for pure grouping types.
    fn category(&self) -> Option<Category>;

    /// Key under which cores of this type are shared.
    ///
    /// The default shares only through an explicit `coreId`.
    fn config_key(&self, core_id: Option<&str>, params: &Value) -> Option<ConfigKey> {
        let _ = params;
        core_id.map(|id| ConfigKey::CoreId(id.to_string()))
    }

    /// Builds the core payload. Called only when no shared core exists yet.
    fn build_core(&self, params: &Value) -> Result<CoreData, ConfigError>;
}

/// Sharing key for a typed payload supplied directly in code.
#[must_use]
pub fn typed_config_key(data: &CoreData, core_id: Option<&str>) -> Option<ConfigKey> {
    if data.category() == Category::Xform {
        return None;
    }
    core_id
        .map(|id| ConfigKey::CoreId(id.to_string()))
        .or_else(|| data.content_key())
}

// ============================================================================
// Built-in types
// ============================================================================

struct Builtin {
    name: &'static str,
    category: Option<Category>,
}

const BUILTINS: [Builtin; 16] = [
    Builtin { name: "node", category: None },
    Builtin { name: "material", category: Some(Category::Material) },
    Builtin { name: "texture", category: Some(Category::Texture) },
    Builtin { name: "flags", category: Some(Category::Flags) },
    Builtin { name: "lights", category: Some(Category::Lights) },
    Builtin { name: "fog", category: Some(Category::Fog) },
    Builtin { name: "clips", category: Some(Category::Clips) },
    Builtin { name: "regionMap", category: Some(Category::RegionMap) },
    Builtin { name: "shader", category: Some(Category::Shader) },
    Builtin { name: "layer", category: Some(Category::Layer) },
    Builtin { name: "translate", category: Some(Category::Xform) },
    Builtin { name: "rotate", category: Some(Category::Xform) },
    Builtin { name: "scale", category: Some(Category::Xform) },
    Builtin { name: "matrix", category: Some(Category::Xform) },
    Builtin { name: "geometry", category: Some(Category::Geometry) },
    Builtin { name: "group", category: None },
];

impl NodeType for Builtin {
    fn type_name(&self) -> &str {
        self.name
    }

    fn category(&self) -> Option<Category> {
        self.category
    }

    fn config_key(&self, core_id: Option<&str>, params: &Value) -> Option<ConfigKey> {
        match self.category? {
            // Every transform node owns its core: links are per position in the tree.
            Category::Xform => None,
            Category::Texture if core_id.is_none() => TextureState::from_params(params).ok()?.content_key(),
            Category::Shader if core_id.is_none() => ShaderState::from_params(params).ok()?.content_key(),
            _ => core_id.map(|id| ConfigKey::CoreId(id.to_string())),
        }
    }

    fn build_core(&self, params: &Value) -> Result<CoreData, ConfigError> {
        let Some(category) = self.category else {
            return Err(ConfigError::Malformed {
                type_name: self.name.to_string(),
                reason: "grouping nodes carry no core".to_string(),
            });
        };
        Ok(match category {
            Category::Material => CoreData::Material(MaterialState::from_params(params)?),
            Category::Texture => CoreData::Texture(TextureState::from_params(params)?),
            Category::Flags => CoreData::Flags(FlagsState::from_params(params)?),
            Category::Lights => CoreData::Lights(LightsState::from_params(params)?),
            Category::Fog => CoreData::Fog(FogState::from_params(params)?),
            Category::Clips => CoreData::Clips(ClipsState::from_params(params)?),
            Category::RegionMap => CoreData::RegionMap(RegionMapState::from_params(params)?),
            Category::Shader => CoreData::Shader(ShaderState::from_params(params)?),
            Category::Layer => CoreData::Layer(LayerState::from_params(params)?),
            Category::Xform => CoreData::Xform(XformState::from_params(self.name, params)?),
            Category::Geometry => CoreData::Geometry(GeometryState::from_params(params)?),
        })
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Node types known to a scene, keyed by type name.
#[derive(Clone)]
pub struct NodeTypeRegistry {
    types: FxHashMap<String, Arc<dyn NodeType>>,
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl NodeTypeRegistry {
    /// Registry without any type.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            types: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for builtin in BUILTINS {
            registry.register(builtin);
        }
        registry
    }

    /// Registers a type, replacing (and returning) any type of the same name.
    pub fn register(&mut self, node_type: impl NodeType + 'static) -> Option<Arc<dyn NodeType>> {
        let name = node_type.type_name().to_string();
        let previous = self.types.insert(name.clone(), Arc::new(node_type));
        if previous.is_some() {
            log::debug!("Node type '{name}' replaced");
        }
        previous
    }

    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn NodeType>> {
        self.types.get(type_name).cloned()
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }
}

impl std::fmt::Debug for NodeTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("NodeTypeRegistry").field("types", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_cover_every_category() {
        let registry = NodeTypeRegistry::with_builtins();
        for category in Category::ALL {
            let found = BUILTINS.iter().any(|b| b.category == Some(category) && registry.contains(b.name));
            assert!(found, "no builtin for {category}");
        }
    }

    #[test]
    fn transforms_never_share() {
        let registry = NodeTypeRegistry::with_builtins();
        let translate = registry.get("translate").unwrap();
        assert!(translate.config_key(Some("shared"), &json!({ "x": 1.0 })).is_none());
    }

    #[test]
    fn textures_share_by_content_without_core_id() {
        let registry = NodeTypeRegistry::with_builtins();
        let texture = registry.get("texture").unwrap();
        let a = texture.config_key(None, &json!({ "src": "a.png" }));
        let b = texture.config_key(None, &json!({ "src": "a.png" }));
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(
            texture.config_key(Some("t0"), &json!({ "src": "a.png" })),
            Some(ConfigKey::CoreId("t0".to_string()))
        );
    }

    #[test]
    fn materials_share_only_by_core_id() {
        let registry = NodeTypeRegistry::with_builtins();
        let material = registry.get("material").unwrap();
        assert!(material.config_key(None, &json!({})).is_none());
    }
}
