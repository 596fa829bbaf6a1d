//! Scene authoring descriptions.
//!
//! A [`NodeDesc`] describes a node and its subtree, either through typed
//! builders or a JSON document:
//!
//! ```json
//! {
//!   "type": "material", "sid": "red", "color": { "r": 1.0, "g": 0.0, "b": 0.0 },
//!   "nodes": [
//!     { "type": "translate", "x": 1.0, "nodes": [{ "type": "geometry", "positions": [...] }] }
//!   ]
//! }
//! ```
//!
//! Every key other than `type`, `sid`, `name`, `coreId` and `nodes` is passed
//! to the node type as its parameters.

use glam::{Mat4, Vec3};
use serde::Deserialize;
use serde_json::{Map, Value};
use strata_core::Result;

use crate::cores::{
    ClipsState, CoreData, FlagsState, FogState, GeometryState, LayerState, LightsState, MaterialState,
    RegionMapState, ShaderState, TextureState, XformState,
};

/// How a description defines its core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreSource {
    /// Parameters decoded by the node type.
    Params(Value),
    /// Payload built in code; validated on insertion.
    Typed(CoreData),
}

/// Description of a node subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDesc {
    pub type_name: String,
    pub sid: Option<String>,
    pub name: Option<String>,
    pub core_id: Option<String>,
    pub source: CoreSource,
    pub children: Vec<NodeDesc>,
}

impl Default for NodeDesc {
    fn default() -> Self {
        Self::group()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDesc {
    #[serde(rename = "type", default = "group_type")]
    type_name: String,
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    core_id: Option<String>,
    #[serde(default)]
    nodes: Vec<RawDesc>,
    #[serde(flatten)]
    params: Map<String, Value>,
}

fn group_type() -> String {
    "node".to_string()
}

impl From<RawDesc> for NodeDesc {
    fn from(raw: RawDesc) -> Self {
        Self {
            type_name: raw.type_name,
            sid: raw.sid,
            name: raw.name,
            core_id: raw.core_id,
            source: CoreSource::Params(Value::Object(raw.params)),
            children: raw.nodes.into_iter().map(NodeDesc::from).collect(),
        }
    }
}

impl NodeDesc {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Plain grouping node.
    #[must_use]
    pub fn group() -> Self {
        Self::of_type("node", Value::Null)
    }

    /// Node of any registered type with raw parameters.
    #[must_use]
    pub fn of_type(type_name: impl Into<String>, params: Value) -> Self {
        Self {
            type_name: type_name.into(),
            sid: None,
            name: None,
            core_id: None,
            source: CoreSource::Params(params),
            children: Vec::new(),
        }
    }

    /// Node carrying a payload built in code.
    #[must_use]
    pub fn typed(type_name: impl Into<String>, data: CoreData) -> Self {
        Self {
            source: CoreSource::Typed(data),
            ..Self::of_type(type_name, Value::Null)
        }
    }

    #[must_use]
    pub fn material(state: MaterialState) -> Self {
        Self::typed("material", CoreData::Material(state))
    }

    #[must_use]
    pub fn texture(state: TextureState) -> Self {
        Self::typed("texture", CoreData::Texture(state))
    }

    #[must_use]
    pub fn flags(state: FlagsState) -> Self {
        Self::typed("flags", CoreData::Flags(state))
    }

    #[must_use]
    pub fn lights(state: LightsState) -> Self {
        Self::typed("lights", CoreData::Lights(state))
    }

    #[must_use]
    pub fn fog(state: FogState) -> Self {
        Self::typed("fog", CoreData::Fog(state))
    }

    #[must_use]
    pub fn clips(state: ClipsState) -> Self {
        Self::typed("clips", CoreData::Clips(state))
    }

    #[must_use]
    pub fn region_map(state: RegionMapState) -> Self {
        Self::typed("regionMap", CoreData::RegionMap(state))
    }

    #[must_use]
    pub fn shader(state: ShaderState) -> Self {
        Self::typed("shader", CoreData::Shader(state))
    }

    #[must_use]
    pub fn layer(state: LayerState) -> Self {
        Self::typed("layer", CoreData::Layer(state))
    }

    #[must_use]
    pub fn translate(offset: Vec3) -> Self {
        Self::typed("translate", CoreData::Xform(XformState::translate(offset)))
    }

    /// Rotation of `angle` degrees about `axis`.
    #[must_use]
    pub fn rotate(angle: f32, axis: Vec3) -> Self {
        Self::typed("rotate", CoreData::Xform(XformState::rotate(angle, axis)))
    }

    #[must_use]
    pub fn scale(factor: Vec3) -> Self {
        Self::typed("scale", CoreData::Xform(XformState::scale(factor)))
    }

    #[must_use]
    pub fn matrix(matrix: Mat4) -> Self {
        Self::typed("matrix", CoreData::Xform(XformState::matrix(matrix)))
    }

    #[must_use]
    pub fn geometry(state: GeometryState) -> Self {
        Self::typed("geometry", CoreData::Geometry(state))
    }

    /// Parses a JSON description.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawDesc = serde_json::from_str(json)?;
        Ok(raw.into())
    }

    /// Converts an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawDesc = serde_json::from_value(value)?;
        Ok(raw.into())
    }

    // ========================================================================
    // Chainable configuration
    // ========================================================================

    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Shares the core with every node declaring the same id.
    #[must_use]
    pub fn with_core_id(mut self, core_id: impl Into<String>) -> Self {
        self.core_id = Some(core_id.into());
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: NodeDesc) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeDesc>) -> Self {
        self.children.extend(children);
        self
    }

    /// Number of nodes in the described subtree.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(NodeDesc::count).sum::<usize>()
    }
}
