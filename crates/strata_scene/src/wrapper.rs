//! Chainable node operation wrapper.
//!
//! [`SceneNode`] borrows a [`Scene`] mutably and provides a fluent API for
//! editing the state a node defines. Each setter mutates the node's core and
//! marks the matching dirt in the same call.
//!
//! All methods silently no-op when the handle is stale or the node does not
//! define the edited category, so users never encounter panics from dangling
//! handles.
//!
//! # Example
//!
//! ```rust,ignore
//! scene.node(material)
//!     .set_color(Vec3::new(0.0, 0.0, 1.0))
//!     .set_alpha(0.5);
//! scene.node(flags).set_transparent(true);
//! ```
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::must_use_candidate)]
use glam::{Mat4, Vec2, Vec3};
use strata_core::{DirtyKind, NodeId};

use crate::cores::{
    CoreData, FlagsState, FogMode, FogState, FrontFace, GeometryState, LayerState, Light, LightsState,
    MaterialState, RegionMapState, TextureState, XformKind,
};
use crate::scene::{CoreChange, Scene};

/// Temporary mutable borrow of a scene node for chainable operations.
pub struct SceneNode<'a> {
    scene: &'a mut Scene,
    id: NodeId,
    last: Option<DirtyKind>,
}

impl<'a> SceneNode<'a> {
    #[inline]
    pub fn new(scene: &'a mut Scene, id: NodeId) -> Self {
        Self { scene, id, last: None }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Dirt raised by the most recent setter; `None` when it was a no-op.
    #[inline]
    #[must_use]
    pub fn last_change(&self) -> Option<DirtyKind> {
        self.last
    }

    fn edit(mut self, change: CoreChange, f: impl FnOnce(&mut CoreData) -> bool) -> Self {
        self.last = self.scene.update_core(self.id, change, f);
        self
    }

    fn material(self, f: impl FnOnce(&mut MaterialState)) -> Self {
        self.edit(CoreChange::Value, |data| match data {
            CoreData::Material(state) => {
                f(state);
                true
            }
            _ => false,
        })
    }

    fn texture(self, f: impl FnOnce(&mut TextureState)) -> Self {
        self.edit(CoreChange::Value, |data| match data {
            CoreData::Texture(state) => {
                f(state);
                true
            }
            _ => false,
        })
    }

    fn flags(self, change: CoreChange, f: impl FnOnce(&mut FlagsState)) -> Self {
        self.edit(change, |data| match data {
            CoreData::Flags(state) => {
                f(state);
                true
            }
            _ => false,
        })
    }

    fn layer(self, change: CoreChange, f: impl FnOnce(&mut LayerState)) -> Self {
        self.edit(change, |data| match data {
            CoreData::Layer(state) => {
                f(state);
                true
            }
            _ => false,
        })
    }

    /// Edits light `index`; out-of-range indices are a no-op.
    fn light(self, index: usize, f: impl FnOnce(&mut Light)) -> Self {
        self.edit(CoreChange::Value, |data| match data {
            CoreData::Lights(LightsState { lights }) => match lights.get_mut(index) {
                Some(light) => {
                    f(light);
                    true
                }
                None => false,
            },
            _ => false,
        })
    }

    fn fog(self, f: impl FnOnce(&mut FogState)) -> Self {
        self.edit(CoreChange::Value, |data| match data {
            CoreData::Fog(state) => {
                f(state);
                true
            }
            _ => false,
        })
    }

    fn region_map(self, f: impl FnOnce(&mut RegionMapState)) -> Self {
        self.edit(CoreChange::Value, |data| match data {
            CoreData::RegionMap(state) => {
                f(state);
                true
            }
            _ => false,
        })
    }

    fn geometry(self, f: impl FnOnce(&mut GeometryState)) -> Self {
        self.edit(CoreChange::Value, |data| match data {
            CoreData::Geometry(state) => {
                f(state);
                true
            }
            _ => false,
        })
    }

    /// Applies `f` when the transform has the expected shape.
    fn xform(self, op: &str, f: impl FnOnce(&mut XformKind) -> bool) -> Self {
        let id = self.id;
        self.edit(CoreChange::Value, |data| match data {
            CoreData::Xform(state) => {
                let applied = f(&mut state.kind);
                if !applied {
                    log::warn!("{op} does not apply to the transform of {id:?}");
                }
                applied
            }
            _ => false,
        })
    }

    // -- Node --

    /// Sets the lookup name. Names never affect compilation.
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.last = None;
        if let Some(node) = self.scene.nodes_mut().get_mut(self.id) {
            node.name = Some(name);
        }
        self
    }

    // -- Material --

    pub fn set_color(self, color: Vec3) -> Self {
        self.material(|m| m.base_color = color)
    }

    pub fn set_specular_color(self, color: Vec3) -> Self {
        self.material(|m| m.specular_color = color)
    }

    pub fn set_specular(self, specular: f32) -> Self {
        self.material(|m| m.specular = specular)
    }

    pub fn set_shine(self, shine: f32) -> Self {
        self.material(|m| m.shine = shine)
    }

    /// Sets opacity in `[0, 1]`; out-of-range values are rejected.
    pub fn set_alpha(self, alpha: f32) -> Self {
        self.material(|m| m.alpha = alpha)
    }

    pub fn set_emit(self, emit: f32) -> Self {
        self.material(|m| m.emit = emit)
    }

    pub fn set_emit_color(self, color: Vec3) -> Self {
        self.material(|m| m.emit_color = color)
    }

    // -- Transforms --

    /// Replaces the offset of a `translate` node.
    pub fn set_translation(self, offset: Vec3) -> Self {
        self.xform("set_translation", |kind| match kind {
            XformKind::Translate(current) => {
                *current = offset;
                true
            }
            _ => false,
        })
    }

    /// Replaces the angle (degrees) of a `rotate` node.
    pub fn set_rotation(self, angle: f32) -> Self {
        self.xform("set_rotation", |kind| match kind {
            XformKind::Rotate { angle: current, .. } => {
                *current = angle;
                true
            }
            _ => false,
        })
    }

    /// Replaces the factors of a `scale` node.
    pub fn set_scale(self, factor: Vec3) -> Self {
        self.xform("set_scale", |kind| match kind {
            XformKind::Scale(current) => {
                *current = factor;
                true
            }
            _ => false,
        })
    }

    /// Replaces the matrix of a `matrix` node.
    pub fn set_matrix(self, matrix: Mat4) -> Self {
        self.xform("set_matrix", |kind| match kind {
            XformKind::Matrix(current) => {
                *current = matrix;
                true
            }
            _ => false,
        })
    }

    // -- Flags --

    /// Moves the subtree between the opaque and transparent passes.
    pub fn set_transparent(self, transparent: bool) -> Self {
        self.flags(CoreChange::Value, |f| f.transparent = transparent)
    }

    /// Disabled subtrees emit nothing.
    pub fn set_enabled(self, enabled: bool) -> Self {
        self.flags(CoreChange::Structure, |f| f.enabled = enabled)
    }

    pub fn set_picking(self, picking: bool) -> Self {
        self.flags(CoreChange::Structure, |f| f.picking = picking)
    }

    pub fn set_backfaces(self, backfaces: bool) -> Self {
        self.flags(CoreChange::Value, |f| f.backfaces = backfaces)
    }

    pub fn set_frontface(self, frontface: FrontFace) -> Self {
        self.flags(CoreChange::Value, |f| f.frontface = frontface)
    }

    pub fn set_clipping(self, clipping: bool) -> Self {
        self.flags(CoreChange::Value, |f| f.clipping = clipping)
    }

    pub fn set_reflective(self, reflective: bool) -> Self {
        self.flags(CoreChange::Value, |f| f.reflective = reflective)
    }

    pub fn set_solid(self, solid: bool) -> Self {
        self.flags(CoreChange::Value, |f| f.solid = solid)
    }

    pub fn set_solid_color(self, color: Vec3) -> Self {
        self.flags(CoreChange::Value, |f| f.solid_color = color)
    }

    pub fn set_skybox(self, skybox: bool) -> Self {
        self.flags(CoreChange::Value, |f| f.skybox = skybox)
    }

    // -- Layer --

    /// Reorders the subtree within its pass; priorities must fit in 16 bits.
    pub fn set_layer_priority(self, priority: i32) -> Self {
        self.layer(CoreChange::Value, |l| l.priority = priority)
    }

    pub fn set_layer_enabled(self, enabled: bool) -> Self {
        self.layer(CoreChange::Structure, |l| l.enabled = enabled)
    }

    // -- Texture --

    pub fn set_blend_factor(self, factor: f32) -> Self {
        self.texture(|t| t.blend_factor = factor)
    }

    pub fn set_texture_translate(self, translate: Vec2) -> Self {
        self.texture(|t| t.transform.translate = translate)
    }

    pub fn set_texture_scale(self, scale: Vec2) -> Self {
        self.texture(|t| t.transform.scale = scale)
    }

    /// Rotation in degrees.
    pub fn set_texture_rotate(self, rotate: f32) -> Self {
        self.texture(|t| t.transform.rotate = rotate)
    }

    // -- Lights --

    pub fn set_light_color(self, index: usize, color: Vec3) -> Self {
        self.light(index, |light| light.color = color)
    }

    pub fn set_light_dir(self, index: usize, dir: Vec3) -> Self {
        self.light(index, |light| light.dir = dir)
    }

    pub fn set_light_pos(self, index: usize, pos: Vec3) -> Self {
        self.light(index, |light| light.pos = pos)
    }

    // -- Fog --

    pub fn set_fog_mode(self, mode: FogMode) -> Self {
        self.fog(|f| f.mode = mode)
    }

    pub fn set_fog_color(self, color: Vec3) -> Self {
        self.fog(|f| f.color = color)
    }

    pub fn set_fog_density(self, density: f32) -> Self {
        self.fog(|f| f.density = density)
    }

    // -- Region map --

    pub fn set_highlight_color(self, color: Vec3) -> Self {
        self.region_map(|r| r.highlight_color = color)
    }

    // -- Geometry --

    /// Replaces vertex positions; other attributes must still match.
    pub fn set_positions(self, positions: Vec<f32>) -> Self {
        self.geometry(|g| g.positions = positions)
    }
}
