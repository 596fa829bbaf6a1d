//! # Strata
//!
//! A retained-mode scene graph that compiles into state-sorted display lists.
//!
//! Applications build a tree of nodes (transforms, materials, lights,
//! textures, render flags, geometry). Every frame the [`Renderer`] compiles
//! only what changed into a flat [`DisplayList`] and submits it to a
//! [`RenderBackend`].
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! let mut scene = Scene::new();
//! let root = scene.root();
//! let material = scene.add_node(
//!     root,
//!     NodeDesc::material(MaterialState::default().with_color(Vec3::X))
//!         .with_child(NodeDesc::geometry(GeometryState::triangles(positions))),
//! )?;
//!
//! let mut renderer = Renderer::new(backend);
//! renderer.render_frame(&mut scene)?;
//!
//! scene.node(material).set_color(Vec3::Z); // re-submit only
//! renderer.render_frame(&mut scene)?;
//! ```

pub use glam;
pub use strata_core as core;
pub use strata_render as render;
pub use strata_scene as scene;

pub use strata_core::{
    Category, CompileSettings, ConfigError, DirtyKind, EventBus, NodeId, Result, SceneEvent, StrataError,
    StructuralError,
};
pub use strata_render::{DisplayList, DrawEntry, PickList, RenderBackend, Renderer, StateKey};
pub use strata_scene::{NodeDesc, NodeType, Scene, SceneNode, SharedScene};

/// Everything needed to build and render a scene.
pub mod prelude {
    pub use glam::{Mat4, Vec2, Vec3, Vec4};
    pub use strata_core::{Category, CompileSettings, DirtyKind, NodeId, SceneEvent, StrataError};
    pub use strata_render::{RenderBackend, Renderer};
    pub use strata_scene::cores::{
        ClipsState, FlagsState, FogState, GeometryState, LayerState, LightsState, MaterialState, RegionMapState,
        ShaderState, TextureState,
    };
    pub use strata_scene::{NodeDesc, Scene};
}
