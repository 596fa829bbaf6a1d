//! Strata scene tree.
//!
//! Owns everything that describes a scene between two compile passes: the
//! node tree, the per-scene state core registry, the per-category core
//! stacks used while compiling, dirty tracking and asset completions.

pub mod assets;
pub mod cores;
pub mod desc;
pub mod dirty;
pub mod node;
pub mod node_type;
pub mod registry;
pub mod scene;
pub mod stack;
pub mod wrapper;

pub use assets::{AssetCompletion, AssetLoader, LoadRequest};
pub use cores::{ConfigKey, CoreData, GpuSlot, ImageData, ImageSource, StateCore};
pub use desc::{CoreSource, NodeDesc};
pub use dirty::DirtyTracker;
pub use node::{Lifecycle, Node};
pub use node_type::{NodeType, NodeTypeRegistry};
pub use registry::{CoreRegistry, HashChange, Release};
pub use scene::{CoreChange, Descendants, Nodes, Scene, SharedScene};
pub use stack::{CoreSnapshot, CoreStackSet, StackBalance};
pub use wrapper::SceneNode;
