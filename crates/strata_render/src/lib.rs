//! Strata compiler and renderer.
//!
//! Turns a [`Scene`](strata_scene::Scene) into a state-sorted display list
//! and submits it to an external [`RenderBackend`].

pub mod backend;
pub mod compiler;
pub mod display_list;
pub mod pick;
pub mod renderer;

pub use backend::{BindTracker, DrawCall, RenderBackend};
pub use compiler::{CompilationContext, CompileSink, CompileStats, Compiler, Drawable};
pub use display_list::{DisplayList, DrawEntry, DrawSink, StateKey};
pub use pick::{PickEntry, PickList, PickSink};
pub use renderer::{FrameStats, Renderer};
