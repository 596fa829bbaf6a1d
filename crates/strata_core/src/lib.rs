//! Strata core types.
//!
//! Foundational pieces shared by the scene and render crates:
//! identifiers, state categories, dirty kinds, the lifecycle event bus,
//! compile settings and the error taxonomy.

pub mod category;
pub mod dirty;
pub mod errors;
pub mod events;
pub mod ids;
pub mod settings;
pub mod version;

pub use category::{Category, CategoryMask, STACKED_CATEGORY_COUNT};
pub use dirty::DirtyKind;
pub use errors::{BackendError, ConfigError, Result, StrataError, StructuralError};
pub use events::{EventBus, ListenerId, SceneEvent};
pub use ids::{CoreKey, GpuHandle, NodeId, SceneId, StateId, StateIdAllocator};
pub use settings::CompileSettings;
pub use version::{CoreVersion, EditGuard};
