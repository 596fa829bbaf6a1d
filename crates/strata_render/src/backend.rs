//! Rendering backend interface.
//!
//! The backend owns every GPU object. The renderer only asks it to allocate
//! resources for cores, bind cores, issue draws and free retired handles.
//! Backend errors are logged by the renderer and never inspected further.

use glam::Mat4;
use strata_core::{BackendError, Category, CategoryMask, GpuHandle, NodeId, STACKED_CATEGORY_COUNT, StateId};
use strata_scene::StateCore;

use crate::display_list::StateKey;

/// One draw issued for a display list entry.
#[derive(Debug)]
pub struct DrawCall<'a> {
    pub node: NodeId,
    pub geometry: &'a StateCore,
    pub handle: GpuHandle,
    /// Product of the entry's transform chain.
    pub world: Mat4,
    pub key: StateKey,
    /// Categories bound right before this draw.
    pub rebound: CategoryMask,
}

/// External rendering backend.
pub trait RenderBackend {
    fn begin_frame(&mut self) {}

    /// Creates the GPU resource of a core. Called at most once per core
    /// unless it was released.
    fn allocate(&mut self, core: &StateCore) -> Result<GpuHandle, BackendError>;

    /// Frees the resource of a destroyed core.
    fn release(&mut self, handle: GpuHandle);

    /// Makes `core` current for `category`.
    ///
    /// Value edits keep the handle and bump [`StateCore::version`]. A backend
    /// re-uploads the core's data when its version is newer than the one it
    /// last uploaded for the handle, see [`CoreVersion::is_newer_than`].
    fn bind(&mut self, category: Category, core: &StateCore, handle: GpuHandle) -> Result<(), BackendError>;

    /// Issues one draw. The geometry core follows the same version contract
    /// as [`RenderBackend::bind`].
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), BackendError>;

    fn end_frame(&mut self) {}
}

/// Remembers the state id bound per category within one frame, so a bind is
/// only issued when it changes between consecutive entries.
#[derive(Debug, Clone, Default)]
pub struct BindTracker {
    bound: [Option<StateId>; STACKED_CATEGORY_COUNT],
}

impl BindTracker {
    #[must_use]
    pub fn needs_bind(&self, category: Category, state_id: StateId) -> bool {
        category
            .stack_index()
            .is_none_or(|i| self.bound[i] != Some(state_id))
    }

    pub fn record(&mut self, category: Category, state_id: StateId) {
        if let Some(i) = category.stack_index() {
            self.bound[i] = Some(state_id);
        }
    }

    /// Forces the next bind of `category`.
    pub fn forget(&mut self, category: Category) {
        if let Some(i) = category.stack_index() {
            self.bound[i] = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_only_on_change() {
        let mut tracker = BindTracker::default();
        let id = StateId::new(4);
        assert!(tracker.needs_bind(Category::Material, id));
        tracker.record(Category::Material, id);
        assert!(!tracker.needs_bind(Category::Material, id));
        assert!(tracker.needs_bind(Category::Material, StateId::new(5)));
        assert!(tracker.needs_bind(Category::Texture, id));
        tracker.forget(Category::Material);
        assert!(tracker.needs_bind(Category::Material, id));
    }
}
