//! Test doubles for Strata.
//!
//! - [`RecordingBackend`]: a headless [`RenderBackend`] that records every
//!   call, including the uploads a version bump triggers, with switches to
//!   make allocation or binding fail.
//! - [`ManualLoader`]: an [`AssetLoader`] that parks requests until the test
//!   completes or fails them.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use strata_core::{BackendError, Category, CoreKey, GpuHandle, NodeId, StateId};
use strata_render::{DrawCall, RenderBackend, StateKey};
use strata_scene::assets::{AssetCompletion, AssetLoader, LoadRequest};
use strata_scene::{ImageData, StateCore};

// ============================================================================
// Recording backend
// ============================================================================

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BeginFrame,
    Allocate { category: Category, core: CoreKey, handle: GpuHandle },
    Release(GpuHandle),
    Bind { category: Category, state_id: StateId, handle: GpuHandle },
    /// Data re-uploaded because the core's version moved past the last upload.
    Refresh { category: Category, core: CoreKey, version: u64 },
    Draw { node: NodeId, key: StateKey },
    EndFrame,
}

/// Headless backend recording every call.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    next_handle: u64,
    live: FxHashSet<GpuHandle>,
    /// Core version last uploaded per handle.
    uploaded: FxHashMap<GpuHandle, u64>,
    /// Categories whose allocation fails.
    pub fail_allocation: FxHashSet<Category>,
    pub fail_bind: FxHashSet<Category>,
}

impl RecordingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes drawn, in call order.
    #[must_use]
    pub fn draws(&self) -> Vec<NodeId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw { node, .. } => Some(*node),
                _ => None,
            })
            .collect()
    }

    /// Binds issued for `category`, as state ids.
    #[must_use]
    pub fn binds(&self, category: Category) -> Vec<StateId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Bind { category: c, state_id, .. } if *c == category => Some(*state_id),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn allocations(&self) -> usize {
        self.calls.iter().filter(|call| matches!(call, Call::Allocate { .. })).count()
    }

    #[must_use]
    pub fn releases(&self) -> Vec<GpuHandle> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Release(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    /// Cores re-uploaded after a value edit, in call order.
    #[must_use]
    pub fn refreshes(&self) -> Vec<(Category, CoreKey)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Refresh { category, core, .. } => Some((*category, *core)),
                _ => None,
            })
            .collect()
    }

    /// Handles allocated and not yet released.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl RecordingBackend {
    fn upload_if_newer(&mut self, category: Category, core: &StateCore, handle: GpuHandle) {
        let version = core.version();
        let seen = self.uploaded.get(&handle).copied().unwrap_or_default();
        if version.is_newer_than(seen) {
            self.uploaded.insert(handle, version.get());
            self.calls.push(Call::Refresh {
                category,
                core: core.key(),
                version: version.get(),
            });
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn begin_frame(&mut self) {
        self.calls.push(Call::BeginFrame);
    }

    fn allocate(&mut self, core: &StateCore) -> Result<GpuHandle, BackendError> {
        if self.fail_allocation.contains(&core.category()) {
            return Err(BackendError::Allocation(format!("{} allocation disabled", core.category())));
        }
        self.next_handle += 1;
        let handle = GpuHandle(self.next_handle);
        self.live.insert(handle);
        self.uploaded.insert(handle, core.version().get());
        self.calls.push(Call::Allocate {
            category: core.category(),
            core: core.key(),
            handle,
        });
        Ok(handle)
    }

    fn release(&mut self, handle: GpuHandle) {
        self.uploaded.remove(&handle);
        if !self.live.remove(&handle) {
            log::warn!("Release of unknown handle {handle:?}");
        }
        self.calls.push(Call::Release(handle));
    }

    fn bind(&mut self, category: Category, core: &StateCore, handle: GpuHandle) -> Result<(), BackendError> {
        if self.fail_bind.contains(&category) {
            return Err(BackendError::Bind {
                category,
                reason: "bind disabled".to_string(),
            });
        }
        self.upload_if_newer(category, core, handle);
        self.calls.push(Call::Bind {
            category,
            state_id: core.state_id(),
            handle,
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), BackendError> {
        self.upload_if_newer(Category::Geometry, call.geometry, call.handle);
        self.calls.push(Call::Draw {
            node: call.node,
            key: call.key,
        });
        Ok(())
    }

    fn end_frame(&mut self) {
        self.calls.push(Call::EndFrame);
    }
}

// ============================================================================
// Manual asset loader
// ============================================================================

/// Loader that parks requests. Clones share the same queue, so a test keeps
/// one clone while the scene owns the other.
#[derive(Debug, Clone, Default)]
pub struct ManualLoader {
    parked: Arc<Mutex<Vec<(LoadRequest, AssetCompletion)>>>,
}

impl ManualLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// URIs requested and not yet answered.
    #[must_use]
    pub fn pending(&self) -> Vec<String> {
        self.parked.lock().iter().map(|(request, _)| request.uri.clone()).collect()
    }

    /// Completes every parked request for `uri`. Returns how many.
    pub fn complete(&self, uri: &str, image: &ImageData) -> usize {
        let completions = self.take(uri);
        let count = completions.len();
        for completion in completions {
            completion.complete(image.clone());
        }
        count
    }

    /// Fails every parked request for `uri`. Returns how many.
    pub fn fail(&self, uri: &str, reason: &str) -> usize {
        let completions = self.take(uri);
        let count = completions.len();
        for completion in completions {
            completion.fail(reason);
        }
        count
    }

    fn take(&self, uri: &str) -> Vec<AssetCompletion> {
        let mut parked = self.parked.lock();
        let (matching, rest): (Vec<_>, Vec<_>) = parked.drain(..).partition(|(request, _)| request.uri == uri);
        *parked = rest;
        matching.into_iter().map(|(_, completion)| completion).collect()
    }
}

impl AssetLoader for ManualLoader {
    fn load(&mut self, request: LoadRequest, completion: AssetCompletion) {
        self.parked.lock().push((request, completion));
    }
}
