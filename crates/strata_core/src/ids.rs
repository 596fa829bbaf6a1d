//! Identifiers shared across the engine.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use slotmap::new_key_type;

new_key_type! {
    /// Generational handle of a scene node. Stale handles never alias a newer node.
    pub struct NodeId;
    /// Generational handle of a state core inside a registry.
    pub struct CoreKey;
}

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique scene identifier, carried on every bus event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u32);

impl SceneId {
    /// Allocates the next scene id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// Monotonic state identifier of a core.
///
/// Used as the cheap "did this category change since the last draw" check when
/// submitting. Ids are never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StateId(u64);

impl StateId {
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic [`StateId`] source. One per registry.
#[derive(Debug)]
pub struct StateIdAllocator {
    next: u64,
}

impl StateIdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> StateId {
        let id = StateId(self.next);
        self.next += 1;
        id
    }
}

impl Default for StateIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle to a resource owned by the rendering backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuHandle(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ids_are_monotonic() {
        let mut alloc = StateIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert!(b > a);
    }

    #[test]
    fn scene_ids_are_unique() {
        assert_ne!(SceneId::next(), SceneId::next());
    }
}
