//! Dirty Propagation Tracker
//!
//! Scene-level record of the cheapest sufficient rebuild action. Node-level
//! path and branch flags live on the nodes themselves; the scene sets them in
//! `Scene::mark_structure_dirty`.
//!
//! Marks never downgrade pending work. Pending work is consumed only after a
//! compile pass succeeded and its entries were submitted; a failed pass keeps
//! it and forces the next structural pass to walk the whole tree.

use strata_core::DirtyKind;

#[derive(Debug, Clone)]
pub struct DirtyTracker {
    level: DirtyKind,
    force_full: bool,
    /// Structural compiles are never incremental before the first success.
    compiled_once: bool,
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyTracker {
    /// Starts dirty: a fresh scene has never been compiled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: DirtyKind::DrawList,
            force_full: true,
            compiled_once: false,
        }
    }

    /// Raises pending work to at least `kind`. Returns whether the level
    /// changed.
    pub fn raise(&mut self, kind: DirtyKind) -> bool {
        if kind > self.level {
            self.level = kind;
            true
        } else {
            false
        }
    }

    #[inline]
    #[must_use]
    pub fn level(&self) -> DirtyKind {
        self.level
    }

    /// Next structural pass must traverse the full tree.
    #[inline]
    #[must_use]
    pub fn needs_full(&self) -> bool {
        self.force_full || !self.compiled_once
    }

    /// Forces the next pass to be a full structural one.
    pub fn force_full(&mut self) {
        self.force_full = true;
        self.level = DirtyKind::DrawList;
    }

    /// Clears pending work after a committed pass.
    pub fn consume(&mut self) {
        self.level = DirtyKind::Clean;
        self.force_full = false;
        self.compiled_once = true;
    }
}
