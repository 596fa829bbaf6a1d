//! Dirty kinds.
//!
//! The three kinds impose strictly increasing rebuild cost. They are ordered so
//! that `max` yields the pending work after two marks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimal kind of rebuild work pending for a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirtyKind {
    /// Nothing to do.
    #[default]
    Clean,
    /// Values inside built entries changed: re-submit only.
    Image,
    /// Entries need re-keying and re-sorting.
    StateSort,
    /// The set of entries changed: recompile.
    DrawList,
}

impl DirtyKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DirtyKind::Clean => "clean",
            DirtyKind::Image => "imageDirty",
            DirtyKind::StateSort => "stateSortDirty",
            DirtyKind::DrawList => "drawListDirty",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_clean(self) -> bool {
        self == DirtyKind::Clean
    }
}

impl fmt::Display for DirtyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_ordered_by_cost() {
        assert!(DirtyKind::Clean < DirtyKind::Image);
        assert!(DirtyKind::Image < DirtyKind::StateSort);
        assert!(DirtyKind::StateSort < DirtyKind::DrawList);
        assert_eq!(DirtyKind::Image.max(DirtyKind::DrawList), DirtyKind::DrawList);
    }
}
