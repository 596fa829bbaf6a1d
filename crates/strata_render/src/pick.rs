//! Pick compilation.
//!
//! Same traversal as draw compilation, different output: every pickable
//! drawable (nearest flags core has `picking` and `enabled` set) receives an
//! index colour. The host renders those colours into an offscreen target,
//! reads back the pixel under the cursor and maps it back with
//! [`PickList::lookup`].

use strata_core::NodeId;

use crate::compiler::{CompileSink, Drawable};

/// One pickable drawable and its index colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickEntry {
    pub node: NodeId,
    /// 1-based; 0 is reserved for "nothing".
    pub index: u32,
}

impl PickEntry {
    /// Index encoded as RGBA8, red holding the lowest byte.
    #[must_use]
    pub fn color(&self) -> [u8; 4] {
        let [r, g, b, _] = self.index.to_le_bytes();
        [r, g, b, 255]
    }
}

/// Result of a pick pass.
#[derive(Debug, Clone, Default)]
pub struct PickList {
    entries: Vec<PickEntry>,
}

impl PickList {
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[PickEntry] {
        &self.entries
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Node drawn with `color`, if any.
    #[must_use]
    pub fn lookup(&self, color: [u8; 4]) -> Option<NodeId> {
        let index = u32::from_le_bytes([color[0], color[1], color[2], 0]);
        let slot = usize::try_from(index).ok()?.checked_sub(1)?;
        self.entries.get(slot).map(|entry| entry.node)
    }
}

/// Sink assigning consecutive index colours.
#[derive(Debug, Default)]
pub struct PickSink {
    list: PickList,
}

impl PickSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn finish(self) -> PickList {
        self.list
    }
}

impl CompileSink for PickSink {
    fn emit(&mut self, drawable: &Drawable<'_>) {
        if !drawable.is_pickable() {
            return;
        }
        let index = self.list.entries.len() as u32 + 1;
        self.list.entries.push(PickEntry {
            node: drawable.node,
            index,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn colors_map_back_to_nodes() {
        let mut ids: SlotMap<NodeId, ()> = SlotMap::with_key();
        let a = ids.insert(());
        let b = ids.insert(());
        let list = PickList {
            entries: vec![PickEntry { node: a, index: 1 }, PickEntry { node: b, index: 2 }],
        };
        assert_eq!(list.lookup(list.entries()[1].color()), Some(b));
        assert_eq!(list.lookup([0, 0, 0, 255]), None);
        assert_eq!(list.lookup([9, 0, 0, 255]), None);
    }

    #[test]
    fn index_spans_three_channels() {
        let entry = PickEntry {
            node: NodeId::default(),
            index: 0x01_02_03,
        };
        assert_eq!(entry.color(), [3, 2, 1, 255]);
    }
}
