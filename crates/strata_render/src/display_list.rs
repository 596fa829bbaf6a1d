//! Display List
//!
//! Flat, render-ready output of a compile pass: one [`DrawEntry`] per enabled
//! drawable, each carrying a snapshot of the cores visible at emission and a
//! composite [`StateKey`].
//!
//! The list is retained between frames. A branch-scoped compile only produces
//! entries for the recompiled branches; [`DisplayList::reconcile`] merges them
//! with the retained entries of untouched branches in tree order.
//!
//! Sorting by state key makes GPU-state-compatible entries contiguous and puts
//! every opaque entry before every transparent one. Within a pass, entries
//! order by layer priority, lowest first. Ties keep traversal order, so sorting
//! is stable and idempotent.

use rustc_hash::FxHashMap;
use strata_core::{Category, CoreKey, NodeId};
use strata_scene::{CoreRegistry, CoreSnapshot, Nodes, StateCore};
use xxhash_rust::xxh3::Xxh3;

use crate::compiler::{CompileSink, Drawable};

// ============================================================================
// State key
// ============================================================================

const TRANSPARENT_BIT: u64 = 1 << 63;
const LAYER_SHIFT: u32 = 47;
const DIGEST_MASK: u64 = (1 << LAYER_SHIFT) - 1;

/// Layer bits of the default layer, priority 0.
pub const DEFAULT_LAYER_BITS: u16 = 0x8000;

/// Composite sort key.
///
/// Bit 63 is the transparency pass, bits 47..63 the biased layer priority
/// and the low 47 bits the state digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StateKey(u64);

impl StateKey {
    /// `layer` is a priority biased to sort as unsigned, see
    /// [`LayerState::sort_bits`](strata_scene::cores::LayerState::sort_bits).
    #[must_use]
    pub fn new(transparent: bool, layer: u16, digest: u64) -> Self {
        let bits = (u64::from(layer) << LAYER_SHIFT) | (digest & DIGEST_MASK);
        Self(if transparent { bits | TRANSPARENT_BIT } else { bits })
    }

    /// Key of a drawable that sees `cores` and draws `geometry`.
    ///
    /// Hashes every key-affecting category's core hash in fixed category
    /// order. Image-backed and program categories also hash the core's state
    /// id: two textures with equal binding parameters still bind different
    /// images.
    #[must_use]
    pub fn compute(registry: &CoreRegistry, cores: &CoreSnapshot, geometry: CoreKey) -> Self {
        let mut hasher = Xxh3::new();
        let mut transparent = false;
        let mut layer = DEFAULT_LAYER_BITS;

        for (&category, &key) in Category::STACKED.iter().zip(cores) {
            if !category.affects_state_key() {
                continue;
            }
            let Some(core) = resolve(registry, category, key) else {
                hasher.update(&[0]);
                continue;
            };
            hasher.update(&core.hash().to_le_bytes());
            if matches!(category, Category::Texture | Category::RegionMap | Category::Shader) {
                hasher.update(&core.state_id().get().to_le_bytes());
            }
            if let Some(flags) = core.data().as_flags() {
                transparent = flags.transparent;
            }
            if let Some(state) = core.data().as_layer() {
                layer = state.sort_bits();
            }
        }

        match registry.core(geometry) {
            Some(core) => hasher.update(&core.hash().to_le_bytes()),
            None => hasher.update(&[0]),
        }

        Self::new(transparent, layer, hasher.digest())
    }

    #[inline]
    #[must_use]
    pub fn is_transparent(self) -> bool {
        self.0 & TRANSPARENT_BIT != 0
    }

    #[inline]
    #[must_use]
    pub fn layer_bits(self) -> u16 {
        ((self.0 & !TRANSPARENT_BIT) >> LAYER_SHIFT) as u16
    }

    #[inline]
    #[must_use]
    pub fn bits(self) -> u64 {
        self.0
    }
}

/// The core behind `key`, or the category default when it is gone.
pub(crate) fn resolve(registry: &CoreRegistry, category: Category, key: CoreKey) -> Option<&StateCore> {
    registry
        .core(key)
        .or_else(|| registry.core(registry.default_core(category)))
}

// ============================================================================
// Entries
// ============================================================================

/// One drawable's resolved instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawEntry {
    pub node: NodeId,
    pub geometry: CoreKey,
    /// Top of every stacked category at emission.
    pub cores: CoreSnapshot,
    pub key: StateKey,
    /// Traversal sequence number.
    pub order: u64,
}

impl DrawEntry {
    /// Core this entry uses for `category`.
    #[must_use]
    pub fn core(&self, category: Category) -> CoreKey {
        match category.stack_index() {
            Some(i) => self.cores[i],
            None => self.geometry,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.key.is_transparent()
    }
}

// ============================================================================
// Display list
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    entries: Vec<DrawEntry>,
    sorted: bool,
}

impl DisplayList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: DrawEntry) {
        self.entries.push(entry);
        self.sorted = false;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.sorted = false;
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

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[DrawEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DrawEntry> {
        self.entries.iter()
    }

    pub fn for_each(&self, f: impl FnMut(&DrawEntry)) {
        self.entries.iter().for_each(f);
    }

    #[must_use]
    pub fn find(&self, node: NodeId) -> Option<&DrawEntry> {
        self.entries.iter().find(|entry| entry.node == node)
    }

    /// Whether the last operation left the list in state-key order.
    #[inline]
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Orders entries by state key, breaking ties by traversal order.
    pub fn sort_by_state_key(&mut self) {
        self.entries.sort_by_key(|entry| (entry.key, entry.order));
        self.sorted = true;
    }

    /// Lengths of the runs of consecutive entries sharing a state key.
    #[must_use]
    pub fn state_runs(&self) -> Vec<usize> {
        self.entries.chunk_by(|a, b| a.key == b.key).map(<[DrawEntry]>::len).collect()
    }

    /// Recomputes every key from current core hashes. Returns how many
    /// changed.
    pub fn rekey(&mut self, registry: &CoreRegistry) -> usize {
        let mut changed = 0;
        for entry in &mut self.entries {
            let key = StateKey::compute(registry, &entry.cores, entry.geometry);
            if key != entry.key {
                entry.key = key;
                changed += 1;
            }
        }
        if changed > 0 {
            self.sorted = false;
        }
        changed
    }

    /// Drops the entry of a geometry node.
    pub fn remove_node(&mut self, node: NodeId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.node != node);
        before != self.entries.len()
    }

    /// Rebuilds the list in tree order from `fresh` entries and the retained
    /// ones.
    ///
    /// Inside recompiled branches (every branch when `full`) only fresh
    /// entries survive; elsewhere the retained entry is kept. Entries of nodes
    /// no longer reachable from the root are dropped. Sequence numbers are
    /// renumbered in tree order.
    pub fn reconcile(&mut self, nodes: Nodes<'_>, fresh: Vec<DrawEntry>, full: bool) {
        let mut retained: FxHashMap<NodeId, DrawEntry> = if full {
            self.entries.clear();
            FxHashMap::default()
        } else {
            self.entries.drain(..).map(|entry| (entry.node, entry)).collect()
        };
        let mut fresh: FxHashMap<NodeId, DrawEntry> = fresh.into_iter().map(|entry| (entry.node, entry)).collect();

        let mut stack = vec![(nodes.root(), full)];
        while let Some((id, covered)) = stack.pop() {
            let Some(node) = nodes.get(id) else {
                continue;
            };
            let covered = covered || node.is_branch_dirty();
            if node.is_geometry() {
                let entry = fresh
                    .remove(&id)
                    .or_else(|| if covered { None } else { retained.remove(&id) });
                self.entries.extend(entry);
            }
            stack.extend(node.children().iter().rev().map(|&child| (child, covered)));
        }

        if !fresh.is_empty() {
            log::debug!("{} compiled entries were unreachable and dropped", fresh.len());
        }
        for (order, entry) in self.entries.iter_mut().enumerate() {
            entry.order = order as u64;
        }
        self.sorted = false;
    }
}

/// Sink collecting one entry per enabled drawable.
#[derive(Debug, Default)]
pub struct DrawSink {
    entries: Vec<DrawEntry>,
}

impl DrawSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<DrawEntry> {
        self.entries
    }
}

impl CompileSink for DrawSink {
    fn emit(&mut self, drawable: &Drawable<'_>) {
        if !drawable.is_enabled() {
            return;
        }
        self.entries.push(DrawEntry {
            node: drawable.node,
            geometry: drawable.geometry,
            cores: drawable.cores,
            key: StateKey::compute(drawable.registry, &drawable.cores, drawable.geometry),
            order: drawable.order,
        });
    }
}

impl<'a> IntoIterator for &'a DisplayList {
    type Item = &'a DrawEntry;
    type IntoIter = std::slice::Iter<'a, DrawEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn entry(node: NodeId, key: u64, order: u64) -> DrawEntry {
        DrawEntry {
            node,
            geometry: CoreKey::default(),
            cores: [CoreKey::default(); strata_core::STACKED_CATEGORY_COUNT],
            key: StateKey::new(false, DEFAULT_LAYER_BITS, key),
            order,
        }
    }

    fn nodes(n: usize) -> Vec<NodeId> {
        let mut map: SlotMap<NodeId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn transparent_keys_sort_last() {
        let opaque = StateKey::new(false, u16::MAX, u64::MAX);
        let transparent = StateKey::new(true, 0, 0);
        assert!(opaque < transparent);
        assert!(transparent.is_transparent());
        assert!(!opaque.is_transparent());
    }

    #[test]
    fn layer_orders_before_digest() {
        let low = StateKey::new(false, DEFAULT_LAYER_BITS - 1, u64::MAX);
        let high = StateKey::new(false, DEFAULT_LAYER_BITS, 0);
        assert!(low < high);
        assert_eq!(low.layer_bits(), DEFAULT_LAYER_BITS - 1);
        assert_eq!(StateKey::new(true, 7, 0).layer_bits(), 7);
    }

    #[test]
    fn sort_is_stable_and_idempotent() {
        let ids = nodes(4);
        let mut list = DisplayList::new();
        list.append(entry(ids[0], 2, 0));
        list.append(entry(ids[1], 1, 1));
        list.append(entry(ids[2], 2, 2));
        list.append(entry(ids[3], 1, 3));

        list.sort_by_state_key();
        let once: Vec<NodeId> = list.iter().map(|e| e.node).collect();
        assert_eq!(once, vec![ids[1], ids[3], ids[0], ids[2]]);

        list.sort_by_state_key();
        let twice: Vec<NodeId> = list.iter().map(|e| e.node).collect();
        assert_eq!(once, twice);
        assert_eq!(list.state_runs(), vec![2, 2]);
    }

    #[test]
    fn remove_node_drops_its_entry() {
        let ids = nodes(2);
        let mut list = DisplayList::new();
        list.append(entry(ids[0], 1, 0));
        list.append(entry(ids[1], 1, 1));
        assert!(list.remove_node(ids[0]));
        assert!(!list.remove_node(ids[0]));
        assert_eq!(list.len(), 1);
    }
}
