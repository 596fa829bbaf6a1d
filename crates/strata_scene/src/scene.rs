//! The node tree of one scene.
//!
//! [`Scene`] owns the nodes (in a generational slot map), the scene's
//! [`CoreRegistry`], its [`DirtyTracker`], its [`EventBus`] and the queue of
//! asynchronous asset completions.
//!
//! # Structure changes
//!
//! - [`Scene::add_node`] / [`Scene::insert_node`] build a whole description
//!   subtree. A node whose configuration is invalid is still created: the
//!   error is logged and recorded, and the node draws with its category's
//!   default core.
//! - [`Scene::remove_node`] destroys post-order (children first, then the
//!   node's own core reference), detaches from the parent and reports
//!   `NodeDestroyed` for each node.
//! - [`Scene::attach`] moves a subtree, refusing cycles.
//!
//! Every structure change marks the affected node structure-dirty. Value
//! changes go through [`SceneNode`](crate::wrapper::SceneNode) setters.

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::SlotMap;
use strata_core::{
    Category, ConfigError, CoreKey, DirtyKind, EventBus, NodeId, Result, SceneEvent, SceneId, StrataError,
    StructuralError,
};

use crate::assets::{AssetLoader, AssetQueue, LoadRequest};
use crate::cores::{ConfigKey, CoreData, GpuSlot};
use crate::desc::{CoreSource, NodeDesc};
use crate::dirty::DirtyTracker;
use crate::node::{Lifecycle, Node};
use crate::node_type::{NodeTypeRegistry, typed_config_key};
use crate::registry::{CoreRegistry, Release};
use crate::wrapper::SceneNode;

/// A scene behind the single coarse per-scene lock used by multi-threaded
/// hosts.
pub type SharedScene = Arc<Mutex<Scene>>;

/// How a core mutation affects the display list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreChange {
    /// Values only; the hash decides between re-submit and re-sort.
    Value,
    /// Changes which drawables exist.
    Structure,
}

/// Read-only view of the node storage, handed out next to the mutable
/// registry while compiling.
#[derive(Clone, Copy)]
pub struct Nodes<'a> {
    nodes: &'a SlotMap<NodeId, Node>,
    root: NodeId,
}

impl<'a> Nodes<'a> {
    #[inline]
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&'a Node> {
        self.nodes.get(id)
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub struct Scene {
    id: SceneId,
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    registry: CoreRegistry,
    dirty: DirtyTracker,
    types: NodeTypeRegistry,
    events: EventBus,
    assets: AssetQueue,
    epoch: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::with_node_types(NodeTypeRegistry::with_builtins())
    }

    /// Scene resolving descriptions against a custom type registry.
    #[must_use]
    pub fn with_node_types(types: NodeTypeRegistry) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert_with_key(|id| {
            let mut node = Node::new(id, "node", None);
            node.name = Some("root".to_string());
            node
        });
        Self {
            id: SceneId::next(),
            nodes,
            root,
            registry: CoreRegistry::new(),
            dirty: DirtyTracker::new(),
            types,
            events: EventBus::new(),
            assets: AssetQueue::new(),
            epoch: 0,
        }
    }

    /// Wraps the scene in its shared lock.
    #[must_use]
    pub fn into_shared(self) -> SharedScene {
        Arc::new(Mutex::new(self))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn id(&self) -> SceneId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of live nodes, root included.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(Node::children).unwrap_or_default()
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut SlotMap<NodeId, Node> {
        &mut self.nodes
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &CoreRegistry {
        &self.registry
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut CoreRegistry {
        &mut self.registry
    }

    /// Node storage and registry, borrowed together.
    pub fn parts_mut(&mut self) -> (Nodes<'_>, &mut CoreRegistry) {
        (
            Nodes {
                nodes: &self.nodes,
                root: self.root,
            },
            &mut self.registry,
        )
    }

    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[inline]
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Emits `event` on the scene's bus.
    pub fn emit(&mut self, event: SceneEvent) {
        self.events.emit(event);
    }

    #[inline]
    pub fn node_types_mut(&mut self) -> &mut NodeTypeRegistry {
        &mut self.types
    }

    /// Bumped by [`Scene::reset`]; renderers drop retained output when it
    /// changes.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Chainable mutation wrapper. Stale ids turn every call into a no-op.
    pub fn node(&mut self, id: NodeId) -> SceneNode<'_> {
        SceneNode::new(self, id)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[must_use]
    pub fn find_child_by_sid(&self, parent: NodeId, sid: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.nodes.get(child).and_then(Node::sid) == Some(sid))
    }

    /// Resolves a `/`-separated SID path from the root.
    #[must_use]
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self.root, |node, sid| self.find_child_by_sid(node, sid))
    }

    /// First node in traversal order carrying `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .find(|&id| self.nodes.get(id).and_then(Node::name) == Some(name))
    }

    /// Pre-order iterator over the nodes below `id` (excluding `id`).
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { scene: self, stack }
    }

    /// Whether `ancestor` lies on the parent chain of `id`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = self.nodes.get(id).and_then(Node::parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(current).and_then(Node::parent);
        }
        false
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Builds `desc` as the last child of `parent`.
    pub fn add_node(&mut self, parent: NodeId, desc: NodeDesc) -> Result<NodeId> {
        let index = self
            .nodes
            .get(parent)
            .ok_or(StrataError::NodeNotFound(parent))?
            .children
            .len();
        self.insert_node(parent, index, desc)
    }

    /// Builds `desc` as child `index` of `parent` (clamped to the end).
    pub fn insert_node(&mut self, parent: NodeId, index: usize, desc: NodeDesc) -> Result<NodeId> {
        if !self.nodes.contains_key(parent) {
            return Err(StrataError::NodeNotFound(parent));
        }
        if let Some(sid) = &desc.sid
            && self.find_child_by_sid(parent, sid).is_some()
        {
            return Err(StrataError::DuplicateSid {
                parent,
                sid: sid.clone(),
            });
        }

        let id = self.build_subtree(parent, desc);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            let index = index.min(parent_node.children.len());
            parent_node.children.insert(index, id);
        }
        self.mark_structure_dirty(id);
        Ok(id)
    }

    fn build_subtree(&mut self, parent: NodeId, desc: NodeDesc) -> NodeId {
        let NodeDesc {
            type_name,
            sid,
            name,
            core_id,
            source,
            children,
        } = desc;

        let id = self.create_node(parent, &type_name, core_id.as_deref(), source);
        if let Some(node) = self.nodes.get_mut(id) {
            node.sid = sid;
            node.name = name;
        }

        for child in children {
            let duplicate = child
                .sid
                .as_deref()
                .is_some_and(|sid| self.find_child_by_sid(id, sid).is_some());
            let mut child = child;
            if duplicate {
                log::warn!(
                    "Duplicate sid '{}' under a '{type_name}' node; sid dropped",
                    child.sid.as_deref().unwrap_or_default()
                );
                child.sid = None;
            }
            let child_id = self.build_subtree(id, child);
            if let Some(node) = self.nodes.get_mut(id) {
                node.children.push(child_id);
            }
        }
        id
    }

    /// Creates one node and acquires its core.
    fn create_node(&mut self, parent: NodeId, type_name: &str, core_id: Option<&str>, source: CoreSource) -> NodeId {
        let (category, acquired) = match source {
            CoreSource::Typed(data) => {
                let category = data.category();
                let key = typed_config_key(&data, core_id);
                (Some(category), Some(self.registry.acquire(category, key, move || Ok(data))))
            }
            CoreSource::Params(params) => match self.types.get(type_name) {
                None => (None, Some(Err(ConfigError::UnknownType(type_name.to_string())))),
                Some(node_type) => match node_type.category() {
                    None => (None, None),
                    Some(category) => {
                        let key = node_type.config_key(core_id, &params);
                        let result = self.registry.acquire(category, key, || node_type.build_core(&params));
                        (Some(category), Some(result))
                    }
                },
            },
        };

        let id = self.nodes.insert_with_key(|id| {
            let mut node = Node::new(id, type_name, category);
            node.parent = Some(parent);
            node
        });

        match acquired {
            None => {}
            Some(Ok(core)) => {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.core = Some(core);
                }
                self.request_asset(id, core);
            }
            Some(Err(error)) => {
                match category {
                    Some(category) => log::warn!("{error}; node uses the default {category} core"),
                    None => log::warn!("{error}; node acts as a plain group"),
                }
                if let Some(node) = self.nodes.get_mut(id) {
                    node.config_error = Some(error);
                }
            }
        }
        id
    }

    /// Asks the loader for the image of a freshly registered core.
    fn request_asset(&mut self, node: NodeId, core: CoreKey) {
        let Some(state) = self.registry.core(core) else {
            return;
        };
        if state.use_count() != 1 || state.gpu() != &GpuSlot::Awaiting {
            return;
        }
        let Some(uri) = state.data().pending_uri().map(str::to_string) else {
            return;
        };
        let request = LoadRequest {
            uri: uri.clone(),
            category: state.category(),
            node,
        };
        if !self.assets.request(request, core) {
            log::warn!("No asset loader installed; '{uri}' stays unresolved");
            self.registry
                .set_gpu(core, GpuSlot::Failed("no asset loader installed".to_string()));
        }
    }

    /// Destroys `id` and its subtree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(StrataError::RootImmutable("removed"));
        }
        let parent = self.nodes.get(id).ok_or(StrataError::NodeNotFound(id))?.parent;

        self.destroy_subtree(id);

        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|child| *child != id);
            }
            self.mark_structure_dirty(parent);
        }
        Ok(())
    }

    /// Post-order destruction: children first, then each node's core.
    fn destroy_subtree(&mut self, id: NodeId) {
        let mut order = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            stack.push((current, true));
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev().map(|&child| (child, false)));
            }
        }

        for current in order {
            let Some(node) = self.nodes.remove(current) else {
                continue;
            };
            if let Some(core) = node.core
                && self.registry.release(core) == Release::Destroyed
            {
                self.assets.cancel(core);
            }
            self.events.emit(SceneEvent::NodeDestroyed {
                scene: self.id,
                node: current,
            });
        }
    }

    /// Moves `child` (with its subtree) to the end of `new_parent`.
    pub fn attach(&mut self, child: NodeId, new_parent: NodeId) -> Result<()> {
        if child == self.root {
            return Err(StrataError::RootImmutable("re-parented"));
        }
        if !self.nodes.contains_key(new_parent) {
            return Err(StrataError::NodeNotFound(new_parent));
        }
        let node = self.nodes.get(child).ok_or(StrataError::NodeNotFound(child))?;
        if child == new_parent || self.is_ancestor(child, new_parent) {
            return Err(StructuralError::CycleDetected {
                child,
                parent: new_parent,
            }
            .into());
        }
        if let Some(sid) = node.sid.clone()
            && self
                .find_child_by_sid(new_parent, &sid)
                .is_some_and(|existing| existing != child)
        {
            return Err(StrataError::DuplicateSid {
                parent: new_parent,
                sid,
            });
        }

        let old_parent = node.parent;
        if let Some(old) = old_parent {
            if let Some(old_node) = self.nodes.get_mut(old) {
                old_node.children.retain(|c| *c != child);
            }
            self.mark_structure_dirty(old);
        }
        if let Some(parent_node) = self.nodes.get_mut(new_parent) {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = Some(new_parent);
        }
        self.mark_structure_dirty(child);
        Ok(())
    }

    /// Destroys every node below the root.
    pub fn reset(&mut self) {
        let children: Vec<NodeId> = self.children(self.root).to_vec();
        for child in children {
            self.destroy_subtree(child);
        }
        if let Some(root) = self.nodes.get_mut(self.root) {
            root.children.clear();
        }
        self.epoch += 1;
        self.events.emit(SceneEvent::SceneReset { scene: self.id });
        self.dirty.force_full();
        self.mark_structure_dirty(self.root);
    }

    // ========================================================================
    // Dirty marking
    // ========================================================================

    /// Flags `id` branch-dirty and the path up to the first already-dirty
    /// ancestor, and raises the scene to [`DirtyKind::DrawList`].
    pub fn mark_structure_dirty(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.branch_dirty = true;
        node.dirty = true;
        touch(node);

        let mut cursor = node.parent;
        while let Some(current) = cursor {
            let Some(ancestor) = self.nodes.get_mut(current) else {
                break;
            };
            if ancestor.dirty {
                break;
            }
            ancestor.dirty = true;
            touch(ancestor);
            cursor = ancestor.parent;
        }
        self.raise(DirtyKind::DrawList);
    }

    pub fn mark_state_sort_dirty(&mut self) {
        self.raise(DirtyKind::StateSort);
    }

    pub fn mark_image_dirty(&mut self) {
        self.raise(DirtyKind::Image);
    }

    fn raise(&mut self, kind: DirtyKind) {
        if self.dirty.raise(kind) {
            self.events.emit(SceneEvent::DirtyRaised { scene: self.id, kind });
        }
    }

    #[inline]
    #[must_use]
    pub fn dirty_level(&self) -> DirtyKind {
        self.dirty.level()
    }

    /// Whether the next structural pass must walk the full tree.
    #[inline]
    #[must_use]
    pub fn needs_full_compile(&self) -> bool {
        self.dirty.needs_full()
    }

    /// Mutates the core of `id` and marks the dirt the change implies.
    ///
    /// Returns the mark raised, or `None` when nothing changed (stale id,
    /// coreless node, declined or invalid update).
    pub fn update_core(
        &mut self,
        id: NodeId,
        change: CoreChange,
        f: impl FnOnce(&mut CoreData) -> bool,
    ) -> Option<DirtyKind> {
        let core = self.nodes.get(id)?.core?;
        let state = self.registry.core(core)?;
        let shared = state.use_count() > 1;
        if shared && matches!(state.config_key(), Some(ConfigKey::Content(_))) {
            return self.fork_core(id, core, f);
        }
        let hash = self.registry.update(core, f)?;

        let kind = match change {
            CoreChange::Structure => {
                self.mark_structure_dirty(id);
                if shared {
                    // Other users of the core sit in clean branches.
                    self.dirty.force_full();
                }
                DirtyKind::DrawList
            }
            CoreChange::Value if hash.changed() => {
                self.mark_state_sort_dirty();
                DirtyKind::StateSort
            }
            CoreChange::Value => {
                self.mark_image_dirty();
                DirtyKind::Image
            }
        };
        Some(kind)
    }

    /// Gives `id` an edited copy of a core it shares by content only; the
    /// other users keep the original. The copy joins an existing core when
    /// the edited content matches one.
    fn fork_core(&mut self, id: NodeId, core: CoreKey, f: impl FnOnce(&mut CoreData) -> bool) -> Option<DirtyKind> {
        let state = self.registry.core(core)?;
        let category = state.category();
        let mut data = state.data().clone();
        if !f(&mut data) {
            return None;
        }
        let key = data.content_key();
        let fork = match self.registry.acquire(category, key, move || Ok(data)) {
            Ok(fork) => fork,
            Err(error) => {
                log::warn!("Rejected {category} update: {error}");
                return None;
            }
        };
        self.registry.release(core);
        if fork == core {
            self.mark_image_dirty();
            return Some(DirtyKind::Image);
        }

        log::debug!("{id:?} forks its shared {category} core");
        if let Some(node) = self.nodes.get_mut(id) {
            node.core = Some(fork);
        }
        self.request_asset(id, fork);
        self.mark_structure_dirty(id);
        Some(DirtyKind::DrawList)
    }

    // ========================================================================
    // Compile hooks
    // ========================================================================

    /// Installs the loader used for image-backed cores.
    pub fn set_asset_loader(&mut self, loader: impl AssetLoader + 'static) {
        self.assets.set_loader(Box::new(loader));
    }

    /// Loads still in flight.
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.assets.pending()
    }

    /// Applies queued asset completions. Called at compile begin, before any
    /// traversal. Returns the number of completions applied.
    pub fn begin_compile(&mut self) -> usize {
        let events = self.assets.drain();
        let applied = events.len();
        for event in events {
            match event.result {
                Ok(image) => {
                    if self.registry.resolve_image(event.core, image) {
                        self.mark_image_dirty();
                    }
                }
                Err(reason) => {
                    log::warn!("Asset load for {:?} failed: {reason}", event.core);
                    self.registry.set_gpu(event.core, GpuSlot::Failed(reason));
                }
            }
        }
        applied
    }

    /// Clears pending work after a pass was compiled and submitted. `visited`
    /// are the nodes the pass traversed.
    pub fn commit_compile(&mut self, visited: &[NodeId]) {
        for &id in visited {
            if let Some(node) = self.nodes.get_mut(id) {
                node.dirty = false;
                node.branch_dirty = false;
                node.lifecycle = Lifecycle::Active;
            }
        }
        self.dirty.consume();
    }

    /// Keeps pending work after a failed pass; the next one walks everything.
    pub fn abort_compile(&mut self) {
        self.dirty.force_full();
    }

    /// Sanity walk from the root: every child link must resolve and point
    /// back to its parent.
    pub fn validate_tree(&self) -> std::result::Result<(), StructuralError> {
        let mut stack = vec![self.root];
        let mut seen = 0_usize;
        while let Some(id) = stack.pop() {
            seen += 1;
            if seen > self.nodes.len() {
                return Err(StructuralError::Corrupted("child links form a cycle".to_string()));
            }
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| StructuralError::Corrupted(format!("dangling child {id:?}")))?;
            for &child in &node.children {
                let child_node = self
                    .nodes
                    .get(child)
                    .ok_or_else(|| StructuralError::Corrupted(format!("dangling child {child:?}")))?;
                if child_node.parent != Some(id) {
                    return Err(StructuralError::Corrupted(format!("{child:?} does not point back to {id:?}")));
                }
                stack.push(child);
            }
        }
        Ok(())
    }

    /// Categories of the cores actually registered, for diagnostics.
    #[must_use]
    pub fn core_count(&self, category: Category) -> usize {
        self.registry
            .iter()
            .filter(|core| core.category() == category && !core.is_default())
            .count()
    }
}

fn touch(node: &mut Node) {
    if node.lifecycle == Lifecycle::Active {
        node.lifecycle = Lifecycle::Dirty;
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("nodes", &self.nodes.len())
            .field("registry", &self.registry)
            .field("dirty", &self.dirty.level())
            .finish_non_exhaustive()
    }
}

/// Pre-order walk produced by [`Scene::descendants`].
pub struct Descendants<'a> {
    scene: &'a Scene,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.scene.children(id).iter().rev().copied());
        Some(id)
    }
}
