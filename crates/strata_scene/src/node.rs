use smallvec::SmallVec;
use strata_core::{Category, ConfigError, CoreKey, NodeId};

/// Lifecycle of a live node. Destroyed nodes leave the tree and their ids go
/// stale, so there is no variant for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Inserted, not yet seen by a successful compile.
    #[default]
    Created,
    /// Compiled and unchanged since.
    Active,
    /// Touched since the last successful compile that visited it.
    Dirty,
}

/// A vertex of the scene tree.
///
/// Nodes are stored in the scene's slot map and referenced by [`NodeId`];
/// the parent link is a plain id so destroyed parents can never be reached
/// through a child.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) sid: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) type_name: String,
    pub(crate) category: Option<Category>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) core: Option<CoreKey>,
    pub(crate) config_error: Option<ConfigError>,
    /// Self or a descendant changed structurally.
    pub(crate) dirty: bool,
    /// Whole subtree must be recompiled.
    pub(crate) branch_dirty: bool,
    pub(crate) lifecycle: Lifecycle,
}

impl Node {
    pub(crate) fn new(id: NodeId, type_name: &str, category: Option<Category>) -> Self {
        Self {
            id,
            sid: None,
            name: None,
            type_name: type_name.to_string(),
            category,
            parent: None,
            children: SmallVec::new(),
            core: None,
            config_error: None,
            dirty: false,
            branch_dirty: false,
            lifecycle: Lifecycle::Created,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Category the node defines state for; `None` for plain group nodes.
    #[inline]
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        self.category
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The node's own core. `None` for group nodes and for nodes whose
    /// configuration failed (those use their category's default core).
    #[inline]
    #[must_use]
    pub fn core(&self) -> Option<CoreKey> {
        self.core
    }

    #[inline]
    #[must_use]
    pub fn config_error(&self) -> Option<&ConfigError> {
        self.config_error.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_geometry(&self) -> bool {
        self.category == Some(Category::Geometry)
    }

    /// Pushes a core during traversal.
    #[inline]
    #[must_use]
    pub fn is_state_defining(&self) -> bool {
        self.category.is_some_and(Category::is_stacked)
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    #[must_use]
    pub fn is_branch_dirty(&self) -> bool {
        self.branch_dirty
    }

    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}
