//! Compiler (Traversal Engine)
//!
//! Depth-first walk of the node tree that maintains the per-category core
//! stacks and hands every reachable geometry leaf to a [`CompileSink`]. The
//! walk knows nothing about what the sink produces: draw compilation
//! ([`DrawSink`](crate::display_list::DrawSink)) and pick compilation
//! ([`PickSink`](crate::pick::PickSink)) share it unchanged.
//!
//! # Traversal
//!
//! ```text
//! visit(node):
//!     pre:   push node core (or category default on config error)
//!     leaf:  snapshot stack tops -> sink.emit
//!     kids:  in list order; incremental passes skip clean children
//!     post:  pop (also when a child failed)
//! ```
//!
//! In an incremental pass only path-dirty and branch-dirty children are
//! entered; below a branch-dirty node everything is. Structural errors abort
//! the pass after the stacks were reset.

use strata_core::{Category, CompileSettings, CoreKey, NodeId, StructuralError};
use strata_scene::cores::{FlagsState, LayerState};
use strata_scene::{CoreRegistry, CoreSnapshot, CoreStackSet, Node, Nodes, StackBalance, StateCore};

use crate::display_list::resolve;

/// A geometry leaf reached by the traversal.
pub struct Drawable<'a> {
    pub node: NodeId,
    pub geometry: CoreKey,
    /// Top of every stacked category.
    pub cores: CoreSnapshot,
    /// Emission sequence number within the pass.
    pub order: u64,
    pub registry: &'a CoreRegistry,
}

impl<'a> Drawable<'a> {
    /// Visible core of `category` (the default core if it is gone).
    #[must_use]
    pub fn core(&self, category: Category) -> Option<&'a StateCore> {
        let key = match category.stack_index() {
            Some(i) => self.cores[i],
            None => self.geometry,
        };
        resolve(self.registry, category, key)
    }

    #[must_use]
    pub fn flags(&self) -> Option<&'a FlagsState> {
        self.core(Category::Flags).and_then(|core| core.data().as_flags())
    }

    #[must_use]
    pub fn layer(&self) -> Option<&'a LayerState> {
        self.core(Category::Layer).and_then(|core| core.data().as_layer())
    }

    /// Nearest flags and layer cores both leave the drawable enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.flags().is_none_or(|flags| flags.enabled) && self.layer_enabled()
    }

    #[must_use]
    pub fn is_pickable(&self) -> bool {
        self.flags().is_none_or(FlagsState::is_pickable) && self.layer_enabled()
    }

    fn layer_enabled(&self) -> bool {
        self.layer().is_none_or(|layer| layer.enabled)
    }
}

/// Consumer of the drawables a traversal reaches.
pub trait CompileSink {
    fn emit(&mut self, drawable: &Drawable<'_>);
}

/// Outcome of one successful traversal.
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    /// Nodes entered, in traversal order.
    pub visited: Vec<NodeId>,
    /// Geometry leaves handed to the sink.
    pub emitted: usize,
    /// Nodes with a configuration error: state nodes fall back to their
    /// default core, geometry nodes emit nothing.
    pub fallbacks: usize,
    /// Deepest level entered (root = 0).
    pub depth: usize,
    pub full: bool,
}

// ============================================================================
// Per-pass context
// ============================================================================

/// State of one compile pass: the core stacks, the depth limit and the
/// statistics gathered so far.
pub struct CompilationContext {
    stacks: CoreStackSet,
    max_depth: usize,
    order: u64,
    stats: CompileStats,
}

impl CompilationContext {
    /// Empty stacks over the registry's default cores.
    #[must_use]
    pub fn new(max_depth: usize, registry: &CoreRegistry, full: bool) -> Self {
        Self {
            stacks: CoreStackSet::new(max_depth, registry.stacked_defaults()),
            max_depth,
            order: 0,
            stats: CompileStats {
                full,
                ..CompileStats::default()
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn stacks(&self) -> &CoreStackSet {
        &self.stacks
    }

    fn visit(
        &mut self,
        nodes: Nodes<'_>,
        registry: &mut CoreRegistry,
        sink: &mut dyn CompileSink,
        id: NodeId,
        depth: usize,
        covered: bool,
    ) -> Result<(), StructuralError> {
        if depth > self.max_depth {
            return Err(StructuralError::DepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        let node = nodes
            .get(id)
            .ok_or_else(|| StructuralError::Corrupted(format!("dangling child {id:?}")))?;
        self.stats.visited.push(id);
        self.stats.depth = self.stats.depth.max(depth);
        let covered = covered || node.is_branch_dirty();

        let pushed = self.pre_visit(node, registry, sink)?;
        let result = self.visit_children(nodes, registry, sink, node, depth, covered);
        if let Some(category) = pushed {
            self.stacks.pop(category);
        }
        result
    }

    fn visit_children(
        &mut self,
        nodes: Nodes<'_>,
        registry: &mut CoreRegistry,
        sink: &mut dyn CompileSink,
        node: &Node,
        depth: usize,
        covered: bool,
    ) -> Result<(), StructuralError> {
        for &child in node.children() {
            let enter = covered || nodes.get(child).is_none_or(|c| c.is_dirty() || c.is_branch_dirty());
            if enter {
                self.visit(nodes, registry, sink, child, depth + 1, covered)?;
            }
        }
        Ok(())
    }

    /// Pushes the node's core or emits its geometry. Returns the category
    /// pushed.
    fn pre_visit(
        &mut self,
        node: &Node,
        registry: &mut CoreRegistry,
        sink: &mut dyn CompileSink,
    ) -> Result<Option<Category>, StructuralError> {
        let Some(category) = node.category() else {
            return Ok(None);
        };
        let core = match node.core() {
            Some(core) if registry.contains(core) => Some(core),
            Some(core) => {
                return Err(StructuralError::Corrupted(format!(
                    "{:?} references released core {core:?}",
                    node.id()
                )));
            }
            None => {
                self.stats.fallbacks += 1;
                if let Some(error) = node.config_error() {
                    log::warn!("{:?} ('{}') falls back to the default {category} core: {error}", node.id(), node.type_name());
                }
                None
            }
        };

        if category == Category::Geometry {
            if let Some(geometry) = core {
                let drawable = Drawable {
                    node: node.id(),
                    geometry,
                    cores: self.stacks.snapshot(),
                    order: self.order,
                    registry: &*registry,
                };
                self.order += 1;
                self.stats.emitted += 1;
                sink.emit(&drawable);
            }
            return Ok(None);
        }

        let core = core.unwrap_or_else(|| registry.default_core(category));
        if category == Category::Xform {
            let enclosing = self.stacks.top(Category::Xform);
            let parent = (enclosing != registry.default_core(Category::Xform)).then_some(enclosing);
            registry.link_xform(core, parent);
        }
        self.stacks.push(category, core)?;
        Ok(Some(category))
    }
}

// ============================================================================
// Compiler
// ============================================================================

/// Runs compile passes and keeps the stack balance of the last one.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    settings: CompileSettings,
    last_balance: StackBalance,
    passes: u64,
}

impl Compiler {
    #[must_use]
    pub fn new(settings: CompileSettings) -> Self {
        Self {
            settings,
            last_balance: StackBalance::default(),
            passes: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CompileSettings {
        &self.settings
    }

    /// Push/pop counters of the most recent pass, successful or not.
    #[inline]
    #[must_use]
    pub fn last_balance(&self) -> StackBalance {
        self.last_balance
    }

    #[inline]
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Traverses from the root. `full` enters every node; otherwise only the
    /// dirty paths and dirty branches are entered.
    pub fn compile(
        &mut self,
        nodes: Nodes<'_>,
        registry: &mut CoreRegistry,
        sink: &mut dyn CompileSink,
        full: bool,
    ) -> Result<CompileStats, StructuralError> {
        self.passes += 1;
        let mut context = CompilationContext::new(self.settings.max_depth, registry, full);
        let result = context.visit(nodes, registry, sink, nodes.root(), 0, full);

        self.last_balance = context.stacks.balance();
        context.stacks.reset();

        result?;
        self.last_balance.check()?;
        log::debug!(
            "Compiled {} nodes, {} drawables ({})",
            context.stats.visited.len(),
            context.stats.emitted,
            if full { "full" } else { "incremental" }
        );
        Ok(context.stats)
    }
}
