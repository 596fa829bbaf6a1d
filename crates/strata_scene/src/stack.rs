//! Core Stack Set
//!
//! One fixed-capacity stack per stacked category. The traversal pushes a
//! state-defining node's core before visiting its children and pops it on the
//! way out, so `top()` is always the nearest enclosing core, or the category's
//! default core when nothing encloses the current node.
//!
//! Capacity equals the maximum supported tree depth; exceeding it is a
//! structural error, never a reallocation.

use smallvec::SmallVec;
use strata_core::{Category, CoreKey, STACKED_CATEGORY_COUNT, StructuralError};

/// Tops of every stacked category, in [`Category::STACKED`] order.
pub type CoreSnapshot = [CoreKey; STACKED_CATEGORY_COUNT];

/// Push/pop counters of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackBalance {
    pub pushes: [u64; STACKED_CATEGORY_COUNT],
    pub pops: [u64; STACKED_CATEGORY_COUNT],
    /// Pops attempted on an empty stack.
    pub underflows: u64,
}

impl StackBalance {
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.pushes == self.pops && self.underflows == 0
    }

    /// First category whose counters diverge.
    pub fn check(&self) -> Result<(), StructuralError> {
        for (i, category) in Category::STACKED.iter().enumerate() {
            if self.pushes[i] != self.pops[i] {
                return Err(StructuralError::UnbalancedStack {
                    category: *category,
                    pushes: self.pushes[i],
                    pops: self.pops[i],
                });
            }
        }
        Ok(())
    }
}

struct CoreStack {
    items: SmallVec<[CoreKey; 16]>,
    default: CoreKey,
}

/// Per-category core stacks of one compile pass.
pub struct CoreStackSet {
    stacks: [CoreStack; STACKED_CATEGORY_COUNT],
    capacity: usize,
    balance: StackBalance,
}

impl CoreStackSet {
    /// `defaults` are the bottom-of-stack cores, in [`Category::STACKED`] order.
    #[must_use]
    pub fn new(capacity: usize, defaults: CoreSnapshot) -> Self {
        Self {
            stacks: defaults.map(|default| CoreStack {
                items: SmallVec::with_capacity(capacity.min(64)),
                default,
            }),
            capacity,
            balance: StackBalance::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot(category: Category) -> Result<usize, StructuralError> {
        category
            .stack_index()
            .ok_or_else(|| StructuralError::Corrupted(format!("{category} cores are not stacked")))
    }

    /// Pushes `core` for `category`. Past capacity nothing is pushed and
    /// nothing is counted.
    pub fn push(&mut self, category: Category, core: CoreKey) -> Result<(), StructuralError> {
        let i = Self::slot(category)?;
        let stack = &mut self.stacks[i];
        if stack.items.len() >= self.capacity {
            return Err(StructuralError::DepthExceeded {
                depth: stack.items.len() + 1,
                max: self.capacity,
            });
        }
        stack.items.push(core);
        self.balance.pushes[i] += 1;
        Ok(())
    }

    /// Pops the top core of `category`. An empty stack stays empty; the
    /// underflow is logged and counted.
    pub fn pop(&mut self, category: Category) -> Option<CoreKey> {
        let i = category.stack_index()?;
        match self.stacks[i].items.pop() {
            Some(core) => {
                self.balance.pops[i] += 1;
                Some(core)
            }
            None => {
                self.balance.underflows += 1;
                log::warn!("Pop on empty {category} stack ignored");
                None
            }
        }
    }

    /// Visible core of `category`, the default core when the stack is empty.
    #[must_use]
    pub fn top(&self, category: Category) -> CoreKey {
        match category.stack_index() {
            Some(i) => {
                let stack = &self.stacks[i];
                stack.items.last().copied().unwrap_or(stack.default)
            }
            None => {
                log::warn!("{category} has no stack; top() is undefined");
                CoreKey::default()
            }
        }
    }

    #[must_use]
    pub fn depth(&self, category: Category) -> usize {
        category.stack_index().map_or(0, |i| self.stacks[i].items.len())
    }

    /// Tops of all stacks in fixed category order.
    #[must_use]
    pub fn snapshot(&self) -> CoreSnapshot {
        std::array::from_fn(|i| {
            let stack = &self.stacks[i];
            stack.items.last().copied().unwrap_or(stack.default)
        })
    }

    /// Counters accumulated since the last [`reset`](Self::reset).
    #[must_use]
    pub fn balance(&self) -> StackBalance {
        self.balance
    }

    /// Empties every stack and clears the counters.
    pub fn reset(&mut self) {
        for stack in &mut self.stacks {
            stack.items.clear();
        }
        self.balance = StackBalance::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<CoreKey> {
        let mut map: SlotMap<CoreKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn stacks(capacity: usize) -> (CoreStackSet, Vec<CoreKey>) {
        let k = keys(STACKED_CATEGORY_COUNT + 4);
        let defaults: CoreSnapshot = std::array::from_fn(|i| k[i]);
        (CoreStackSet::new(capacity, defaults), k[STACKED_CATEGORY_COUNT..].to_vec())
    }

    #[test]
    fn empty_stack_yields_default() {
        let (set, _) = stacks(4);
        for (i, category) in Category::STACKED.iter().enumerate() {
            assert_eq!(set.top(*category), set.snapshot()[i]);
        }
    }

    #[test]
    fn pop_restores_previous_top() {
        let (mut set, k) = stacks(4);
        let default = set.top(Category::Material);
        set.push(Category::Material, k[0]).unwrap();
        set.push(Category::Material, k[1]).unwrap();
        assert_eq!(set.top(Category::Material), k[1]);
        set.pop(Category::Material);
        assert_eq!(set.top(Category::Material), k[0]);
        set.pop(Category::Material);
        assert_eq!(set.top(Category::Material), default);
        assert!(set.balance().is_balanced());
    }

    #[test]
    fn overflow_is_structural_and_not_counted() {
        let (mut set, k) = stacks(1);
        set.push(Category::Texture, k[0]).unwrap();
        let err = set.push(Category::Texture, k[1]).unwrap_err();
        assert_eq!(err, StructuralError::DepthExceeded { depth: 2, max: 1 });
        assert_eq!(set.balance().pushes[Category::Texture.index()], 1);
    }

    #[test]
    fn underflow_keeps_default_visible() {
        let (mut set, _) = stacks(2);
        let default = set.top(Category::Fog);
        assert_eq!(set.pop(Category::Fog), None);
        assert_eq!(set.top(Category::Fog), default);
        assert_eq!(set.balance().underflows, 1);
        assert!(!set.balance().is_balanced());
    }

    #[test]
    fn unbalanced_counters_name_the_category() {
        let (mut set, k) = stacks(2);
        set.push(Category::Lights, k[0]).unwrap();
        let err = set.balance().check().unwrap_err();
        assert!(matches!(err, StructuralError::UnbalancedStack { category: Category::Lights, pushes: 1, pops: 0 }));
    }

    #[test]
    fn geometry_cannot_be_pushed() {
        let (mut set, k) = stacks(2);
        assert!(matches!(set.push(Category::Geometry, k[0]), Err(StructuralError::Corrupted(_))));
    }
}
