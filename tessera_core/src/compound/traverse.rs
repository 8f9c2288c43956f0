// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Child iteration and visitor-based traversal of the compound tree.
//!
//! [`CompoundStore::accept`] walks a subtree depth-first using only the
//! parent and sibling links, so arbitrarily deep trees never grow the call
//! stack. Interior compounds receive [`visit_pre`](CompoundVisitor::visit_pre)
//! on descent and [`visit_post`](CompoundVisitor::visit_post) on ascent,
//! leaves receive [`visit_leaf`](CompoundVisitor::visit_leaf).

use alloc::vec::Vec;

use super::id::{CompoundId, INVALID};
use super::store::CompoundStore;

/// Iterator over the direct children of a compound.
#[derive(Clone, Debug)]
pub struct Children<'a> {
    store: &'a CompoundStore,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a CompoundStore, first: u32) -> Self {
        Self {
            store,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = CompoundId;

    fn next(&mut self) -> Option<CompoundId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.store.next_sibling[idx as usize];
        Some(self.store.id_at(idx))
    }
}

/// Outcome of a single visit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VisitorResult {
    /// Keep going.
    #[default]
    Continue,
    /// Skip the subtree below this compound, continue with its siblings.
    Prune,
    /// Stop the traversal.
    Terminate,
}

/// A read-only traversal callback.
pub trait CompoundVisitor {
    /// Fallback for [`visit_pre`](Self::visit_pre) and
    /// [`visit_leaf`](Self::visit_leaf).
    fn visit(&mut self, store: &CompoundStore, id: CompoundId) -> VisitorResult {
        _ = (store, id);
        VisitorResult::Continue
    }

    /// Called when descending into an interior compound.
    fn visit_pre(&mut self, store: &CompoundStore, id: CompoundId) -> VisitorResult {
        self.visit(store, id)
    }

    /// Called for a compound without children.
    fn visit_leaf(&mut self, store: &CompoundStore, id: CompoundId) -> VisitorResult {
        self.visit(store, id)
    }

    /// Called when leaving an interior compound.
    fn visit_post(&mut self, store: &CompoundStore, id: CompoundId) -> VisitorResult {
        _ = (store, id);
        VisitorResult::Continue
    }
}

/// A traversal callback that may mutate the store.
///
/// Visitors must not change the topology of the tree being walked.
pub trait CompoundVisitorMut {
    /// Fallback for [`visit_pre`](Self::visit_pre) and
    /// [`visit_leaf`](Self::visit_leaf).
    fn visit(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        _ = (store, id);
        VisitorResult::Continue
    }

    /// Called when descending into an interior compound.
    fn visit_pre(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        self.visit(store, id)
    }

    /// Called for a compound without children.
    fn visit_leaf(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        self.visit(store, id)
    }

    /// Called when leaving an interior compound.
    fn visit_post(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        _ = (store, id);
        VisitorResult::Continue
    }
}

trait Step {
    fn store(&self) -> &CompoundStore;
    fn pre(&mut self, id: CompoundId) -> VisitorResult;
    fn leaf(&mut self, id: CompoundId) -> VisitorResult;
    fn post(&mut self, id: CompoundId) -> VisitorResult;
}

struct Shared<'a, V> {
    store: &'a CompoundStore,
    visitor: &'a mut V,
}

impl<V: CompoundVisitor + ?Sized> Step for Shared<'_, V> {
    fn store(&self) -> &CompoundStore {
        self.store
    }

    fn pre(&mut self, id: CompoundId) -> VisitorResult {
        self.visitor.visit_pre(self.store, id)
    }

    fn leaf(&mut self, id: CompoundId) -> VisitorResult {
        self.visitor.visit_leaf(self.store, id)
    }

    fn post(&mut self, id: CompoundId) -> VisitorResult {
        self.visitor.visit_post(self.store, id)
    }
}

struct Exclusive<'a, V> {
    store: &'a mut CompoundStore,
    visitor: &'a mut V,
}

impl<V: CompoundVisitorMut + ?Sized> Step for Exclusive<'_, V> {
    fn store(&self) -> &CompoundStore {
        self.store
    }

    fn pre(&mut self, id: CompoundId) -> VisitorResult {
        self.visitor.visit_pre(self.store, id)
    }

    fn leaf(&mut self, id: CompoundId) -> VisitorResult {
        self.visitor.visit_leaf(self.store, id)
    }

    fn post(&mut self, id: CompoundId) -> VisitorResult {
        self.visitor.visit_post(self.store, id)
    }
}

fn walk(step: &mut impl Step, start: CompoundId) -> VisitorResult {
    step.store().validate(start);
    let start = start.idx;
    if step.store().first_child[start as usize] == INVALID {
        let id = step.store().id_at(start);
        return step.leaf(id);
    }

    let mut result = VisitorResult::Continue;
    let mut current = start;

    loop {
        let store = step.store();
        let parent = store.parent[current as usize];
        let next = store.next_sibling[current as usize];
        let child = store.first_child[current as usize];
        let id = store.id_at(current);

        // Down and right.
        if child == INVALID {
            match step.leaf(id) {
                VisitorResult::Terminate => return VisitorResult::Terminate,
                VisitorResult::Prune => result = VisitorResult::Prune,
                VisitorResult::Continue => {}
            }
            current = next;
        } else {
            match step.pre(id) {
                VisitorResult::Terminate => return VisitorResult::Terminate,
                VisitorResult::Prune => {
                    result = VisitorResult::Prune;
                    match step.post(id) {
                        VisitorResult::Terminate => return VisitorResult::Terminate,
                        VisitorResult::Prune | VisitorResult::Continue => {}
                    }
                    if current == start {
                        return result;
                    }
                    current = next;
                }
                VisitorResult::Continue => current = child,
            }
        }

        // Up and right.
        let mut parent = parent;
        while current == INVALID {
            current = parent;
            let store = step.store();
            parent = store.parent[current as usize];
            let next = store.next_sibling[current as usize];
            let id = store.id_at(current);

            match step.post(id) {
                VisitorResult::Terminate => return VisitorResult::Terminate,
                VisitorResult::Prune => result = VisitorResult::Prune,
                VisitorResult::Continue => {}
            }

            if current == start {
                return result;
            }
            current = next;
        }
    }
}

impl CompoundStore {
    /// Walks the subtree rooted at `id` with a read-only visitor.
    ///
    /// Children are visited in their stored order. Returns
    /// [`Terminate`](VisitorResult::Terminate) if any callback terminated,
    /// [`Prune`](VisitorResult::Prune) if any callback pruned, and
    /// [`Continue`](VisitorResult::Continue) otherwise.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn accept<V: CompoundVisitor + ?Sized>(&self, id: CompoundId, visitor: &mut V) -> VisitorResult {
        walk(
            &mut Shared {
                store: self,
                visitor,
            },
            id,
        )
    }

    /// Walks the subtree rooted at `id` with a mutating visitor.
    ///
    /// Same order and result semantics as [`accept`](Self::accept).
    pub fn accept_mut<V: CompoundVisitorMut + ?Sized>(
        &mut self,
        id: CompoundId,
        visitor: &mut V,
    ) -> VisitorResult {
        walk(
            &mut Exclusive {
                store: self,
                visitor,
            },
            id,
        )
    }

    /// Returns the leaves below `id` in traversal order, `id` itself if it
    /// is a leaf.
    #[must_use]
    pub fn leaves(&self, id: CompoundId) -> Vec<CompoundId> {
        struct Leaves(Vec<CompoundId>);
        impl CompoundVisitor for Leaves {
            fn visit_leaf(&mut self, _: &CompoundStore, id: CompoundId) -> VisitorResult {
                self.0.push(id);
                VisitorResult::Continue
            }
        }
        let mut leaves = Leaves(Vec::new());
        self.accept(id, &mut leaves);
        leaves.0
    }

    /// Returns `id` and every compound below it in traversal order.
    pub(crate) fn subtree(&self, id: CompoundId) -> Vec<CompoundId> {
        struct Subtree(Vec<CompoundId>);
        impl CompoundVisitor for Subtree {
            fn visit(&mut self, _: &CompoundStore, id: CompoundId) -> VisitorResult {
                self.0.push(id);
                VisitorResult::Continue
            }
        }
        let mut subtree = Subtree(Vec::new());
        self.accept(id, &mut subtree);
        subtree.0
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Call {
        Pre(CompoundId),
        Leaf(CompoundId),
        Post(CompoundId),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        prune: Option<CompoundId>,
        terminate: Option<CompoundId>,
    }

    impl Recorder {
        fn answer(&self, id: CompoundId) -> VisitorResult {
            if self.terminate == Some(id) {
                VisitorResult::Terminate
            } else if self.prune == Some(id) {
                VisitorResult::Prune
            } else {
                VisitorResult::Continue
            }
        }
    }

    impl CompoundVisitor for Recorder {
        fn visit_pre(&mut self, _: &CompoundStore, id: CompoundId) -> VisitorResult {
            self.calls.push(Call::Pre(id));
            self.answer(id)
        }

        fn visit_leaf(&mut self, _: &CompoundStore, id: CompoundId) -> VisitorResult {
            self.calls.push(Call::Leaf(id));
            self.answer(id)
        }

        fn visit_post(&mut self, _: &CompoundStore, id: CompoundId) -> VisitorResult {
            self.calls.push(Call::Post(id));
            VisitorResult::Continue
        }
    }

    /// root { a { a1, a2 }, b }
    fn tree() -> (CompoundStore, [CompoundId; 5]) {
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        let a = store.create_child(root);
        let a1 = store.create_child(a);
        let a2 = store.create_child(a);
        let b = store.create_child(root);
        (store, [root, a, a1, a2, b])
    }

    #[test]
    fn visits_every_compound_in_order() {
        let (store, [root, a, a1, a2, b]) = tree();
        let mut rec = Recorder::default();
        assert_eq!(store.accept(root, &mut rec), VisitorResult::Continue);
        assert_eq!(
            rec.calls,
            [
                Call::Pre(root),
                Call::Pre(a),
                Call::Leaf(a1),
                Call::Leaf(a2),
                Call::Post(a),
                Call::Leaf(b),
                Call::Post(root),
            ]
        );
    }

    #[test]
    fn prune_skips_subtree_and_reports() {
        let (store, [root, a, _, _, b]) = tree();
        let mut rec = Recorder {
            prune: Some(a),
            ..Recorder::default()
        };
        assert_eq!(store.accept(root, &mut rec), VisitorResult::Prune);
        assert_eq!(
            rec.calls,
            [
                Call::Pre(root),
                Call::Pre(a),
                Call::Post(a),
                Call::Leaf(b),
                Call::Post(root),
            ]
        );
    }

    #[test]
    fn terminate_stops_immediately() {
        let (store, [root, a, a1, _, _]) = tree();
        let mut rec = Recorder {
            terminate: Some(a1),
            ..Recorder::default()
        };
        assert_eq!(store.accept(root, &mut rec), VisitorResult::Terminate);
        assert_eq!(rec.calls, [Call::Pre(root), Call::Pre(a), Call::Leaf(a1)]);
    }

    #[test]
    fn subtree_lists_interior_and_leaves() {
        let (store, [root, a, a1, a2, b]) = tree();
        assert_eq!(store.subtree(a), [a, a1, a2]);
        assert_eq!(store.subtree(root), [root, a, a1, a2, b]);
        assert_eq!(store.subtree(b), [b]);
    }

    #[test]
    fn subtree_walk_stays_inside_subtree() {
        let (store, [_, a, a1, a2, _]) = tree();
        let mut rec = Recorder::default();
        store.accept(a, &mut rec);
        assert_eq!(
            rec.calls,
            [Call::Pre(a), Call::Leaf(a1), Call::Leaf(a2), Call::Post(a)]
        );

        let mut rec = Recorder {
            prune: Some(a),
            ..Recorder::default()
        };
        assert_eq!(store.accept(a, &mut rec), VisitorResult::Prune);
        assert_eq!(rec.calls, [Call::Pre(a), Call::Post(a)]);
    }

    #[test]
    fn leaf_start_visits_leaf_only() {
        let (store, [_, _, a1, _, _]) = tree();
        let mut rec = Recorder::default();
        store.accept(a1, &mut rec);
        assert_eq!(rec.calls, [Call::Leaf(a1)]);
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        let mut tip = root;
        for _ in 0..10_000 {
            tip = store.create_child(tip);
        }
        assert_eq!(store.leaves(root), [tip]);
    }

    #[test]
    fn mutable_visitor_sees_same_order() {
        struct Namer(u32);
        impl CompoundVisitorMut for Namer {
            fn visit(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
                store.set_name(id, alloc::format!("n{}", self.0));
                self.0 += 1;
                VisitorResult::Continue
            }
        }
        let (mut store, [root, a, a1, a2, b]) = tree();
        store.accept_mut(root, &mut Namer(0));
        let names: Vec<_> = [root, a, a1, a2, b].iter().map(|id| store.name(*id)).collect();
        assert_eq!(names, ["n0", "n1", "n2", "n3", "n4"]);
    }
}
