// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.


//! # Open-Node Queue
//!
//! The set of open subproblems of a branch-and-bound search. Every node is
//! described by its domain-change stack relative to the root, the columns it
//! was branched on, a proven `lower_bound` and a heuristic `estimate`.
//!
//! ## Indices
//!
//! Nodes live in a slot arena and are threaded into several intrusive
//! order-statistic trees (`crate::rbtree`) without extra allocation:
//!
//! - the lower-bound tree, keyed by `(lower_bound, id)`, drives best-first
//!   selection (`pop_best_node`) and bounding;
//! - the estimate tree, keyed by `(0.5 * lower_bound + 0.5 * estimate, id)`,
//!   drives best-estimate selection (`pop_best_bound_node`);
//! - the suboptimal tree holds nodes that can no longer improve the incumbent.
//!   They stay in the queue only so that `best_lower_bound` reports a valid
//!   global dual bound;
//! - per column, the tightest lower and upper bound change of every active node
//!   (`crate::column_index`), giving O(log n) counts of how many open nodes
//!   already branch a column in a given direction.
//!
//! ## Weights
//!
//! A node at depth `d` covers `2^-d` of the search tree. Every operation that
//! inserts or removes nodes reports that weight so that the driver can track
//! the explored fraction of the tree.
//!
//! ## Usage
//!
//! ```rust
//! use keel_mip::domain::DomainChange;
//! use keel_mip::index::ColumnIndex;
//! use keel_mip::node_queue::NodeQueue;
//!
//! let mut queue = NodeQueue::with_num_cols(2);
//! let x = ColumnIndex::new(0);
//!
//! queue.emplace_node(vec![DomainChange::lower(x, 1.0)], vec![x], 3.0, 4.0, 1);
//! queue.emplace_node(vec![DomainChange::upper(x, 0.0)], vec![x], 2.0, 5.0, 1);
//!
//! assert_eq!(queue.num_nodes_up(x), 1);
//! assert_eq!(queue.best_lower_bound(), 2.0);
//!
//! let node = queue.pop_best_node();
//! assert_eq!(node.lower_bound(), 2.0);
//! ```

use crate::column_index::{ColumnBoundIndex, EntryId};
use crate::domain::{BoundKind, DomainChange, GlobalDomain};
use crate::index::{ColumnIndex, NodeIndex};
use crate::rbtree::{LinkStore, OrderStatTree, TreeKey, TreeLinks};
use crate::stats::NodeQueueStatistics;
use keel_core::num::compensated::CompensatedSum;
use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Default tolerance of `NodeQueue::perform_bounding`.
pub const DEFAULT_BOUNDING_TOLERANCE: f64 = 1e-9;

/// Returns the search-tree weight `2^-depth` of a node at `depth`.
#[inline]
pub fn tree_weight(depth: u32) -> f64 {
    // powi takes an i32; depths beyond that are weightless anyway.
    0.5f64.powi(depth.min(i32::MAX as u32) as i32)
}

/// Key of the estimate tree.
#[inline]
fn hybrid_key(lower_bound: f64, estimate: f64) -> f64 {
    if estimate.is_finite() {
        0.5 * lower_bound + 0.5 * estimate
    } else {
        lower_bound
    }
}

/// An open subproblem. Nodes are moved in and out of the queue, never copied.
#[derive(Debug, PartialEq)]
pub struct OpenNode {
    domchgs: Vec<DomainChange>,
    branchings: Vec<ColumnIndex>,
    lower_bound: f64,
    estimate: f64,
    depth: u32,
}

impl OpenNode {
    /// The bound changes that carve this node out of the root domain.
    #[inline]
    pub fn domchgs(&self) -> &[DomainChange] {
        &self.domchgs
    }

    /// The columns branched on along the path from the root.
    #[inline]
    pub fn branchings(&self) -> &[ColumnIndex] {
        &self.branchings
    }

    #[inline]
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    #[inline]
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The fraction of the search tree this node covers.
    #[inline]
    pub fn weight(&self) -> f64 {
        tree_weight(self.depth)
    }

    /// Consumes the node and returns its domain-change stack and branching history.
    #[inline]
    pub fn into_parts(self) -> (Vec<DomainChange>, Vec<ColumnIndex>) {
        (self.domchgs, self.branchings)
    }
}

impl std::fmt::Display for OpenNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OpenNode(depth: {}, lower_bound: {}, estimate: {}, domchgs: {})",
            self.depth,
            self.lower_bound,
            self.estimate,
            self.domchgs.len()
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Free,
    Active,
    Suboptimal,
}

#[derive(Debug)]
struct NodeSlot {
    node: Option<OpenNode>,
    lower_key: f64,
    estim_key: f64,
    /// Links into the lower-bound tree, or the suboptimal tree once demoted.
    lower_links: TreeLinks,
    estim_links: TreeLinks,
    col_entries: Vec<EntryId>,
    state: SlotState,
}

impl NodeSlot {
    fn vacant() -> Self {
        Self {
            node: None,
            lower_key: 0.0,
            estim_key: 0.0,
            lower_links: TreeLinks::default(),
            estim_links: TreeLinks::default(),
            col_entries: Vec::new(),
            state: SlotState::Free,
        }
    }
}

struct LowerView<'a>(&'a mut [NodeSlot]);

impl LinkStore for LowerView<'_> {
    type Key = TreeKey;

    #[inline]
    fn key(&self, id: u32) -> TreeKey {
        TreeKey::new(self.0[id as usize].lower_key, id)
    }

    #[inline]
    fn links(&self, id: u32) -> &TreeLinks {
        &self.0[id as usize].lower_links
    }

    #[inline]
    fn links_mut(&mut self, id: u32) -> &mut TreeLinks {
        &mut self.0[id as usize].lower_links
    }
}

struct EstimView<'a>(&'a mut [NodeSlot]);

impl LinkStore for EstimView<'_> {
    type Key = TreeKey;

    #[inline]
    fn key(&self, id: u32) -> TreeKey {
        TreeKey::new(self.0[id as usize].estim_key, id)
    }

    #[inline]
    fn links(&self, id: u32) -> &TreeLinks {
        &self.0[id as usize].estim_links
    }

    #[inline]
    fn links_mut(&mut self, id: u32) -> &mut TreeLinks {
        &mut self.0[id as usize].estim_links
    }
}

/// The open-node queue of a branch-and-bound search.
#[derive(Debug)]
pub struct NodeQueue {
    slots: Vec<NodeSlot>,
    free_slots: BinaryHeap<Reverse<u32>>,
    lower: OrderStatTree,
    estim: OrderStatTree,
    suboptimal: OrderStatTree,
    num_suboptimal: usize,
    columns: Option<ColumnBoundIndex>,
    optimality_limit: f64,
    bounding_tolerance: f64,
    stats: NodeQueueStatistics,
}

impl Default for NodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeQueue {
    /// Creates an empty queue. The column count must be set with
    /// `set_num_cols` before the first node is emplaced.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: BinaryHeap::new(),
            lower: OrderStatTree::new(),
            estim: OrderStatTree::new(),
            suboptimal: OrderStatTree::new(),
            num_suboptimal: 0,
            columns: None,
            optimality_limit: f64::INFINITY,
            bounding_tolerance: DEFAULT_BOUNDING_TOLERANCE,
            stats: NodeQueueStatistics::default(),
        }
    }

    /// Creates an empty queue for a model with `num_cols` columns.
    pub fn with_num_cols(num_cols: usize) -> Self {
        let mut queue = Self::new();
        queue.set_num_cols(num_cols);
        queue
    }

    /// Creates an empty queue with room for `capacity` nodes.
    pub fn preallocated(num_cols: usize, capacity: usize) -> Self {
        let mut queue = Self::with_num_cols(num_cols);
        queue.slots.reserve(capacity);
        queue
    }

    /// Sets the number of model columns.
    ///
    /// # Panics
    ///
    /// Panics if the queue still holds nodes.
    pub fn set_num_cols(&mut self, num_cols: usize) {
        assert!(
            self.num_nodes() == 0,
            "called `NodeQueue::set_num_cols` on a queue holding {} nodes",
            self.num_nodes()
        );
        self.columns = Some(ColumnBoundIndex::new(num_cols));
    }

    /// Returns the configured column count, 0 if none was set.
    #[inline]
    pub fn num_cols(&self) -> usize {
        self.columns.as_ref().map_or(0, ColumnBoundIndex::num_cols)
    }

    /// Nodes emplaced with a lower bound above `limit` go straight into the
    /// suboptimal set.
    #[inline]
    pub fn set_optimality_limit(&mut self, limit: f64) {
        self.optimality_limit = limit;
    }

    #[inline]
    pub fn optimality_limit(&self) -> f64 {
        self.optimality_limit
    }

    /// Sets the tolerance used by `perform_bounding`.
    ///
    /// # Panics
    ///
    /// Panics if `tolerance` is negative or NaN.
    #[inline]
    pub fn set_bounding_tolerance(&mut self, tolerance: f64) {
        assert!(
            tolerance >= 0.0,
            "called `NodeQueue::set_bounding_tolerance` with tolerance {}",
            tolerance
        );
        self.bounding_tolerance = tolerance;
    }

    #[inline]
    pub fn bounding_tolerance(&self) -> f64 {
        self.bounding_tolerance
    }

    #[inline]
    pub fn statistics(&self) -> &NodeQueueStatistics {
        &self.stats
    }

    /// Number of nodes held, active or suboptimal.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    #[inline]
    pub fn num_active_nodes(&self) -> usize {
        self.num_nodes() - self.num_suboptimal
    }

    #[inline]
    pub fn num_suboptimal(&self) -> usize {
        self.num_suboptimal
    }

    /// Returns `true` if no active node is left to explore.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_active_nodes() == 0
    }

    /// Returns the node stored under `id`, active or suboptimal.
    #[inline]
    pub fn node(&self, id: NodeIndex) -> Option<&OpenNode> {
        self.slots.get(id.get()).and_then(|slot| slot.node.as_ref())
    }

    /// Removes every node. The column count is kept.
    pub fn clear(&mut self) {
        let num_cols = self.num_cols();
        let configured = self.columns.is_some();
        self.slots.clear();
        self.free_slots.clear();
        self.lower = OrderStatTree::new();
        self.estim = OrderStatTree::new();
        self.suboptimal = OrderStatTree::new();
        self.num_suboptimal = 0;
        self.stats = NodeQueueStatistics::default();
        if configured {
            self.columns = Some(ColumnBoundIndex::new(num_cols));
        }
    }

    /// Inserts a new open node and returns its tree weight `2^-depth`.
    ///
    /// # Panics
    ///
    /// Panics if the column count was never set or if a bound change refers
    /// to a column outside of it.
    pub fn emplace_node(
        &mut self,
        domchgs: Vec<DomainChange>,
        branchings: Vec<ColumnIndex>,
        lower_bound: f64,
        estimate: f64,
        depth: u32,
    ) -> f64 {
        let Some(columns) = self.columns.as_ref() else {
            panic!("called `NodeQueue::emplace_node` before the column count was set");
        };
        let num_cols = columns.num_cols();
        for chg in &domchgs {
            assert!(
                chg.column.get() < num_cols,
                "called `NodeQueue::emplace_node` with bound change {} but the queue has {} columns",
                chg,
                num_cols
            );
        }
        debug_assert!(
            !lower_bound.is_nan(),
            "called `NodeQueue::emplace_node` with a NaN lower bound"
        );

        // Folding -0.0 keeps `total_cmp` consistent with numeric comparison.
        let lower_bound = lower_bound + 0.0;
        let id = self.allocate_slot();
        let slot = &mut self.slots[id as usize];
        slot.lower_key = lower_bound;
        slot.estim_key = hybrid_key(lower_bound, estimate) + 0.0;
        slot.node = Some(OpenNode {
            domchgs,
            branchings,
            lower_bound,
            estimate,
            depth,
        });

        let suboptimal = lower_bound > self.optimality_limit;
        if suboptimal {
            self.link_suboptimal(id);
        } else {
            self.link_active(id);
        }
        self.stats.on_emplace(depth, suboptimal);
        log::trace!(
            "emplaced node {} (lower bound {}, depth {}, suboptimal {})",
            id,
            lower_bound,
            depth,
            suboptimal
        );

        tree_weight(depth)
    }

    /// Removes and returns the active node with the smallest lower bound.
    ///
    /// # Panics
    ///
    /// Panics if there is no active node.
    pub fn pop_best_node(&mut self) -> OpenNode {
        let Some(id) = self.lower.first() else {
            panic!("called `NodeQueue::pop_best_node` on a queue without active nodes");
        };
        self.stats.on_pop();
        self.remove_node(id)
    }

    /// Removes and returns the active node with the smallest hybrid key
    /// `0.5 * lower_bound + 0.5 * estimate`.
    ///
    /// # Panics
    ///
    /// Panics if there is no active node.
    pub fn pop_best_bound_node(&mut self) -> OpenNode {
        let Some(id) = self.estim.first() else {
            panic!("called `NodeQueue::pop_best_bound_node` on a queue without active nodes");
        };
        self.stats.on_pop();
        self.remove_node(id)
    }

    /// Moves every active node with `lower_bound >= upper_limit - tolerance`
    /// into the suboptimal set and returns the tree weight moved.
    pub fn perform_bounding(&mut self, upper_limit: f64) -> f64 {
        if self.lower.is_empty() || upper_limit == f64::INFINITY {
            return 0.0;
        }

        let threshold = upper_limit - self.bounding_tolerance + 0.0;
        let doomed: Vec<u32> = self
            .lower
            .iter_at_least(&LowerView(&mut self.slots), &TreeKey::new(threshold, 0))
            .collect();
        if doomed.is_empty() {
            return 0.0;
        }

        let mut weight = CompensatedSum::new();
        for &id in &doomed {
            weight += self.slot_weight(id);
            self.unlink_active(id);
            self.link_suboptimal(id);
        }
        self.stats.on_demote(doomed.len() as u64);
        log::debug!(
            "bounding at {} demoted {} nodes, {} active left",
            upper_limit,
            doomed.len(),
            self.num_active_nodes()
        );

        weight.value()
    }

    /// Removes the node `id`, active or suboptimal, and returns its weight.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a queued node.
    pub fn prune_node(&mut self, id: NodeIndex) -> f64 {
        let raw = id.get_u32();
        assert!(
            self.slots
                .get(id.get())
                .is_some_and(|slot| slot.state != SlotState::Free),
            "called `NodeQueue::prune_node` with {} which is not queued",
            id
        );
        let weight = self.remove_node(raw).weight();
        self.stats.on_pruning_explicit(weight);
        weight
    }

    /// Removes the active nodes whose bound change on `col` contradicts the
    /// global bounds `[lb, ub]`, that is a lower bound of at least
    /// `ub + feastol` or an upper bound of at most `lb - feastol`. The weight of
    /// the removed nodes is added to `treeweight`.
    ///
    /// # Panics
    ///
    /// Panics if the column count was never set.
    pub fn check_global_bounds(
        &mut self,
        col: ColumnIndex,
        lb: f64,
        ub: f64,
        feastol: f64,
        treeweight: &mut CompensatedSum,
    ) {
        let Some(columns) = self.columns.as_ref() else {
            panic!("called `NodeQueue::check_global_bounds` before the column count was set");
        };

        let mut infeasible: Vec<u32> = columns
            .lower_entries_at_least(col, ub + feastol)
            .into_iter()
            .chain(columns.upper_entries_at_most(col, lb - feastol))
            .map(|entry| columns.entry(entry).0.get_u32())
            .collect();
        infeasible.sort_unstable();
        infeasible.dedup();

        for id in infeasible {
            let weight = self.remove_node(id).weight();
            *treeweight += weight;
            self.stats.on_pruning_infeasible(weight);
        }
    }

    /// Removes every node that the global `domain` renders infeasible and
    /// returns the removed tree weight.
    pub fn prune_infeasible_nodes<D>(&mut self, domain: &D, feastol: f64) -> f64
    where
        D: GlobalDomain + ?Sized,
    {
        let mut treeweight = CompensatedSum::new();
        let num_cols = self.num_cols().min(domain.num_cols());
        for col in (0..num_cols).map(ColumnIndex::new) {
            self.check_global_bounds(
                col,
                domain.col_lower(col),
                domain.col_upper(col),
                feastol,
                &mut treeweight,
            );
        }

        // Suboptimal nodes are not column-indexed; check their stacks directly.
        let suboptimal: Vec<u32> = self.suboptimal.iter(&LowerView(&mut self.slots)).collect();
        let doomed: Vec<u32> = suboptimal
            .into_iter()
            .filter(|&id| {
                self.slots[id as usize].node.as_ref().is_some_and(|node| {
                    node.domchgs.iter().any(|chg| {
                        chg.column.get() < domain.num_cols()
                            && chg.is_infeasible_within(
                                domain.col_lower(chg.column),
                                domain.col_upper(chg.column),
                                feastol,
                            )
                    })
                })
            })
            .collect();
        for id in doomed {
            let weight = self.remove_node(id).weight();
            treeweight += weight;
            self.stats.on_pruning_infeasible(weight);
        }

        if treeweight.value() > 0.0 {
            log::debug!(
                "pruned infeasible nodes of weight {}, {} nodes left",
                treeweight.value(),
                self.num_nodes()
            );
        }
        treeweight.value()
    }

    /// Minimum lower bound over active and suboptimal nodes, `+inf` if the
    /// queue holds no node.
    pub fn best_lower_bound(&self) -> f64 {
        let active = self.lower.first().map(|id| self.slots[id as usize].lower_key);
        let subopt = self
            .suboptimal
            .first()
            .map(|id| self.slots[id as usize].lower_key);
        match (active, subopt) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => f64::INFINITY,
        }
    }

    /// Domain-change stack size of the active node with the smallest lower bound.
    pub fn best_bound_domchg_stack_size(&self) -> usize {
        self.lower
            .first()
            .and_then(|id| self.slots[id as usize].node.as_ref())
            .map_or(0, |node| node.domchgs.len())
    }

    /// Number of active nodes that tighten the lower bound of `col`.
    #[inline]
    pub fn num_nodes_up(&self, col: ColumnIndex) -> usize {
        self.columns
            .as_ref()
            .map_or(0, |c| c.count(col, BoundKind::Lower))
    }

    /// Number of active nodes that tighten the upper bound of `col`.
    #[inline]
    pub fn num_nodes_down(&self, col: ColumnIndex) -> usize {
        self.columns
            .as_ref()
            .map_or(0, |c| c.count(col, BoundKind::Upper))
    }

    /// Number of active nodes whose lower bound on `col` is strictly above `val`.
    #[inline]
    pub fn num_nodes_up_past(&self, col: ColumnIndex, val: f64) -> usize {
        self.columns
            .as_ref()
            .map_or(0, |c| c.count_lower_above(col, val))
    }

    /// Number of active nodes whose upper bound on `col` is strictly below `val`.
    #[inline]
    pub fn num_nodes_down_past(&self, col: ColumnIndex, val: f64) -> usize {
        self.columns
            .as_ref()
            .map_or(0, |c| c.count_upper_below(col, val))
    }

    /// Iterates `(value, node)` over the lower-bound changes of `col` in ascending value order.
    pub fn up_nodes(&self, col: ColumnIndex) -> impl Iterator<Item = (f64, NodeIndex)> + '_ {
        self.columns
            .iter()
            .flat_map(move |c| c.iter(col, BoundKind::Lower))
    }

    /// Iterates `(value, node)` over the upper-bound changes of `col` in ascending value order.
    pub fn down_nodes(&self, col: ColumnIndex) -> impl Iterator<Item = (f64, NodeIndex)> + '_ {
        self.columns
            .iter()
            .flat_map(move |c| c.iter(col, BoundKind::Upper))
    }

    fn allocate_slot(&mut self) -> u32 {
        match self.free_slots.pop() {
            Some(Reverse(id)) => id,
            None => {
                let id = self.slots.len();
                assert!(
                    id < u32::MAX as usize,
                    "called `NodeQueue::emplace_node` with {} nodes already allocated",
                    id
                );
                self.slots.push(NodeSlot::vacant());
                id as u32
            }
        }
    }

    #[inline]
    fn slot_weight(&self, id: u32) -> f64 {
        self.slots[id as usize]
            .node
            .as_ref()
            .map_or(0.0, OpenNode::weight)
    }

    fn link_active(&mut self, id: u32) {
        self.lower.insert(&mut LowerView(&mut self.slots), id);
        self.estim.insert(&mut EstimView(&mut self.slots), id);

        let slot = &mut self.slots[id as usize];
        slot.state = SlotState::Active;
        let Some(node) = slot.node.as_ref() else {
            return;
        };
        let Some(columns) = self.columns.as_mut() else {
            return;
        };

        // Only the tightest change per column and direction is indexed.
        let mut tightest: FxHashMap<(ColumnIndex, BoundKind), f64> = FxHashMap::default();
        for chg in &node.domchgs {
            tightest
                .entry((chg.column, chg.kind))
                .and_modify(|value| {
                    *value = match chg.kind {
                        BoundKind::Lower => value.max(chg.value),
                        BoundKind::Upper => value.min(chg.value),
                    }
                })
                .or_insert(chg.value);
        }

        let node_id = NodeIndex::from_u32(id);
        slot.col_entries = tightest
            .into_iter()
            .map(|((column, kind), value)| columns.insert(column, kind, value, node_id))
            .collect();
    }

    fn unlink_active(&mut self, id: u32) {
        self.lower.remove(&mut LowerView(&mut self.slots), id);
        self.estim.remove(&mut EstimView(&mut self.slots), id);
        let entries = std::mem::take(&mut self.slots[id as usize].col_entries);
        if let Some(columns) = self.columns.as_mut() {
            for entry in entries {
                columns.remove(entry);
            }
        }
    }

    fn link_suboptimal(&mut self, id: u32) {
        self.suboptimal.insert(&mut LowerView(&mut self.slots), id);
        self.slots[id as usize].state = SlotState::Suboptimal;
        self.num_suboptimal += 1;
    }

    fn unlink_suboptimal(&mut self, id: u32) {
        self.suboptimal.remove(&mut LowerView(&mut self.slots), id);
        self.num_suboptimal -= 1;
    }

    /// Unlinks the node from all indices, frees its slot and returns it.
    fn remove_node(&mut self, id: u32) -> OpenNode {
        match self.slots[id as usize].state {
            SlotState::Active => self.unlink_active(id),
            SlotState::Suboptimal => self.unlink_suboptimal(id),
            SlotState::Free => panic!("called `NodeQueue::remove_node` on free slot {}", id),
        }

        let slot = &mut self.slots[id as usize];
        slot.state = SlotState::Free;
        self.free_slots.push(Reverse(id));
        let Some(node) = slot.node.take() else {
            panic!("called `NodeQueue::remove_node` on slot {} without a node", id);
        };
        node
    }

    #[cfg(test)]
    fn validate(&mut self) {
        let active = self.lower.validate(&LowerView(&mut self.slots));
        let estim = self.estim.validate(&EstimView(&mut self.slots));
        let subopt = self.suboptimal.validate(&LowerView(&mut self.slots));
        assert_eq!(active, estim);
        assert_eq!(active, self.num_active_nodes());
        assert_eq!(subopt, self.num_suboptimal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ColumnBounds;
    use proptest::prelude::*;

    fn c(i: usize) -> ColumnIndex {
        ColumnIndex::new(i)
    }

    fn up(col: usize, value: f64) -> DomainChange {
        DomainChange::lower(c(col), value)
    }

    fn down(col: usize, value: f64) -> DomainChange {
        DomainChange::upper(c(col), value)
    }

    #[test]
    fn test_emplace_returns_weight() {
        let mut q = NodeQueue::with_num_cols(1);
        assert_eq!(q.emplace_node(vec![], vec![], 0.0, 0.0, 0), 1.0);
        assert_eq!(q.emplace_node(vec![up(0, 1.0)], vec![c(0)], 0.0, 0.0, 3), 0.125);
        assert_eq!(q.num_nodes(), 2);
        assert_eq!(q.num_active_nodes(), 2);
        q.validate();
    }

    #[test]
    #[should_panic(expected = "before the column count was set")]
    fn test_emplace_without_columns_panics() {
        let mut q = NodeQueue::new();
        q.emplace_node(vec![], vec![], 0.0, 0.0, 0);
    }

    #[test]
    #[should_panic(expected = "but the queue has 2 columns")]
    fn test_emplace_column_out_of_range_panics() {
        let mut q = NodeQueue::with_num_cols(2);
        q.emplace_node(vec![up(2, 1.0)], vec![], 0.0, 0.0, 1);
    }

    #[test]
    #[should_panic(expected = "without active nodes")]
    fn test_pop_empty_panics() {
        let mut q = NodeQueue::with_num_cols(1);
        q.pop_best_node();
    }

    #[test]
    fn test_pop_best_node_ties_break_by_id() {
        let mut q = NodeQueue::with_num_cols(1);
        q.emplace_node(vec![up(0, 1.0)], vec![], 5.0, 5.0, 1);
        q.emplace_node(vec![up(0, 2.0)], vec![], 5.0, 5.0, 1);
        q.emplace_node(vec![up(0, 3.0)], vec![], 4.0, 9.0, 1);

        assert_eq!(q.pop_best_node().domchgs()[0].value, 3.0);
        assert_eq!(q.pop_best_node().domchgs()[0].value, 1.0);
        assert_eq!(q.pop_best_node().domchgs()[0].value, 2.0);
        assert!(q.is_empty());
    }

    #[test]
    fn test_pop_best_bound_node_uses_hybrid_key() {
        let mut q = NodeQueue::with_num_cols(1);
        // keys: 0.5*1 + 0.5*9 = 5, 0.5*3 + 0.5*3 = 3, infinite estimate -> 2
        q.emplace_node(vec![up(0, 1.0)], vec![], 1.0, 9.0, 1);
        q.emplace_node(vec![up(0, 2.0)], vec![], 3.0, 3.0, 1);
        q.emplace_node(vec![up(0, 3.0)], vec![], 2.0, f64::INFINITY, 1);

        assert_eq!(q.pop_best_bound_node().lower_bound(), 2.0);
        assert_eq!(q.pop_best_bound_node().lower_bound(), 3.0);
        assert_eq!(q.pop_best_bound_node().lower_bound(), 1.0);
    }

    #[test]
    fn test_free_slots_reuse_lowest_id() {
        let mut q = NodeQueue::with_num_cols(1);
        for lb in [3.0, 1.0, 2.0, 4.0] {
            q.emplace_node(vec![], vec![], lb, lb, 1);
        }
        // Frees slots 1 and 2.
        q.pop_best_node();
        q.pop_best_node();
        assert_eq!(q.num_nodes(), 2);

        q.emplace_node(vec![], vec![], 10.0, 10.0, 2);
        assert_eq!(q.node(NodeIndex::new(1)).map(OpenNode::lower_bound), Some(10.0));
        assert!(q.node(NodeIndex::new(2)).is_none());
        q.validate();
    }

    #[test]
    fn test_column_counts_use_tightest_change() {
        let mut q = NodeQueue::with_num_cols(2);
        q.emplace_node(vec![up(0, 1.0), up(0, 3.0), down(1, 4.0)], vec![], 0.0, 0.0, 2);
        q.emplace_node(vec![up(0, 2.0), down(1, 2.0), down(1, 1.0)], vec![], 0.0, 0.0, 2);

        assert_eq!(q.num_nodes_up(c(0)), 2);
        assert_eq!(q.num_nodes_down(c(1)), 2);
        assert_eq!(q.num_nodes_up_past(c(0), 2.0), 1);
        assert_eq!(q.num_nodes_up_past(c(0), 1.5), 2);
        assert_eq!(q.num_nodes_down_past(c(1), 2.0), 1);
        assert_eq!(q.num_nodes_down_past(c(1), 5.0), 2);

        let ups: Vec<f64> = q.up_nodes(c(0)).map(|(v, _)| v).collect();
        assert_eq!(ups, vec![2.0, 3.0]);
        let downs: Vec<NodeIndex> = q.down_nodes(c(1)).map(|(_, n)| n).collect();
        assert_eq!(downs, vec![NodeIndex::new(1), NodeIndex::new(0)]);
    }

    #[test]
    fn test_perform_bounding_demotes_permanently() {
        let mut q = NodeQueue::with_num_cols(1);
        q.emplace_node(vec![up(0, 1.0)], vec![], 1.0, 1.0, 1);
        q.emplace_node(vec![up(0, 2.0)], vec![], 5.0, 5.0, 2);
        q.emplace_node(vec![up(0, 3.0)], vec![], 10.0 - 1e-12, 10.0, 2);

        let demoted = q.perform_bounding(10.0);
        assert_eq!(demoted, 0.25);
        assert_eq!(q.num_nodes(), 3);
        assert_eq!(q.num_active_nodes(), 2);
        assert_eq!(q.num_suboptimal(), 1);
        assert_eq!(q.num_nodes_up(c(0)), 2);

        let demoted = q.perform_bounding(4.0);
        assert_eq!(demoted, 0.25);
        assert_eq!(q.num_suboptimal(), 2);
        assert_eq!(q.best_lower_bound(), 1.0);
        q.validate();

        // Raising the limit again does not revive anything.
        assert_eq!(q.perform_bounding(100.0), 0.0);
        assert_eq!(q.num_active_nodes(), 1);
        assert_eq!(q.pop_best_node().lower_bound(), 1.0);
        assert!(q.is_empty());
        assert_eq!(q.best_lower_bound(), 5.0);
        assert_eq!(q.statistics().nodes_demoted, 2);
    }

    #[test]
    fn test_optimality_limit_on_emplace() {
        let mut q = NodeQueue::with_num_cols(1);
        q.set_optimality_limit(3.0);
        q.emplace_node(vec![up(0, 1.0)], vec![], 3.0, 3.0, 1);
        q.emplace_node(vec![up(0, 1.0)], vec![], 3.5, 3.5, 1);
        assert_eq!(q.num_active_nodes(), 1);
        assert_eq!(q.num_suboptimal(), 1);
        assert_eq!(q.num_nodes_up(c(0)), 1);
        assert_eq!(q.statistics().nodes_emplaced_suboptimal, 1);
    }

    #[test]
    fn test_best_bound_queries() {
        let mut q = NodeQueue::with_num_cols(1);
        assert_eq!(q.best_lower_bound(), f64::INFINITY);
        assert_eq!(q.best_bound_domchg_stack_size(), 0);

        q.emplace_node(vec![up(0, 1.0), down(0, 3.0)], vec![], 2.0, 2.0, 2);
        q.emplace_node(vec![up(0, 1.0)], vec![], 4.0, 4.0, 1);
        assert_eq!(q.best_lower_bound(), 2.0);
        assert_eq!(q.best_bound_domchg_stack_size(), 2);
    }

    #[test]
    fn test_prune_node_active_and_suboptimal() {
        let mut q = NodeQueue::with_num_cols(1);
        q.emplace_node(vec![up(0, 1.0)], vec![], 1.0, 1.0, 1);
        q.emplace_node(vec![up(0, 2.0)], vec![], 8.0, 8.0, 2);
        q.perform_bounding(5.0);

        assert_eq!(q.prune_node(NodeIndex::new(1)), 0.25);
        assert_eq!(q.num_suboptimal(), 0);
        assert_eq!(q.prune_node(NodeIndex::new(0)), 0.5);
        assert_eq!(q.num_nodes(), 0);
        assert_eq!(q.num_nodes_up(c(0)), 0);
        assert_eq!(q.statistics().prunings_explicit, 2);
        q.validate();
    }

    #[test]
    #[should_panic(expected = "which is not queued")]
    fn test_prune_free_slot_panics() {
        let mut q = NodeQueue::with_num_cols(1);
        q.prune_node(NodeIndex::new(0));
    }

    #[test]
    fn test_check_global_bounds_prunes_infeasible_nodes() {
        let mut q = NodeQueue::with_num_cols(1);
        q.emplace_node(vec![up(0, 3.0)], vec![], 0.0, 0.0, 1); // infeasible for ub = 2
        q.emplace_node(vec![up(0, 1.0)], vec![], 0.0, 0.0, 2); // within [1, 2]
        q.emplace_node(vec![down(0, 1.5)], vec![], 0.0, 0.0, 2); // within [1, 2]

        let mut weight = CompensatedSum::new();
        q.check_global_bounds(c(0), 1.0, 2.0, 1e-6, &mut weight);

        assert_eq!(weight.value(), 0.5);
        assert_eq!(q.num_nodes(), 2);
        assert_eq!(q.num_nodes_up(c(0)), 1);
        assert_eq!(q.num_nodes_down(c(0)), 1);
        assert_eq!(q.statistics().prunings_infeasible, 1);
        q.validate();
    }

    #[test]
    fn test_check_global_bounds_keeps_counts_consistent() {
        let mut q = NodeQueue::with_num_cols(1);
        q.emplace_node(vec![up(0, 1.0)], vec![], 0.0, 0.0, 1);
        q.emplace_node(vec![up(0, 4.0)], vec![], 0.0, 0.0, 1);
        q.emplace_node(vec![down(0, 3.0)], vec![], 0.0, 0.0, 2);
        q.emplace_node(vec![], vec![], 0.0, 0.0, 2);

        let mut weight = CompensatedSum::new();
        q.check_global_bounds(c(0), 1.0, 10.0, 1e-6, &mut weight);
        assert_eq!(weight.value(), 0.0);
        assert_eq!(q.num_active_nodes(), 4);

        let col = c(0);
        for val in [0.5, 1.0, 2.0, 4.0, 5.0] {
            let not_past = (0..q.num_nodes())
                .filter_map(|i| q.node(NodeIndex::new(i)))
                .filter(|node| {
                    !node
                        .domchgs()
                        .iter()
                        .any(|chg| chg.column == col && chg.kind == BoundKind::Lower && chg.value > val)
                })
                .count();
            assert_eq!(q.num_nodes_up_past(col, val) + not_past, q.num_active_nodes());
        }
        assert_eq!(q.num_nodes_up(col), 2);
        q.validate();
    }

    #[test]
    fn test_check_global_bounds_is_inclusive_at_the_tolerance() {
        let mut q = NodeQueue::with_num_cols(1);
        q.emplace_node(vec![up(0, 2.5)], vec![], 0.0, 0.0, 1);
        q.emplace_node(vec![down(0, -0.5)], vec![], 0.0, 0.0, 1);
        q.emplace_node(vec![up(0, 2.25)], vec![], 0.0, 0.0, 2);

        let mut weight = CompensatedSum::new();
        q.check_global_bounds(c(0), 0.0, 2.0, 0.5, &mut weight);

        // 2.5 >= 2 + 0.5 and -0.5 <= 0 - 0.5 are both infeasible.
        assert_eq!(weight.value(), 1.0);
        assert_eq!(q.num_nodes(), 1);
        assert_eq!(q.num_nodes_up(c(0)), 1);
        q.validate();
    }

    #[test]
    #[should_panic(expected = "before the column count was set")]
    fn test_check_global_bounds_without_columns_panics() {
        let mut q = NodeQueue::new();
        q.check_global_bounds(c(0), 0.0, 1.0, 1e-6, &mut CompensatedSum::new());
    }

    #[test]
    fn test_prune_infeasible_nodes_covers_suboptimal() {
        let mut q = NodeQueue::with_num_cols(2);
        q.emplace_node(vec![up(0, 1.0)], vec![], 1.0, 1.0, 1);
        q.emplace_node(vec![down(1, -1.0)], vec![], 9.0, 9.0, 1);
        q.emplace_node(vec![up(1, 0.0)], vec![], 2.0, 2.0, 1);
        q.perform_bounding(5.0);

        let mut domain = ColumnBounds::unbounded(2);
        domain.set(c(1), 0.0, 1.0);
        let removed = q.prune_infeasible_nodes(&domain, 1e-6);

        assert_eq!(removed, 0.5);
        assert_eq!(q.num_nodes(), 2);
        assert_eq!(q.num_suboptimal(), 0);
        assert_eq!(q.num_nodes_up(c(1)), 1);
        assert_eq!(q.num_nodes_up(c(0)), 1);
        q.validate();
    }

    #[test]
    fn test_clear_keeps_column_count() {
        let mut q = NodeQueue::with_num_cols(3);
        q.emplace_node(vec![up(2, 1.0)], vec![], 0.0, 0.0, 1);
        q.clear();
        assert_eq!(q.num_nodes(), 0);
        assert_eq!(q.num_cols(), 3);
        q.emplace_node(vec![up(2, 1.0)], vec![], 0.0, 0.0, 1);
        assert_eq!(q.num_nodes_up(c(2)), 1);
    }

    #[test]
    fn test_negative_zero_bound_values() {
        let mut q = NodeQueue::with_num_cols(1);
        q.emplace_node(vec![down(0, -0.0)], vec![], -0.0, 0.0, 1);
        q.emplace_node(vec![down(0, 0.0)], vec![], 0.0, 0.0, 1);
        assert_eq!(q.num_nodes_down_past(c(0), 0.0), 0);
        assert_eq!(q.num_nodes_down_past(c(0), 1e-9), 2);
        // Both keys are +0.0, so the tie breaks by id.
        assert!(q.node(NodeIndex::new(0)).is_some());
        assert_eq!(q.perform_bounding(1e-9), 1.0);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Emplace { lb: i32, est: i32, col: usize, val: i32, is_up: bool },
        PopBest,
        PopEstimate,
        Bound(i32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (-20i32..20, -20i32..20, 0usize..3, -5i32..5, any::<bool>())
                .prop_map(|(lb, est, col, val, is_up)| Op::Emplace { lb, est, col, val, is_up }),
            1 => Just(Op::PopBest),
            1 => Just(Op::PopEstimate),
            1 => (-20i32..25).prop_map(Op::Bound),
        ]
    }

    #[derive(Clone, Debug)]
    struct ModelNode {
        lb: f64,
        key: f64,
        col: usize,
        val: f64,
        is_up: bool,
    }

    proptest! {
        #[test]
        fn prop_queue_matches_model(ops in prop::collection::vec(op_strategy(), 1..120)) {
            let mut q = NodeQueue::with_num_cols(3);
            q.set_bounding_tolerance(0.0);
            let mut active: Vec<ModelNode> = Vec::new();
            let mut suboptimal = 0usize;

            for op in ops {
                match op {
                    Op::Emplace { lb, est, col, val, is_up } => {
                        let (lb, est, val) = (lb as f64, est as f64, val as f64);
                        let chg = if is_up { up(col, val) } else { down(col, val) };
                        q.emplace_node(vec![chg], vec![c(col)], lb, est, 1);
                        active.push(ModelNode { lb, key: 0.5 * lb + 0.5 * est, col, val, is_up });
                    }
                    Op::PopBest => {
                        if active.is_empty() { continue; }
                        let min = active.iter().map(|n| n.lb).fold(f64::INFINITY, f64::min);
                        let node = q.pop_best_node();
                        prop_assert_eq!(node.lower_bound(), min);
                        let pos = active.iter().position(|n| {
                            n.lb == node.lower_bound() && n.val == node.domchgs()[0].value
                                && n.col == node.domchgs()[0].column.get()
                                && n.is_up == (node.domchgs()[0].kind == BoundKind::Lower)
                                && n.key == hybrid_key(node.lower_bound(), node.estimate())
                        });
                        prop_assert!(pos.is_some());
                        active.swap_remove(pos.unwrap());
                    }
                    Op::PopEstimate => {
                        if active.is_empty() { continue; }
                        let min = active.iter().map(|n| n.key).fold(f64::INFINITY, f64::min);
                        let node = q.pop_best_bound_node();
                        prop_assert_eq!(hybrid_key(node.lower_bound(), node.estimate()), min);
                        let pos = active.iter().position(|n| {
                            n.key == min && n.lb == node.lower_bound()
                                && n.val == node.domchgs()[0].value
                                && n.col == node.domchgs()[0].column.get()
                                && n.is_up == (node.domchgs()[0].kind == BoundKind::Lower)
                        });
                        prop_assert!(pos.is_some());
                        active.swap_remove(pos.unwrap());
                    }
                    Op::Bound(limit) => {
                        let limit = limit as f64;
                        let before = active.len();
                        active.retain(|n| n.lb < limit);
                        let moved = before - active.len();
                        suboptimal += moved;
                        prop_assert_eq!(q.perform_bounding(limit), moved as f64 * 0.5);
                    }
                }

                prop_assert_eq!(q.num_active_nodes(), active.len());
                prop_assert_eq!(q.num_suboptimal(), suboptimal);
                for col in 0..3 {
                    for pivot in -5..5 {
                        let pivot = pivot as f64;
                        let ups = active.iter().filter(|n| n.col == col && n.is_up && n.val > pivot).count();
                        let downs = active.iter().filter(|n| n.col == col && !n.is_up && n.val < pivot).count();
                        prop_assert_eq!(q.num_nodes_up_past(c(col), pivot), ups);
                        prop_assert_eq!(q.num_nodes_down_past(c(col), pivot), downs);
                    }
                }
            }
            q.validate();
        }
    }
}
