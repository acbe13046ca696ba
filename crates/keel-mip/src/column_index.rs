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


//! Per-column indices over the bound changes of open nodes.
//!
//! For every column the index keeps two order-statistic trees of
//! `(bound value, node id)` entries: one for nodes whose domain-change stack
//! raises the column's lower bound and one for nodes that lower its upper
//! bound. Counting queries ("how many open nodes already branch this column up
//! past `v`") are rank queries and run in O(log n).
//!
//! Entries live in a single arena shared by all columns and are recycled
//! through a free list, so relinking nodes does not allocate in steady state.

use crate::domain::BoundKind;
use crate::index::{ColumnIndex, NodeIndex};
use crate::rbtree::{LinkStore, OrderStatTree, TreeKey, TreeLinks};

/// Folds `-0.0` into `0.0` so that `total_cmp` agrees with numeric equality.
#[inline(always)]
fn canonical(value: f64) -> f64 {
    value + 0.0
}

#[derive(Clone, Debug)]
struct ColumnEntry {
    value: f64,
    node: u32,
    column: u32,
    kind: BoundKind,
    links: TreeLinks,
}

#[derive(Clone, Debug, Default)]
struct EntryArena {
    entries: Vec<ColumnEntry>,
    free: Vec<u32>,
}

impl LinkStore for EntryArena {
    type Key = TreeKey;

    #[inline]
    fn key(&self, id: u32) -> TreeKey {
        let e = &self.entries[id as usize];
        TreeKey::new(e.value, e.node)
    }

    #[inline]
    fn links(&self, id: u32) -> &TreeLinks {
        &self.entries[id as usize].links
    }

    #[inline]
    fn links_mut(&mut self, id: u32) -> &mut TreeLinks {
        &mut self.entries[id as usize].links
    }
}

/// Handle of one entry of a `ColumnBoundIndex`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryId(u32);

/// Lower- and upper-bound change indices for every column.
#[derive(Clone, Debug, Default)]
pub struct ColumnBoundIndex {
    arena: EntryArena,
    lower: Vec<OrderStatTree>,
    upper: Vec<OrderStatTree>,
}

impl ColumnBoundIndex {
    /// Creates an index for `num_cols` columns.
    pub fn new(num_cols: usize) -> Self {
        Self {
            arena: EntryArena::default(),
            lower: vec![OrderStatTree::new(); num_cols],
            upper: vec![OrderStatTree::new(); num_cols],
        }
    }

    #[inline]
    pub fn num_cols(&self) -> usize {
        self.lower.len()
    }

    /// Returns the number of linked entries across all columns.
    #[cfg(test)]
    pub fn num_entries(&self) -> usize {
        self.arena.entries.len() - self.arena.free.len()
    }

    #[inline]
    fn tree(&self, column: ColumnIndex, kind: BoundKind) -> &OrderStatTree {
        match kind {
            BoundKind::Lower => &self.lower[column.get()],
            BoundKind::Upper => &self.upper[column.get()],
        }
    }

    /// Links a `(value, node)` entry into the tree of `column`/`kind`.
    pub fn insert(
        &mut self,
        column: ColumnIndex,
        kind: BoundKind,
        value: f64,
        node: NodeIndex,
    ) -> EntryId {
        let entry = ColumnEntry {
            value: canonical(value),
            node: node.get_u32(),
            column: column.get_u32(),
            kind,
            links: TreeLinks::default(),
        };
        let id = match self.arena.free.pop() {
            Some(id) => {
                self.arena.entries[id as usize] = entry;
                id
            }
            None => {
                self.arena.entries.push(entry);
                (self.arena.entries.len() - 1) as u32
            }
        };

        let tree = match kind {
            BoundKind::Lower => &mut self.lower[column.get()],
            BoundKind::Upper => &mut self.upper[column.get()],
        };
        tree.insert(&mut self.arena, id);
        EntryId(id)
    }

    /// Unlinks an entry and recycles its storage.
    pub fn remove(&mut self, entry: EntryId) {
        let e = &self.arena.entries[entry.0 as usize];
        let (column, kind) = (e.column as usize, e.kind);
        let tree = match kind {
            BoundKind::Lower => &mut self.lower[column],
            BoundKind::Upper => &mut self.upper[column],
        };
        tree.remove(&mut self.arena, entry.0);
        self.arena.free.push(entry.0);
    }

    /// Returns the node and bound value of an entry.
    #[inline]
    pub fn entry(&self, entry: EntryId) -> (NodeIndex, f64) {
        let e = &self.arena.entries[entry.0 as usize];
        (NodeIndex::from_u32(e.node), e.value)
    }

    /// Number of entries in the tree of `column`/`kind`.
    #[inline]
    pub fn count(&self, column: ColumnIndex, kind: BoundKind) -> usize {
        self.tree(column, kind).len(&self.arena)
    }

    /// Number of lower-bound entries of `column` with a value strictly above `value`.
    #[inline]
    pub fn count_lower_above(&self, column: ColumnIndex, value: f64) -> usize {
        let pivot = TreeKey::new(canonical(value), u32::MAX);
        self.lower[column.get()].count_greater(&self.arena, &pivot)
    }

    /// Number of upper-bound entries of `column` with a value strictly below `value`.
    #[inline]
    pub fn count_upper_below(&self, column: ColumnIndex, value: f64) -> usize {
        let pivot = TreeKey::new(canonical(value), 0);
        self.upper[column.get()].count_less(&self.arena, &pivot)
    }

    /// Iterates `(value, node)` pairs of the tree of `column`/`kind` in ascending order.
    pub fn iter(
        &self,
        column: ColumnIndex,
        kind: BoundKind,
    ) -> impl Iterator<Item = (f64, NodeIndex)> + '_ {
        self.tree(column, kind)
            .iter(&self.arena)
            .map(move |id| self.entry(EntryId(id)))
            .map(|(node, value)| (value, node))
    }

    /// Collects the lower-bound entries of `column` with a value of at least `value`.
    pub fn lower_entries_at_least(&self, column: ColumnIndex, value: f64) -> Vec<EntryId> {
        let pivot = TreeKey::new(canonical(value), 0);
        self.lower[column.get()]
            .iter_at_least(&self.arena, &pivot)
            .map(EntryId)
            .collect()
    }

    /// Collects the upper-bound entries of `column` with a value of at most `value`.
    pub fn upper_entries_at_most(&self, column: ColumnIndex, value: f64) -> Vec<EntryId> {
        let value = canonical(value);
        self.upper[column.get()]
            .iter(&self.arena)
            .take_while(|&id| self.arena.entries[id as usize].value <= value)
            .map(EntryId)
            .collect()
    }
}
