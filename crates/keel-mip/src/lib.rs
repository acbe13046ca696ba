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


//! Keel-MIP: the open-node side of a mixed-integer branch-and-bound search
//!
//! The crate owns the dynamic search tree between relaxation solves: which
//! subproblems are still open, which of them to explore next, which can be
//! discarded once a better incumbent or tighter global bounds are known, and
//! which column to branch on. Relaxations, propagation and the driver loop
//! live outside; parallel relaxation solves run on `keel_parallel`.
//!
//! Core flow
//! - Emplace the root node into a `node_queue::NodeQueue`.
//! - Pop a node (`pop_best_node` for best-first, `pop_best_bound_node` for
//!   best-estimate), solve its relaxation, and report the objective change of
//!   each branching to the `pseudocost::PseudocostEstimator`.
//! - Pick a branching column by `PseudocostEstimator::score` and emplace the
//!   children.
//! - Install improving solutions into `incumbent::SharedIncumbent` and call
//!   `NodeQueue::perform_bounding` with its upper bound.
//!
//! Module map
//! - `domain`: bound changes and read access to global column bounds.
//! - `index`: typed column and node indices.
//! - `node_queue`: the open-node queue.
//! - `pseudocost`: branching cost estimates.
//! - `incumbent`: the shared best solution.
//! - `stats`: node queue counters.
//! - `rbtree`: the intrusive order-statistic tree behind the queue.

mod column_index;
pub mod domain;
pub mod incumbent;
pub mod index;
pub mod node_queue;
pub mod pseudocost;
pub mod rbtree;
pub mod stats;
