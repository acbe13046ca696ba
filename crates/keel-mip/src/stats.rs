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


/// Counters collected by a `NodeQueue` over its lifetime.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeQueueStatistics {
    /// Total nodes inserted.
    pub nodes_emplaced: u64,
    /// Nodes emplaced directly into the suboptimal set.
    pub nodes_emplaced_suboptimal: u64,
    /// Total nodes handed out by `pop_best_node` and `pop_best_bound_node`.
    pub nodes_popped: u64,
    /// Nodes moved into the suboptimal set by bounding.
    pub nodes_demoted: u64,
    /// Nodes removed because a global bound change made them infeasible.
    pub prunings_infeasible: u64,
    /// Nodes removed through `prune_node`.
    pub prunings_explicit: u64,
    /// Cumulative tree weight of all removed nodes.
    pub pruned_weight: f64,
    /// The deepest node ever emplaced.
    pub max_depth: u32,
}

impl NodeQueueStatistics {
    #[inline]
    pub fn on_emplace(&mut self, depth: u32, suboptimal: bool) {
        self.nodes_emplaced = self.nodes_emplaced.saturating_add(1);
        if suboptimal {
            self.nodes_emplaced_suboptimal = self.nodes_emplaced_suboptimal.saturating_add(1);
        }
        self.max_depth = self.max_depth.max(depth);
    }

    #[inline]
    pub fn on_pop(&mut self) {
        self.nodes_popped = self.nodes_popped.saturating_add(1);
    }

    #[inline]
    pub fn on_demote(&mut self, count: u64) {
        self.nodes_demoted = self.nodes_demoted.saturating_add(count);
    }

    /// Records an infeasibility pruning that removed `weight`.
    #[inline]
    pub fn on_pruning_infeasible(&mut self, weight: f64) {
        self.prunings_infeasible = self.prunings_infeasible.saturating_add(1);
        self.pruned_weight += weight;
    }

    #[inline]
    pub fn on_pruning_explicit(&mut self, weight: f64) {
        self.prunings_explicit = self.prunings_explicit.saturating_add(1);
        self.pruned_weight += weight;
    }
}

impl std::fmt::Display for NodeQueueStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Node Queue Statistics:")?;
        writeln!(f, "  Nodes emplaced:        {}", self.nodes_emplaced)?;
        writeln!(f, "    into suboptimal:     {}", self.nodes_emplaced_suboptimal)?;
        writeln!(f, "  Nodes popped:          {}", self.nodes_popped)?;
        writeln!(f, "  Nodes demoted:         {}", self.nodes_demoted)?;
        writeln!(f, "  Prunings (infeasible): {}", self.prunings_infeasible)?;
        writeln!(f, "  Prunings (explicit):   {}", self.prunings_explicit)?;
        writeln!(f, "  Pruned weight:         {:.6}", self.pruned_weight)?;
        writeln!(f, "  Max depth:             {}", self.max_depth)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut stats = NodeQueueStatistics::default();
        stats.on_emplace(3, false);
        stats.on_emplace(1, true);
        stats.on_pop();
        stats.on_demote(2);
        stats.on_pruning_infeasible(0.25);
        stats.on_pruning_explicit(0.5);

        assert_eq!(stats.nodes_emplaced, 2);
        assert_eq!(stats.nodes_emplaced_suboptimal, 1);
        assert_eq!(stats.nodes_popped, 1);
        assert_eq!(stats.nodes_demoted, 2);
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.pruned_weight, 0.75);
    }

    #[test]
    fn test_display_report() {
        let stats = NodeQueueStatistics::default();
        let report = stats.to_string();
        assert!(report.starts_with("Node Queue Statistics:"));
        assert!(report.contains("Nodes popped:          0"));
    }
}
