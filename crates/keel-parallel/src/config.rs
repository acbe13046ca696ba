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


use crate::error::ExecutorError;

/// Default number of task slots in each worker's local deque.
pub const DEFAULT_DEQUE_CAPACITY: usize = 8192;

/// Tunables of a `TaskExecutor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Total number of workers, including the constructing thread.
    pub workers: usize,
    /// Capacity of each worker's local deque. Spawns beyond it run inline.
    pub deque_capacity: usize,
    /// An idle worker makes `steal_factor * (workers - 1)` steal attempts per round.
    pub steal_factor: usize,
    /// Steal rounds before a worker parks or a waiter blocks.
    pub yield_rounds: usize,
    /// Seed of the per-worker victim selection.
    pub seed: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            deque_capacity: DEFAULT_DEQUE_CAPACITY,
            steal_factor: 4,
            yield_rounds: 4,
            seed: 0x533D,
        }
    }
}

impl ExecutorConfig {
    /// Checks that the configuration can start an executor.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.workers == 0 {
            return Err(ExecutorError::NoWorkers);
        }
        if self.deque_capacity == 0 {
            return Err(ExecutorError::ZeroCapacity);
        }
        Ok(())
    }

    /// Number of steal attempts in one round.
    #[inline]
    pub fn steals_per_round(&self) -> usize {
        self.steal_factor * self.workers.saturating_sub(1)
    }
}

impl std::fmt::Display for ExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ExecutorConfig(workers: {}, deque_capacity: {}, steal_factor: {}, yield_rounds: {})",
            self.workers, self.deque_capacity, self.steal_factor, self.yield_rounds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ExecutorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.workers >= 1);
        assert_eq!(config.deque_capacity, 8192);
    }

    #[test]
    fn test_validate_rejects_degenerate_configs() {
        let config = ExecutorConfig {
            workers: 0,
            ..ExecutorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ExecutorError::NoWorkers)));

        let config = ExecutorConfig {
            deque_capacity: 0,
            ..ExecutorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ExecutorError::ZeroCapacity)));
    }

    #[test]
    fn test_steals_per_round() {
        let config = ExecutorConfig {
            workers: 5,
            ..ExecutorConfig::default()
        };
        assert_eq!(config.steals_per_round(), 16);

        let single = ExecutorConfig {
            workers: 1,
            ..ExecutorConfig::default()
        };
        assert_eq!(single.steals_per_round(), 0);
    }
}
