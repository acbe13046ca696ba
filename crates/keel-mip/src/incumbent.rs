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


//! # Shared Incumbent
//!
//! The best primal solution found so far, shared between search workers.
//! The objective is mirrored into an `AtomicU64` (the bit pattern of an `f64`)
//! so that workers can read the current cutoff for `NodeQueue::perform_bounding`
//! without locking. The solution itself lives behind a `Mutex`, which is the
//! source of truth for every install decision.
//!
//! The cutoff starts at `+inf`, meaning "no incumbent yet". Objectives are
//! minimized.
//!
//! ## Usage
//!
//! ```rust
//! use keel_mip::incumbent::SharedIncumbent;
//!
//! let inc = SharedIncumbent::new();
//! assert!(inc.try_install(12.5, vec![1.0, 0.0]));
//! assert!(!inc.try_install(13.0, vec![0.0, 1.0]));
//! assert_eq!(inc.upper_bound(), 12.5);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A primal solution: objective plus column values.
#[derive(Debug, Clone, PartialEq)]
pub struct IncumbentSolution {
    pub objective: f64,
    pub values: Vec<f64>,
}

/// A concurrent holder for the incumbent solution.
#[derive(Debug)]
pub struct SharedIncumbent {
    /// `f64::to_bits` of the incumbent objective. Only a hint for fast reads.
    upper_bound: AtomicU64,
    solution: Mutex<Option<IncumbentSolution>>,
}

impl Default for SharedIncumbent {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SharedIncumbent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Incumbent(upper_bound: {})", self.upper_bound())
    }
}

impl SharedIncumbent {
    /// Creates an incumbent holder with no solution and an infinite cutoff.
    #[inline]
    pub fn new() -> Self {
        Self {
            upper_bound: AtomicU64::new(f64::INFINITY.to_bits()),
            solution: Mutex::new(None),
        }
    }

    /// Returns the objective of the incumbent, `+inf` if there is none.
    #[inline]
    pub fn upper_bound(&self) -> f64 {
        f64::from_bits(self.upper_bound.load(Ordering::Acquire))
    }

    /// Returns `true` once a solution has been installed.
    #[inline]
    pub fn has_solution(&self) -> bool {
        self.upper_bound().is_finite()
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Option<IncumbentSolution>> {
        // The guarded state is replaced wholesale, so a poisoned lock still holds a valid value.
        self.solution.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a clone of the incumbent solution, if any.
    pub fn snapshot(&self) -> Option<IncumbentSolution> {
        self.lock().clone()
    }

    /// Installs `(objective, values)` if it strictly improves the incumbent.
    /// Returns `true` if the candidate was installed.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `objective` is NaN.
    pub fn try_install(&self, objective: f64, values: Vec<f64>) -> bool {
        debug_assert!(
            !objective.is_nan(),
            "called `SharedIncumbent::try_install` with a NaN objective"
        );

        if objective >= self.upper_bound() {
            return false;
        }

        let mut guard = self.lock();
        // The atomic read above may be stale; the mutex-held objective decides.
        if let Some(current) = guard.as_ref() {
            if objective >= current.objective {
                return false;
            }
        }

        *guard = Some(IncumbentSolution { objective, values });
        self.upper_bound.store(objective.to_bits(), Ordering::Release);
        log::debug!("new incumbent with objective {}", objective);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::SharedIncumbent;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_initial_state() {
        let inc = SharedIncumbent::new();
        assert_eq!(inc.upper_bound(), f64::INFINITY);
        assert!(!inc.has_solution());
        assert!(inc.snapshot().is_none());
    }

    #[test]
    fn test_install_better_solution_updates_upper_bound_and_snapshot() {
        let inc = SharedIncumbent::new();
        assert!(inc.try_install(100.0, vec![1.0, 2.0, 3.0]));
        assert_eq!(inc.upper_bound(), 100.0);

        let snap = inc.snapshot().expect("snapshot should be Some");
        assert_eq!(snap.objective, 100.0);
        assert_eq!(snap.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_reject_worse_or_equal_candidates() {
        let inc = SharedIncumbent::new();
        assert!(inc.try_install(100.0, vec![0.0]));
        assert!(!inc.try_install(150.0, vec![1.0]));
        assert!(!inc.try_install(100.0, vec![2.0]));
        assert_eq!(inc.upper_bound(), 100.0);
        assert_eq!(inc.snapshot().unwrap().values, vec![0.0]);
    }

    #[test]
    fn test_negative_objectives() {
        let inc = SharedIncumbent::new();
        assert!(inc.try_install(-3.0, vec![]));
        assert!(inc.try_install(-7.5, vec![]));
        assert_eq!(inc.upper_bound(), -7.5);
    }

    #[test]
    fn test_concurrent_installs_minimum_wins() {
        let inc = Arc::new(SharedIncumbent::new());
        let objectives = vec![300.0, 200.0, 400.0, 50.0, 120.0, 75.0, 500.0, 60.0, 90.0];

        let handles: Vec<_> = objectives
            .iter()
            .copied()
            .map(|obj| {
                let inc = Arc::clone(&inc);
                thread::spawn(move || inc.try_install(obj, vec![obj]))
            })
            .collect();

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().any(|&r| r));

        assert_eq!(inc.upper_bound(), 50.0);
        let snap = inc.snapshot().unwrap();
        assert_eq!(snap.objective, 50.0);
        assert_eq!(snap.values, vec![50.0]);
    }
}
