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


//! # Pseudocost Estimation
//!
//! Pseudocosts estimate how much the objective of a relaxation degrades per
//! unit of bound change on a column. After every branching the driver reports
//! the observed degradation through `add_observation`; the estimator keeps the
//! per-column, per-direction sums and sample counts plus a global total used
//! as fallback for columns that were never branched on.
//!
//! ## Scoring
//!
//! The score of a candidate with fractional value `frac` is the product of the
//! estimated up and down degradations (the product rule). A tiny deterministic
//! perturbation in `[0, 1e-5]`, derived from the column index and the seed,
//! breaks ties between otherwise equal candidates without consulting an RNG:
//!
//! ```text
//! hash  = (col + seed) * 0x9e3779b9   (wrapping u32)
//! score = up * down + 1e-5 * hash / u32::MAX
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use keel_mip::index::ColumnIndex;
//! use keel_mip::pseudocost::PseudocostEstimator;
//!
//! let mut pc = PseudocostEstimator::new(3);
//! let x = ColumnIndex::new(1);
//!
//! // Branching x up by 0.5 raised the objective by 2.
//! pc.add_observation(x, 0.5, 2.0);
//! assert_eq!(pc.pseudocost_up(x, 2.5), 2.0);
//! ```

use crate::index::ColumnIndex;

/// Scale of the tie-breaking perturbation added to every score.
const SCORE_PERTURBATION: f64 = 1e-5;

/// Multiplier of the golden-ratio hash used for the perturbation.
const HASH_MULTIPLIER: u32 = 0x9e37_79b9;

/// Tunables of a `PseudocostEstimator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudocostConfig {
    /// Samples per direction after which a column's pseudocost is trusted.
    pub min_reliable: u32,
    /// Seed of the score perturbation.
    pub seed: u32,
}

impl Default for PseudocostConfig {
    fn default() -> Self {
        Self {
            min_reliable: 8,
            seed: 0x533D,
        }
    }
}

impl PseudocostConfig {
    #[inline]
    pub fn with_min_reliable(mut self, min_reliable: u32) -> Self {
        self.min_reliable = min_reliable;
        self
    }

    #[inline]
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ColumnCosts {
    sum_up: f64,
    sum_down: f64,
    samples_up: u32,
    samples_down: u32,
}

/// Running pseudocost statistics for all columns of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct PseudocostEstimator {
    columns: Vec<ColumnCosts>,
    cost_total: f64,
    samples_total: u64,
    config: PseudocostConfig,
}

impl PseudocostEstimator {
    /// Creates an estimator for `num_cols` columns with the default configuration.
    pub fn new(num_cols: usize) -> Self {
        Self::with_config(num_cols, PseudocostConfig::default())
    }

    pub fn with_config(num_cols: usize, config: PseudocostConfig) -> Self {
        Self {
            columns: vec![ColumnCosts::default(); num_cols],
            cost_total: 0.0,
            samples_total: 0,
            config,
        }
    }

    #[inline]
    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn config(&self) -> &PseudocostConfig {
        &self.config
    }

    #[inline]
    pub fn set_seed(&mut self, seed: u32) {
        self.config.seed = seed;
    }

    #[inline]
    pub fn set_min_reliable(&mut self, min_reliable: u32) {
        self.config.min_reliable = min_reliable;
    }

    #[inline]
    pub fn min_reliable(&self) -> u32 {
        self.config.min_reliable
    }

    /// Total number of samples recorded for `col` in both directions.
    #[inline]
    pub fn num_observations(&self, col: ColumnIndex) -> u32 {
        let c = &self.columns[col.get()];
        c.samples_up + c.samples_down
    }

    /// Average per-unit cost over all observations, 0 without any.
    #[inline]
    pub fn avg_pseudocost(&self) -> f64 {
        if self.samples_total == 0 {
            0.0
        } else {
            self.cost_total / self.samples_total as f64
        }
    }

    /// Records that moving a bound of `col` by `delta` (positive for up
    /// branches) degraded the objective by `objdelta`.
    ///
    /// # Panics
    ///
    /// Panics if `delta` is zero or `objdelta` is negative.
    pub fn add_observation(&mut self, col: ColumnIndex, delta: f64, objdelta: f64) {
        assert!(
            delta != 0.0,
            "called `PseudocostEstimator::add_observation` with a zero bound change on {}",
            col
        );
        assert!(
            objdelta >= 0.0,
            "called `PseudocostEstimator::add_observation` with negative degradation {} on {}",
            objdelta,
            col
        );

        let unit_cost = objdelta / delta.abs();
        let c = &mut self.columns[col.get()];
        if delta > 0.0 {
            c.sum_up += unit_cost;
            c.samples_up += 1;
        } else {
            c.sum_down += unit_cost;
            c.samples_down += 1;
        }
        self.cost_total += unit_cost;
        self.samples_total += 1;
    }

    #[inline]
    pub fn is_reliable(&self, col: ColumnIndex) -> bool {
        let c = &self.columns[col.get()];
        c.samples_up.min(c.samples_down) >= self.config.min_reliable
    }

    #[inline]
    pub fn is_reliable_up(&self, col: ColumnIndex) -> bool {
        self.columns[col.get()].samples_up >= self.config.min_reliable
    }

    #[inline]
    pub fn is_reliable_down(&self, col: ColumnIndex) -> bool {
        self.columns[col.get()].samples_down >= self.config.min_reliable
    }

    /// Estimated degradation of rounding `frac` up. Falls back to the global
    /// average when `col` has no up samples.
    pub fn pseudocost_up(&self, col: ColumnIndex, frac: f64) -> f64 {
        let up = frac.ceil() - frac;
        let c = &self.columns[col.get()];
        if c.samples_up == 0 {
            up * self.avg_pseudocost()
        } else {
            up * c.sum_up / c.samples_up as f64
        }
    }

    /// Estimated degradation of rounding `frac` down. Falls back to the global
    /// average when `col` has no down samples.
    pub fn pseudocost_down(&self, col: ColumnIndex, frac: f64) -> f64 {
        let down = frac - frac.floor();
        let c = &self.columns[col.get()];
        if c.samples_down == 0 {
            down * self.avg_pseudocost()
        } else {
            down * c.sum_down / c.samples_down as f64
        }
    }

    /// Like `pseudocost_up`, but adds `offset` to the per-unit cost and uses
    /// 0 instead of the global average for unsampled columns.
    pub fn pseudocost_up_with_offset(&self, col: ColumnIndex, frac: f64, offset: f64) -> f64 {
        let up = frac.ceil() - frac;
        let c = &self.columns[col.get()];
        let cost = if c.samples_up == 0 {
            0.0
        } else {
            c.sum_up / c.samples_up as f64
        };
        up * (offset + cost)
    }

    pub fn pseudocost_down_with_offset(&self, col: ColumnIndex, frac: f64, offset: f64) -> f64 {
        let down = frac - frac.floor();
        let c = &self.columns[col.get()];
        let cost = if c.samples_down == 0 {
            0.0
        } else {
            c.sum_down / c.samples_down as f64
        };
        down * (offset + cost)
    }

    #[inline]
    fn perturbation(&self, col: ColumnIndex) -> f64 {
        let hash = col
            .get_u32()
            .wrapping_add(self.config.seed)
            .wrapping_mul(HASH_MULTIPLIER);
        SCORE_PERTURBATION * hash as f64 / u32::MAX as f64
    }

    /// Product score of `col` from explicit up and down cost estimates.
    #[inline]
    pub fn score_with_costs(&self, col: ColumnIndex, upcost: f64, downcost: f64) -> f64 {
        self.perturbation(col) + upcost * downcost
    }

    /// Product score of `col` at fractional value `frac`.
    #[inline]
    pub fn score(&self, col: ColumnIndex, frac: f64) -> f64 {
        let upcost = self.pseudocost_up(col, frac);
        let downcost = self.pseudocost_down(col, frac);
        self.score_with_costs(col, upcost, downcost)
    }

    /// Removes the per-column statistics of `base` from `self`, leaving only
    /// the observations recorded since `base` was cloned. The global totals
    /// are kept.
    ///
    /// # Panics
    ///
    /// Panics if the column counts differ.
    pub fn subtract_base(&mut self, base: &PseudocostEstimator) {
        assert_eq!(
            self.num_cols(),
            base.num_cols(),
            "called `PseudocostEstimator::subtract_base` with {} columns on an estimator with {}",
            base.num_cols(),
            self.num_cols()
        );
        for (c, b) in self.columns.iter_mut().zip(&base.columns) {
            c.sum_up -= b.sum_up;
            c.sum_down -= b.sum_down;
            c.samples_up = c.samples_up.saturating_sub(b.samples_up);
            c.samples_down = c.samples_down.saturating_sub(b.samples_down);
        }
    }
}

impl std::fmt::Display for PseudocostEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PseudocostEstimator(cols: {}, samples: {}, avg: {:.4})",
            self.num_cols(),
            self.samples_total,
            self.avg_pseudocost()
        )
    }
}
