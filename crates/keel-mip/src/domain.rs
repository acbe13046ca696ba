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


//! Bound changes and the global domain seen by the node queue.
//!
//! An open node is described relative to the root model by a stack of
//! `DomainChange`s. Global bound tightening (propagation, reduced cost fixing)
//! happens outside this crate; the queue only needs read access to the
//! resulting column bounds, which it gets through `GlobalDomain`.

use crate::index::ColumnIndex;

/// Which side of a column's domain a bound change tightens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundKind {
    /// `x >= value`
    Lower,
    /// `x <= value`
    Upper,
}

impl std::fmt::Display for BoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundKind::Lower => write!(f, ">="),
            BoundKind::Upper => write!(f, "<="),
        }
    }
}

/// A single bound change `column (>=|<=) value`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DomainChange {
    pub column: ColumnIndex,
    pub kind: BoundKind,
    pub value: f64,
}

impl DomainChange {
    #[inline]
    pub const fn new(column: ColumnIndex, kind: BoundKind, value: f64) -> Self {
        Self {
            column,
            kind,
            value,
        }
    }

    /// Creates the bound change of an up branch, `column >= value`.
    #[inline]
    pub const fn lower(column: ColumnIndex, value: f64) -> Self {
        Self::new(column, BoundKind::Lower, value)
    }

    /// Creates the bound change of a down branch, `column <= value`.
    #[inline]
    pub const fn upper(column: ColumnIndex, value: f64) -> Self {
        Self::new(column, BoundKind::Upper, value)
    }

    /// Returns `true` if this change contradicts the global bounds `[lb, ub]`
    /// by at least `feastol`.
    #[inline]
    pub fn is_infeasible_within(&self, lb: f64, ub: f64, feastol: f64) -> bool {
        match self.kind {
            BoundKind::Lower => self.value >= ub + feastol,
            BoundKind::Upper => self.value <= lb - feastol,
        }
    }
}

impl std::fmt::Display for DomainChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.column, self.kind, self.value)
    }
}

/// Read access to the current global column bounds.
pub trait GlobalDomain {
    /// Number of columns of the model.
    fn num_cols(&self) -> usize;

    /// Current global lower bound of `col`.
    fn col_lower(&self, col: ColumnIndex) -> f64;

    /// Current global upper bound of `col`.
    fn col_upper(&self, col: ColumnIndex) -> f64;
}

/// A plain vector-backed `GlobalDomain`.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnBounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl ColumnBounds {
    /// Creates bounds from lower and upper vectors.
    ///
    /// # Panics
    ///
    /// Panics if the vectors differ in length.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert_eq!(
            lower.len(),
            upper.len(),
            "called `ColumnBounds::new` with {} lower but {} upper bounds",
            lower.len(),
            upper.len()
        );
        Self { lower, upper }
    }

    /// Creates `num_cols` columns with bounds `(-inf, +inf)`.
    pub fn unbounded(num_cols: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; num_cols],
            upper: vec![f64::INFINITY; num_cols],
        }
    }

    /// Replaces the bounds of `col`.
    #[inline]
    pub fn set(&mut self, col: ColumnIndex, lb: f64, ub: f64) {
        self.lower[col.get()] = lb;
        self.upper[col.get()] = ub;
    }
}

impl GlobalDomain for ColumnBounds {
    #[inline]
    fn num_cols(&self) -> usize {
        self.lower.len()
    }

    #[inline]
    fn col_lower(&self, col: ColumnIndex) -> f64 {
        self.lower[col.get()]
    }

    #[inline]
    fn col_upper(&self, col: ColumnIndex) -> f64 {
        self.upper[col.get()]
    }
}
