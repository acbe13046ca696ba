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


//! # Compensated Summation
//!
//! `CompensatedSum` stores a running sum as an unevaluated pair `hi + lo`
//! where `hi` is the rounded sum and `lo` the exact rounding error collected
//! through Knuth's TwoSum transformation. The result of `value()` is accurate to
//! roughly twice the precision of a naive `f64` accumulation.
//!
//! ## Usage
//!
//! ```rust
//! use keel_core::num::compensated::CompensatedSum;
//!
//! let mut weight = CompensatedSum::new();
//! weight += 1e16;
//! weight += 1.0;
//! weight -= 1e16;
//! assert_eq!(weight.value(), 1.0);
//! ```

/// Error-free transformation of `a + b` into `(s, e)` with `s + e == a + b`
/// exactly and `s == fl(a + b)`.
#[inline(always)]
fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    let e = (a - (s - bb)) + (b - bb);
    (s, e)
}

/// A floating point accumulator that tracks the rounding error of each addition.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompensatedSum {
    hi: f64,
    lo: f64,
}

impl CompensatedSum {
    /// Creates a new accumulator holding zero.
    #[inline]
    pub const fn new() -> Self {
        Self { hi: 0.0, lo: 0.0 }
    }

    /// Creates an accumulator holding `value`.
    #[inline]
    pub const fn from_value(value: f64) -> Self {
        Self { hi: value, lo: 0.0 }
    }

    /// Adds `value` to the running sum.
    #[inline]
    pub fn add(&mut self, value: f64) {
        let (s, e) = two_sum(self.hi, value);
        let lo = self.lo + e;
        let (hi, lo) = two_sum(s, lo);
        self.hi = hi;
        self.lo = lo;
    }

    /// Adds another compensated sum, keeping both error terms.
    #[inline]
    pub fn add_sum(&mut self, other: &CompensatedSum) {
        let (s, e) = two_sum(self.hi, other.hi);
        let lo = self.lo + other.lo + e;
        let (hi, lo) = two_sum(s, lo);
        self.hi = hi;
        self.lo = lo;
    }

    /// Returns the accumulated value rounded to `f64`.
    #[inline]
    pub fn value(&self) -> f64 {
        self.hi + self.lo
    }

    /// Resets the accumulator to zero.
    #[inline]
    pub fn reset(&mut self) {
        self.hi = 0.0;
        self.lo = 0.0;
    }
}

impl From<f64> for CompensatedSum {
    #[inline]
    fn from(value: f64) -> Self {
        Self::from_value(value)
    }
}

impl From<CompensatedSum> for f64 {
    #[inline]
    fn from(sum: CompensatedSum) -> Self {
        sum.value()
    }
}

impl std::ops::AddAssign<f64> for CompensatedSum {
    #[inline]
    fn add_assign(&mut self, rhs: f64) {
        self.add(rhs);
    }
}

impl std::ops::SubAssign<f64> for CompensatedSum {
    #[inline]
    fn sub_assign(&mut self, rhs: f64) {
        self.add(-rhs);
    }
}

impl std::ops::AddAssign<CompensatedSum> for CompensatedSum {
    #[inline]
    fn add_assign(&mut self, rhs: CompensatedSum) {
        self.add_sum(&rhs);
    }
}

impl std::iter::Sum<f64> for CompensatedSum {
    fn sum<I: Iterator<Item = f64>>(iter: I) -> Self {
        let mut acc = CompensatedSum::new();
        for v in iter {
            acc.add(v);
        }
        acc
    }
}

impl std::fmt::Display for CompensatedSum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.value(), f)
    }
}
