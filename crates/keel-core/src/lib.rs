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


//! # Keel Core
//!
//! Foundational utilities shared by the Keel branch-and-bound crates. The
//! search-side crate (`keel-mip`) builds on these primitives instead of
//! passing raw `usize` indices and naive floating point sums around.
//!
//! ## Modules
//!
//! - `num`: Floating point accumulation helpers, most notably
//!   `CompensatedSum`, an error-free-transformation accumulator used for the
//!   search tree weight where millions of tiny `2^-depth` terms are added to
//!   values close to one.
//! - `utils`: Phantom-tagged, strongly typed indices (`TypedIndex<T>`) used
//!   for columns and open-node slots.
//!
//! Refer to each module for detailed APIs and examples.

pub mod num;
pub mod utils;
