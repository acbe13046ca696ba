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


//! # Strongly Typed Indices
//!
//! Phantom-typed wrappers around `usize` so that the different index spaces of
//! the branch-and-bound core (columns of the model, slots of the open-node
//! arena) cannot be mixed up. `TypedIndex<T>` compiles down to a plain `usize`
//! (`#[repr(transparent)]`) and only carries its tag at the type level.
//!
//! ## Usage
//!
//! ```rust
//! use keel_core::utils::index::{TypedIndex, TypedIndexTag};
//!
//! #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
//! struct ColumnTag;
//! impl TypedIndexTag for ColumnTag { const NAME: &'static str = "Column"; }
//!
//! type Column = TypedIndex<ColumnTag>;
//! let c = Column::new(3);
//! assert_eq!(c.get(), 3);
//! assert_eq!(format!("{}", c), "Column(3)");
//! ```

/// Names an index space for `Debug`/`Display` output.
pub trait TypedIndexTag: Clone {
    const NAME: &'static str;
}

/// A `usize` index bound to the index space `T`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypedIndex<T> {
    index: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T> TypedIndex<T> {
    /// Creates a new index.
    #[inline(always)]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            _marker: std::marker::PhantomData,
        }
    }

    /// Returns the underlying `usize`.
    #[inline(always)]
    pub const fn get(&self) -> usize {
        self.index
    }

    /// Returns the index narrowed to `u32`, the width used by arena links.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the index does not fit into `u32`.
    #[inline(always)]
    pub fn get_u32(&self) -> u32 {
        debug_assert!(
            self.index <= u32::MAX as usize,
            "called `TypedIndex::get_u32` on an index that does not fit into u32: {}",
            self.index
        );
        self.index as u32
    }

    /// Creates an index from an arena link.
    #[inline(always)]
    pub const fn from_u32(index: u32) -> Self {
        Self::new(index as usize)
    }
}

impl<T> std::fmt::Debug for TypedIndex<T>
where
    T: TypedIndexTag,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", T::NAME, self.index)
    }
}

impl<T> std::fmt::Display for TypedIndex<T>
where
    T: TypedIndexTag,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", T::NAME, self.index)
    }
}

impl<T> From<usize> for TypedIndex<T> {
    #[inline]
    fn from(index: usize) -> Self {
        Self::new(index)
    }
}

impl<T> From<TypedIndex<T>> for usize {
    #[inline]
    fn from(typed_index: TypedIndex<T>) -> Self {
        typed_index.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
    struct SlotTag;

    impl TypedIndexTag for SlotTag {
        const NAME: &'static str = "Slot";
    }

    type Slot = TypedIndex<SlotTag>;

    #[test]
    fn test_new_and_get() {
        let idx = Slot::new(10);
        assert_eq!(idx.get(), 10);
        assert_eq!(idx.get_u32(), 10);
        assert_eq!(Slot::from_u32(10), idx);
    }

    #[test]
    fn test_conversions() {
        let idx: Slot = 42.into();
        assert_eq!(idx.get(), 42);
        let val: usize = idx.into();
        assert_eq!(val, 42);
    }

    #[test]
    fn test_debug_and_display_use_tag_name() {
        let idx = Slot::new(7);
        assert_eq!(format!("{}", idx), "Slot(7)");
        assert_eq!(format!("{:?}", idx), "Slot(7)");
    }

    #[test]
    fn test_ordering_follows_raw_index() {
        let mut v = vec![Slot::new(3), Slot::new(1), Slot::new(2)];
        v.sort();
        assert_eq!(v, vec![Slot::new(1), Slot::new(2), Slot::new(3)]);
    }
}
