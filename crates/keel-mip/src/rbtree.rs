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


//! # Arena Order-Statistic Red-Black Tree
//!
//! An intrusive red-black tree whose nodes live in a caller-owned arena and are
//! addressed by `u32` ids. The tree itself (`OrderStatTree`) only stores the
//! root and the cached minimum; the per-element `TreeLinks` (parent, children,
//! color, subtree size) are embedded in the arena records and reached through
//! the `LinkStore` trait. One arena record can therefore take part in several
//! trees at once by embedding several `TreeLinks`.
//!
//! Every link record carries the size of its subtree, which gives O(log n)
//! rank queries (`count_less`, `count_greater`) on top of the usual O(log n)
//! insert and delete-by-id and O(1) minimum lookup.
//!
//! Keys must be unique within one tree. The node queue guarantees this by
//! keying on `(f64, id)` pairs (`TreeKey`).

use std::cmp::Ordering;

/// Link value marking an absent parent or child.
pub const NIL: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

/// Intrusive link record embedded in every arena element that can be part of
/// an `OrderStatTree`.
#[derive(Clone, Copy, Debug)]
pub struct TreeLinks {
    parent: u32,
    left: u32,
    right: u32,
    size: u32,
    color: Color,
}

impl Default for TreeLinks {
    fn default() -> Self {
        Self {
            parent: NIL,
            left: NIL,
            right: NIL,
            size: 0,
            color: Color::Red,
        }
    }
}

impl TreeLinks {
    /// Returns `true` if the record is currently linked into a tree.
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.size != 0
    }
}

/// A totally ordered `(value, id)` key. Floating point values are compared
/// with `f64::total_cmp`, ties are broken by ascending id.
#[derive(Clone, Copy, Debug)]
pub struct TreeKey {
    pub value: f64,
    pub id: u32,
}

impl TreeKey {
    #[inline]
    pub const fn new(value: f64, id: u32) -> Self {
        Self { value, id }
    }
}

impl PartialEq for TreeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TreeKey {}

impl PartialOrd for TreeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then(self.id.cmp(&other.id))
    }
}

/// Access to the arena records of one tree.
pub trait LinkStore {
    type Key: Ord;

    /// Returns the ordering key of element `id`.
    fn key(&self, id: u32) -> Self::Key;

    /// Returns the tree links of element `id`.
    fn links(&self, id: u32) -> &TreeLinks;

    /// Returns the tree links of element `id` mutably.
    fn links_mut(&mut self, id: u32) -> &mut TreeLinks;
}

#[inline(always)]
fn left<S: LinkStore>(s: &S, x: u32) -> u32 {
    s.links(x).left
}

#[inline(always)]
fn right<S: LinkStore>(s: &S, x: u32) -> u32 {
    s.links(x).right
}

#[inline(always)]
fn parent<S: LinkStore>(s: &S, x: u32) -> u32 {
    s.links(x).parent
}

#[inline(always)]
fn size<S: LinkStore>(s: &S, x: u32) -> u32 {
    if x == NIL { 0 } else { s.links(x).size }
}

#[inline(always)]
fn is_red<S: LinkStore>(s: &S, x: u32) -> bool {
    x != NIL && s.links(x).color == Color::Red
}

#[inline(always)]
fn set_color<S: LinkStore>(s: &mut S, x: u32, color: Color) {
    if x != NIL {
        s.links_mut(x).color = color;
    }
}

#[inline(always)]
fn update_size<S: LinkStore>(s: &mut S, x: u32) {
    let n = 1 + size(s, left(s, x)) + size(s, right(s, x));
    s.links_mut(x).size = n;
}

fn minimum<S: LinkStore>(s: &S, mut x: u32) -> u32 {
    while left(s, x) != NIL {
        x = left(s, x);
    }
    x
}

/// Returns the in-order successor of `x`, or `NIL` if `x` is the maximum.
pub fn successor<S: LinkStore>(s: &S, x: u32) -> u32 {
    let r = right(s, x);
    if r != NIL {
        return minimum(s, r);
    }
    let mut x = x;
    let mut p = parent(s, x);
    while p != NIL && x == right(s, p) {
        x = p;
        p = parent(s, p);
    }
    p
}

/// Root and cached minimum of an intrusive order-statistic tree.
#[derive(Clone, Copy, Debug)]
pub struct OrderStatTree {
    root: u32,
    min: u32,
}

impl Default for OrderStatTree {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderStatTree {
    /// Creates an empty tree.
    #[inline]
    pub const fn new() -> Self {
        Self {
            root: NIL,
            min: NIL,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    /// Returns the number of elements, read from the root's subtree size.
    #[inline]
    pub fn len<S: LinkStore>(&self, s: &S) -> usize {
        size(s, self.root) as usize
    }

    /// Returns the id of the minimum element.
    #[inline]
    pub fn first(&self) -> Option<u32> {
        if self.min == NIL { None } else { Some(self.min) }
    }

    fn rotate_left<S: LinkStore>(&mut self, s: &mut S, x: u32) {
        let y = right(s, x);
        let yl = left(s, y);
        s.links_mut(x).right = yl;
        if yl != NIL {
            s.links_mut(yl).parent = x;
        }
        let xp = parent(s, x);
        s.links_mut(y).parent = xp;
        if xp == NIL {
            self.root = y;
        } else if x == left(s, xp) {
            s.links_mut(xp).left = y;
        } else {
            s.links_mut(xp).right = y;
        }
        s.links_mut(y).left = x;
        s.links_mut(x).parent = y;
        update_size(s, x);
        update_size(s, y);
    }

    fn rotate_right<S: LinkStore>(&mut self, s: &mut S, x: u32) {
        let y = left(s, x);
        let yr = right(s, y);
        s.links_mut(x).left = yr;
        if yr != NIL {
            s.links_mut(yr).parent = x;
        }
        let xp = parent(s, x);
        s.links_mut(y).parent = xp;
        if xp == NIL {
            self.root = y;
        } else if x == right(s, xp) {
            s.links_mut(xp).right = y;
        } else {
            s.links_mut(xp).left = y;
        }
        s.links_mut(y).right = x;
        s.links_mut(x).parent = y;
        update_size(s, x);
        update_size(s, y);
    }

    /// Links element `z` into the tree.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `z` is already linked.
    pub fn insert<S: LinkStore>(&mut self, s: &mut S, z: u32) {
        debug_assert!(
            !s.links(z).is_linked(),
            "called `OrderStatTree::insert` with element {} that is already linked",
            z
        );

        let key = s.key(z);
        let mut y = NIL;
        let mut x = self.root;
        let mut is_min = true;
        let mut go_left = false;
        while x != NIL {
            y = x;
            s.links_mut(x).size += 1;
            if key < s.key(x) {
                go_left = true;
                x = left(s, x);
            } else {
                go_left = false;
                is_min = false;
                x = right(s, x);
            }
        }

        *s.links_mut(z) = TreeLinks {
            parent: y,
            left: NIL,
            right: NIL,
            size: 1,
            color: Color::Red,
        };

        if y == NIL {
            self.root = z;
        } else if go_left {
            s.links_mut(y).left = z;
        } else {
            s.links_mut(y).right = z;
        }

        if is_min {
            self.min = z;
        }

        self.insert_fixup(s, z);
    }

    fn insert_fixup<S: LinkStore>(&mut self, s: &mut S, mut z: u32) {
        while is_red(s, parent(s, z)) {
            let p = parent(s, z);
            let g = parent(s, p);
            if p == left(s, g) {
                let u = right(s, g);
                if is_red(s, u) {
                    set_color(s, p, Color::Black);
                    set_color(s, u, Color::Black);
                    set_color(s, g, Color::Red);
                    z = g;
                } else {
                    if z == right(s, p) {
                        z = p;
                        self.rotate_left(s, z);
                    }
                    let p = parent(s, z);
                    let g = parent(s, p);
                    set_color(s, p, Color::Black);
                    set_color(s, g, Color::Red);
                    self.rotate_right(s, g);
                }
            } else {
                let u = left(s, g);
                if is_red(s, u) {
                    set_color(s, p, Color::Black);
                    set_color(s, u, Color::Black);
                    set_color(s, g, Color::Red);
                    z = g;
                } else {
                    if z == left(s, p) {
                        z = p;
                        self.rotate_right(s, z);
                    }
                    let p = parent(s, z);
                    let g = parent(s, p);
                    set_color(s, p, Color::Black);
                    set_color(s, g, Color::Red);
                    self.rotate_left(s, g);
                }
            }
        }
        let root = self.root;
        set_color(s, root, Color::Black);
    }

    fn transplant<S: LinkStore>(&mut self, s: &mut S, u: u32, v: u32) {
        let up = parent(s, u);
        if up == NIL {
            self.root = v;
        } else if u == left(s, up) {
            s.links_mut(up).left = v;
        } else {
            s.links_mut(up).right = v;
        }
        if v != NIL {
            s.links_mut(v).parent = up;
        }
    }

    /// Unlinks element `z` from the tree and resets its links.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `z` is not linked.
    pub fn remove<S: LinkStore>(&mut self, s: &mut S, z: u32) {
        debug_assert!(
            s.links(z).is_linked(),
            "called `OrderStatTree::remove` with element {} that is not linked",
            z
        );

        if self.min == z {
            self.min = successor(s, z);
        }

        let mut removed_color = s.links(z).color;
        let x;
        let x_parent;

        if left(s, z) == NIL {
            x = right(s, z);
            x_parent = parent(s, z);
            self.transplant(s, z, x);
        } else if right(s, z) == NIL {
            x = left(s, z);
            x_parent = parent(s, z);
            self.transplant(s, z, x);
        } else {
            let y = minimum(s, right(s, z));
            removed_color = s.links(y).color;
            x = right(s, y);
            if parent(s, y) == z {
                x_parent = y;
            } else {
                x_parent = parent(s, y);
                self.transplant(s, y, x);
                let zr = right(s, z);
                s.links_mut(y).right = zr;
                s.links_mut(zr).parent = y;
            }
            self.transplant(s, z, y);
            let zl = left(s, z);
            s.links_mut(y).left = zl;
            s.links_mut(zl).parent = y;
            let zc = s.links(z).color;
            s.links_mut(y).color = zc;
        }

        // All structural changes are done; restore subtree sizes bottom-up.
        let mut w = x_parent;
        while w != NIL {
            update_size(s, w);
            w = parent(s, w);
        }

        if removed_color == Color::Black {
            self.remove_fixup(s, x, x_parent);
        }

        *s.links_mut(z) = TreeLinks::default();
    }

    fn remove_fixup<S: LinkStore>(&mut self, s: &mut S, mut x: u32, mut xp: u32) {
        while x != self.root && !is_red(s, x) {
            if x == left(s, xp) {
                let mut w = right(s, xp);
                if is_red(s, w) {
                    set_color(s, w, Color::Black);
                    set_color(s, xp, Color::Red);
                    self.rotate_left(s, xp);
                    w = right(s, xp);
                }
                if !is_red(s, left(s, w)) && !is_red(s, right(s, w)) {
                    set_color(s, w, Color::Red);
                    x = xp;
                    xp = parent(s, x);
                } else {
                    if !is_red(s, right(s, w)) {
                        let wl = left(s, w);
                        set_color(s, wl, Color::Black);
                        set_color(s, w, Color::Red);
                        self.rotate_right(s, w);
                        w = right(s, xp);
                    }
                    let c = s.links(xp).color;
                    set_color(s, w, c);
                    set_color(s, xp, Color::Black);
                    let wr = right(s, w);
                    set_color(s, wr, Color::Black);
                    self.rotate_left(s, xp);
                    x = self.root;
                    xp = NIL;
                }
            } else {
                let mut w = left(s, xp);
                if is_red(s, w) {
                    set_color(s, w, Color::Black);
                    set_color(s, xp, Color::Red);
                    self.rotate_right(s, xp);
                    w = left(s, xp);
                }
                if !is_red(s, right(s, w)) && !is_red(s, left(s, w)) {
                    set_color(s, w, Color::Red);
                    x = xp;
                    xp = parent(s, x);
                } else {
                    if !is_red(s, left(s, w)) {
                        let wr = right(s, w);
                        set_color(s, wr, Color::Black);
                        set_color(s, w, Color::Red);
                        self.rotate_left(s, w);
                        w = left(s, xp);
                    }
                    let c = s.links(xp).color;
                    set_color(s, w, c);
                    set_color(s, xp, Color::Black);
                    let wl = left(s, w);
                    set_color(s, wl, Color::Black);
                    self.rotate_right(s, xp);
                    x = self.root;
                    xp = NIL;
                }
            }
        }
        set_color(s, x, Color::Black);
    }

    /// Counts the elements whose key is strictly less than `pivot`.
    pub fn count_less<S: LinkStore>(&self, s: &S, pivot: &S::Key) -> usize {
        let mut n = 0usize;
        let mut x = self.root;
        while x != NIL {
            if s.key(x) < *pivot {
                n += size(s, left(s, x)) as usize + 1;
                x = right(s, x);
            } else {
                x = left(s, x);
            }
        }
        n
    }

    /// Counts the elements whose key is strictly greater than `pivot`.
    pub fn count_greater<S: LinkStore>(&self, s: &S, pivot: &S::Key) -> usize {
        let mut n = 0usize;
        let mut x = self.root;
        while x != NIL {
            if s.key(x) > *pivot {
                n += size(s, right(s, x)) as usize + 1;
                x = left(s, x);
            } else {
                x = right(s, x);
            }
        }
        n
    }

    /// Returns the smallest element whose key is strictly greater than `pivot`.
    pub fn first_greater<S: LinkStore>(&self, s: &S, pivot: &S::Key) -> Option<u32> {
        let mut best = NIL;
        let mut x = self.root;
        while x != NIL {
            if s.key(x) > *pivot {
                best = x;
                x = left(s, x);
            } else {
                x = right(s, x);
            }
        }
        if best == NIL { None } else { Some(best) }
    }

    /// Returns the smallest element whose key is greater than or equal to `pivot`.
    pub fn first_at_least<S: LinkStore>(&self, s: &S, pivot: &S::Key) -> Option<u32> {
        let mut best = NIL;
        let mut x = self.root;
        while x != NIL {
            if s.key(x) >= *pivot {
                best = x;
                x = left(s, x);
            } else {
                x = right(s, x);
            }
        }
        if best == NIL { None } else { Some(best) }
    }

    /// Iterates the element ids in ascending key order.
    #[inline]
    pub fn iter<'a, S: LinkStore>(&self, s: &'a S) -> TreeIter<'a, S> {
        TreeIter {
            store: s,
            next: self.min,
        }
    }

    /// Iterates the element ids whose key is strictly greater than `pivot`,
    /// in ascending key order.
    #[inline]
    pub fn iter_greater<'a, S: LinkStore>(&self, s: &'a S, pivot: &S::Key) -> TreeIter<'a, S> {
        TreeIter {
            store: s,
            next: self.first_greater(s, pivot).unwrap_or(NIL),
        }
    }

    /// Iterates the element ids whose key is greater than or equal to `pivot`,
    /// in ascending key order.
    #[inline]
    pub fn iter_at_least<'a, S: LinkStore>(&self, s: &'a S, pivot: &S::Key) -> TreeIter<'a, S> {
        TreeIter {
            store: s,
            next: self.first_at_least(s, pivot).unwrap_or(NIL),
        }
    }

    /// Verifies the red-black and size invariants and returns the element count.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    #[cfg(test)]
    pub fn validate<S: LinkStore>(&self, s: &S) -> usize {
        fn walk<S: LinkStore>(s: &S, x: u32, p: u32) -> (u32, u32) {
            if x == NIL {
                return (1, 0);
            }
            assert_eq!(parent(s, x), p, "parent link mismatch at {}", x);
            let (l, r) = (left(s, x), right(s, x));
            if is_red(s, x) {
                assert!(!is_red(s, l) && !is_red(s, r), "red node {} has red child", x);
            }
            if l != NIL {
                assert!(s.key(l) < s.key(x), "left child out of order at {}", x);
            }
            if r != NIL {
                assert!(s.key(r) > s.key(x), "right child out of order at {}", x);
            }
            let (bl, nl) = walk(s, l, x);
            let (br, nr) = walk(s, r, x);
            assert_eq!(bl, br, "black height mismatch at {}", x);
            assert_eq!(size(s, x), nl + nr + 1, "size mismatch at {}", x);
            (bl + u32::from(!is_red(s, x)), nl + nr + 1)
        }
        assert!(!is_red(s, self.root), "root must be black");
        let (_, n) = walk(s, self.root, NIL);
        if n == 0 {
            assert_eq!(self.min, NIL);
        } else {
            assert_eq!(self.min, minimum(s, self.root), "cached minimum is stale");
        }
        n as usize
    }
}

/// In-order iterator over the element ids of an `OrderStatTree`.
pub struct TreeIter<'a, S> {
    store: &'a S,
    next: u32,
}

impl<'a, S: LinkStore> Iterator for TreeIter<'a, S> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next == NIL {
            return None;
        }
        let current = self.next;
        self.next = successor(self.store, current);
        Some(current)
    }
}
