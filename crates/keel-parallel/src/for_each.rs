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


//! Parallel loops on top of `spawn`/`sync`.

use crate::executor::WorkerContext;
use std::ops::Range;
use std::sync::Arc;

/// Calls `f` on disjoint chunks of `range` of at most `grain` indices each.
///
/// The range is split in halves recursively; the upper half is spawned and
/// the lower half processed by the calling worker, so idle workers steal the
/// largest remaining pieces first. Returns after every chunk has been
/// processed.
///
/// # Panics
///
/// Re-raises the first panic of `f` observed while syncing.
pub fn for_each<F>(ctx: &WorkerContext, range: Range<usize>, grain: usize, f: F)
where
    F: Fn(Range<usize>) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    split(ctx, range, grain.max(1), &f);
}

fn split<F>(ctx: &WorkerContext, range: Range<usize>, grain: usize, f: &Arc<F>)
where
    F: Fn(Range<usize>) + Send + Sync + 'static,
{
    if range.len() <= grain {
        if !range.is_empty() {
            f(range);
        }
        return;
    }

    let mid = range.start + range.len() / 2;
    let upper = mid..range.end;
    let g = Arc::clone(f);
    let handle = ctx.spawn(move |ctx| split(ctx, upper, grain, &g));
    split(ctx, range.start..mid, grain, f);
    ctx.sync(handle);
}
