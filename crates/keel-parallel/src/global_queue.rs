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


//! Queue of top-level submissions and parking place of idle workers.
//!
//! Submissions go through a `crossbeam_deque::Injector`; idle workers sleep on
//! their own `Parker`. A worker about to park registers as a sleeper, fences
//! and rechecks for work. A producer publishes work, fences and unparks a
//! registered sleeper. One of the two always observes the other, so no wakeup
//! is lost.

use crate::deque::steal_queued;
use crate::task::{TaskCell, lock};
use crossbeam_deque::Injector;
use crossbeam_utils::sync::{Parker, Unparker};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering, fence};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub(crate) struct GlobalQueue {
    injector: Injector<Arc<TaskCell>>,
    unparkers: Box<[Unparker]>,
    sleepers: Mutex<Vec<usize>>,
    /// Length of `sleepers`, read on the spawn path without locking.
    num_sleepers: AtomicUsize,
    shutdown: AtomicBool,
}

impl GlobalQueue {
    /// Creates the queue for workers whose unparkers are `unparkers[i]`.
    pub(crate) fn new(unparkers: Vec<Unparker>) -> Self {
        Self {
            injector: Injector::new(),
            unparkers: unparkers.into_boxed_slice(),
            sleepers: Mutex::new(Vec::new()),
            num_sleepers: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Enqueues a submission and wakes one parked worker.
    pub(crate) fn push(&self, task: Arc<TaskCell>) {
        self.injector.push(task);
        self.wake_one();
    }

    #[inline]
    pub(crate) fn try_pop(&self) -> Option<Arc<TaskCell>> {
        steal_queued(|| self.injector.steal())
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.injector.len()
    }

    #[inline]
    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Unparks one sleeping worker, if any. Called after work was published.
    pub(crate) fn wake_one(&self) {
        fence(Ordering::SeqCst);
        if self.num_sleepers.load(Ordering::SeqCst) == 0 {
            return;
        }
        let sleeper = {
            let mut sleepers = lock(&self.sleepers);
            let sleeper = sleepers.pop();
            self.num_sleepers.store(sleepers.len(), Ordering::SeqCst);
            sleeper
        };
        if let Some(worker) = sleeper {
            self.unparkers[worker].unpark();
        }
    }

    /// Parks `worker` unless submissions or `has_work` report pending work
    /// after it registered as a sleeper. Returns `false` once shut down.
    pub(crate) fn park(&self, worker: usize, parker: &Parker, has_work: impl Fn() -> bool) -> bool {
        {
            let mut sleepers = lock(&self.sleepers);
            sleepers.push(worker);
            self.num_sleepers.store(sleepers.len(), Ordering::SeqCst);
        }
        fence(Ordering::SeqCst);

        if !self.is_shut_down() && self.injector.is_empty() && !has_work() {
            parker.park();
        }

        let mut sleepers = lock(&self.sleepers);
        if let Some(pos) = sleepers.iter().position(|&w| w == worker) {
            sleepers.swap_remove(pos);
            self.num_sleepers.store(sleepers.len(), Ordering::SeqCst);
        }
        drop(sleepers);
        !self.is_shut_down()
    }

    /// Releases every parked worker for good.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for unparker in self.unparkers.iter() {
            unparker.unpark();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn cell() -> Arc<TaskCell> {
        Arc::new(TaskCell::new(Box::new(|_| {})))
    }

    fn queue_with_parkers(n: usize) -> (Arc<GlobalQueue>, Vec<Parker>) {
        let parkers: Vec<Parker> = (0..n).map(|_| Parker::new()).collect();
        let unparkers = parkers.iter().map(|p| p.unparker().clone()).collect();
        (Arc::new(GlobalQueue::new(unparkers)), parkers)
    }

    #[test]
    fn test_fifo_order_skips_claimed_tasks() {
        let queue = GlobalQueue::new(Vec::new());
        let (a, b, c) = (cell(), cell(), cell());
        queue.push(Arc::clone(&a));
        queue.push(Arc::clone(&b));
        queue.push(Arc::clone(&c));
        assert_eq!(queue.len(), 3);
        assert!(b.try_claim(0));

        assert!(Arc::ptr_eq(&queue.try_pop().unwrap(), &a));
        assert!(Arc::ptr_eq(&queue.try_pop().unwrap(), &c));
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_push_wakes_parked_worker() {
        let (queue, mut parkers) = queue_with_parkers(1);
        let parker = parkers.remove(0);
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.park(0, &parker, || false))
        };
        while queue.num_sleepers.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }
        queue.push(cell());
        assert!(waiter.join().unwrap());
        assert!(queue.try_pop().is_some());
    }

    #[test]
    fn test_pending_work_skips_parking() {
        let (queue, parkers) = queue_with_parkers(1);
        // Would block forever if the recheck after registration were missing.
        assert!(queue.park(0, &parkers[0], || true));
        assert_eq!(queue.num_sleepers.load(Ordering::SeqCst), 0);

        queue.push(cell());
        assert!(queue.park(0, &parkers[0], || false));
    }

    #[test]
    fn test_shutdown_releases_all_parked_workers() {
        let (queue, parkers) = queue_with_parkers(3);
        let waiters: Vec<_> = parkers
            .into_iter()
            .enumerate()
            .map(|(worker, parker)| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.park(worker, &parker, || false))
            })
            .collect();
        while queue.num_sleepers.load(Ordering::SeqCst) < 3 {
            thread::yield_now();
        }
        queue.shutdown();
        for waiter in waiters {
            assert!(!waiter.join().unwrap());
        }
        assert!(queue.is_shut_down());
    }
}
