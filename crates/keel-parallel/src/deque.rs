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


//! Bounded per-worker task deque.
//!
//! A thin layer over `crossbeam_deque`. The owning worker pushes and pops at
//! the tail (LIFO, keeps the working set hot) without taking a lock; thieves
//! take from the head through a `TaskStealer` (FIFO, steals the oldest and
//! typically largest pieces of work). The owner refuses pushes beyond its
//! capacity and the spawner runs the task inline instead.
//!
//! Entries go stale when their task is claimed elsewhere, for example by a
//! `sync` that runs a queued task directly. `pop` and `steal` skip them.

use crate::task::TaskCell;
use crossbeam_deque::{Steal, Stealer, Worker};
use std::sync::Arc;

/// Retries `steal` until it yields a still-queued task or runs empty.
pub(crate) fn steal_queued(
    mut steal: impl FnMut() -> Steal<Arc<TaskCell>>,
) -> Option<Arc<TaskCell>> {
    loop {
        match steal() {
            Steal::Success(task) if task.is_queued() => return Some(task),
            Steal::Success(_) | Steal::Retry => {}
            Steal::Empty => return None,
        }
    }
}

/// Owner side of a worker's deque. Lives on the owning worker only.
#[derive(Debug)]
pub(crate) struct WorkerDeque {
    worker: Worker<Arc<TaskCell>>,
    capacity: usize,
}

impl WorkerDeque {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(
            capacity > 0,
            "called `WorkerDeque::new` with zero capacity"
        );
        Self {
            worker: Worker::new_lifo(),
            capacity,
        }
    }

    /// Returns a handle through which other workers steal from this deque.
    #[inline]
    pub(crate) fn stealer(&self) -> TaskStealer {
        TaskStealer(self.worker.stealer())
    }

    /// Pushes `task` at the tail. Returns the task if the deque is full.
    #[inline]
    pub(crate) fn push(&self, task: Arc<TaskCell>) -> Result<(), Arc<TaskCell>> {
        if self.worker.len() >= self.capacity {
            return Err(task);
        }
        self.worker.push(task);
        Ok(())
    }

    /// Pops the newest still-queued task from the tail.
    pub(crate) fn pop(&self) -> Option<Arc<TaskCell>> {
        while let Some(task) = self.worker.pop() {
            if task.is_queued() {
                return Some(task);
            }
        }
        None
    }

    /// Pops the tail entry if it is `task`. Stale entries above it are dropped
    /// on the way; a live entry that is not `task` is put back.
    pub(crate) fn pop_if(&self, task: &Arc<TaskCell>) -> Option<Arc<TaskCell>> {
        while let Some(top) = self.worker.pop() {
            if Arc::ptr_eq(&top, task) {
                return Some(top);
            }
            if top.is_queued() {
                self.worker.push(top);
                return None;
            }
        }
        None
    }
}

/// Thief side of a worker's deque.
#[derive(Debug, Clone)]
pub(crate) struct TaskStealer(Stealer<Arc<TaskCell>>);

impl TaskStealer {
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Takes the oldest still-queued task from the head.
    #[inline]
    pub(crate) fn steal(&self) -> Option<Arc<TaskCell>> {
        steal_queued(|| self.0.steal())
    }
}
