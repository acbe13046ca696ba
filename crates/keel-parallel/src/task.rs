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


//! Task cells and typed result handles.
//!
//! A `TaskCell` may be referenced from several places at once: the deque it
//! was pushed to, a thief that took it, and the `TaskHandle` of its spawner.
//! Exactly one of them runs it. Running requires winning the
//! `QUEUED -> RUNNING` compare-and-swap in `TaskCell::try_claim`; every other
//! holder treats its reference as stale.

use crate::executor::WorkerContext;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;

/// Marker for "no worker has claimed the task yet".
const NO_RUNNER: usize = usize::MAX;

pub(crate) type Job = Box<dyn FnOnce(&WorkerContext) + Send + 'static>;

type Outcome<R> = Result<R, Box<dyn Any + Send + 'static>>;

/// Locks `mutex`, ignoring poisoning. Jobs run outside of every lock held here.
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct TaskCell {
    state: AtomicU8,
    runner: AtomicUsize,
    job: Mutex<Option<Job>>,
    done: Mutex<bool>,
    finished: Condvar,
}

impl std::fmt::Debug for TaskCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCell")
            .field("state", &self.state.load(Ordering::Relaxed))
            .field("runner", &self.runner.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl TaskCell {
    pub(crate) fn new(job: Job) -> Self {
        Self {
            state: AtomicU8::new(QUEUED),
            runner: AtomicUsize::new(NO_RUNNER),
            job: Mutex::new(Some(job)),
            done: Mutex::new(false),
            finished: Condvar::new(),
        }
    }

    #[inline]
    pub(crate) fn is_queued(&self) -> bool {
        self.state.load(Ordering::Acquire) == QUEUED
    }

    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.state.load(Ordering::Acquire) == FINISHED
    }

    /// The worker running or having run the task, if it was claimed.
    #[inline]
    pub(crate) fn runner(&self) -> Option<usize> {
        match self.runner.load(Ordering::Acquire) {
            NO_RUNNER => None,
            worker => Some(worker),
        }
    }

    /// Claims the right to run the task for `worker`. Succeeds for exactly one caller.
    #[inline]
    pub(crate) fn try_claim(&self, worker: usize) -> bool {
        let claimed = self
            .state
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if claimed {
            self.runner.store(worker, Ordering::Release);
        }
        claimed
    }

    /// Runs a claimed task and signals its completion.
    pub(crate) fn run(&self, ctx: &WorkerContext) {
        debug_assert_eq!(
            self.state.load(Ordering::Relaxed),
            RUNNING,
            "called `TaskCell::run` on an unclaimed task"
        );
        let job = lock(&self.job).take();
        if let Some(job) = job {
            job(ctx);
        }

        self.state.store(FINISHED, Ordering::Release);
        let mut done = lock(&self.done);
        *done = true;
        self.finished.notify_all();
    }

    /// Blocks the calling thread until the task has finished.
    pub(crate) fn wait(&self) {
        let mut done = lock(&self.done);
        while !*done {
            done = self
                .finished
                .wait(done)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Handle to the result of a spawned task.
///
/// The result is obtained with `WorkerContext::sync`. Dropping a handle does
/// not cancel the task.
#[must_use = "a task handle should be passed to `WorkerContext::sync`"]
pub struct TaskHandle<R> {
    cell: Arc<TaskCell>,
    result: Arc<Mutex<Option<Outcome<R>>>>,
}

impl<R> std::fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<R> TaskHandle<R> {
    /// Returns `true` once the task has run to completion (or panicked).
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.cell.is_finished()
    }

    #[inline]
    pub(crate) fn cell(&self) -> &Arc<TaskCell> {
        &self.cell
    }

    /// Takes the result of a finished task, re-raising a captured panic.
    pub(crate) fn into_result(self) -> R {
        let outcome = lock(&self.result).take();
        match outcome {
            Some(Ok(value)) => value,
            Some(Err(payload)) => panic::resume_unwind(payload),
            None => panic!("called `TaskHandle::into_result` on a task that has not finished"),
        }
    }
}

/// Wraps `f` into a task cell and returns the cell together with its handle.
/// Panics raised by `f` are captured and stored as the result.
pub(crate) fn new_task<F, R>(f: F) -> (Arc<TaskCell>, TaskHandle<R>)
where
    F: FnOnce(&WorkerContext) -> R + Send + 'static,
    R: Send + 'static,
{
    let result: Arc<Mutex<Option<Outcome<R>>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&result);
    let job: Job = Box::new(move |ctx: &WorkerContext| {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(ctx)));
        *lock(&slot) = Some(outcome);
    });

    let cell = Arc::new(TaskCell::new(job));
    let handle = TaskHandle {
        cell: Arc::clone(&cell),
        result,
    };
    (cell, handle)
}
