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


//! # Work-Stealing Task Executor
//!
//! A fixed pool of workers running fork/join task graphs. Worker 0 is the
//! thread that constructed the executor and acts through
//! `TaskExecutor::main_context`; workers `1..n` run on dedicated threads until
//! `shutdown`.
//!
//! ## Scheduling
//!
//! - `WorkerContext::spawn` pushes onto the caller's bounded local deque, a
//!   lock-free `crossbeam_deque::Worker`, and unparks one sleeping worker. A
//!   spawn into a full deque runs the task inline.
//! - An idle worker drains its own deque, then the global injector, then makes
//!   `yield_rounds` rounds of `steal_factor * (workers - 1)` random steal
//!   attempts with a `yield_now` between rounds, and finally parks.
//! - `TaskExecutor::submit` goes through the global injector and wakes one
//!   parked worker.
//!
//! ## Leapfrogging
//!
//! `WorkerContext::sync` on a task that another worker has stolen does not
//! block right away. The waiter drains its own deque, then helps the thief by
//! taking work from the thief's deque (which most likely belongs to the
//! awaited task), then steals randomly, rechecking completion after every
//! task. Only after the bounded
//! rounds does it block on the task's completion signal.
//!
//! ## Usage
//!
//! ```rust
//! use keel_parallel::executor::TaskExecutorBuilder;
//!
//! let executor = TaskExecutorBuilder::new().with_workers(4).build().unwrap();
//! let ctx = executor.main_context();
//!
//! let left = ctx.spawn(|_| (0..1000u64).sum::<u64>());
//! let right: u64 = (1000..2000u64).sum();
//! assert_eq!(ctx.sync(left) + right, (0..2000u64).sum());
//! ```

use crate::config::ExecutorConfig;
use crate::deque::{TaskStealer, WorkerDeque};
use crate::error::ExecutorError;
use crate::global_queue::GlobalQueue;
use crate::task::{TaskCell, TaskHandle, new_task};
use crossbeam_utils::sync::Parker;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// State shared by all workers of one executor.
#[derive(Debug)]
struct Shared {
    stealers: Box<[TaskStealer]>,
    global: GlobalQueue,
    config: ExecutorConfig,
}

/// The per-worker handle through which tasks are spawned and awaited.
///
/// Every task receives the context of the worker running it.
#[derive(Debug)]
pub struct WorkerContext {
    shared: Arc<Shared>,
    index: usize,
    deque: WorkerDeque,
    parker: Parker,
    rng: RefCell<SmallRng>,
}

impl WorkerContext {
    fn new(shared: Arc<Shared>, index: usize, deque: WorkerDeque, parker: Parker) -> Self {
        let seed = shared.config.seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self {
            shared,
            index,
            deque,
            parker,
            rng: RefCell::new(SmallRng::seed_from_u64(seed)),
        }
    }

    /// Index of this worker, 0 for the main context.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.shared.stealers.len()
    }

    #[inline]
    fn deque(&self) -> &WorkerDeque {
        &self.deque
    }

    /// Spawns `f` onto this worker's local deque. If the deque is full the
    /// task runs inline before `spawn` returns.
    pub fn spawn<F, R>(&self, f: F) -> TaskHandle<R>
    where
        F: FnOnce(&WorkerContext) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (cell, handle) = new_task(f);
        match self.deque().push(cell) {
            Ok(()) => self.shared.global.wake_one(),
            Err(cell) => {
                log::trace!("worker {} deque full, running spawned task inline", self.index);
                self.execute(&cell);
            }
        }
        handle
    }

    /// Waits for the task behind `handle` and returns its result. While
    /// waiting the worker runs other tasks.
    ///
    /// # Panics
    ///
    /// Re-raises the panic if the task panicked.
    pub fn sync<R>(&self, handle: TaskHandle<R>) -> R {
        let cell = handle.cell();
        if !cell.is_finished() {
            if let Some(task) = self.deque().pop_if(cell) {
                self.execute(&task);
            } else if cell.try_claim(self.index) {
                cell.run(self);
            } else {
                self.wait_stolen(cell);
            }
        }
        handle.into_result()
    }

    /// Runs `a` on this worker while `b` is offered to thieves, and returns both results.
    pub fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce(&WorkerContext) -> RA,
        B: FnOnce(&WorkerContext) -> RB + Send + 'static,
        RB: Send + 'static,
    {
        let handle = self.spawn(b);
        let ra = a(self);
        (ra, self.sync(handle))
    }

    /// Runs `task` if it can still be claimed.
    #[inline]
    fn execute(&self, task: &Arc<TaskCell>) {
        if task.try_claim(self.index) {
            task.run(self);
        }
    }

    /// Tries one steal from a random other worker.
    fn try_steal(&self) -> Option<Arc<TaskCell>> {
        let workers = self.num_workers();
        if workers < 2 {
            return None;
        }
        let mut victim = self.rng.borrow_mut().random_range(0..workers - 1);
        if victim >= self.index {
            victim += 1;
        }
        self.shared.stealers[victim].steal()
    }

    /// Runs up to `yield_rounds` rounds of random steals until `done` holds.
    /// Returns `true` if `done` held before the rounds were exhausted.
    fn steal_rounds(&self, done: impl Fn() -> bool) -> bool {
        let config = &self.shared.config;
        for _ in 0..config.yield_rounds {
            for _ in 0..config.steals_per_round() {
                if done() {
                    return true;
                }
                if let Some(task) = self.try_steal() {
                    self.execute(&task);
                }
            }
            if done() {
                return true;
            }
            thread::yield_now();
        }
        done()
    }

    /// Steal attempts of an idle worker before it parks.
    fn find_work(&self) -> Option<Arc<TaskCell>> {
        let config = &self.shared.config;
        for _ in 0..config.yield_rounds {
            for _ in 0..config.steals_per_round() {
                if let Some(task) = self.try_steal() {
                    return Some(task);
                }
            }
            thread::yield_now();
        }
        None
    }

    /// Leapfrogging wait for a task claimed by another worker.
    fn wait_stolen(&self, cell: &Arc<TaskCell>) {
        while !cell.is_finished() {
            match self.deque().pop() {
                Some(task) => self.execute(&task),
                None => break,
            }
        }

        if let Some(thief) = cell.runner().filter(|&t| t != self.index && t < self.num_workers())
        {
            let stealer = &self.shared.stealers[thief];
            while !cell.is_finished() {
                match stealer.steal() {
                    Some(task) => self.execute(&task),
                    None => break,
                }
            }
        }

        if self.steal_rounds(|| cell.is_finished()) {
            return;
        }
        log::trace!("worker {} blocking on a stolen task", self.index);
        cell.wait();
    }

    /// Main loop of a dedicated worker thread.
    fn run_worker(&self) {
        log::debug!("worker {} started", self.index);
        loop {
            while let Some(task) = self.deque().pop() {
                self.execute(&task);
            }
            if let Some(task) = self.shared.global.try_pop() {
                self.execute(&task);
                continue;
            }

            if let Some(task) = self.find_work() {
                self.execute(&task);
                continue;
            }

            log::trace!("worker {} parking", self.index);
            let stealers = &self.shared.stealers;
            if !self
                .shared
                .global
                .park(self.index, &self.parker, || stealers.iter().any(|s| !s.is_empty()))
            {
                break;
            }
        }
        log::debug!("worker {} stopped", self.index);
    }
}

/// A pool of work-stealing workers.
#[derive(Debug)]
pub struct TaskExecutor {
    shared: Arc<Shared>,
    main: WorkerContext,
    threads: Vec<JoinHandle<()>>,
}

impl TaskExecutor {
    /// Starts an executor. The calling thread becomes worker 0.
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        config.validate()?;

        let deques: Vec<WorkerDeque> = (0..config.workers)
            .map(|_| WorkerDeque::new(config.deque_capacity))
            .collect();
        let parkers: Vec<Parker> = (0..config.workers).map(|_| Parker::new()).collect();
        let shared = Arc::new(Shared {
            stealers: deques.iter().map(WorkerDeque::stealer).collect(),
            global: GlobalQueue::new(parkers.iter().map(|p| p.unparker().clone()).collect()),
            config,
        });

        let mut locals = deques.into_iter().zip(parkers);
        let Some((main_deque, main_parker)) = locals.next() else {
            return Err(ExecutorError::NoWorkers);
        };

        let mut threads = Vec::with_capacity(config.workers - 1);
        for (index, (deque, parker)) in (1..).zip(locals) {
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("keel-worker-{index}"))
                .spawn(move || WorkerContext::new(worker_shared, index, deque, parker).run_worker());
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(source) => {
                    shared.global.shutdown();
                    for handle in threads {
                        let _ = handle.join();
                    }
                    return Err(ExecutorError::Spawn {
                        worker: index,
                        source,
                    });
                }
            }
        }

        log::debug!("task executor started: {}", config);
        let main = WorkerContext::new(Arc::clone(&shared), 0, main_deque, main_parker);
        Ok(Self {
            shared,
            main,
            threads,
        })
    }

    /// The context of worker 0, owned by the constructing thread.
    #[inline]
    pub fn main_context(&self) -> &WorkerContext {
        &self.main
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.shared.config.workers
    }

    #[inline]
    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }

    /// Number of submissions no worker has picked up yet.
    #[inline]
    pub fn pending_submissions(&self) -> usize {
        self.shared.global.len()
    }

    /// Submits a top-level task through the global injector.
    pub fn submit<F, R>(&self, f: F) -> TaskHandle<R>
    where
        F: FnOnce(&WorkerContext) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (cell, handle) = new_task(f);
        self.shared.global.push(cell);
        handle
    }

    /// Stops and joins the worker threads. Queued but unclaimed tasks are
    /// not run by them; syncing such a task on the main context runs it inline.
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.shared.global.shutdown();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::debug!("a worker thread terminated by panic");
            }
        }
        log::debug!("task executor shut down");
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for `TaskExecutor`.
#[derive(Debug, Clone, Default)]
pub struct TaskExecutorBuilder {
    config: ExecutorConfig,
}

impl TaskExecutorBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    #[inline]
    pub fn with_deque_capacity(mut self, capacity: usize) -> Self {
        self.config.deque_capacity = capacity;
        self
    }

    #[inline]
    pub fn with_steal_factor(mut self, steal_factor: usize) -> Self {
        self.config.steal_factor = steal_factor;
        self
    }

    #[inline]
    pub fn with_yield_rounds(mut self, yield_rounds: usize) -> Self {
        self.config.yield_rounds = yield_rounds;
        self
    }

    #[inline]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    #[inline]
    pub fn build(self) -> Result<TaskExecutor, ExecutorError> {
        TaskExecutor::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn executor(workers: usize) -> TaskExecutor {
        TaskExecutorBuilder::new()
            .with_workers(workers)
            .build()
            .expect("executor should start")
    }

    fn fib(ctx: &WorkerContext, n: u64) -> u64 {
        if n < 2 {
            return n;
        }
        let (a, b) = ctx.join(|ctx| fib(ctx, n - 1), move |ctx| fib(ctx, n - 2));
        a + b
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        assert!(matches!(
            TaskExecutorBuilder::new().with_workers(0).build(),
            Err(ExecutorError::NoWorkers)
        ));
        assert!(matches!(
            TaskExecutorBuilder::new().with_workers(2).with_deque_capacity(0).build(),
            Err(ExecutorError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_single_worker_runs_inline() {
        let exec = executor(1);
        let ctx = exec.main_context();
        let handle = exec.submit(|ctx| ctx.index());
        assert_eq!(ctx.sync(handle), 0);
        assert_eq!(fib(ctx, 15), 610);
    }

    #[test]
    fn test_each_task_runs_exactly_once() {
        const TASKS: usize = 5000;
        let exec = executor(4);
        let ctx = exec.main_context();
        let counters: Arc<Vec<AtomicUsize>> =
            Arc::new((0..TASKS).map(|_| AtomicUsize::new(0)).collect());

        let handles: Vec<_> = (0..TASKS)
            .map(|i| {
                let counters = Arc::clone(&counters);
                ctx.spawn(move |_| {
                    counters[i].fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect();
        // Sync in spawn order so most waits hit tasks that are not at the tail.
        for handle in handles {
            ctx.sync(handle);
        }

        assert!(counters.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_nested_fork_join_completes() {
        let exec = executor(4);
        assert_eq!(fib(exec.main_context(), 22), 17711);
    }

    #[test]
    fn test_submissions_from_many_handles() {
        let exec = executor(3);
        let handles: Vec<_> = (0..64u64).map(|i| exec.submit(move |_| i * i)).collect();
        let ctx = exec.main_context();
        let total: u64 = handles.into_iter().map(|h| ctx.sync(h)).sum();
        assert_eq!(total, (0..64u64).map(|i| i * i).sum());
    }

    #[test]
    fn test_sync_on_stolen_task_runs_work_of_the_thief() {
        let exec = executor(2);
        let ctx = exec.main_context();
        let started = Arc::new(AtomicBool::new(false));

        let stolen = {
            let started = Arc::clone(&started);
            ctx.spawn(move |ctx| {
                started.store(true, Ordering::SeqCst);
                // Only worker 0 can run this child while worker 1 spins here,
                // and worker 0 only gets to it by helping from its sync.
                let child = ctx.spawn(|ctx| ctx.index());
                while !child.is_finished() {
                    thread::yield_now();
                }
                (ctx.index(), ctx.sync(child))
            })
        };
        while !started.load(Ordering::SeqCst) {
            thread::yield_now();
        }

        let (runner, child_runner) = ctx.sync(stolen);
        assert_eq!(runner, 1);
        assert_eq!(child_runner, 0);
    }

    #[test]
    fn test_sync_blocks_until_a_stolen_task_finishes() {
        let exec = TaskExecutorBuilder::new()
            .with_workers(2)
            .with_yield_rounds(1)
            .with_steal_factor(1)
            .build()
            .unwrap();
        let ctx = exec.main_context();
        let started = Arc::new(AtomicBool::new(false));

        let stolen = {
            let started = Arc::clone(&started);
            ctx.spawn(move |ctx| {
                started.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                ctx.index()
            })
        };
        while !started.load(Ordering::SeqCst) {
            thread::yield_now();
        }

        // Nothing is left to help with, so the wait ends on the completion signal.
        assert_eq!(ctx.sync(stolen), 1);
    }

    #[test]
    fn test_full_deque_runs_inline() {
        let exec = TaskExecutorBuilder::new()
            .with_workers(1)
            .with_deque_capacity(1)
            .build()
            .unwrap();
        let ctx = exec.main_context();
        let first = ctx.spawn(|_| 1);
        let second = ctx.spawn(|_| 2);
        assert!(!first.is_finished());
        assert!(second.is_finished());
        assert_eq!(ctx.sync(first) + ctx.sync(second), 3);
    }

    #[test]
    fn test_task_panic_is_reraised_at_sync() {
        let exec = executor(2);
        let ctx = exec.main_context();
        let handle = ctx.spawn(|_| -> u32 { panic!("relaxation failed") });

        let caught = panic::catch_unwind(AssertUnwindSafe(|| ctx.sync(handle)));
        let payload = caught.expect_err("sync should re-raise the panic");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"relaxation failed"));

        // The executor keeps working afterwards.
        assert_eq!(ctx.sync(ctx.spawn(|_| 7)), 7);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut exec = executor(3);
        exec.shutdown();
        exec.shutdown();
        // Work submitted after shutdown is still run by the main context.
        let handle = exec.submit(|_| 5);
        assert_eq!(exec.main_context().sync(handle), 5);
    }
}
