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


//! Keel-Parallel: a work-stealing fork/join executor
//!
//! A fixed pool of worker threads, each with a bounded local deque, plus a
//! global queue for top-level submissions. Workers that wait for a stolen
//! task keep executing other work ("leapfrogging") instead of blocking, which
//! keeps deep fork/join graphs such as parallel relaxation solves busy.
//!
//! Core flow
//! - Build an `executor::TaskExecutor` (directly or via `TaskExecutorBuilder`).
//! - Use its `main_context()` to `spawn` and `sync` tasks, or `submit` work
//!   through the global queue.
//! - Inside tasks, use the `WorkerContext` passed to the closure for nested
//!   parallelism, or `for_each::for_each` for parallel loops.
//! - `shutdown` (or drop) joins the worker threads.
//!
//! Module map
//! - `executor`: executor, worker context and builder.
//! - `config`: executor configuration.
//! - `error`: construction errors.
//! - `task`: typed task handles.
//! - `for_each`: recursive range splitting.

pub mod config;
mod deque;
pub mod error;
pub mod executor;
pub mod for_each;
mod global_queue;
pub mod task;

pub use config::ExecutorConfig;
pub use error::ExecutorError;
pub use executor::{TaskExecutor, TaskExecutorBuilder, WorkerContext};
pub use task::TaskHandle;
