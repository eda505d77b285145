//! Bounded concurrent executor.
//!
//! Runs a list of independent tasks on a dedicated rayon pool with exactly
//! `max_in_flight` worker threads, so no more than that many tasks are ever
//! running. Each task's outcome is captured as its own `Result`: an error or
//! even a panic inside one task is recorded and the remaining tasks carry on.
//! [`Executor::run`] returns once every task has been attempted exactly once.
//!
//! The pool is private to the executor rather than rayon's global pool, so the
//! bound holds regardless of what else in the process uses rayon.

use rayon::prelude::*;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Concurrency limit must be at least 1")]
    ZeroConcurrency,
    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Why a single task did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub message: String,
    pub panicked: bool,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.panicked {
            write!(f, "panicked: {}", self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

/// Result of one task, tagged with its position in the input list.
#[derive(Debug)]
pub struct TaskOutcome<R> {
    pub index: usize,
    pub result: Result<R, TaskFailure>,
}

pub struct Executor {
    pool: rayon::ThreadPool,
    max_in_flight: usize,
}

impl Executor {
    pub fn new(max_in_flight: usize) -> Result<Self, ExecutorError> {
        if max_in_flight == 0 {
            return Err(ExecutorError::ZeroConcurrency);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_in_flight)
            .thread_name(|i| format!("forge-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            max_in_flight,
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Run `work` over every task, at most `max_in_flight` at a time.
    ///
    /// `on_complete` is called from the worker thread right after each task
    /// finishes, successful or not. Outcomes are returned in input order.
    pub fn run<T, R, E, F, C>(&self, tasks: &[T], work: F, on_complete: C) -> Vec<TaskOutcome<R>>
    where
        T: Sync,
        R: Send,
        E: fmt::Display,
        F: Fn(&T) -> Result<R, E> + Sync,
        C: Fn(usize, &Result<R, TaskFailure>) + Sync,
    {
        self.pool.install(|| {
            tasks
                .par_iter()
                .enumerate()
                .map(|(index, task)| {
                    let result = match catch_unwind(AssertUnwindSafe(|| work(task))) {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(TaskFailure {
                            message: e.to_string(),
                            panicked: false,
                        }),
                        Err(payload) => Err(TaskFailure {
                            message: panic_message(payload.as_ref()),
                            panicked: true,
                        }),
                    };
                    if let Err(failure) = &result {
                        tracing::debug!(task = index, "task failed: {failure}");
                    }
                    on_complete(index, &result);
                    TaskOutcome { index, result }
                })
                .collect()
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
