//! Named background threads observed by polling.
//!
//! Long operations (captures, collage assembly) run on a [`Worker`] while
//! the caller keeps its own loop going and asks [`Worker::is_finished`].
//! There is no cancellation: a worker always runs to completion.

use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::error::{PhotoboothError, Result};

/// A running or finished background task returning `T`.
#[derive(Debug)]
pub struct Worker<T> {
    name: String,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Worker<T> {
    /// Start `task` on a new thread called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoboothError::Io`] if the thread cannot be spawned.
    pub fn spawn<F>(name: &str, task: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_string()).spawn(task)?;
        debug!(worker = name, "Worker started");
        Ok(Self {
            name: name.to_string(),
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking completion check.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task and take its result.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoboothError::WorkerPanicked`] if the task panicked.
    pub fn join(self) -> Result<T> {
        let Self { name, handle } = self;
        handle.join().map_err(|_| {
            error!(worker = %name, "Worker panicked");
            PhotoboothError::WorkerPanicked { name }
        })
    }
}
