//! Orderly Session Shutdown
//!
//! When a session ends a handful of independent cleanup steps run in a fixed
//! order (log usage, publish the report, ...). A step that fails or panics is
//! logged and skipped over; it never stops the steps after it.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use tracing::{error, info};

type Callback = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Outcome of running a `ShutdownSequence`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Default)]
pub struct ShutdownSequence {
    callbacks: Vec<(String, Callback)>,
}

impl ShutdownSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named step. Steps run in the order they were added.
    pub fn add<F, Fut>(&mut self, name: impl Into<String>, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.callbacks
            .push((name.into(), Box::new(move || callback().boxed())));
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Runs every step to completion, one after another.
    ///
    /// Each step runs on its own task so a panic is contained the same way
    /// an error is.
    pub async fn run(self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for (name, callback) in self.callbacks {
            match tokio::spawn(callback()).await {
                Ok(Ok(())) => {
                    info!(step = %name, "Shutdown step completed.");
                    report.completed.push(name);
                }
                Ok(Err(e)) => {
                    error!(step = %name, error = ?e, "Shutdown step failed.");
                    report.failed.push(name);
                }
                Err(e) => {
                    error!(step = %name, error = %e, "Shutdown step panicked.");
                    report.failed.push(name);
                }
            }
        }
        report
    }
}
