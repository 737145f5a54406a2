//! Shared lifecycle for the three periodic background threads
//! ([`crate::cache::RepairStateCache`]'s refresh loop,
//! [`crate::metrics_supplier::MetricsSupplier`],
//! [`crate::failure_logger::FailureLogger`]).
//!
//! Modeled on `kimberlite-server`'s `CoreRuntime`: a named
//! `thread::Builder` spawn, a `JoinHandle` the owner joins on shutdown,
//! and a `Drop` impl that calls the same idempotent `close`. Unlike
//! `CoreRuntime`'s busy-polling workers, this one parks between ticks
//! via `thread::park_timeout` and is woken early by `unpark` on close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A single named thread that runs a closure at a fixed cadence until
/// [`PeriodicWorker::close`] is called.
pub struct PeriodicWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicWorker {
    /// Spawns the worker thread and runs `tick` immediately, then again
    /// every `interval` until closed.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the thread.
    pub fn spawn(name: &str, interval: Duration, mut tick: impl FnMut() + Send + 'static) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_in_thread = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while running_in_thread.load(Ordering::Acquire) {
                    tick();
                    thread::park_timeout(interval);
                }
            })
            .expect("failed to spawn periodic worker thread");

        Self { running, handle: Some(handle) }
    }

    /// Signals the worker to exit, wakes it if parked, and joins it.
    /// Idempotent -- safe to call more than once, and called again by
    /// `Drop` if the owner never called it explicitly.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if let Err(panic) = handle.join() {
                tracing::error!(reason = %panic_message(&panic), "background worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        self.close();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
