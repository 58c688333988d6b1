//! Cancellable handles for the room timers (countdown, match tick, reconnect
//! expiry).
//!
//! Aborting a tokio task only takes effect at its next await point, so a task
//! that already woke up may still run to its next lock. Rooms pair every
//! handle with an epoch counter that the task re-checks after locking.

use std::future::Future;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// A handle with nothing scheduled.
    pub fn idle() -> Self {
        Self { handle: None }
    }

    /// Spawns `future` on the current runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(future)),
        }
    }

    /// Aborts the task if one is scheduled. Calling it again does nothing.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Forgets the task without aborting it. Used by a task that is about to
    /// finish on its own and must not abort itself.
    pub fn release(&mut self) {
        self.handle = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
