//! Task spawning abstraction.
//!
//! Rooms never call `tokio::spawn` directly: room loops, metadata fetches and
//! track timers all go through a [`TaskSpawner`], so the composition root
//! decides which runtime hosts them.

use std::future::Future;

use tokio::task::JoinHandle;

/// Abstraction for spawning background tasks.
///
/// # Example
///
/// ```ignore
/// struct Room {
///     spawner: TokioSpawner,
/// }
///
/// impl Room {
///     fn resolve_in_background(&self) {
///         self.spawner.spawn(async {
///             // Fetch metadata, report back through a channel
///         });
///     }
/// }
/// ```
pub trait TaskSpawner: Send + Sync {
    /// Spawns a future as a detached background task.
    ///
    /// The task runs until completion even if the spawner is dropped.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Spawns a future and returns a handle to await its output.
    ///
    /// Used for tasks whose result must be applied by the caller, such as a
    /// track timer reporting its final progress.
    fn spawn_joinable<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static;
}

/// Tokio-based spawner for the server and tests.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Creates a new `TokioSpawner` with the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a new `TokioSpawner` using the current runtime's handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }

    fn spawn_joinable<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.handle.spawn(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn detached_task_runs() {
        let spawner = TokioSpawner::current();
        let executed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&executed);

        spawner.spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(executed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn joinable_task_returns_output() {
        let spawner = TokioSpawner::current();
        let handle = spawner.spawn_joinable(async { 6 * 7 });
        assert_eq!(handle.await.unwrap(), 42);
    }
}
