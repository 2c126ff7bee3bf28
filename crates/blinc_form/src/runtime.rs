//! Task scheduling for background validation
//!
//! Validation triggered by a mutation (change, blur, mount) runs in the
//! background: the form hands the run to a [`Spawn`] implementation and
//! returns immediately. Everything is single-threaded; tasks are `!Send`.
//!
//! The default spawner is a [`TaskPool`] the host drives from its event
//! loop with [`TaskPool::run_until_stalled`]. With the `tokio` feature,
//! [`TokioSpawner`] places tasks on the current `LocalSet`.

use std::cell::RefCell;
use std::fmt;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

/// Something that can run local background tasks
pub trait Spawn {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);
}

/// Single-threaded task pool driven by the host
pub struct TaskPool {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl TaskPool {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool: RefCell::new(pool),
            spawner,
        }
    }

    /// Poll every queued task until none can make progress.
    ///
    /// Tasks spawned while this runs are polled too. Calling this from inside
    /// a pooled task does nothing.
    pub fn run_until_stalled(&self) {
        match self.pool.try_borrow_mut() {
            Ok(mut pool) => pool.run_until_stalled(),
            Err(_) => tracing::debug!("task pool already running; skipping nested drive"),
        }
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawn for TaskPool {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(err) = self.spawner.spawn_local(task) {
            tracing::warn!(error = %err, "failed to queue background task");
        }
    }
}

impl fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPool").finish_non_exhaustive()
    }
}

/// Spawns onto the current tokio `LocalSet`.
///
/// Must be used from inside `LocalSet::run_until` (or a task spawned on a
/// `LocalSet`); tokio panics otherwise.
#[cfg(feature = "tokio")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSpawner;

#[cfg(feature = "tokio")]
impl Spawn for TokioSpawner {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        drop(tokio::task::spawn_local(task));
    }
}
