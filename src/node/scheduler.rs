//! Scheduler - Cooperative next-tick queue.
//!
//! Work deferred to the "next tick" (the point where pending reactive updates
//! and continuations run) is queued here and executed when the host calls
//! [`Scheduler::tick`]. Backed by a single-threaded `LocalPool`, so queued
//! futures may await node promises such as [`Node::settled`](super::Node::settled).
//!
//! Nodes created with the same scheduler share one queue.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use tracing::warn;

/// Shared handle to a local task queue.
#[derive(Clone)]
pub struct Scheduler {
    pool: Rc<RefCell<LocalPool>>,
    spawner: futures::executor::LocalSpawner,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool: Rc::new(RefCell::new(pool)),
            spawner,
        }
    }

    /// Queue a future. It first runs on the next [`tick`](Self::tick).
    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.spawner.spawn_local(task) {
            warn!(error = %err, "scheduler rejected task");
        }
    }

    /// Queue a callback for the next tick.
    pub fn next_tick(&self, callback: impl FnOnce() + 'static) {
        self.spawn(async move { callback() });
    }

    /// Run every queued task until none can make progress.
    ///
    /// Calling `tick` from inside a task is a no-op.
    pub fn tick(&self) {
        let Ok(mut pool) = self.pool.try_borrow_mut() else {
            return;
        };
        pool.run_until_stalled();
    }
}
