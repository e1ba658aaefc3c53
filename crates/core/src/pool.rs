//! Per-document worker pool.
//!
//! Each document owns its own fixed-size pool; there is no process-wide
//! pool, so two documents never contend for the same workers and
//! dropping a document releases its threads promptly.

use std::sync::Mutex;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};

pub struct WorkerPool {
    pool: Mutex<Option<ThreadPool>>,
}

impl WorkerPool {
    /// Build a pool with `threads` workers. Zero is bumped to one.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .map_err(|e| Error::Pool(e.to_string()))?;
        Ok(Self {
            pool: Mutex::new(Some(pool)),
        })
    }

    /// Run `job` on a pool thread. Jobs submitted after shutdown are
    /// dropped.
    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        let Ok(guard) = self.pool.lock() else {
            tracing::warn!("worker pool lock poisoned, dropping job");
            return;
        };
        match guard.as_ref() {
            Some(pool) => pool.spawn(job),
            None => tracing::debug!("worker pool is shut down, dropping job"),
        }
    }

    /// Tear the pool down, waiting for in-flight jobs. Safe to call
    /// more than once.
    pub fn shutdown(&self) {
        let Ok(mut guard) = self.pool.lock() else {
            tracing::warn!("worker pool lock poisoned during shutdown");
            return;
        };
        *guard = None;
    }

    pub fn is_shut_down(&self) -> bool {
        self.pool.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
