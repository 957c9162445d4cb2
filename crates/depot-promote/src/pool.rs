//! Bounded worker pools with load-sensitive admission.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use depot_config::PoolConfig;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tracing::{Instrument, Span, info, warn};

use crate::error::{PromoteError, PromoteResult};

/// Pool running at most `threads` tasks at once and admitting at most
/// `threads * max_load_factor` tasks (running plus waiting).
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: Arc<str>,
    threads: usize,
    max_load: usize,
    permits: Arc<Semaphore>,
    load: Arc<AtomicUsize>,
}

#[derive(Debug)]
struct LoadGuard {
    load: Arc<AtomicUsize>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.load.fetch_sub(1, Ordering::AcqRel);
    }
}

impl WorkerPool {
    /// Build a pool from its configuration.
    #[must_use]
    pub fn new(name: &str, config: &PoolConfig) -> Self {
        let threads = config.threads.max(1);
        let max_load = config.max_load().max(threads);
        info!(
            pool = name,
            threads,
            priority = config.priority,
            max_load,
            "worker pool ready"
        );
        Self {
            name: Arc::from(name),
            threads,
            max_load,
            permits: Arc::new(Semaphore::new(threads)),
            load: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pool name used in logs and metrics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of tasks that may run concurrently.
    #[must_use]
    pub const fn core_size(&self) -> usize {
        self.threads
    }

    /// Tasks currently admitted.
    #[must_use]
    pub fn load(&self) -> usize {
        self.load.load(Ordering::Acquire)
    }

    fn admit(&self) -> PromoteResult<LoadGuard> {
        let limit = self.max_load;
        self.load
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < limit).then_some(current + 1)
            })
            .map_err(|load| {
                warn!(pool = %self.name, load, limit, "worker pool overloaded");
                PromoteError::PoolOverloaded {
                    pool: self.name.to_string(),
                    load,
                    limit,
                }
            })?;
        Ok(LoadGuard {
            load: Arc::clone(&self.load),
        })
    }

    fn wrap<F>(&self, guard: LoadGuard, task: F) -> impl Future<Output = F::Output> + Send + 'static
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        async move {
            let _guard = guard;
            let _permit = permits.acquire_owned().await;
            task.await
        }
        .instrument(Span::current())
    }

    /// Submit `task`, failing fast when the pool is at its load limit.
    ///
    /// # Errors
    ///
    /// Returns [`PromoteError::PoolOverloaded`] when admission is refused.
    pub fn spawn<F>(&self, task: F) -> PromoteResult<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.admit()?;
        Ok(tokio::spawn(self.wrap(guard, task)))
    }

    /// Submit `task` into `set` so results can be drained as they complete.
    ///
    /// # Errors
    ///
    /// Returns [`PromoteError::PoolOverloaded`] when admission is refused.
    pub fn spawn_into<F>(&self, set: &mut JoinSet<F::Output>, task: F) -> PromoteResult<AbortHandle>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.admit()?;
        Ok(set.spawn(self.wrap(guard, task)))
    }
}
