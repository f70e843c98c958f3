//! Keyed registry of periodic tasks.
//!
//! Each registered task runs on its own tokio task: it sleeps until its start
//! instant, then ticks at a fixed period until the tick returns
//! `ControlFlow::Break` or the task is cancelled through the registry. Ticks of
//! one task never overlap because the next tick is only awaited once the
//! previous one has returned.
//!
//! The key → handle map is private; callers only schedule and cancel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error};

/// Identifies the polling task of one match/fixture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub match_id: i64,
    pub fixture_id: i64,
}

impl TaskKey {
    pub fn new(match_id: i64, fixture_id: i64) -> Self {
        TaskKey { match_id, fixture_id }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.match_id, self.fixture_id)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a task is already scheduled for key {0}")]
    AlreadyScheduled(TaskKey),

    #[error("task period must be greater than zero")]
    ZeroPeriod,

    #[error("task registry lock poisoned")]
    Poisoned,
}

/// Work executed on every tick of a scheduled task.
#[async_trait]
pub trait PeriodicTask: Send + 'static {
    async fn tick(&mut self) -> ControlFlow<()>;
}

struct ActiveTask {
    /// Distinguishes this registration from a later one under the same key.
    generation: u64,
    handle: AbortHandle,
}

/// In-memory registry of active periodic tasks. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<TaskKey, ActiveTask>>>,
    generations: Arc<AtomicU64>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` under `key`, first ticking at `start_at` and then every
    /// `period`. A start time in the past ticks immediately.
    ///
    /// Rejects a key that already has a live task.
    pub fn schedule<T: PeriodicTask>(
        &self,
        key: TaskKey,
        mut task: T,
        period: Duration,
        start_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        if period.is_zero() {
            return Err(RegistryError::ZeroPeriod);
        }

        let mut tasks = self.lock()?;
        if tasks.contains_key(&key) {
            return Err(RegistryError::AlreadyScheduled(key));
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let start = instant_at(start_at);
        let registry = self.clone();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if task.tick().await.is_break() {
                    break;
                }
            }
            registry.release(key, generation);
            debug!("Periodic task {} finished", key);
        });

        tasks.insert(
            key,
            ActiveTask {
                generation,
                handle: join.abort_handle(),
            },
        );
        debug!("Periodic task {} registered, first tick at {}", key, start_at);
        Ok(())
    }

    /// Stop the task registered under `key`. Cancelling an unknown or already
    /// finished key is a no-op. Returns whether a live entry was removed.
    pub fn cancel(&self, key: TaskKey) -> bool {
        match self.lock() {
            Ok(mut tasks) => match tasks.remove(&key) {
                Some(active) => {
                    active.handle.abort();
                    debug!("Periodic task {} cancelled", key);
                    true
                }
                None => false,
            },
            Err(e) => {
                error!("Failed to cancel task {}: {}", key, e);
                false
            }
        }
    }

    pub fn is_scheduled(&self, key: TaskKey) -> bool {
        self.lock().map(|t| t.contains_key(&key)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Drop the entry of a task that ended on its own, unless the key has been
    /// re-registered since.
    fn release(&self, key: TaskKey, generation: u64) {
        if let Ok(mut tasks) = self.lock() {
            if tasks.get(&key).map(|t| t.generation) == Some(generation) {
                tasks.remove(&key);
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<TaskKey, ActiveTask>>, RegistryError> {
        self.tasks.lock().map_err(|_| RegistryError::Poisoned)
    }
}

/// Map a wall-clock time onto the tokio clock.
fn instant_at(at: DateTime<Utc>) -> Instant {
    let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Instant::now() + delay
}
