//! Bounded concurrency for server handlers

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    total: AtomicU64,
}

/// Caps the number of handlers running at once
///
/// `acquire` waits for a free slot instead of failing, so a server that
/// acquires before reading leaves excess traffic queued in the kernel.
#[derive(Debug, Clone)]
pub struct HandlerLimiter {
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl HandlerLimiter {
    pub fn new(capacity: usize) -> Result<Self, LimitError> {
        if capacity == 0 {
            return Err(LimitError::InvalidCapacity);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            counters: Arc::new(Counters::default()),
            capacity,
        })
    }

    /// Waits for a handler slot
    pub async fn acquire(&self) -> Result<HandlerGuard, LimitError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LimitError::Closed)?;
        Ok(self.guard(permit))
    }

    /// Takes a handler slot only if one is free right now
    #[cfg(test)]
    pub fn try_acquire(&self) -> Option<HandlerGuard> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(self.guard(permit))
    }

    /// Stops handing out slots; pending and future `acquire` calls fail
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn metrics(&self) -> HandlerMetrics {
        HandlerMetrics {
            active: self.counters.active.load(Ordering::SeqCst),
            total: self.counters.total.load(Ordering::SeqCst),
            available: self.semaphore.available_permits(),
            capacity: self.capacity,
        }
    }

    fn guard(&self, permit: OwnedSemaphorePermit) -> HandlerGuard {
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.counters.total.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(active, total, "Handler slot acquired");

        HandlerGuard {
            _permit: permit,
            counters: self.counters.clone(),
            start_time: Instant::now(),
        }
    }
}

/// RAII guard for a handler slot
#[derive(Debug)]
pub struct HandlerGuard {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
    start_time: Instant,
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        let active = self.counters.active.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(
            active,
            handler_duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Handler slot released"
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LimitError {
    #[error("Handler limiter closed")]
    Closed,
    #[error("Handler limit must be at least 1")]
    InvalidCapacity,
}

/// Handler metrics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerMetrics {
    pub active: usize,
    pub total: u64,
    pub available: usize,
    pub capacity: usize,
}
