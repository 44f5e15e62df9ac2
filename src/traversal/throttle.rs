//! # Concurrency Throttle
//!
//! Bounds the number of batches in flight (dispatched to the handler but not yet
//! settled) with a semaphore, and optionally pauses the fetch loop after every
//! dispatch. A slot is held by a [`SlotPermit`] which releases it on drop, so a
//! handler frees its slot whether it succeeds, fails or panics.

use crate::config::TraversalConfig;
use crate::error::{TraversalError, TraversalResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Debug)]
pub struct ConcurrencyThrottle {
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
    sleep_between_batches: Option<Duration>,
    high_water_mark: Arc<AtomicUsize>,
}

impl ConcurrencyThrottle {
    pub fn new(config: &TraversalConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_batch_count)),
            max_in_flight: config.max_concurrent_batch_count,
            sleep_between_batches: config.inter_batch_sleep(),
            high_water_mark: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait until fewer than `max_in_flight` slots are held, then take one
    pub async fn acquire_slot(&self) -> TraversalResult<SlotPermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| TraversalError::Runtime(format!("concurrency slot unavailable: {e}")))?;

        let in_flight = self.in_flight();
        self.high_water_mark.fetch_max(in_flight, Ordering::AcqRel);

        Ok(SlotPermit { _permit: permit })
    }

    /// Sleep for the configured inter-batch pause, if enabled
    pub async fn pause(&self) {
        if let Some(duration) = self.sleep_between_batches {
            debug!(sleep_ms = duration.as_millis() as u64, "Sleeping between batches");
            tokio::time::sleep(duration).await;
        }
    }

    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.semaphore.available_permits()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Highest number of slots held at once since construction
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark.load(Ordering::Acquire)
    }
}

/// A held concurrency slot; dropping it releases the slot
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}
