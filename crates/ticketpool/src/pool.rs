//! The shared ticket pool.
//!
//! One mutex guards both the available count and the running flag. Every
//! successful mutation logs and publishes its status notification while the
//! lock is still held, so observers see counts in the same order the
//! mutations were applied.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activity_log::ActivityLog;
use crate::config::{ConfigError, SimulationConfig};
use crate::notify::{Notifier, Topic};

/// Snapshot of the pool counts, also the `ticketAvailability` payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total_tickets: u64,
    pub available_tickets: u64,
}

/// Result of a batch release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// This many tickets went into the pool.
    Added(u64),
    /// Already at capacity, or a batch of zero.
    Full,
    /// The pool is not running; nothing changed.
    Stopped,
}

#[derive(Debug)]
struct PoolState {
    available: u64,
    running: bool,
}

pub struct TicketPool {
    total_tickets: u64,
    max_capacity: u64,
    release_interval: Duration,
    retrieval_interval: Duration,
    state: Mutex<PoolState>,
    log: Arc<ActivityLog>,
    notifier: Arc<dyn Notifier>,
}

impl TicketPool {
    /// Build a stopped pool holding `min(total_tickets, max_capacity)` tickets.
    pub fn new(
        total_tickets: i64,
        max_capacity: i64,
        release_interval: Duration,
        retrieval_interval: Duration,
        log: Arc<ActivityLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        if total_tickets <= 0 {
            return Err(ConfigError::TotalTickets(total_tickets));
        }
        if max_capacity <= 0 {
            return Err(ConfigError::MaxCapacity(max_capacity));
        }
        let total_tickets = total_tickets as u64;
        let max_capacity = max_capacity as u64;

        Ok(Self {
            total_tickets,
            max_capacity,
            release_interval,
            retrieval_interval,
            state: Mutex::new(PoolState {
                available: total_tickets.min(max_capacity),
                running: false,
            }),
            log,
            notifier,
        })
    }

    pub fn from_config(
        config: &SimulationConfig,
        log: Arc<ActivityLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        Self::new(
            config.total_tickets,
            config.max_ticket_capacity,
            config.release_interval(),
            config.retrieval_interval(),
            log,
            notifier,
        )
    }

    pub fn start(&self) {
        let mut state = self.lock();
        if !state.running {
            state.running = true;
            tracing::debug!(available = state.available, "Pool started");
        }
    }

    pub fn stop(&self) {
        let mut state = self.lock();
        if state.running {
            state.running = false;
            tracing::debug!(available = state.available, "Pool stopped");
        }
    }

    /// Release one ticket into the pool. Returns false when the pool is full.
    pub fn add_one(&self, producer_id: u32) -> bool {
        let mut state = self.lock();
        if state.available >= self.max_capacity {
            return false;
        }
        state.available += 1;
        self.log.append(format!(
            "Vendor {} added a ticket. Available tickets: {}",
            producer_id, state.available
        ));
        self.publish_status(state.available);
        true
    }

    /// Release up to `count` tickets in one critical section, stopping at
    /// capacity. The running flag is checked under the same lock, so a batch
    /// never lands in a stopped pool.
    pub fn add_many(&self, count: u64, producer_id: u32) -> AddOutcome {
        let mut state = self.lock();
        if !state.running {
            return AddOutcome::Stopped;
        }
        let added = count.min(self.max_capacity.saturating_sub(state.available));
        if added == 0 {
            return AddOutcome::Full;
        }
        state.available += added;
        self.log.append(format!(
            "Vendor {} added {} tickets. Available tickets: {}",
            producer_id, added, state.available
        ));
        self.publish_status(state.available);
        AddOutcome::Added(added)
    }

    /// Sell one ticket. Returns false when the pool is empty.
    pub fn take_one(&self, consumer_id: u32) -> bool {
        let mut state = self.lock();
        if state.available == 0 {
            return false;
        }
        state.available -= 1;
        self.log.append(format!(
            "Customer {} bought a ticket. Available tickets: {}",
            consumer_id, state.available
        ));
        self.publish_status(state.available);
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn available_count(&self) -> u64 {
        self.lock().available
    }

    pub fn total_count(&self) -> u64 {
        self.total_tickets
    }

    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    pub fn stats(&self) -> TicketStats {
        TicketStats {
            total_tickets: self.total_tickets,
            available_tickets: self.available_count(),
        }
    }

    pub fn release_interval(&self) -> Duration {
        self.release_interval
    }

    pub fn retrieval_interval(&self) -> Duration {
        self.retrieval_interval
    }

    fn publish_status(&self, available: u64) {
        let stats = TicketStats {
            total_tickets: self.total_tickets,
            available_tickets: available,
        };
        match serde_json::to_string(&stats) {
            Ok(payload) => self.notifier.publish(Topic::TicketAvailability, payload),
            Err(e) => tracing::error!(error = %e, "Failed to encode ticket availability"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // The state is two plain integers updated in single statements; a
        // panic while holding the lock cannot leave it half-written.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for TicketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TicketPool")
            .field("total_tickets", &self.total_tickets)
            .field("max_capacity", &self.max_capacity)
            .field("available", &state.available)
            .field("running", &state.running)
            .finish()
    }
}
