//! Activity log: capped, timestamped, append-only text log.
//!
//! Backed by a fixed ring of slots, each behind its own lock. An append
//! reserves a sequence number atomically and only touches the slot that
//! sequence maps to, so snapshot reads never serialize the whole log
//! behind a burst of worker appends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::notify::{Notifier, Topic};

/// Lines kept before the oldest is overwritten.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    line: Arc<str>,
}

pub struct ActivityLog {
    slots: Box<[Mutex<Option<Entry>>]>,
    next_seq: AtomicU64,
    notifier: Arc<dyn Notifier>,
}

impl ActivityLog {
    pub fn new(capacity: usize, notifier: Arc<dyn Notifier>) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| Mutex::new(None)).collect(),
            next_seq: AtomicU64::new(0),
            notifier,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total lines ever appended, including the ones already overwritten.
    pub fn appended(&self) -> u64 {
        self.next_seq.load(Ordering::Acquire)
    }

    /// Timestamp `message`, store it, echo it to tracing and publish it on
    /// the `logs` topic. Returns the stored line.
    pub fn append(&self, message: impl AsRef<str>) -> Arc<str> {
        let message = message.as_ref();
        let line: Arc<str> = format!(
            "{} - {}",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            message
        )
        .into();

        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
        {
            let mut slot = self.slot(seq);
            // A writer that stalled long enough to be lapped must not clobber newer lines.
            if slot.as_ref().is_none_or(|e| e.seq < seq) {
                *slot = Some(Entry {
                    seq,
                    line: Arc::clone(&line),
                });
            }
        }

        tracing::info!(target: "ticketpool::activity", "{}", message);
        self.notifier.publish(Topic::Logs, line.to_string());
        line
    }

    /// Snapshot of the retained lines, oldest first.
    ///
    /// Appends racing with the snapshot may or may not be included.
    pub fn recent(&self) -> Vec<String> {
        let end = self.next_seq.load(Ordering::Acquire);
        let start = end.saturating_sub(self.slots.len() as u64);

        let mut lines = Vec::with_capacity((end - start) as usize);
        for seq in start..end {
            let slot = self.slot(seq);
            if let Some(entry) = slot.as_ref()
                && entry.seq == seq
            {
                lines.push(entry.line.to_string());
            }
        }
        lines
    }

    fn slot(&self, seq: u64) -> MutexGuard<'_, Option<Entry>> {
        let idx = (seq % self.slots.len() as u64) as usize;
        // Slots hold plain data; a panic mid-write cannot leave them inconsistent.
        self.slots[idx]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog")
            .field("capacity", &self.capacity())
            .field("appended", &self.appended())
            .finish()
    }
}
