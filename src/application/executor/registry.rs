//! In-flight experiment registry.
//!
//! One entry per experiment id, inserted on submit and removed when the
//! executing task finishes or a queued entry is cancelled. A second submit
//! for an id already present is rejected, so an experiment never runs twice
//! concurrently.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::domain::id::ExperimentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for a worker permit (or for a retry delay to pass).
    Queued,
    Running,
}

#[derive(Debug)]
struct Entry {
    serial: u64,
    token: CancellationToken,
    phase: Phase,
}

/// Handle returned to the task that owns an entry.
#[derive(Debug, Clone)]
pub(crate) struct Ticket {
    pub id: ExperimentId,
    pub serial: u64,
    pub token: CancellationToken,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cancelled {
    /// Entry was queued; it has been removed and will never run.
    Queued,
    /// Entry is running; its token is now cancelled.
    Running,
}

#[derive(Debug, Default)]
struct Inner {
    next_serial: u64,
    entries: HashMap<ExperimentId, Entry>,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    inner: Mutex<Inner>,
    idle: Notify,
}

impl Registry {
    /// Register `id` as queued. `None` if it is already in flight.
    pub fn register(&self, id: ExperimentId) -> Option<Ticket> {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&id) {
            return None;
        }
        inner.next_serial += 1;
        let serial = inner.next_serial;
        let token = CancellationToken::new();
        inner.entries.insert(
            id,
            Entry {
                serial,
                token: token.clone(),
                phase: Phase::Queued,
            },
        );
        Some(Ticket { id, serial, token })
    }

    /// Move a queued entry to running. False if it was cancelled or replaced.
    pub fn start(&self, ticket: &Ticket) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&ticket.id) {
            Some(entry) if entry.serial == ticket.serial && !entry.token.is_cancelled() => {
                entry.phase = Phase::Running;
                true
            }
            _ => false,
        }
    }

    /// Put a running entry back in the queue, for a retry.
    pub fn requeue(&self, ticket: &Ticket) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&ticket.id) {
            Some(entry) if entry.serial == ticket.serial && !entry.token.is_cancelled() => {
                entry.phase = Phase::Queued;
                true
            }
            _ => false,
        }
    }

    /// Cancel the entry for `id`, if any.
    pub fn cancel(&self, id: ExperimentId) -> Option<Cancelled> {
        let mut inner = self.inner.lock();
        let phase = inner.entries.get(&id)?.phase;
        match phase {
            Phase::Queued => {
                let entry = inner.entries.remove(&id)?;
                entry.token.cancel();
                let empty = inner.entries.is_empty();
                drop(inner);
                if empty {
                    self.idle.notify_waiters();
                }
                Some(Cancelled::Queued)
            }
            Phase::Running => {
                inner.entries.get(&id)?.token.cancel();
                Some(Cancelled::Running)
            }
        }
    }

    /// Remove the entry owned by `ticket`.
    pub fn release(&self, ticket: &Ticket) {
        let mut inner = self.inner.lock();
        let owned = inner
            .entries
            .get(&ticket.id)
            .is_some_and(|entry| entry.serial == ticket.serial);
        if owned {
            inner.entries.remove(&ticket.id);
        }
        let empty = inner.entries.is_empty();
        drop(inner);
        if empty {
            self.idle.notify_waiters();
        }
    }

    pub fn contains(&self, id: ExperimentId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    pub fn is_running(&self, id: ExperimentId) -> bool {
        self.inner
            .lock()
            .entries
            .get(&id)
            .is_some_and(|entry| entry.phase == Phase::Running)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Resolve once no entry is left.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.inner.lock().entries.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
