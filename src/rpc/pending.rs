//! Pending request table.
//!
//! One table per running server. Each in-flight request owns a one-shot
//! channel keyed by its correlation id; the output reader completes and
//! removes the entry when a response with that id shows up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use super::ParsedResponse;

/// An in-flight request waiting for its response.
#[derive(Debug)]
struct PendingRequest {
    method: String,
    issued_at: Instant,
    tx: oneshot::Sender<ParsedResponse>,
}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<u64, PendingRequest>,
    closed: bool,
}

/// Table of requests awaiting a response.
#[derive(Debug)]
pub struct PendingRequests {
    next_id: AtomicU64,
    table: Mutex<Table>,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    /// Create an empty table. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            table: Mutex::new(Table::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh correlation id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a request and return the receiver its response arrives on.
    ///
    /// On a closed table the sender is dropped right away, so the receiver
    /// reports the channel as closed.
    pub fn register(&self, id: u64, method: &str) -> oneshot::Receiver<ParsedResponse> {
        let (tx, rx) = oneshot::channel();
        let mut table = self.lock();
        if table.closed {
            return rx;
        }
        table.entries.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                issued_at: Instant::now(),
                tx,
            },
        );
        rx
    }

    /// Hand a decoded message to the request it answers.
    ///
    /// Returns `false` when no pending request carries the message's id.
    pub fn complete(&self, response: ParsedResponse) -> bool {
        let Some(id) = response.id_u64() else {
            return false;
        };
        let Some(pending) = self.lock().entries.remove(&id) else {
            return false;
        };

        tracing::trace!(
            id,
            method = %pending.method,
            elapsed_ms = elapsed_ms(pending.issued_at.elapsed()),
            "Response matched pending request"
        );
        // The caller may have given up already; nothing to do then.
        let _ = pending.tx.send(response);
        true
    }

    /// Drop a pending request without completing it.
    pub fn cancel(&self, id: u64) -> bool {
        self.lock().entries.remove(&id).is_some()
    }

    /// Fail every pending request and refuse new ones.
    ///
    /// Returns how many requests were still waiting.
    pub fn close(&self) -> usize {
        let mut table = self.lock();
        table.closed = true;
        let drained = table.entries.len();
        table.entries.clear();
        drained
    }

    /// Number of requests still waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no request is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the table has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Removes its entry from the table when dropped.
///
/// Keeps the table from accumulating entries for callers that time out or
/// are cancelled.
pub(crate) struct PendingGuard<'a> {
    pending: &'a PendingRequests,
    id: u64,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(pending: &'a PendingRequests, id: u64) -> Self {
        Self { pending, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.cancel(self.id);
    }
}

// Safe: request latencies never approach u64::MAX milliseconds
#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(elapsed: Duration) -> u64 {
    elapsed.as_millis() as u64
}
