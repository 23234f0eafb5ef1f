//! Stale-response suppression for type-ahead search.
//!
//! A debounced search can fire again while the previous request is still in
//! flight, and the slower response may land last. Tag each request with a
//! `Ticket` and drop whatever comes back for a ticket that is no longer the
//! latest.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket; it supersedes every earlier one.
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// `Some(value)` only if `ticket` is still the latest issued.
    pub fn accept<T>(&self, ticket: Ticket, value: T) -> Option<T> {
        if self.is_latest(ticket) {
            Some(value)
        } else {
            tracing::debug!(ticket = ticket.0, "discarding stale response");
            None
        }
    }

    /// Issue a ticket, await `fut`, and keep its output only if no newer
    /// ticket was issued meanwhile.
    pub async fn run<F: std::future::Future>(&self, fut: F) -> Option<F::Output> {
        let ticket = self.issue();
        let output = fut.await;
        self.accept(ticket, output)
    }
}
