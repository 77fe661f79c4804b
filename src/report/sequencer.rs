use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one issued search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Hands out increasing tickets and tells whether a response still belongs
/// to the newest search. With the guard disabled every response is current,
/// so the last one to arrive wins.
#[derive(Debug)]
pub struct SearchSequencer {
    latest: AtomicU64,
    guard: bool,
}

impl Default for SearchSequencer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SearchSequencer {
    pub fn new(guard: bool) -> Self {
        Self {
            latest: AtomicU64::new(0),
            guard,
        }
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        !self.guard || self.latest.load(Ordering::SeqCst) == ticket.0
    }

    pub fn is_guarded(&self) -> bool {
        self.guard
    }
}
