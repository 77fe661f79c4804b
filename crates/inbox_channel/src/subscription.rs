use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use serde_json::Value;
use tracing::trace;

pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Handlers per hub target. Targets are matched case-insensitively, like
/// the hub itself does.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Vec<(u64, Handler)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.total())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>, target: &str, handler: Handler) -> Subscription {
        let key = target.to_lowercase();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.entry(key.clone()).or_default().push((id, handler));
        trace!(target = %target, id, "handler registered");
        Subscription {
            registry: Arc::downgrade(self),
            target: key,
            id,
            active: true,
        }
    }

    fn remove(&self, key: &str, id: u64) -> bool {
        let mut removed = false;
        if let Some(mut entry) = self.handlers.get_mut(key) {
            let before = entry.len();
            entry.retain(|(hid, _)| *hid != id);
            removed = entry.len() != before;
        }
        self.handlers.remove_if(key, |_, list| list.is_empty());
        removed
    }

    /// Calls every handler registered for `target`; returns how many ran.
    /// Handlers run outside the map lock so they may subscribe or
    /// unsubscribe themselves.
    pub fn dispatch(&self, target: &str, args: &[Value]) -> usize {
        let snapshot: Vec<Handler> = match self.handlers.get(&target.to_lowercase()) {
            Some(entry) => entry.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };
        for handler in &snapshot {
            handler(args);
        }
        snapshot.len()
    }

    pub fn handler_count(&self, target: &str) -> usize {
        self.handlers
            .get(&target.to_lowercase())
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.handlers.iter().map(|entry| entry.len()).sum()
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }
}

/// Disposer for one registered handler. Dropping it deregisters the handler.
#[must_use = "dropping a Subscription immediately removes its handler"]
pub struct Subscription {
    registry: Weak<HandlerRegistry>,
    target: String,
    id: u64,
    active: bool,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("target", &self.target)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl Subscription {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_active(&self) -> bool {
        self.active && self.registry.strong_count() > 0
    }

    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.target, self.id);
            trace!(target = %self.target, id = self.id, "handler removed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
