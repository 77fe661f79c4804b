use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Where user-facing notifications end up.
pub trait NotificationSink: Send + Sync + Debug {
    fn show(&self, level: NotifyLevel, message: &str);
}

#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn show(&self, level: NotifyLevel, message: &str) {
        match level {
            NotifyLevel::Info | NotifyLevel::Success => info!(%level, "{message}"),
            NotifyLevel::Warning => warn!(%level, "{message}"),
            NotifyLevel::Error => error!(%level, "{message}"),
        }
    }
}

/// Prints to stderr so it does not mix with command output.
#[derive(Debug, Default, Clone)]
pub struct TerminalSink;

impl NotificationSink for TerminalSink {
    fn show(&self, level: NotifyLevel, message: &str) {
        let icon = match level {
            NotifyLevel::Info => "ℹ️ ",
            NotifyLevel::Success => "✅",
            NotifyLevel::Warning => "⚠️ ",
            NotifyLevel::Error => "❌",
        };
        eprintln!("{icon} {message}");
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<(NotifyLevel, String)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<(NotifyLevel, String)> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.entries().len()
    }
}

impl NotificationSink for RecordingSink {
    fn show(&self, level: NotifyLevel, message: &str) {
        match self.entries.lock() {
            Ok(mut guard) => guard.push((level, message.to_string())),
            Err(poisoned) => poisoned.into_inner().push((level, message.to_string())),
        }
    }
}

/// Rate-limited notifications. A repeat of the same key within the cooldown
/// is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    cooldown: Duration,
    recent: Arc<DashMap<String, Instant>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink), Duration::from_millis(2500))
    }
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, cooldown: Duration) -> Self {
        Self {
            sink,
            cooldown,
            recent: Arc::new(DashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Keys on the message text. Returns whether it was shown.
    pub fn notify(&self, level: NotifyLevel, message: &str) -> bool {
        self.notify_keyed(message, level, message)
    }

    pub fn notify_keyed(&self, key: &str, level: NotifyLevel, message: &str) -> bool {
        let now = Instant::now();
        self.recent.retain(|_, seen| now.duration_since(*seen) < self.cooldown);
        let shown = match self.recent.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) >= self.cooldown {
                    entry.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        };

        if shown {
            self.sink.show(level, message);
        } else {
            debug!(key, "notification suppressed");
        }
        shown
    }

    pub fn info(&self, message: &str) -> bool {
        self.notify(NotifyLevel::Info, message)
    }

    pub fn success(&self, message: &str) -> bool {
        self.notify(NotifyLevel::Success, message)
    }

    pub fn warning(&self, message: &str) -> bool {
        self.notify(NotifyLevel::Warning, message)
    }

    pub fn error(&self, message: &str) -> bool {
        self.notify(NotifyLevel::Error, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_duplicates_within_cooldown_are_suppressed() {
        let sink = RecordingSink::new();
        let notifier = Notifier::new(sink.clone(), Duration::from_millis(2500));

        assert!(notifier.error("Session expired"));
        assert!(!notifier.error("Session expired"));
        tokio::time::advance(Duration::from_millis(2499)).await;
        assert!(!notifier.error("Session expired"));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(notifier.error("Session expired"));

        assert_eq!(sink.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let sink = RecordingSink::new();
        let notifier = Notifier::new(sink.clone(), Duration::from_secs(5));

        assert!(notifier.notify_keyed("auth", NotifyLevel::Error, "one"));
        assert!(notifier.notify_keyed("network", NotifyLevel::Error, "two"));
        assert!(!notifier.notify_keyed("auth", NotifyLevel::Error, "three"));

        let messages: Vec<String> = sink.entries().into_iter().map(|(_, m)| m).collect();
        assert_eq!(messages, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_keys_are_forgotten() {
        let sink = RecordingSink::new();
        let notifier = Notifier::new(sink.clone(), Duration::from_secs(1));

        for n in 0..50 {
            notifier.error(&format!("server error #{n}"));
        }
        assert_eq!(notifier.recent.len(), 50);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(notifier.error("server error #0"));
        assert_eq!(notifier.recent.len(), 1);
        assert_eq!(sink.count(), 51);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_cooldown_state() {
        let sink = RecordingSink::new();
        let notifier = Notifier::new(sink.clone(), Duration::from_secs(1));
        let other = notifier.clone();

        assert!(notifier.warning("slow down"));
        assert!(!other.warning("slow down"));
        assert_eq!(sink.entries(), vec![(NotifyLevel::Warning, "slow down".to_string())]);
    }
}
