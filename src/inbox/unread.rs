use std::collections::HashMap;

use inbox_channel::UnreadCount;

/// Unread message counts per contact, reconciled against the server.
#[derive(Debug, Default, Clone)]
pub struct UnreadCounter {
    counts: HashMap<String, u32>,
    refresh_needed: bool,
}

impl UnreadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, contact_id: &str) -> u32 {
        self.counts.get(contact_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn increment(&mut self, contact_id: &str) -> u32 {
        let count = self.counts.entry(contact_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Server value wins over the local count.
    pub fn set(&mut self, contact_id: &str, count: u32) {
        if count == 0 {
            self.counts.remove(contact_id);
        } else {
            self.counts.insert(contact_id.to_string(), count);
        }
    }

    pub fn reset(&mut self, contact_id: &str) {
        self.counts.remove(contact_id);
    }

    pub fn replace_all(&mut self, counts: Vec<UnreadCount>) {
        self.counts.clear();
        for c in counts {
            self.set(&c.contact_id, c.unread_count);
        }
        self.refresh_needed = false;
    }

    pub fn mark_refresh_needed(&mut self) {
        self.refresh_needed = true;
    }

    pub fn refresh_needed(&self) -> bool {
        self.refresh_needed
    }

    pub fn snapshot(&self) -> Vec<UnreadCount> {
        let mut all: Vec<UnreadCount> = self
            .counts
            .iter()
            .map(|(contact_id, unread_count)| UnreadCount {
                contact_id: contact_id.clone(),
                unread_count: *unread_count,
            })
            .collect();
        all.sort_by(|a, b| a.contact_id.cmp(&b.contact_id));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_set_reset() {
        let mut counter = UnreadCounter::new();
        counter.increment("a");
        counter.increment("a");
        counter.increment("b");
        assert_eq!(counter.get("a"), 2);
        assert_eq!(counter.total(), 3);

        counter.set("a", 7);
        assert_eq!(counter.get("a"), 7);
        counter.reset("a");
        assert_eq!(counter.get("a"), 0);
        assert_eq!(counter.total(), 1);
    }

    #[test]
    fn test_replace_all_clears_refresh_flag() {
        let mut counter = UnreadCounter::new();
        counter.increment("stale");
        counter.mark_refresh_needed();
        counter.replace_all(vec![UnreadCount {
            contact_id: "fresh".into(),
            unread_count: 3,
        }]);
        assert!(!counter.refresh_needed());
        assert_eq!(counter.get("stale"), 0);
        assert_eq!(counter.snapshot().len(), 1);
    }
}
