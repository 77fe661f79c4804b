use std::collections::HashMap;

use chrono::NaiveDate;
use inbox_channel::InboxMessage;

use super::InboxError;

/// Per-contact message threads, each kept sorted by timestamp.
#[derive(Debug, Default, Clone)]
pub struct ThreadStore {
    threads: HashMap<String, Vec<InboxMessage>>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts after every message with a timestamp not later than this one,
    /// so equal timestamps keep arrival order.
    pub fn insert(&mut self, message: InboxMessage) -> Result<usize, InboxError> {
        let ts = message
            .timestamp()
            .ok_or_else(|| InboxError::MissingTimestamp(message.contact_id.clone()))?;
        let thread = self.threads.entry(message.contact_id.clone()).or_default();
        let at = thread.partition_point(|m| m.timestamp().is_some_and(|t| t <= ts));
        thread.insert(at, message);
        Ok(at)
    }

    /// Replaces a thread with server history. Messages without a timestamp
    /// are dropped.
    pub fn replace_thread(&mut self, contact_id: &str, mut messages: Vec<InboxMessage>) -> usize {
        messages.retain(|m| m.timestamp().is_some());
        messages.sort_by_key(|m| m.timestamp());
        let count = messages.len();
        self.threads.insert(contact_id.to_string(), messages);
        count
    }

    pub fn thread(&self, contact_id: &str) -> &[InboxMessage] {
        self.threads
            .get(contact_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn last_message(&self, contact_id: &str) -> Option<&InboxMessage> {
        self.thread(contact_id).last()
    }

    /// Contacts ordered by most recent activity first.
    pub fn contacts(&self) -> Vec<&str> {
        let mut contacts: Vec<(&str, _)> = self
            .threads
            .iter()
            .map(|(id, msgs)| (id.as_str(), msgs.last().and_then(|m| m.timestamp())))
            .collect();
        contacts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        contacts.into_iter().map(|(id, _)| id).collect()
    }

    /// The thread split into UTC calendar days, oldest first.
    pub fn grouped_by_day(&self, contact_id: &str) -> Vec<(NaiveDate, Vec<&InboxMessage>)> {
        let mut groups: Vec<(NaiveDate, Vec<&InboxMessage>)> = Vec::new();
        for message in self.thread(contact_id) {
            let Some(day) = message.timestamp().map(|t| t.date_naive()) else {
                continue;
            };
            match groups.last_mut() {
                Some((current, bucket)) if *current == day => bucket.push(message),
                _ => groups.push((day, vec![message])),
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.threads.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
