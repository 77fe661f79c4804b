//! Inbox state fed by the realtime hub: ordered threads, unread counts and
//! the notification sound.

use std::sync::{Arc, Mutex, MutexGuard};

use inbox_channel::{
    HubClient, HubConfig, HubError, InboxMessage, Subscription, UnreadCountChanged,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::{self, ApiClient, ApiError};

pub mod sound;
pub mod thread;
pub mod unread;

pub use sound::{CountingPlayer, SoundGate, SoundPlayer, TerminalBell};
pub use thread::ThreadStore;
pub use unread::UnreadCounter;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InboxError {
    #[error("message for contact `{0}` has neither sentAt nor createdAt")]
    MissingTimestamp(String),
}

/// Fire-and-forget read receipts.
pub trait ReadReceipts: Send + Sync {
    fn mark_as_read(&self, contact_id: &str) -> Result<(), HubError>;
}

impl ReadReceipts for HubClient {
    fn mark_as_read(&self, contact_id: &str) -> Result<(), HubError> {
        HubClient::mark_as_read(self, contact_id)
    }
}

/// What applying one pushed message did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageOutcome {
    pub stored: bool,
    pub counted: bool,
    pub sound_played: bool,
}

#[derive(Debug)]
pub struct InboxState {
    threads: ThreadStore,
    unread: UnreadCounter,
    open_contact: Option<String>,
    user_id: Option<String>,
    sound: SoundGate,
}

impl InboxState {
    pub fn new(user_id: Option<String>, player: Arc<dyn SoundPlayer>) -> Self {
        Self {
            threads: ThreadStore::new(),
            unread: UnreadCounter::new(),
            open_contact: None,
            user_id,
            sound: SoundGate::new(player),
        }
    }

    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    pub fn unread(&self) -> &UnreadCounter {
        &self.unread
    }

    pub fn open_contact(&self) -> Option<&str> {
        self.open_contact.as_deref()
    }

    pub fn sound(&self) -> &SoundGate {
        &self.sound
    }

    pub fn record_gesture(&self) {
        self.sound.record_gesture();
    }

    pub fn apply_message(&mut self, message: InboxMessage) -> MessageOutcome {
        let contact_id = message.contact_id.clone();
        let self_sent = match (&self.user_id, &message.sender_id) {
            (Some(me), Some(sender)) => me == sender,
            _ => false,
        };
        let counts = message.is_incoming
            && !self_sent
            && self.open_contact.as_deref() != Some(contact_id.as_str());

        if let Err(err) = self.threads.insert(message) {
            warn!(error = %err, "inbox message dropped");
            return MessageOutcome::default();
        }

        let mut outcome = MessageOutcome {
            stored: true,
            ..MessageOutcome::default()
        };
        if counts {
            let unread = self.unread.increment(&contact_id);
            debug!(contact_id = %contact_id, unread, "unread count raised");
            outcome.counted = true;
            outcome.sound_played = self.sound.request_play();
        }
        outcome
    }

    pub fn apply_unread_change(&mut self, change: UnreadCountChanged) {
        match change {
            UnreadCountChanged::Contact(count) => {
                self.unread.set(&count.contact_id, count.unread_count)
            }
            UnreadCountChanged::RefreshAll => self.unread.mark_refresh_needed(),
        }
    }

    /// Makes `contact_id` the open thread, zeroes its count and sends a read
    /// receipt without waiting for it. Opening counts as a user gesture.
    pub fn open_thread(&mut self, contact_id: &str, receipts: &dyn ReadReceipts) -> bool {
        self.sound.record_gesture();
        self.open_contact = Some(contact_id.to_string());
        self.unread.reset(contact_id);
        match receipts.mark_as_read(contact_id) {
            Ok(()) => true,
            Err(err) => {
                warn!(contact_id, error = %err, "read receipt not sent");
                false
            }
        }
    }

    pub fn close_thread(&mut self) {
        self.open_contact = None;
    }

    pub fn load_history(&mut self, contact_id: &str, messages: Vec<InboxMessage>) -> usize {
        self.threads.replace_thread(contact_id, messages)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboxEvent {
    Message {
        message: InboxMessage,
        outcome: MessageOutcome,
    },
    UnreadChanged(UnreadCountChanged),
}

fn lock(state: &Mutex<InboxState>) -> MutexGuard<'_, InboxState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A mounted inbox screen: the hub connection plus the handlers feeding
/// [`InboxState`]. Unmounting removes the handlers and closes the hub.
pub struct InboxView {
    client: HubClient,
    state: Arc<Mutex<InboxState>>,
    events: broadcast::Sender<InboxEvent>,
    subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for InboxView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboxView")
            .field("client", &self.client)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl InboxView {
    pub async fn mount(config: HubConfig, state: Arc<Mutex<InboxState>>) -> Result<Self, HubError> {
        let client = HubClient::connect(config).await?;
        let (events, _) = broadcast::channel(64);

        let on_message = {
            let state = state.clone();
            let events = events.clone();
            client.on_inbox_message(move |message| {
                let outcome = lock(&state).apply_message(message.clone());
                let _ = events.send(InboxEvent::Message { message, outcome });
            })
        };
        let on_unread = {
            let state = state.clone();
            let events = events.clone();
            client.on_unread_count_changed(move |change| {
                lock(&state).apply_unread_change(change.clone());
                let _ = events.send(InboxEvent::UnreadChanged(change));
            })
        };
        info!("inbox mounted");

        Ok(Self {
            client,
            state,
            events,
            subscriptions: vec![on_message, on_unread],
        })
    }

    pub fn client(&self) -> &HubClient {
        &self.client
    }

    pub fn state(&self) -> Arc<Mutex<InboxState>> {
        self.state.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<InboxEvent> {
        self.events.subscribe()
    }

    pub fn open_thread(&self, contact_id: &str) -> bool {
        lock(&self.state).open_thread(contact_id, &self.client)
    }

    pub async fn send(&self, contact_id: &str, text: &str) -> Result<Option<Value>, HubError> {
        self.record_gesture();
        self.client.send_message_to_contact(contact_id, text).await
    }

    /// Fetches all counts if the hub asked for a full refresh. Returns
    /// whether a fetch happened.
    pub async fn refresh_unread_if_needed(&self, api: &ApiClient) -> Result<bool, ApiError> {
        if !lock(&self.state).unread().refresh_needed() {
            return Ok(false);
        }
        let counts = api::inbox::unread_counts(api).await?;
        lock(&self.state).unread.replace_all(counts);
        Ok(true)
    }

    pub async fn load_history(&self, api: &ApiClient, contact_id: &str) -> Result<usize, ApiError> {
        let messages = api::inbox::thread_history(api, contact_id).await?;
        Ok(lock(&self.state).load_history(contact_id, messages))
    }

    pub fn handler_count(&self) -> usize {
        self.client.registry().total()
    }

    pub async fn unmount(mut self) {
        self.subscriptions.clear();
        self.client.close().await;
        info!("inbox unmounted");
    }

    /// Unlocks the notification sound, e.g. when a user starts listening.
    pub fn record_gesture(&self) {
        lock(&self.state).record_gesture();
    }
}
