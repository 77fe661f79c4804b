//! Realtime inbox hub client.
//!
//! The hub speaks the JSON hub protocol over a WebSocket. The server pushes
//! `ReceiveInboxMessage` and `UnreadCountChanged`; the client invokes
//! `SendMessageToContact` and `MarkAsRead`.

pub mod client;
pub mod message;
pub mod protocol;
pub mod reconnect;
pub mod subscription;

pub use client::{HubClient, HubConfig, HubError};
pub use message::{ConnectionState, HubMethod, InboxMessage, UnreadCount, UnreadCountChanged};
pub use reconnect::ReconnectPolicy;
pub use subscription::{HandlerRegistry, Subscription};
