use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Hub methods the server invokes on us, and the ones we invoke on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
pub enum HubMethod {
    ReceiveInboxMessage,
    UnreadCountChanged,
    SendMessageToContact,
    MarkAsRead,
}

/// One chat message pushed by the hub for a contact's thread.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InboxMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub contact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    pub is_incoming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_name: Option<String>,
}

impl InboxMessage {
    /// Ordering key of the message: `sentAt`, falling back to `createdAt`.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.sent_at.or(self.created_at)
    }
}

/// Server-side unread count for one contact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub contact_id: String,
    pub unread_count: u32,
}

/// `UnreadCountChanged` carries either one contact's new count or nothing,
/// in which case every count has to be fetched again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnreadCountChanged {
    Contact(UnreadCount),
    RefreshAll,
}

/// Lifecycle of a hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_method_names_match_wire_targets() {
        assert_eq!(HubMethod::ReceiveInboxMessage.as_ref(), "ReceiveInboxMessage");
        assert_eq!(HubMethod::MarkAsRead.to_string(), "MarkAsRead");
        assert_eq!(
            HubMethod::from_str("UnreadCountChanged").unwrap(),
            HubMethod::UnreadCountChanged
        );
    }

    #[test]
    fn test_inbox_message_timestamp_falls_back_to_created_at() {
        let msg: InboxMessage = serde_json::from_value(json!({
            "contactId": "c1",
            "isIncoming": true,
            "message": "hi",
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(msg.sent_at, None);
        assert_eq!(msg.timestamp().unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_inbox_message_requires_contact_id() {
        let res = serde_json::from_value::<InboxMessage>(json!({
            "isIncoming": true,
            "sentAt": "2024-05-01T10:00:00Z"
        }));
        assert!(res.is_err());
    }
}
