use inbox_channel::{InboxMessage, UnreadCount};

use super::{ApiClient, ApiError, ApiRequest};

/// `GET /inbox/unread-counts`, bare list of `{ contactId, unreadCount }`.
pub async fn unread_counts(api: &ApiClient) -> Result<Vec<UnreadCount>, ApiError> {
    api.call(ApiRequest::get("/inbox/unread-counts").bare()).await
}

/// `GET /inbox/messages?contactId=`, bare list in server order.
pub async fn thread_history(api: &ApiClient, contact_id: &str) -> Result<Vec<InboxMessage>, ApiError> {
    api.call(
        ApiRequest::get("/inbox/messages")
            .query("contactId", contact_id)
            .bare(),
    )
    .await
}
