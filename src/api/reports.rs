use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError, ApiRequest, Page, RequestOptions};
use crate::report::{ExportBackend, ExportFormat, SearchBackend, SearchRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLog {
    pub id: String,
    pub recipient_number: String,
    #[serde(default)]
    pub campaign_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub message_content: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub waba_id: Option<String>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

/// `POST /report/message-logs/search`, enveloped page, and its CSV/XLSX
/// export siblings.
#[derive(Debug, Clone)]
pub struct MessageLogReport {
    api: ApiClient,
}

impl MessageLogReport {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SearchBackend for MessageLogReport {
    type Row = MessageLog;

    async fn search(&self, request: &SearchRequest) -> Result<Page<MessageLog>, ApiError> {
        self.api
            .call(ApiRequest::post("/report/message-logs/search").json(request)?)
            .await
    }
}

#[async_trait]
impl ExportBackend for MessageLogReport {
    fn report_name(&self) -> &str {
        "message-logs"
    }

    async fn export(&self, request: &SearchRequest, format: ExportFormat) -> Result<Vec<u8>, ApiError> {
        let path = format!("/report/message-logs/export/{}", format.extension());
        self.api
            .call_bytes(ApiRequest::post(path).json(request)?.options(RequestOptions::silent()))
            .await
    }
}
