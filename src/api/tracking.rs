use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError, ApiRequest, Page, RequestOptions};
use crate::report::{ExportBackend, ExportFormat, SearchBackend, SearchRequest};

/// One CTA button click recorded by the tracking endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingLog {
    pub id: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub cta_flow_id: Option<String>,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub clicked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TrackingReport {
    api: ApiClient,
}

impl TrackingReport {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SearchBackend for TrackingReport {
    type Row = TrackingLog;

    /// `POST /tracking/logs/search`, bare page.
    async fn search(&self, request: &SearchRequest) -> Result<Page<TrackingLog>, ApiError> {
        self.api
            .call(ApiRequest::post("/tracking/logs/search").json(request)?.bare())
            .await
    }
}

#[async_trait]
impl ExportBackend for TrackingReport {
    fn report_name(&self) -> &str {
        "tracking-logs"
    }

    async fn export(&self, request: &SearchRequest, format: ExportFormat) -> Result<Vec<u8>, ApiError> {
        let path = format!("/tracking/logs/export/{}", format.extension());
        self.api
            .call_bytes(ApiRequest::post(path).json(request)?.options(RequestOptions::silent()))
            .await
    }
}

/// `GET /tracking/journey/{messageLogId}`, bare list of clicks in order.
pub async fn journey(api: &ApiClient, message_log_id: &str) -> Result<Vec<TrackingLog>, ApiError> {
    api.call(ApiRequest::get(format!("/tracking/journey/{message_log_id}")).bare())
        .await
}
