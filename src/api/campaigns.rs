use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Ack, ApiClient, ApiError, ApiRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub cta_flow_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_count: u32,
    #[serde(default)]
    pub failed_count: u32,
}

/// `GET /campaign/get-all-campaigns`, enveloped list.
pub async fn list_campaigns(api: &ApiClient) -> Result<Vec<Campaign>, ApiError> {
    api.call(ApiRequest::get("/campaign/get-all-campaigns")).await
}

pub async fn get_campaign(api: &ApiClient, id: &str) -> Result<Campaign, ApiError> {
    api.call(ApiRequest::get(format!("/campaign/{id}"))).await
}

/// `POST /campaign/send-campaign/{id}`.
pub async fn send_campaign(api: &ApiClient, id: &str) -> Result<Ack, ApiError> {
    let ack = api
        .call_ack(ApiRequest::post(format!("/campaign/send-campaign/{id}")))
        .await?;
    info!(campaign_id = id, "campaign sent");
    Ok(ack)
}

/// `POST /campaign/{id}/retry-all`. Server-side retry of every failed send;
/// the client itself never retries.
pub async fn retry_failed(api: &ApiClient, id: &str) -> Result<Ack, ApiError> {
    let ack = api
        .call_ack(ApiRequest::post(format!("/campaign/{id}/retry-all")))
        .await?;
    info!(campaign_id = id, "retry of failed sends requested");
    Ok(ack)
}

pub async fn delete_campaign(api: &ApiClient, id: &str) -> Result<Ack, ApiError> {
    api.call_ack(ApiRequest::delete(format!("/campaign/{id}"))).await
}
