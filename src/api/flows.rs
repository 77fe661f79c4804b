use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Ack, ApiClient, ApiError, ApiRequest};
use crate::flow::{Flow, FlowBackend};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub id: String,
    pub flow_name: String,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedFlow {
    flow_id: String,
}

/// `GET /cta-flow/all-published`, bare list.
pub async fn list_published(api: &ApiClient) -> Result<Vec<FlowSummary>, ApiError> {
    api.call(ApiRequest::get("/cta-flow/all-published").bare()).await
}

/// `GET /cta-flow/all-drafts`, bare list.
pub async fn list_drafts(api: &ApiClient) -> Result<Vec<FlowSummary>, ApiError> {
    api.call(ApiRequest::get("/cta-flow/all-drafts").bare()).await
}

/// `GET /cta-flow/{id}`, bare flow with its steps.
pub async fn get_flow(api: &ApiClient, id: &str) -> Result<Flow, ApiError> {
    api.call(ApiRequest::get(format!("/cta-flow/{id}")).bare()).await
}

/// `POST /cta-flow/save-visual`, enveloped `{ flowId }`. Creates or, when
/// the flow carries an id, replaces.
pub async fn save_flow(api: &ApiClient, flow: &Flow, is_published: bool) -> Result<String, ApiError> {
    let mut body = flow.clone();
    body.is_published = is_published;
    let saved: SavedFlow = api
        .call(ApiRequest::post("/cta-flow/save-visual").json(&body)?.enveloped())
        .await?;
    info!(flow_id = %saved.flow_id, is_published, "flow saved");
    Ok(saved.flow_id)
}

pub async fn delete_flow(api: &ApiClient, id: &str) -> Result<Ack, ApiError> {
    api.call_ack(ApiRequest::delete(format!("/cta-flow/delete/{id}"))).await
}

#[async_trait]
impl FlowBackend for ApiClient {
    async fn save_flow(&self, flow: &Flow, is_published: bool) -> Result<String, ApiError> {
        save_flow(self, flow, is_published).await
    }
}
