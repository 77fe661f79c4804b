use serde::{Deserialize, Serialize};

use super::{Ack, ApiClient, ApiError, ApiRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub monthly_quota: Option<u32>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAccess {
    pub feature_code: String,
    pub is_enabled: bool,
    #[serde(default)]
    pub plan_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeatureToggle<'a> {
    business_id: &'a str,
    feature_code: &'a str,
    is_enabled: bool,
}

/// `GET /plan/all`, bare list.
pub async fn list_plans(api: &ApiClient) -> Result<Vec<Plan>, ApiError> {
    api.call(ApiRequest::get("/plan/all").bare()).await
}

/// `GET /plan/me`, enveloped.
pub async fn current_plan(api: &ApiClient) -> Result<Plan, ApiError> {
    api.call(ApiRequest::get("/plan/me")).await
}

/// `GET /feature-access/me`, bare list.
pub async fn feature_access(api: &ApiClient) -> Result<Vec<FeatureAccess>, ApiError> {
    api.call(ApiRequest::get("/feature-access/me").bare()).await
}

/// Whether `feature_code` is enabled for the current business. Unknown
/// features count as disabled.
pub async fn has_feature(api: &ApiClient, feature_code: &str) -> Result<bool, ApiError> {
    Ok(feature_access(api)
        .await?
        .iter()
        .any(|f| f.is_enabled && f.feature_code.eq_ignore_ascii_case(feature_code)))
}

/// `PUT /feature-access`.
pub async fn set_feature_access(
    api: &ApiClient,
    business_id: &str,
    feature_code: &str,
    is_enabled: bool,
) -> Result<Ack, ApiError> {
    api.call_ack(ApiRequest::put("/feature-access").json(&FeatureToggle {
        business_id,
        feature_code,
        is_enabled,
    })?)
    .await
}
