use serde::{Deserialize, Serialize};

use super::{Ack, ApiClient, ApiError, ApiRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppSettings {
    pub provider: String,
    #[serde(default)]
    pub phone_number_id: Option<String>,
    #[serde(default)]
    pub waba_id: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub sender_display_name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// `GET /whatsappsettings/me`, enveloped.
pub async fn get_settings(api: &ApiClient) -> Result<WhatsAppSettings, ApiError> {
    api.call(ApiRequest::get("/whatsappsettings/me")).await
}

/// `PUT /whatsappsettings/update`.
pub async fn update_settings(api: &ApiClient, settings: &WhatsAppSettings) -> Result<Ack, ApiError> {
    api.call_ack(ApiRequest::put("/whatsappsettings/update").json(settings)?)
        .await
}
