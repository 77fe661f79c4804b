use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError, ApiRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateButton {
    pub text: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub placeholder_count: u32,
    #[serde(default)]
    pub buttons: Vec<TemplateButton>,
}

/// `GET /WhatsAppTemplateFetcher/get-template-all`, enveloped list.
pub async fn list_templates(api: &ApiClient) -> Result<Vec<Template>, ApiError> {
    api.call(ApiRequest::get("/WhatsAppTemplateFetcher/get-template-all"))
        .await
}

/// `GET /WhatsAppTemplateFetcher/get-template-by-name?name=`, enveloped.
pub async fn get_template(api: &ApiClient, name: &str) -> Result<Template, ApiError> {
    api.call(ApiRequest::get("/WhatsAppTemplateFetcher/get-template-by-name").query("name", name))
        .await
}
