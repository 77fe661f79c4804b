use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Ack, ApiClient, ApiError, ApiRequest, Page};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub name: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// `GET /contacts?page=&pageSize=&search=`, enveloped page.
pub async fn list_contacts(
    api: &ApiClient,
    page: u32,
    page_size: u32,
    search: Option<&str>,
) -> Result<Page<Contact>, ApiError> {
    let request = ApiRequest::get("/contacts")
        .query("page", page.max(1))
        .query("pageSize", page_size)
        .query_opt("search", search.filter(|s| !s.trim().is_empty()));
    api.call(request).await
}

pub async fn get_contact(api: &ApiClient, id: &str) -> Result<Contact, ApiError> {
    api.call(ApiRequest::get(format!("/contacts/{id}"))).await
}

pub async fn create_contact(api: &ApiClient, contact: &NewContact) -> Result<Contact, ApiError> {
    api.call(ApiRequest::post("/contacts").json(contact)?).await
}

pub async fn delete_contact(api: &ApiClient, id: &str) -> Result<Ack, ApiError> {
    api.call_ack(ApiRequest::delete(format!("/contacts/{id}"))).await
}
