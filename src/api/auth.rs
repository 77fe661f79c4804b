use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::{ApiClient, ApiError, ApiRequest};
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub business_id: Option<String>,
}

/// `POST /auth/login`, bare `{ token, role?, businessId? }`. Stores the token
/// on success.
pub async fn login(api: &ApiClient, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
    let _auth_flow = api.session().begin_auth_flow();
    let request = ApiRequest::post("/auth/login")
        .json(&LoginRequest { email, password })?
        .bare();
    let response: LoginResponse = api.call(request).await?;
    if response.token.trim().is_empty() {
        return Err(ApiError::Malformed("login response carried an empty token".into()).into());
    }
    api.session().set_token(&response.token)?;
    info!(role = ?response.role, "logged in");
    Ok(response)
}

pub fn logout(api: &ApiClient) -> Result<(), SessionError> {
    api.session().logout()
}
