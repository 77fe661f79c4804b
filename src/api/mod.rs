//! REST client for the xByteChat API.
//!
//! Every call goes through [`ApiClient::call`], which attaches the bearer
//! token, decodes the declared response [`Shape`] and turns failures into
//! one notification plus an [`ApiError`].

use std::sync::Arc;

use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientSettings;
use crate::logger::RequestTimer;
use crate::notifier::{Notifier, NotifyLevel};
use crate::session::Session;

pub mod auth;
pub mod campaigns;
pub mod contacts;
pub mod envelope;
pub mod error;
pub mod flows;
pub mod inbox;
pub mod plans;
pub mod reports;
pub mod settings;
pub mod templates;
pub mod tracking;

pub use envelope::{Ack, Envelope, Page, Shape};
pub use error::ApiError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// A 401 still clears the token but does not ask for a new login.
    pub suppress_auth_redirect: bool,
    /// No notification on failure; the caller reports the error itself.
    pub silent: bool,
}

impl RequestOptions {
    pub fn suppress_auth_redirect() -> Self {
        Self {
            suppress_auth_redirect: true,
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }
}

/// One REST call, built up before it is handed to [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    shape: Shape,
    options: RequestOptions,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            shape: Shape::Enveloped,
            options: RequestOptions::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Malformed(format!("could not encode request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn bare(mut self) -> Self {
        self.shape = Shape::Bare;
        self
    }

    pub fn enveloped(mut self) -> Self {
        self.shape = Shape::Enveloped;
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    session: Arc<Session>,
    notifier: Notifier,
    production: bool,
}

impl ApiClient {
    pub fn new(
        settings: &ClientSettings,
        session: Arc<Session>,
        notifier: Notifier,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("could not build http client: {e}")))?;
        Ok(Self {
            http,
            base: settings.api_url.clone(),
            session,
            notifier,
            production: settings.is_production(),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// Sends the request and decodes the declared shape into `T`.
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let shape = request.shape;
        let options = request.options;
        let path = request.path.clone();
        let body = self.execute(request).await?;
        envelope::decode(shape, &body).map_err(|err| self.report(&path, err, options))
    }

    /// For endpoints that answer with an optional status body.
    pub async fn call_ack(&self, request: ApiRequest) -> Result<Ack, ApiError> {
        let options = request.options;
        let path = request.path.clone();
        let body = self.execute(request).await?;
        envelope::decode_ack(&body).map_err(|err| self.report(&path, err, options))
    }

    /// Raw body, for file downloads.
    pub async fn call_bytes(&self, request: ApiRequest) -> Result<Vec<u8>, ApiError> {
        self.execute(request).await
    }

    async fn execute(&self, request: ApiRequest) -> Result<Vec<u8>, ApiError> {
        let ApiRequest {
            method,
            path,
            query,
            body,
            options,
            ..
        } = request;

        let url = self.url(&path).map_err(|err| self.report(&path, err, options))?;
        let mut builder = self.http.request(method.clone(), url);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let timer = RequestTimer::start(method.as_str(), &path);
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                timer.finish(None);
                return Err(self.report(&path, ApiError::from(err), options));
            }
        };

        let status = response.status();
        let bytes = response.bytes().await;
        timer.finish(Some(status.as_u16()));
        let bytes = match bytes {
            Ok(bytes) => bytes.to_vec(),
            Err(err) => return Err(self.report(&path, ApiError::from(err), options)),
        };

        if status.is_success() {
            debug!(%method, path = %path, status = status.as_u16(), "api call succeeded");
            return Ok(bytes);
        }

        let err = self.failure(status, &bytes, options);
        Err(self.report(&path, err, options))
    }

    fn failure(&self, status: StatusCode, body: &[u8], options: RequestOptions) -> ApiError {
        match status {
            StatusCode::UNAUTHORIZED => {
                if let Err(err) = self.session.clear_token() {
                    warn!("could not clear session token: {}", err);
                }
                if !options.suppress_auth_redirect && !self.session.in_auth_flow() {
                    self.session.request_login();
                }
                ApiError::Unauthorized
            }
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            _ => {
                let text = String::from_utf8_lossy(body);
                let message = error::extract_message(&text).unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected server response")
                        .to_string()
                });
                ApiError::Http {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }

    /// Notifies the user about `err` (once per cooldown) and hands it back.
    fn report(&self, path: &str, err: ApiError, options: RequestOptions) -> ApiError {
        if !self.production {
            warn!(path, error = %err, "api call failed");
        }
        if options.silent {
            return err;
        }
        let (key, level, message) = match &err {
            ApiError::Unauthorized => (
                "auth:unauthorized".to_string(),
                NotifyLevel::Error,
                "Your session has expired. Please log in again.".to_string(),
            ),
            ApiError::Forbidden => (
                "auth:forbidden".to_string(),
                NotifyLevel::Warning,
                "You do not have permission to do that.".to_string(),
            ),
            ApiError::Network(_) => (
                "network".to_string(),
                NotifyLevel::Error,
                "Network error. Please check your connection.".to_string(),
            ),
            other => {
                let message = match other {
                    ApiError::Http { message, .. } | ApiError::Rejected { message } => {
                        message.clone()
                    }
                    _ => other.to_string(),
                };
                (message.clone(), NotifyLevel::Error, message)
            }
        };
        self.notifier.notify_keyed(&key, level, &message);
        err
    }
}
