//! The Mailchimp v3 API client.
//!
//! # Design
//! `MailchimpClient` holds resolved settings and a `reqwest` handle, and
//! carries no mutable state between calls. Every call goes through
//! `connect`, which is split into three steps:
//!
//! 1. `build_request` turns `(endpoint, method, data)` into an `HttpRequest`
//!    without touching the network.
//! 2. `transport::execute` performs the round-trip.
//! 3. `parse_response` turns the buffered `HttpResponse` into JSON.
//!
//! Status codes are not inspected. A Mailchimp error body comes back as an
//! ordinary `Ok` value; see `ProblemDetail`.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{BodyPolicy, ClientConfig, Settings, API_PREFIX, AUTH_USERNAME};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport;
use crate::types::ApiResponse;

/// Pass as `data` for a call without a payload.
pub const NO_DATA: Option<&'static Value> = None;

/// Async client for the Mailchimp v3 REST API.
///
/// Cheap to clone; clones share the connection settings. Any number of
/// independently configured clients may coexist.
#[derive(Clone)]
pub struct MailchimpClient {
    settings: Arc<Settings>,
    http: reqwest::Client,
}

impl MailchimpClient {
    /// Build a client. A missing key is logged and otherwise ignored: the
    /// server will reject the unauthenticated requests.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        if config.key.is_none() {
            warn!("Mailchimp API key is not set, requests will be sent without credentials");
        }
        let settings = Settings::resolve(config);
        // One connection per call; nothing is kept alive between requests.
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self {
            settings: Arc::new(settings),
            http,
        })
    }

    pub fn location(&self) -> &str {
        &self.settings.location
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    pub fn has_key(&self) -> bool {
        self.settings.key.is_some()
    }

    pub fn body_policy(&self) -> BodyPolicy {
        self.settings.body_policy
    }

    /// Whether `method` carries the payload under the configured policy.
    pub fn sends_body(&self, method: HttpMethod) -> bool {
        match self.settings.body_policy {
            BodyPolicy::Always => true,
            BodyPolicy::PostAndPatch => matches!(method, HttpMethod::Post | HttpMethod::Patch),
        }
    }

    /// Describe the request `connect` would send.
    ///
    /// `data` is serialized whenever present, even if the method does not
    /// carry it, so a bad payload fails the same way for every verb.
    pub fn build_request<B>(
        &self,
        endpoint: &str,
        method: HttpMethod,
        data: Option<&B>,
    ) -> Result<HttpRequest, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let payload = data
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::Serialization(e.to_string()))?;

        let path = format!("{API_PREFIX}{endpoint}");
        let url = format!("{}{path}", self.settings.base_url);
        let parsed =
            reqwest::Url::parse(&url).map_err(|e| ApiError::InvalidUrl(format!("{url}: {e}")))?;
        // The URL parser resolves dot segments and escapes some bytes; refuse
        // any endpoint that would not reach the wire unchanged. `ends_with`
        // leaves room for a path prefix in `base_url`.
        let wire_path = match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_string(),
        };
        if !wire_path.ends_with(&path) {
            return Err(ApiError::InvalidUrl(format!(
                "{url}: endpoint would be sent as {wire_path}"
            )));
        }

        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        let body = match payload {
            Some(payload) if self.sends_body(method) => {
                headers.push(("content-length".to_string(), payload.len().to_string()));
                Some(payload)
            }
            Some(_) => {
                if self.settings.debug {
                    info!(%method, endpoint, "payload is not sent with this method");
                }
                None
            }
            None => {
                if self.settings.debug {
                    info!("no data is set (sometimes this is ok, for example with a GET request)");
                }
                None
            }
        };
        if let Some(key) = &self.settings.key {
            headers.push(("authorization".to_string(), basic_credentials(key)));
        }

        Ok(HttpRequest {
            method,
            url,
            path,
            headers,
            body,
        })
    }

    /// Parse a buffered response as JSON, regardless of its status.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_body(response.body)
    }

    /// Send one request and return the parsed body with its status and
    /// headers.
    pub async fn send<B>(
        &self,
        endpoint: &str,
        method: HttpMethod,
        data: Option<&B>,
    ) -> Result<ApiResponse, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.build_request(endpoint, method, data)?;
        let HttpResponse {
            status,
            headers,
            body,
        } = transport::execute(&self.http, request, self.settings.debug).await?;
        Ok(ApiResponse {
            status,
            headers,
            body: parse_body(body)?,
        })
    }

    /// Send one request and return the parsed body.
    pub async fn connect<B>(
        &self,
        endpoint: &str,
        method: HttpMethod,
        data: Option<&B>,
    ) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.send(endpoint, method, data)
            .await
            .map(|response| response.body)
    }

    pub async fn get<B>(&self, endpoint: &str, data: Option<&B>) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.connect(endpoint, HttpMethod::Get, data).await
    }

    pub async fn post<B>(&self, endpoint: &str, data: Option<&B>) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.connect(endpoint, HttpMethod::Post, data).await
    }

    /// Under the default body policy the payload is not sent; use
    /// `BodyPolicy::Always` for endpoints that need a PUT body.
    pub async fn put<B>(&self, endpoint: &str, data: Option<&B>) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.connect(endpoint, HttpMethod::Put, data).await
    }

    pub async fn patch<B>(&self, endpoint: &str, data: Option<&B>) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.connect(endpoint, HttpMethod::Patch, data).await
    }

    pub async fn delete<B>(&self, endpoint: &str, data: Option<&B>) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.connect(endpoint, HttpMethod::Delete, data).await
    }
}

impl fmt::Debug for MailchimpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailchimpClient")
            .field("base_url", &self.settings.base_url)
            .field("location", &self.settings.location)
            .field("has_key", &self.settings.key.is_some())
            .field("debug", &self.settings.debug)
            .field("body_policy", &self.settings.body_policy)
            .finish()
    }
}

fn basic_credentials(key: &str) -> String {
    let token = STANDARD.encode(format!("{AUTH_USERNAME}:{key}"));
    format!("Basic {token}")
}

fn parse_body(body: String) -> Result<Value, ApiError> {
    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(e) => Err(ApiError::Decode {
            message: e.to_string(),
            body,
        }),
    }
}
