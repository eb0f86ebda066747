//! Response-side types and Mailchimp helpers.
//!
//! # Design
//! Response bodies stay `serde_json::Value`: the shape depends on the
//! endpoint and the client does not interpret it. `ProblemDetail` is an
//! opt-in view for callers that want to detect Mailchimp's error body.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed response together with its status line and headers.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The Mailchimp error body, if the response carries one.
    pub fn problem(&self) -> Option<ProblemDetail> {
        ProblemDetail::from_value(&self.body)
    }
}

/// Mailchimp's error body (RFC 7807 style).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub title: String,
    pub status: u16,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub instance: Option<String>,
    /// Per-field validation failures, present on some 400 responses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub message: String,
}

impl ProblemDetail {
    /// Recognise an error body: an object with a numeric `status` and a
    /// string `title`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let has_status = obj.get("status").is_some_and(Value::is_u64);
        let has_title = obj.get("title").is_some_and(Value::is_string);
        if !has_status || !has_title {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// The member id Mailchimp uses in `/lists/{list_id}/members/{hash}`:
/// the MD5 of the lowercased email address, as lowercase hex.
pub fn subscriber_hash(email: &str) -> String {
    let digest = Md5::digest(email.trim().to_lowercase().as_bytes());
    hex::encode(digest)
}
