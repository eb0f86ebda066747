//! Error types for the Mailchimp client.
//!
//! # Design
//! HTTP status codes are never mapped to errors: Mailchimp reports failures
//! as a JSON problem body and that body is handed back to the caller as a
//! successful result. `ApiError` therefore only covers what prevents a JSON
//! value from being produced at all.

use thiserror::Error;

/// Errors returned by `MailchimpClient`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// DNS, connect, TLS or stream failure. Also covers a server that closes
    /// the connection before sending a complete response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body is not valid JSON (an empty body included).
    #[error("response is not valid JSON: {message}")]
    Decode { message: String, body: String },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The configured base URL, location or endpoint does not form a URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, ApiError::Decode { .. })
    }
}
