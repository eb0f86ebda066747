//! Async client for the Mailchimp v3 REST API.
//!
//! # Overview
//! `MailchimpClient` sends one authenticated request per call and resolves
//! to the parsed JSON body. `get`, `post`, `put`, `patch` and `delete` are
//! thin wrappers over `connect`.
//!
//! ```no_run
//! use mailchimp_core::{ClientConfig, MailchimpClient, NO_DATA};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), mailchimp_core::ApiError> {
//! let client = MailchimpClient::new(ClientConfig::new("0123abcd-us6").location("us6"))?;
//! let lists = client.get("/lists", NO_DATA).await?;
//! let created = client
//!     .post("/lists/abc123/members", Some(&json!({
//!         "email_address": "urist@example.com",
//!         "status": "subscribed",
//!     })))
//!     .await?;
//! # let _ = (lists, created);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - Request building and response parsing are plain functions over
//!   `HttpRequest` / `HttpResponse`; only `transport` does I/O.
//! - HTTP status codes are not interpreted. Mailchimp error bodies resolve as
//!   `Ok`; `ProblemDetail` recognises them.
//! - No retries, pagination, pooling or timeouts.

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
mod transport;
pub mod types;

pub use client::{MailchimpClient, NO_DATA};
pub use config::{data_center_from_key, BodyPolicy, ClientConfig, DEFAULT_LOCATION};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use types::{subscriber_hash, ApiResponse, FieldError, ProblemDetail};
