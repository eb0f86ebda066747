//! Client configuration.
//!
//! `ClientConfig` is what the caller supplies; every field is optional and
//! defaults are applied once, when `MailchimpClient::new` resolves it into
//! `Settings`. The config derives `Deserialize` so it can sit inside an
//! application's own settings file.

use std::fmt;

use serde::Deserialize;

/// Data center used when no `location` is configured.
pub const DEFAULT_LOCATION: &str = "us12";

/// Prefix prepended verbatim to every endpoint.
pub const API_PREFIX: &str = "/3.0";

/// Mailchimp ignores the Basic auth username; only the password (the key)
/// is checked.
pub const AUTH_USERNAME: &str = "anystring";

/// Which methods carry the serialized payload as a request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPolicy {
    /// Only POST and PATCH send a body; GET, PUT and DELETE drop the payload.
    #[default]
    PostAndPatch,
    /// Every method sends a body when a payload is given. Needed for the
    /// PUT "add or update" endpoints.
    Always,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub key: Option<String>,
    pub location: Option<String>,
    pub debug: bool,
    /// Overrides `https://<location>.api.mailchimp.com`.
    pub base_url: Option<String>,
    pub body_policy: BodyPolicy,
}

impl ClientConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn body_policy(mut self, policy: BodyPolicy) -> Self {
        self.body_policy = policy;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("location", &self.location)
            .field("debug", &self.debug)
            .field("base_url", &self.base_url)
            .field("body_policy", &self.body_policy)
            .finish()
    }
}

/// A `ClientConfig` with defaults applied.
#[derive(Clone)]
pub(crate) struct Settings {
    pub key: Option<String>,
    pub location: String,
    pub debug: bool,
    pub base_url: String,
    pub body_policy: BodyPolicy,
}

impl Settings {
    pub fn resolve(config: ClientConfig) -> Self {
        let location = config
            .location
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        let base_url = match config.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{location}.api.mailchimp.com"),
        };
        Self {
            key: config.key,
            location,
            debug: config.debug,
            base_url,
            body_policy: config.body_policy,
        }
    }
}

/// The data-center suffix of a Mailchimp API key (`...-us6` -> `us6`).
///
/// Not applied automatically; pass it to `ClientConfig::location` to route
/// requests to the key's own data center.
pub fn data_center_from_key(key: &str) -> Option<&str> {
    let (_, dc) = key.rsplit_once('-')?;
    let valid = !dc.is_empty() && dc.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(dc)
}
