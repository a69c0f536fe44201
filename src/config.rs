//! Service configuration.
//!
//! We read the environment exactly once, at startup, and pass the resulting
//! [`ServiceConfig`] down to whoever needs it.

use std::{env, fmt, time::Duration};

/// Environment variable holding the service endpoint URL.
pub const ENDPOINT_VAR: &str = "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT";

/// Environment variable holding the API key.
pub const KEY_VAR: &str = "AZURE_DOCUMENT_INTELLIGENCE_KEY";

/// Environment variable which may override the REST API version.
pub const API_VERSION_VAR: &str = "AZURE_DOCUMENT_INTELLIGENCE_API_VERSION";

/// The REST API version we speak by default.
pub const DEFAULT_API_VERSION: &str = "2024-11-30";

/// How long to wait between polls when the service doesn't tell us.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything we need to know to talk to the document analysis service.
///
/// Missing values are kept as `None` here. The client factory decides whether
/// they're fatal.
#[derive(Clone)]
pub struct ServiceConfig {
    /// The service endpoint, e.g. `https://example.cognitiveservices.azure.com/`.
    pub endpoint: Option<String>,

    /// The API key. Never printed.
    pub key: Option<String>,

    /// The REST API version to request.
    pub api_version: String,

    /// Fallback delay between polls of a running analysis.
    pub poll_interval: Duration,
}

impl ServiceConfig {
    /// Load our configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load our configuration using an arbitrary lookup function. Empty
    /// values are treated as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            endpoint: get(ENDPOINT_VAR),
            key: get(KEY_VAR),
            api_version: get(API_VERSION_VAR)
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_owned()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create a configuration from explicit values.
    #[cfg(test)]
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            key: Some(key.into()),
            api_version: DEFAULT_API_VERSION.to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
