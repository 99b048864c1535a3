use std::time::Duration;

use serde::Deserialize;

use crate::error::{ErrorDetails, GAuthifyError, Result};

/// Per-attempt timeout used unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Revision of the GAuthify HTTP API the client talks to.
///
/// The revision decides how the API key is sent, which endpoints are used by
/// default and whether HTTP 409 is a well-known failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRevision {
    V1,
    #[default]
    V2,
}

impl ApiRevision {
    pub fn default_endpoints(self) -> Vec<String> {
        let urls: &[&str] = match self {
            ApiRevision::V1 => &[
                "https://api.gauthify.com/v1/",
                "https://backup.gauthify.com/v1/",
            ],
            ApiRevision::V2 => &[
                "https://alpha.gauthify.com/v1/",
                "https://beta.gauthify.com/v1/",
            ],
        };
        urls.iter().map(|u| u.to_string()).collect()
    }

    pub fn default_client_identifier(self) -> &'static str {
        match self {
            ApiRevision::V1 => "GAuthify/v1.00 Rust",
            ApiRevision::V2 => "GAuthify-Rust/v2.0",
        }
    }
}

/// Everything needed to build a [`GAuthify`](crate::GAuthify) client.
///
/// Endpoints are tried in order for every request: the first entry is the
/// primary, the rest are backups.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub revision: ApiRevision,
    pub endpoints: Vec<String>,
    pub timeout: Duration,
    pub client_identifier: String,
}

impl ClientConfig {
    /// Configuration for the current API revision with its default endpoints.
    pub fn new(api_key: impl Into<String>) -> Self {
        let revision = ApiRevision::default();
        Self {
            api_key: api_key.into(),
            revision,
            endpoints: revision.default_endpoints(),
            timeout: DEFAULT_TIMEOUT,
            client_identifier: revision.default_client_identifier().to_string(),
        }
    }

    /// Switch revision, resetting endpoints and client identifier to that
    /// revision's defaults. Call [`with_endpoints`](Self::with_endpoints)
    /// afterwards to override them.
    pub fn with_revision(mut self, revision: ApiRevision) -> Self {
        self.revision = revision;
        self.endpoints = revision.default_endpoints();
        self.client_identifier = revision.default_client_identifier().to_string();
        self
    }

    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.client_identifier = identifier.into();
        self
    }

    /// Load configuration from `GAUTHIFY_*` environment variables.
    ///
    /// * `GAUTHIFY_API_KEY` – required
    /// * `GAUTHIFY_REVISION` – `v1` or `v2`
    /// * `GAUTHIFY_ENDPOINTS` – comma separated base URLs
    /// * `GAUTHIFY_TIMEOUT_SECS` – per-attempt timeout
    pub fn from_env() -> Result<Self> {
        Self::from_environment(None)
    }

    fn from_environment(source: Option<config::Map<String, String>>) -> Result<Self> {
        let invalid = |message: String| GAuthifyError::Parameter(ErrorDetails::new(message, 0, "", ""));

        // Values stay raw strings so an API key is never reinterpreted as a
        // number.
        let env = config::Environment::with_prefix("GAUTHIFY").source(source);
        let raw: EnvConfig = config::Config::builder()
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| invalid(format!("Invalid GAuthify configuration: {e}")))?;

        let mut cfg = ClientConfig::new(raw.api_key).with_revision(raw.revision.unwrap_or_default());
        if let Some(endpoints) = raw.endpoints {
            cfg = cfg.with_endpoints(
                endpoints
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty()),
            );
        }
        if let Some(secs) = raw.timeout_secs {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| invalid(format!("Invalid GAUTHIFY_TIMEOUT_SECS {secs:?}: {e}")))?;
            cfg = cfg.with_timeout(Duration::from_secs(secs));
        }
        Ok(cfg)
    }
}

#[derive(Debug, Deserialize)]
struct EnvConfig {
    api_key: String,
    revision: Option<ApiRevision>,
    endpoints: Option<String>,
    timeout_secs: Option<String>,
}
