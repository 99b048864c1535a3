use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::error::{ErrorDetails, ErrorKind, GAuthifyError, Result};
use crate::settings::{ApiRevision, ClientConfig};

/// Form fields sent with a request. Values are plain strings; nested
/// structures are JSON-encoded by the caller.
pub type Payload = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Status → error kind
// ---------------------------------------------------------------------------

const WELL_KNOWN_V1: &[(u16, ErrorKind)] = &[
    (401, ErrorKind::ApiKey),
    (402, ErrorKind::RateLimit),
    (404, ErrorKind::NotFound),
    (406, ErrorKind::Parameter),
];

const WELL_KNOWN_V2: &[(u16, ErrorKind)] = &[
    (401, ErrorKind::ApiKey),
    (402, ErrorKind::RateLimit),
    (404, ErrorKind::NotFound),
    (406, ErrorKind::Parameter),
    (409, ErrorKind::Conflict),
];

/// Statuses for which the API guarantees a structured JSON error body.
fn well_known_statuses(revision: ApiRevision) -> &'static [(u16, ErrorKind)] {
    match revision {
        ApiRevision::V1 => WELL_KNOWN_V1,
        ApiRevision::V2 => WELL_KNOWN_V2,
    }
}

pub(crate) fn well_known_kind(revision: ApiRevision, status: u16) -> Option<ErrorKind> {
    well_known_statuses(revision)
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, kind)| *kind)
}

// ---------------------------------------------------------------------------
// Outcome classification
// ---------------------------------------------------------------------------

/// A failure that belongs to the endpoint rather than the request.
#[derive(Debug, Error)]
pub(crate) enum InfrastructureFailure {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("Response body is not valid JSON: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("Response body is not a JSON object")]
    NotAnObject,
}

#[derive(Debug)]
pub(crate) enum Outcome {
    /// The unwrapped `data` field of a successful response.
    Success(Value),
    WellKnown(GAuthifyError),
    Infrastructure {
        failure: InfrastructureFailure,
        body: String,
    },
}

fn field_as_string(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Decide what a single HTTP response means.
pub(crate) fn classify(revision: ApiRevision, status: u16, body: &str) -> Outcome {
    let infrastructure = |failure| Outcome::Infrastructure {
        failure,
        body: body.to_string(),
    };

    let kind = well_known_kind(revision, status);
    if status >= 400 && kind.is_none() {
        return infrastructure(InfrastructureFailure::UnexpectedStatus(status));
    }

    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return infrastructure(e.into()),
    };
    let Value::Object(mut obj) = parsed else {
        return infrastructure(InfrastructureFailure::NotAnObject);
    };

    match kind {
        Some(kind) => Outcome::WellKnown(kind.into_error(ErrorDetails::new(
            field_as_string(&obj, "error_message"),
            status,
            field_as_string(&obj, "error_code"),
            body,
        ))),
        None => Outcome::Success(obj.remove("data").unwrap_or(Value::Null)),
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Sends requests to the configured endpoints in order, falling back to the
/// next endpoint on infrastructure failures only.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    endpoints: Vec<String>,
    revision: ApiRevision,
    http: Client,
}

fn authorization_value(revision: ApiRevision, api_key: &str) -> String {
    match revision {
        ApiRevision::V1 => api_key.to_string(),
        ApiRevision::V2 => format!("Basic {}", BASE64.encode(format!(":{api_key}"))),
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{base}{}", path.trim_start_matches('/'))
}

impl Dispatcher {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(GAuthifyError::Parameter(ErrorDetails::new(
                "At least one endpoint must be configured",
                0,
                "",
                "",
            )));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&authorization_value(config.revision, &config.api_key))
            .map_err(|e| {
                GAuthifyError::ApiKey(ErrorDetails::new(
                    format!("Invalid API key header value: {e}"),
                    0,
                    "",
                    "",
                ))
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        let agent = HeaderValue::from_str(&config.client_identifier).map_err(|e| {
            GAuthifyError::Parameter(ErrorDetails::new(
                format!("Invalid client identifier header value: {e}"),
                0,
                "",
                "",
            ))
        })?;
        headers.insert(USER_AGENT, agent);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                GAuthifyError::Server(ErrorDetails::new(
                    format!("Failed to build HTTP client: {e}"),
                    0,
                    "",
                    "",
                ))
            })?;

        let endpoints = config
            .endpoints
            .iter()
            .map(|e| {
                if e.ends_with('/') {
                    e.clone()
                } else {
                    format!("{e}/")
                }
            })
            .collect();

        Ok(Self {
            endpoints,
            revision: config.revision,
            http,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn revision(&self) -> ApiRevision {
        self.revision
    }

    /// Send `method path` with `payload` and return the response's `data`.
    ///
    /// A well-known failure from any endpoint is returned at once. When every
    /// endpoint fails at the infrastructure level the last failure is
    /// reported as a [`GAuthifyError::Server`].
    pub fn execute(&self, method: Method, path: &str, payload: &Payload) -> Result<Value> {
        let mut last_failure: Option<(InfrastructureFailure, String)> = None;

        for (attempt, base) in self.endpoints.iter().enumerate() {
            let url = join_url(base, path);
            debug!(%method, %url, attempt = attempt + 1, "sending GAuthify request");

            match self.attempt(&method, &url, payload) {
                Outcome::Success(data) => return Ok(data),
                Outcome::WellKnown(err) => {
                    debug!(%url, status = err.http_status(), code = err.error_code(), "GAuthify rejected request");
                    return Err(err);
                }
                Outcome::Infrastructure { failure, body } => {
                    warn!(endpoint = %base, error = %failure, "GAuthify endpoint failed");
                    last_failure = Some((failure, body));
                }
            }
        }

        let (reason, body) = match last_failure {
            Some((failure, body)) => (failure.to_string(), body),
            None => ("No endpoints configured".to_string(), String::new()),
        };
        error!(%method, path, error = %reason, "all GAuthify endpoints failed");
        Err(GAuthifyError::server(reason, body))
    }

    fn attempt(&self, method: &Method, url: &str, payload: &Payload) -> Outcome {
        let mut request = self.http.request(method.clone(), url);
        if !payload.is_empty() {
            request = request.form(payload);
        }

        let transport = |source| Outcome::Infrastructure {
            failure: InfrastructureFailure::Transport {
                url: url.to_string(),
                source,
            },
            body: String::new(),
        };

        let response = match request.send() {
            Ok(r) => r,
            Err(e) => return transport(e),
        };
        let status = response.status().as_u16();
        match response.text() {
            Ok(body) => classify(self.revision, status, &body),
            Err(e) => transport(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table_depends_on_revision() {
        assert_eq!(well_known_kind(ApiRevision::V2, 401), Some(ErrorKind::ApiKey));
        assert_eq!(well_known_kind(ApiRevision::V2, 402), Some(ErrorKind::RateLimit));
        assert_eq!(well_known_kind(ApiRevision::V2, 404), Some(ErrorKind::NotFound));
        assert_eq!(well_known_kind(ApiRevision::V2, 406), Some(ErrorKind::Parameter));
        assert_eq!(well_known_kind(ApiRevision::V2, 409), Some(ErrorKind::Conflict));
        assert_eq!(well_known_kind(ApiRevision::V1, 409), None);
        assert_eq!(well_known_kind(ApiRevision::V2, 500), None);
        assert_eq!(well_known_kind(ApiRevision::V2, 200), None);
    }

    #[test]
    fn success_unwraps_data() {
        let outcome = classify(ApiRevision::V2, 200, r#"{"data":{"unique_id":"u1"}}"#);
        match outcome {
            Outcome::Success(data) => assert_eq!(data["unique_id"], "u1"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn success_without_data_is_null() {
        assert!(matches!(
            classify(ApiRevision::V2, 200, "{}"),
            Outcome::Success(Value::Null)
        ));
    }

    #[test]
    fn api_key_error_carries_body_fields() {
        let body = r#"{"error_message":"bad key","error_code":"E1"}"#;
        let Outcome::WellKnown(err) = classify(ApiRevision::V2, 401, body) else {
            panic!("expected well-known failure");
        };
        assert_eq!(err.kind(), ErrorKind::ApiKey);
        assert_eq!(err.message(), "bad key");
        assert_eq!(err.error_code(), "E1");
        assert_eq!(err.http_status(), 401);
        assert_eq!(err.response_body(), body);
    }

    #[test]
    fn numeric_error_code_is_rendered() {
        let Outcome::WellKnown(err) =
            classify(ApiRevision::V2, 406, r#"{"error_message":"missing","error_code":17}"#)
        else {
            panic!("expected well-known failure");
        };
        assert_eq!(err.error_code(), "17");
    }

    #[test]
    fn conflict_only_in_v2() {
        let body = r#"{"error_message":"exists","error_code":"C1"}"#;
        assert!(matches!(
            classify(ApiRevision::V2, 409, body),
            Outcome::WellKnown(GAuthifyError::Conflict(_))
        ));
        assert!(matches!(
            classify(ApiRevision::V1, 409, body),
            Outcome::Infrastructure {
                failure: InfrastructureFailure::UnexpectedStatus(409),
                ..
            }
        ));
    }

    #[test]
    fn array_body_is_infrastructure_failure() {
        assert!(matches!(
            classify(ApiRevision::V2, 200, r#"[{"data":1}]"#),
            Outcome::Infrastructure {
                failure: InfrastructureFailure::NotAnObject,
                ..
            }
        ));
    }

    #[test]
    fn malformed_body_is_infrastructure_failure() {
        assert!(matches!(
            classify(ApiRevision::V2, 200, "<html>oops</html>"),
            Outcome::Infrastructure {
                failure: InfrastructureFailure::MalformedBody(_),
                ..
            }
        ));
        // A well-known status without a structured body is not trusted.
        assert!(matches!(
            classify(ApiRevision::V2, 401, "Unauthorized"),
            Outcome::Infrastructure {
                failure: InfrastructureFailure::MalformedBody(_),
                ..
            }
        ));
    }

    #[test]
    fn other_error_statuses_fail_over() {
        for status in [400, 403, 500, 502, 503] {
            assert!(matches!(
                classify(ApiRevision::V2, status, r#"{"error_message":"x"}"#),
                Outcome::Infrastructure {
                    failure: InfrastructureFailure::UnexpectedStatus(s),
                    ..
                } if s == status
            ));
        }
    }

    #[test]
    fn v2_authorization_is_basic_with_empty_user() {
        assert_eq!(authorization_value(ApiRevision::V1, "abc"), "abc");
        assert_eq!(authorization_value(ApiRevision::V2, "abc"), "Basic OmFiYw==");
    }

    #[test]
    fn endpoints_are_normalized() {
        let cfg = ClientConfig::new("k").with_endpoints(["http://a.test/v1", "http://b.test/v1/"]);
        let d = Dispatcher::new(&cfg).unwrap();
        assert_eq!(d.endpoints(), ["http://a.test/v1/", "http://b.test/v1/"]);
        assert_eq!(join_url(&d.endpoints()[0], "/users/"), "http://a.test/v1/users/");
    }

    #[test]
    fn empty_endpoint_list_is_rejected() {
        let cfg = ClientConfig::new("k").with_endpoints(Vec::<String>::new());
        let err = Dispatcher::new(&cfg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }
}
