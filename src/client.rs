use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::dispatcher::{Dispatcher, Payload};
use crate::error::{ErrorDetails, GAuthifyError, Result};
use crate::models::{to_payload, CreateUserParams, OtpCheck, UpdateUserParams, User};
use crate::settings::{ApiRevision, ClientConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Everything except RFC 3986 unreserved characters is escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Escape `value` for use as one path segment. `.` and `..` are escaped too
/// so URL normalization cannot drop them.
fn segment(value: &str) -> String {
    match value {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => utf8_percent_encode(value, PATH_SEGMENT).to_string(),
    }
}

fn user_path(unique_id: &str) -> String {
    format!("users/{}/", segment(unique_id))
}

/// Deserialize the unwrapped `data` of a response into a model.
fn decode<T: DeserializeOwned>(data: Value) -> Result<T> {
    let body = data.to_string();
    serde_json::from_value(data)
        .map_err(|e| GAuthifyError::server(format!("Unexpected response shape: {e}"), body))
}

fn payload<const N: usize>(fields: [(&str, &str); N]) -> Payload {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn parameter_error(message: impl Into<String>) -> GAuthifyError {
    GAuthifyError::Parameter(ErrorDetails::new(message, 0, "", ""))
}

fn not_in_v1(what: &str) -> GAuthifyError {
    parameter_error(format!("{what} is not available in the v1 API"))
}

// ---------------------------------------------------------------------------
// Public client
// ---------------------------------------------------------------------------

/// Main entry point for the GAuthify API.
///
/// Paths and payloads follow the configured [`ApiRevision`]. Operations the
/// v1 API does not offer fail with [`GAuthifyError::Parameter`] without
/// sending a request.
///
/// ```no_run
/// use gauthify_client::GAuthify;
///
/// let client = GAuthify::new("my-api-key").unwrap();
/// let user = client.create_user("user@example.com", "Example User", &Default::default()).unwrap();
/// let ok = client.check_auth(&user.unique_id, "123456", None, false).unwrap();
/// println!("authenticated: {ok}");
/// ```
#[derive(Debug, Clone)]
pub struct GAuthify {
    dispatcher: Dispatcher,
}

impl GAuthify {
    /// Create a client for the current API revision and its default endpoints.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_config(&ClientConfig::new(api_key))
    }

    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            dispatcher: Dispatcher::new(config)?,
        })
    }

    /// The dispatcher used by every operation.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn revision(&self) -> ApiRevision {
        self.dispatcher.revision()
    }

    // -- users ----------------------------------------------------------------

    /// Create or upsert a user with a new secret key.
    ///
    /// The v1 API only stores `display_name`; any field set in `params` is
    /// rejected there.
    pub fn create_user(
        &self,
        unique_id: &str,
        display_name: &str,
        params: &CreateUserParams,
    ) -> Result<User> {
        let mut body = to_payload(params)?;
        let data = match self.revision() {
            ApiRevision::V1 => {
                if !body.is_empty() {
                    return Err(not_in_v1("Contact details and meta on create_user"));
                }
                body.insert("display_name".into(), display_name.into());
                self.dispatcher
                    .execute(Method::POST, &user_path(unique_id), &body)?
            }
            ApiRevision::V2 => {
                body.insert("unique_id".into(), unique_id.into());
                body.insert("display_name".into(), display_name.into());
                self.dispatcher.execute(Method::POST, "users/", &body)?
            }
        };
        decode(data)
    }

    /// Update the given fields of an existing user.
    pub fn update_user(&self, unique_id: &str, params: &UpdateUserParams) -> Result<User> {
        if self.revision() == ApiRevision::V1 {
            return Err(not_in_v1("update_user"));
        }
        let body = to_payload(params)?;
        decode(
            self.dispatcher
                .execute(Method::PUT, &user_path(unique_id), &body)?,
        )
    }

    pub fn delete_user(&self, unique_id: &str) -> Result<Value> {
        self.dispatcher
            .execute(Method::DELETE, &user_path(unique_id), &Payload::new())
    }

    pub fn get_all_users(&self) -> Result<Vec<User>> {
        decode(self.dispatcher.execute(Method::GET, "users/", &Payload::new())?)
    }

    pub fn get_user(&self, unique_id: &str) -> Result<User> {
        decode(
            self.dispatcher
                .execute(Method::GET, &user_path(unique_id), &Payload::new())?,
        )
    }

    /// Look up the user a one-time token was issued to.
    pub fn get_user_by_token(&self, token: &str) -> Result<User> {
        if self.revision() == ApiRevision::V1 {
            return Err(not_in_v1("get_user_by_token"));
        }
        decode(
            self.dispatcher
                .execute(Method::POST, "token/", &payload([("token", token)]))?,
        )
    }

    // -- one-time passwords ---------------------------------------------------

    /// Send an OTP to the API and return both flags of its verdict.
    pub fn check_otp(&self, unique_id: &str, auth_code: &str, otp_id: Option<&str>) -> Result<OtpCheck> {
        let data = match self.revision() {
            ApiRevision::V1 => {
                if otp_id.is_some() {
                    return Err(not_in_v1("otp_id"));
                }
                let path = format!("{}check/{}", user_path(unique_id), segment(auth_code));
                self.dispatcher.execute(Method::GET, &path, &Payload::new())?
            }
            ApiRevision::V2 => {
                let mut body = payload([("unique_id", unique_id), ("auth_code", auth_code)]);
                if let Some(id) = otp_id {
                    body.insert("otp_id".into(), id.into());
                }
                self.dispatcher.execute(Method::POST, "check/", &body)?
            }
        };
        decode(data)
    }

    /// Check an OTP for a user.
    ///
    /// A response that does not acknowledge the auth code fails with
    /// [`GAuthifyError::Parameter`]. With `safe_mode` set, any error is
    /// swallowed and the check reports `true`.
    pub fn check_auth(
        &self,
        unique_id: &str,
        auth_code: &str,
        otp_id: Option<&str>,
        safe_mode: bool,
    ) -> Result<bool> {
        let verdict = self.check_otp(unique_id, auth_code, otp_id).and_then(|check| {
            if check.provided_auth {
                Ok(check.authenticated)
            } else {
                Err(parameter_error(
                    "auth_code not detected. Check if params sent via get request.",
                ))
            }
        });

        match verdict {
            Ok(authenticated) => Ok(authenticated),
            Err(e) if safe_mode => {
                debug!(error = %e, unique_id, "check_auth failed in safe mode, allowing");
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Email the user's current OTP, to `email` or the address on file.
    ///
    /// The v1 API needs an explicit address.
    pub fn send_email(&self, unique_id: &str, email: Option<&str>) -> Result<Value> {
        self.dispatch_otp("email", "email", unique_id, email)
    }

    /// Text the user's current OTP, to `sms_number` or the number on file.
    ///
    /// The v1 API needs an explicit number.
    pub fn send_sms(&self, unique_id: &str, sms_number: Option<&str>) -> Result<Value> {
        self.dispatch_otp("sms", "sms_number", unique_id, sms_number)
    }

    /// Call the user and read out the current OTP.
    pub fn send_voice(&self, unique_id: &str, voice_number: Option<&str>) -> Result<Value> {
        if self.revision() == ApiRevision::V1 {
            return Err(not_in_v1("send_voice"));
        }
        self.dispatch_otp("voice", "voice_number", unique_id, voice_number)
    }

    fn dispatch_otp(
        &self,
        channel: &str,
        field: &str,
        unique_id: &str,
        destination: Option<&str>,
    ) -> Result<Value> {
        match self.revision() {
            ApiRevision::V1 => {
                let dest = destination
                    .ok_or_else(|| parameter_error(format!("{field} is required by the v1 API")))?;
                let path = format!("{}{channel}/{}", user_path(unique_id), segment(dest));
                self.dispatcher.execute(Method::GET, &path, &Payload::new())
            }
            ApiRevision::V2 => {
                let mut body = payload([("unique_id", unique_id)]);
                if let Some(dest) = destination {
                    body.insert(field.into(), dest.into());
                }
                self.dispatcher
                    .execute(Method::POST, &format!("{channel}/"), &body)
            }
        }
    }

    // -- misc -----------------------------------------------------------------

    /// The catalog of error codes the API can return.
    pub fn api_errors(&self) -> Result<Value> {
        if self.revision() == ApiRevision::V1 {
            return Err(not_in_v1("api_errors"));
        }
        self.dispatcher
            .execute(Method::GET, "errors/", &Payload::new())
    }
}
