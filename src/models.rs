use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatcher::Payload;
use crate::error::{ErrorDetails, GAuthifyError, Result};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A GAuthify user as returned by the `users/` endpoints.
///
/// Fields the API adds beyond the ones listed here are kept in `extra`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub unique_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sms_number: Option<String>,
    #[serde(default)]
    pub voice_number: Option<String>,
    #[serde(default)]
    pub meta: Option<Value>,
    /// Shared secret for authenticator apps.
    #[serde(default)]
    pub key: Option<String>,
    /// The user's current one-time password.
    #[serde(default)]
    pub otp: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Result of checking a one-time password.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct OtpCheck {
    /// Whether the API saw an auth code in the request at all.
    #[serde(default)]
    pub provided_auth: bool,
    #[serde(default)]
    pub authenticated: bool,
}

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// Optional fields for [`GAuthify::create_user`](crate::GAuthify::create_user).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateUserParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_number: Option<String>,
    /// Arbitrary JSON stored alongside the user; sent JSON-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Fields to change in [`GAuthify::update_user`](crate::GAuthify::update_user).
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateUserParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Generate a new secret key for the user.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reset_key: bool,
}

/// Flatten a serializable parameter object into form fields.
///
/// Strings are sent as-is, `null` fields are dropped and any other value is
/// JSON-encoded.
pub(crate) fn to_payload<T: Serialize>(params: &T) -> Result<Payload> {
    let invalid = |message: String| GAuthifyError::Parameter(ErrorDetails::new(message, 0, "", ""));

    let fields = match serde_json::to_value(params) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => return Err(invalid(format!("Parameters must be an object, got {other}"))),
        Err(e) => return Err(invalid(format!("Failed to encode parameters: {e}"))),
    };

    let mut payload = Payload::new();
    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::String(s) => {
                payload.insert(key, s);
            }
            other => {
                payload.insert(key, other.to_string());
            }
        }
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_are_omitted() {
        let payload = to_payload(&CreateUserParams {
            email: Some("a@example.com".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload["email"], "a@example.com");
    }

    #[test]
    fn meta_is_json_encoded() {
        let payload = to_payload(&CreateUserParams {
            meta: Some(json!({"plan": "pro"})),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(payload["meta"], r#"{"plan":"pro"}"#);
    }

    #[test]
    fn reset_key_only_sent_when_set() {
        assert!(to_payload(&UpdateUserParams::default()).unwrap().is_empty());
        let payload = to_payload(&UpdateUserParams {
            reset_key: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(payload["reset_key"], "true");
    }

    #[test]
    fn non_object_parameters_are_rejected() {
        let err = to_payload(&vec!["a", "b"]).unwrap_err();
        assert!(matches!(err, GAuthifyError::Parameter(_)));
        assert_eq!(err.http_status(), 0);
    }

    #[test]
    fn otp_check_defaults_missing_flags() {
        let check: OtpCheck = serde_json::from_value(json!({"authenticated": true})).unwrap();
        assert!(check.authenticated);
        assert!(!check.provided_auth);
    }

    #[test]
    fn user_keeps_unknown_fields() {
        let user: User = serde_json::from_value(json!({
            "unique_id": "u1",
            "display_name": "Test",
            "otp": "123456",
            "qr_url": "https://example.com/qr"
        }))
        .unwrap();
        assert_eq!(user.unique_id, "u1");
        assert_eq!(user.otp.as_deref(), Some("123456"));
        assert_eq!(user.extra["qr_url"], "https://example.com/qr");
    }
}
