use thiserror::Error;

/// Appended to every synthesized [`GAuthifyError::Server`] message.
pub const SUPPORT_SUFFIX: &str = ". Please contact support@gauthify.com for help";

/// Context carried by every GAuthify error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub message: String,
    pub http_status: u16,
    pub error_code: String,
    pub response_body: String,
}

impl ErrorDetails {
    pub fn new(
        message: impl Into<String>,
        http_status: u16,
        error_code: impl Into<String>,
        response_body: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            http_status,
            error_code: error_code.into(),
            response_body: response_body.into(),
        }
    }
}

/// Which kind of failure a [`GAuthifyError`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ApiKey,
    RateLimit,
    Parameter,
    NotFound,
    Conflict,
    Server,
}

impl ErrorKind {
    /// Wrap `details` in the variant for this kind.
    pub fn into_error(self, details: ErrorDetails) -> GAuthifyError {
        match self {
            ErrorKind::ApiKey => GAuthifyError::ApiKey(details),
            ErrorKind::RateLimit => GAuthifyError::RateLimit(details),
            ErrorKind::Parameter => GAuthifyError::Parameter(details),
            ErrorKind::NotFound => GAuthifyError::NotFound(details),
            ErrorKind::Conflict => GAuthifyError::Conflict(details),
            ErrorKind::Server => GAuthifyError::Server(details),
        }
    }
}

/// Error type for GAuthify API operations.
///
/// - `ApiKey`: HTTP 401, the API key was rejected
/// - `RateLimit`: HTTP 402, plan or billing limit reached
/// - `NotFound`: HTTP 404
/// - `Parameter`: HTTP 406, bad or missing parameters
/// - `Conflict`: HTTP 409 (v2 API only)
/// - `Server`: anything else, including every endpoint being unreachable
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GAuthifyError {
    #[error("API key rejected: {}", .0.message)]
    ApiKey(ErrorDetails),

    #[error("Rate limit reached: {}", .0.message)]
    RateLimit(ErrorDetails),

    #[error("Parameter error: {}", .0.message)]
    Parameter(ErrorDetails),

    #[error("Not found: {}", .0.message)]
    NotFound(ErrorDetails),

    #[error("Conflict: {}", .0.message)]
    Conflict(ErrorDetails),

    #[error("Server error: {}", .0.message)]
    Server(ErrorDetails),
}

impl GAuthifyError {
    /// A `Server` error with status 500, code `"500"` and the support suffix
    /// appended to `reason`.
    pub fn server(reason: impl std::fmt::Display, response_body: impl Into<String>) -> Self {
        GAuthifyError::Server(ErrorDetails::new(
            format!("{reason}{SUPPORT_SUFFIX}"),
            500,
            "500",
            response_body,
        ))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GAuthifyError::ApiKey(_) => ErrorKind::ApiKey,
            GAuthifyError::RateLimit(_) => ErrorKind::RateLimit,
            GAuthifyError::Parameter(_) => ErrorKind::Parameter,
            GAuthifyError::NotFound(_) => ErrorKind::NotFound,
            GAuthifyError::Conflict(_) => ErrorKind::Conflict,
            GAuthifyError::Server(_) => ErrorKind::Server,
        }
    }

    pub fn details(&self) -> &ErrorDetails {
        match self {
            GAuthifyError::ApiKey(d)
            | GAuthifyError::RateLimit(d)
            | GAuthifyError::Parameter(d)
            | GAuthifyError::NotFound(d)
            | GAuthifyError::Conflict(d)
            | GAuthifyError::Server(d) => d,
        }
    }

    pub fn message(&self) -> &str {
        &self.details().message
    }

    pub fn http_status(&self) -> u16 {
        self.details().http_status
    }

    pub fn error_code(&self) -> &str {
        &self.details().error_code
    }

    pub fn response_body(&self) -> &str {
        &self.details().response_body
    }
}

pub type Result<T> = std::result::Result<T, GAuthifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_carries_fixed_status_and_suffix() {
        let err = GAuthifyError::server("connection refused", "");
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.error_code(), "500");
        assert_eq!(
            err.message(),
            "connection refused. Please contact support@gauthify.com for help"
        );
    }

    #[test]
    fn into_error_round_trips_kind() {
        let details = ErrorDetails::new("bad key", 401, "E1", "{}");
        for kind in [
            ErrorKind::ApiKey,
            ErrorKind::RateLimit,
            ErrorKind::Parameter,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Server,
        ] {
            let err = kind.into_error(details.clone());
            assert_eq!(err.kind(), kind);
            assert_eq!(err.details(), &details);
        }
    }

    #[test]
    fn display_includes_message() {
        let err = ErrorKind::Parameter.into_error(ErrorDetails::new("missing unique_id", 406, "P1", ""));
        assert_eq!(err.to_string(), "Parameter error: missing unique_id");
    }
}
