use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};

/// Errors raised while issuing, decoding or validating session cookies
///
/// Every variant is terminal for the call that produced it. Nothing is retried
/// internally; callers may retry `StorageUnavailable` with their own backoff.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid user identifier: {0}")]
    InvalidUser(String),

    #[error("Session storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Cookie signature is invalid")]
    InvalidSignature,

    #[error("Malformed cookie value: {0}")]
    MalformedCookie(&'static str),

    #[error("Session expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("Cookie scheme mismatch: expected {expected}, found {found}")]
    SchemeMismatch { expected: String, found: String },

    #[error("Session not found")]
    SessionNotFound,

    #[error("Cookie attribute conflict: {0}")]
    AttributeConflict(String),

    #[error("Invalid session lifetime: {0}")]
    InvalidLifetime(String),
}

impl SessionError {
    /// Whether the error came from a cookie the client presented rather than
    /// from the server side
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature
                | Self::MalformedCookie(_)
                | Self::Expired(_)
                | Self::SchemeMismatch { .. }
                | Self::SessionNotFound
        )
    }
}

impl ResponseError for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUser(_) => StatusCode::BAD_REQUEST,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::AttributeConflict(_) | Self::InvalidLifetime(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SessionError::InvalidUser(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SessionError::StorageUnavailable("down".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SessionError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            SessionError::AttributeConflict("secure".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_client_errors() {
        assert!(SessionError::SessionNotFound.is_client_error());
        assert!(SessionError::Expired(Utc::now()).is_client_error());
        assert!(!SessionError::StorageUnavailable(String::new()).is_client_error());
        assert!(!SessionError::AttributeConflict(String::new()).is_client_error());
        assert!(!SessionError::InvalidLifetime(String::new()).is_client_error());
    }
}
