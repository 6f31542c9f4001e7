use fairydust_api::DustApiError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing or rejected credentials; callers clear and re-authenticate.
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("{message}")]
    Network { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Validation(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Token storage error: {0}")]
    TokenStorage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AuthError::Unauthenticated)
    }
}

impl From<DustApiError> for AuthError {
    fn from(err: DustApiError) -> Self {
        if err.is_unauthorized() {
            return AuthError::Unauthenticated;
        }
        match err {
            DustApiError::Api { status, message } => AuthError::Network { status, message },
            DustApiError::Internal(e) => AuthError::Transport(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for AuthError {
    fn from(err: config::ConfigError) -> Self {
        AuthError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_401_maps_to_unauthenticated() {
        let err = AuthError::from(DustApiError::from_response(401, r#"{"message": "expired"}"#));
        assert!(err.is_unauthenticated());
    }

    #[test]
    fn test_other_statuses_keep_server_message() {
        let err = AuthError::from(DustApiError::from_response(400, r#"{"message": "Invalid code"}"#));
        match &err {
            AuthError::Network { status, message } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "Invalid code");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "Invalid code");
    }

    #[test]
    fn test_unparseable_body_reports_status() {
        let err = AuthError::from(DustApiError::from_response(503, "upstream down"));
        assert_eq!(err.to_string(), "HTTP 503");
    }
}
