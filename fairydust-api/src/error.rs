use serde::{Deserialize, Serialize};
use tower_api_client::{Error as ApiError, StatusCode};

#[derive(Debug)]
pub enum DustApiError {
    Api { status: u16, message: String },
    Internal(ApiError),
}

impl DustApiError {
    /// Builds an API error from a non-success status and its raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        DustApiError::Api {
            status,
            message: ErrorBody::message_or_status(status, body),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            DustApiError::Api { status, .. } => Some(*status),
            DustApiError::Internal(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

impl From<ApiError> for DustApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, detail) | ApiError::ServerError(status, detail) => {
                DustApiError::from_response(status.as_u16(), &detail)
            }
            e => DustApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for DustApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DustApiError::Internal(e) => write!(f, "Internal error: {}", e),
            DustApiError::Api { message, .. } => f.write_str(message),
        }
    }
}

impl std::error::Error for DustApiError {}

/// Error payload returned by the fairydust services.
///
/// The account service reports `message`; framework-generated errors use `detail`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        if let Some(message) = self.message.as_ref().filter(|m| !m.is_empty()) {
            return Some(message.clone());
        }
        match &self.detail {
            Some(serde_json::Value::String(detail)) if !detail.is_empty() => Some(detail.clone()),
            _ => None,
        }
    }

    /// Message from a structured body, or `HTTP {status}` when the body has none.
    pub fn message_or_status(status: u16, body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.message())
            .unwrap_or_else(|| format!("HTTP {}", status))
    }
}
