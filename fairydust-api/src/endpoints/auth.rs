use super::IdentifierType;
use super::users::User;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{EmptyResponse, Method, Request, RequestData};

// Common

/// Token pair as it travels over the wire.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

// Requests

#[derive(Debug, Clone, Serialize)]
pub struct RequestCode {
    identifier: String,
    identifier_type: IdentifierType,
}

impl RequestCode {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let identifier_type = IdentifierType::detect(&identifier);
        Self {
            identifier,
            identifier_type,
        }
    }

    pub fn identifier_type(&self) -> IdentifierType {
        self.identifier_type
    }
}

impl Request for RequestCode {
    type Data = Self;
    type Response = OtpResponse;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        "/auth/otp/request".into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyCode {
    identifier: String,
    code: String,
}

impl VerifyCode {
    pub fn new(identifier: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            code: code.into(),
        }
    }
}

impl Request for VerifyCode {
    type Data = Self;
    type Response = AuthResponse;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        "/auth/otp/verify".into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Clone, Serialize)]
pub struct RefreshToken {
    refresh_token: String,
}

impl RefreshToken {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshToken")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl Request for RefreshToken {
    type Data = Self;
    type Response = TokenResponse;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        "/auth/refresh".into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Default, Debug, Clone)]
pub struct Logout;

impl Request for Logout {
    type Data = ();
    type Response = EmptyResponse;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        "/auth/logout".into()
    }
}

// Responses

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtpResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: TokenResponse,
    #[serde(default)]
    pub is_new_user: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_code_classifies_identifier() {
        let req = RequestCode::new("fairy@dust.fun");
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["identifier"], "fairy@dust.fun");
        assert_eq!(body["identifier_type"], "email");

        let req = RequestCode::new("+1 555 123");
        assert_eq!(req.identifier_type(), IdentifierType::Phone);
    }

    #[test]
    fn test_auth_response_deserializes() {
        let json = r#"{
            "user": {
                "id": "00000000-0000-0000-0000-000000000001",
                "fairyname": "sparkle",
                "dust_balance": 25
            },
            "token": {
                "access_token": "access",
                "refresh_token": "refresh",
                "token_type": "bearer"
            }
        }"#;
        let response: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.user.fairyname, "sparkle");
        assert_eq!(response.user.dust_balance.inner(), 25);
        assert_eq!(response.token.access_token, "access");
        assert!(!response.is_new_user);
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let tokens = TokenResponse {
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            token_type: None,
            expires_in: None,
        };
        let printed = format!("{:?}", tokens);
        assert!(!printed.contains("secret-access"));
        assert!(!printed.contains("secret-refresh"));
    }
}
