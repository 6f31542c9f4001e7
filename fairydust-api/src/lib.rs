pub mod endpoints;
mod error;
mod macros;
pub mod repositories;

pub use crate::error::{DustApiError, ErrorBody};
pub use tower_api_client::Request as Endpoint;
use repositories::*;
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

pub const DEFAULT_API_URL: &str = "https://api.fairydust.fun";

/// Account-service client.
///
/// The bearer token is supplied per call because it lives in the caller's
/// credential store and may change between requests (login, refresh, logout).
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send<R>(&self, request: R, access_token: Option<&str>) -> Result<R::Response, DustApiError>
    where
        R: ApiRequest,
    {
        let mut inner = ApiClient::new(self.base_url.as_str());
        if let Some(token) = access_token {
            inner = inner.bearer_auth(token);
        }
        inner.send(request).await.map_err(From::from)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

pub struct Request;

impl Request {
    pub fn new() -> Self {
        Self {}
    }

    pub fn auth() -> AuthRepository {
        AuthRepository::new()
    }

    pub fn users() -> UserRepository {
        UserRepository::new()
    }

    pub fn transactions() -> TransactionRepository {
        TransactionRepository::new()
    }

    pub fn payments() -> PaymentRepository {
        PaymentRepository::new()
    }
}
