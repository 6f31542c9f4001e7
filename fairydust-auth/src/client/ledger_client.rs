use crate::error::AuthError;
use fairydust_api::endpoints::{
    ledger::{ConsumeRequest, CONSUME_PATH},
    transactions::Transaction,
};
use fairydust_api::DustApiError;
use reqwest::Client;
use std::time::Duration;

/// Direct client for the ledger service.
///
/// Debits always carry the bearer token even though the ledger is a separate
/// service from the account API.
pub struct LedgerClient {
    http_client: Client,
    base_url: String,
}

impl LedgerClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AuthError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn consume(
        &self,
        access_token: &str,
        req: &ConsumeRequest,
    ) -> Result<Transaction, AuthError> {
        let url = format!("{}{}", self.base_url, CONSUME_PATH);

        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DustApiError::from_response(status.as_u16(), &body).into());
        }

        Ok(resp.json::<Transaction>().await?)
    }
}
