use crate::client::credential_store::CredentialStore;
use crate::client::ledger_client::LedgerClient;
use crate::client::settings::Settings;
use crate::client::storage::Storage;
use crate::common::TokenPair;
use crate::error::AuthError;
use fairydust_api::endpoints::{
    auth::{AuthResponse, OtpResponse},
    ledger::ConsumeRequest,
    payments::{PaymentMethod, PurchaseResponse},
    transactions::Transaction,
    users::User,
    Dust,
};
use fairydust_api::{Client, Endpoint, Request};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

const OTP_LENGTH: usize = 6;

/// Authenticated façade over the account and ledger services.
///
/// Tokens are read from the credential store on every call, so concurrent
/// sessions sharing a store always use the latest pair (last write wins).
pub struct Session {
    settings: Settings,
    client: Client,
    ledger: LedgerClient,
    store: CredentialStore,
    timeout: Duration,
}

impl Session {
    pub fn new(settings: Settings, storage: Arc<dyn Storage>) -> Result<Self, AuthError> {
        settings.validate().map_err(AuthError::Configuration)?;

        let timeout = settings.request_timeout();
        let client = Client::new(settings.api_base_url());
        let ledger = LedgerClient::new(settings.ledger_base_url(), timeout)?;
        let store = CredentialStore::new(settings.app_id.clone(), storage);

        tracing::info!(
            app_id = %settings.app_id,
            api_url = %client.base_url(),
            ledger_url = %ledger.base_url(),
            "Session initialized"
        );

        Ok(Self {
            settings,
            client,
            ledger,
            store,
            timeout,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    async fn send<R>(&self, request: R) -> Result<R::Response, AuthError>
    where
        R: Endpoint,
    {
        let token = self.store.access_token()?;
        let call = self
            .client
            .send(request, token.as_ref().map(|t| t.expose_secret()));

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| AuthError::Timeout(self.timeout))?
            .map_err(AuthError::from)
    }

    /// Presence check on the access token, not a validity check.
    pub fn is_authenticated(&self) -> bool {
        match self.store.access_token() {
            Ok(token) => token.is_some(),
            Err(e) => {
                tracing::warn!("Failed to read credentials: {}", e);
                false
            }
        }
    }

    pub fn clear_credentials(&self) -> Result<(), AuthError> {
        tracing::info!(app_id = %self.settings.app_id, "Clearing stored credentials");
        self.store.clear()
    }

    pub async fn request_code(&self, identifier: &str) -> Result<OtpResponse, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AuthError::Validation(
                "Please enter an email or phone number".to_string(),
            ));
        }

        let req = Request::auth().request_code(identifier);
        tracing::info!(identifier_type = ?req.identifier_type(), "Requesting verification code");
        self.send(req).await
    }

    /// Verifies the code and persists the returned token pair.
    pub async fn verify_code(&self, identifier: &str, code: &str) -> Result<AuthResponse, AuthError> {
        let code = code.trim();
        if code.len() != OTP_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthError::Validation(
                "Please enter a 6-digit code".to_string(),
            ));
        }

        let response = self
            .send(Request::auth().verify_code(identifier.trim(), code))
            .await?;
        self.store.set(&TokenPair::from(&response.token))?;

        tracing::info!(user_id = %response.user.id, new_user = response.is_new_user, "Verification succeeded");
        Ok(response)
    }

    pub async fn refresh(&self) -> Result<(), AuthError> {
        let refresh_token = self
            .store
            .refresh_token()?
            .ok_or(AuthError::Unauthenticated)?;

        let tokens = self
            .send(Request::auth().refresh(refresh_token.expose_secret()))
            .await?;
        self.store.set(&TokenPair::from(tokens))?;

        tracing::info!("Tokens refreshed");
        Ok(())
    }

    /// Best-effort remote logout; local credentials are cleared regardless.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if let Err(e) = self.send(Request::auth().logout()).await {
            tracing::warn!("Remote logout failed, clearing local credentials anyway: {}", e);
        }
        self.clear_credentials()
    }

    pub async fn current_user(&self) -> Result<User, AuthError> {
        self.send(Request::users().me()).await
    }

    pub async fn balance(&self) -> Result<Dust, AuthError> {
        Ok(self.send(Request::users().balance()).await?.balance)
    }

    pub async fn transactions(&self) -> Result<Vec<Transaction>, AuthError> {
        self.send(Request::transactions().list()).await
    }

    pub async fn purchase_dust(
        &self,
        amount: Dust,
        payment_method_id: Option<String>,
    ) -> Result<PurchaseResponse, AuthError> {
        let mut req = Request::payments().purchase(amount);
        if let Some(id) = payment_method_id {
            req = req.payment_method_id(id);
        }
        self.send(req).await
    }

    pub async fn payment_methods(&self) -> Result<Vec<PaymentMethod>, AuthError> {
        self.send(Request::payments().methods()).await
    }

    pub async fn check_connection(&self) -> bool {
        self.current_user().await.is_ok()
    }

    /// Debits `amount` for `action` against the ledger with a fresh idempotency key.
    pub async fn consume_dust(&self, amount: Dust, action: &str) -> Result<Transaction, AuthError> {
        if amount.inner() <= 0 {
            return Err(AuthError::Validation(format!(
                "Invalid dust amount: {}",
                amount
            )));
        }
        if !self.is_authenticated() {
            return Err(AuthError::Unauthenticated);
        }

        let user = self.current_user().await?;
        let token = self
            .store
            .access_token()?
            .ok_or(AuthError::Unauthenticated)?;

        let req = ConsumeRequest::new(user.id, amount, action, self.settings.app_id.clone());
        tracing::info!(
            user_id = %user.id,
            amount = %amount,
            idempotency_key = %req.idempotency_key,
            "Consuming dust"
        );

        let transaction = self.ledger.consume(token.expose_secret(), &req).await?;
        tracing::info!(transaction_id = %transaction.id, "Dust consumed");
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::MemoryStorage;
    use crate::client::test_server::{Recorded, TestServer};
    use fairydust_api::endpoints::ledger::CONSUME_PATH;

    const USER: &str = r#"{
        "id": "00000000-0000-0000-0000-000000000001",
        "fairyname": "glimmer",
        "dust_balance": 25
    }"#;

    const TRANSACTION: &str = r#"{
        "id": "00000000-0000-0000-0000-0000000000aa",
        "amount": 5,
        "type": "consume",
        "action": "Generate - App"
    }"#;

    fn live_session(api: &TestServer, ledger: &TestServer) -> Session {
        let settings = Settings::for_app("test-app", api.url())
            .with_ledger_url(ledger.url())
            .with_request_timeout(Duration::from_secs(5));
        let session = Session::new(settings, Arc::new(MemoryStorage::new())).unwrap();
        session
            .credentials()
            .set(&TokenPair::new("access-token", "refresh-token"))
            .unwrap();
        session
    }

    // Nothing listens on the discard port, so any request that does go out fails fast.
    fn offline_session() -> Session {
        let settings = Settings::for_app("test-app", "http://127.0.0.1:9")
            .with_ledger_url("http://127.0.0.1:9")
            .with_request_timeout(Duration::from_secs(2));
        Session::new(settings, Arc::new(MemoryStorage::new())).unwrap()
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = Settings::for_app("", "http://localhost:8001");
        let result = Session::new(settings, Arc::new(MemoryStorage::new()));
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }

    #[test]
    fn test_is_authenticated_is_presence_check() {
        let session = offline_session();
        assert!(!session.is_authenticated());

        session
            .credentials()
            .set(&TokenPair::new("any", "thing"))
            .unwrap();
        assert!(session.is_authenticated());

        session.clear_credentials().unwrap();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_empty_identifier_is_validation_failure() {
        let session = offline_session();
        let err = session.request_code("   ").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_malformed_code_is_validation_failure() {
        let session = offline_session();
        for code in ["12345", "1234567", "12a456"] {
            let err = session.verify_code("a@b.com", code).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "code {code}");
        }
    }

    #[tokio::test]
    async fn test_refresh_without_token_is_unauthenticated() {
        let session = offline_session();
        let err = session.refresh().await.unwrap_err();
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn test_consume_without_token_is_unauthenticated() {
        let session = offline_session();
        let err = session.consume_dust(Dust::new(5), "test").await.unwrap_err();
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn test_consume_rejects_non_positive_amount() {
        let session = offline_session();
        let err = session.consume_dust(Dust::new(0), "test").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_remote_fails() {
        let session = offline_session();
        session
            .credentials()
            .set(&TokenPair::new("access", "refresh"))
            .unwrap();

        session.logout().await.unwrap();
        assert!(!session.is_authenticated());
        assert!(session.credentials().get().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_current_user_sends_bearer() {
        let api = TestServer::start(&[("/users/me", 200, USER)]).await;
        let ledger = TestServer::start(&[]).await;
        let session = live_session(&api, &ledger);

        let user = session.current_user().await.unwrap();
        assert_eq!(user.fairyname, "glimmer");
        assert_eq!(user.dust_balance, Dust::new(25));

        let [sent]: [Recorded; 1] = api.requests().try_into().unwrap();
        assert_eq!(sent.method, "GET");
        assert_eq!(
            sent.headers.get("authorization").map(String::as_str),
            Some("Bearer access-token")
        );
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthenticated() {
        let api = TestServer::start(&[("/users/me", 401, r#"{"message": "Token expired"}"#)]).await;
        let ledger = TestServer::start(&[]).await;
        let session = live_session(&api, &ledger);

        let err = session.current_user().await.unwrap_err();
        assert!(err.is_unauthenticated());
        assert!(!session.check_connection().await);
    }

    #[tokio::test]
    async fn test_consume_debits_the_ledger_service() {
        let api = TestServer::start(&[("/users/me", 200, USER)]).await;
        let ledger = TestServer::start(&[(CONSUME_PATH, 200, TRANSACTION)]).await;
        let session = live_session(&api, &ledger);

        let transaction = session
            .consume_dust(Dust::new(5), "Generate - App")
            .await
            .unwrap();
        assert_eq!(transaction.amount, Dust::new(5));

        // The user lookup goes to the account service, the debit to the ledger
        assert_eq!(api.requests().len(), 1);
        let [sent]: [Recorded; 1] = ledger.requests().try_into().unwrap();
        assert_eq!(sent.path, CONSUME_PATH);
        assert_eq!(
            sent.headers.get("authorization").map(String::as_str),
            Some("Bearer access-token")
        );

        let body = sent.json();
        assert_eq!(body["user_id"], "00000000-0000-0000-0000-000000000001");
        assert_eq!(body["amount"], 5);
        assert_eq!(body["app_id"], "test-app");
        assert!(body["idempotency_key"]
            .as_str()
            .unwrap()
            .starts_with("00000000-0000-0000-0000-000000000001"));
    }

    #[tokio::test]
    async fn test_consume_ledger_failure_surfaces_status() {
        let api = TestServer::start(&[("/users/me", 200, USER)]).await;
        let ledger = TestServer::start(&[(CONSUME_PATH, 503, "upstream down")]).await;
        let session = live_session(&api, &ledger);

        let err = session
            .consume_dust(Dust::new(5), "Generate - App")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "HTTP 503");
        assert!(session.is_authenticated());
    }
}
