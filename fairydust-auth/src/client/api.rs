use crate::client::credential_store::CredentialStore;
use crate::client::session::Session;
use crate::client::settings::Settings;
use crate::error::AuthError;
use async_trait::async_trait;
use fairydust_api::endpoints::{
    auth::{AuthResponse, OtpResponse},
    transactions::Transaction,
    users::User,
    Dust,
};

/// Operations the interactive flows need from the services.
///
/// [`Session`] is the production implementation; tests substitute an
/// in-memory one.
#[async_trait]
pub trait DustApi: Send + Sync {
    fn settings(&self) -> &Settings;

    fn credentials(&self) -> &CredentialStore;

    fn is_authenticated(&self) -> bool;

    fn clear_credentials(&self) -> Result<(), AuthError>;

    async fn request_code(&self, identifier: &str) -> Result<OtpResponse, AuthError>;

    async fn verify_code(&self, identifier: &str, code: &str) -> Result<AuthResponse, AuthError>;

    async fn logout(&self) -> Result<(), AuthError>;

    async fn current_user(&self) -> Result<User, AuthError>;

    async fn consume_dust(&self, amount: Dust, action: &str) -> Result<Transaction, AuthError>;
}

#[async_trait]
impl DustApi for Session {
    fn settings(&self) -> &Settings {
        Session::settings(self)
    }

    fn credentials(&self) -> &CredentialStore {
        Session::credentials(self)
    }

    fn is_authenticated(&self) -> bool {
        Session::is_authenticated(self)
    }

    fn clear_credentials(&self) -> Result<(), AuthError> {
        Session::clear_credentials(self)
    }

    async fn request_code(&self, identifier: &str) -> Result<OtpResponse, AuthError> {
        Session::request_code(self, identifier).await
    }

    async fn verify_code(&self, identifier: &str, code: &str) -> Result<AuthResponse, AuthError> {
        Session::verify_code(self, identifier, code).await
    }

    async fn logout(&self) -> Result<(), AuthError> {
        Session::logout(self).await
    }

    async fn current_user(&self) -> Result<User, AuthError> {
        Session::current_user(self).await
    }

    async fn consume_dust(&self, amount: Dust, action: &str) -> Result<Transaction, AuthError> {
        Session::consume_dust(self, amount, action).await
    }
}
