use crate::client::storage::Storage;
use crate::common::TokenPair;
use crate::error::AuthError;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

const KEY_PREFIX: &str = "fairydust";
const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";

/// Preference name for the per-application confirmation opt-out.
pub const SKIP_CONFIRMATIONS: &str = "skip_confirmations";

/// Tokens and preferences for one application id.
///
/// Every key is namespaced as `fairydust_{app_id}_{name}` so several embeds can
/// share one backend. No expiry is tracked here; a stale token is only
/// discovered when the server rejects it.
#[derive(Clone)]
pub struct CredentialStore {
    app_id: String,
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    pub fn new(app_id: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            app_id: app_id.into(),
            storage,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    fn key(&self, name: &str) -> String {
        format!("{}_{}_{}", KEY_PREFIX, self.app_id, name)
    }

    /// The stored pair, or `None` unless both halves are present.
    pub fn get(&self) -> Result<Option<TokenPair>, AuthError> {
        let access = self.storage.get(&self.key(ACCESS_TOKEN))?;
        let refresh = self.storage.get(&self.key(REFRESH_TOKEN))?;
        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair::new(access, refresh))),
            (None, None) => Ok(None),
            _ => {
                tracing::warn!(app_id = %self.app_id, "Ignoring half-stored token pair");
                Ok(None)
            }
        }
    }

    pub fn access_token(&self) -> Result<Option<SecretString>, AuthError> {
        Ok(self.get()?.map(|pair| pair.into_parts().0))
    }

    pub fn refresh_token(&self) -> Result<Option<SecretString>, AuthError> {
        Ok(self.get()?.map(|pair| pair.into_parts().1))
    }

    pub fn set(&self, tokens: &TokenPair) -> Result<(), AuthError> {
        let access_key = self.key(ACCESS_TOKEN);
        let refresh_key = self.key(REFRESH_TOKEN);
        self.storage.set_many(&[
            (access_key.as_str(), tokens.access_token().expose_secret()),
            (refresh_key.as_str(), tokens.refresh_token().expose_secret()),
        ])
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        let access_key = self.key(ACCESS_TOKEN);
        let refresh_key = self.key(REFRESH_TOKEN);
        self.storage
            .remove_many(&[access_key.as_str(), refresh_key.as_str()])
    }

    pub fn preference(&self, name: &str) -> Result<Option<String>, AuthError> {
        self.storage.get(&self.key(name))
    }

    pub fn set_preference(&self, name: &str, value: &str) -> Result<(), AuthError> {
        let key = self.key(name);
        self.storage.set_many(&[(key.as_str(), value)])
    }

    pub fn clear_preference(&self, name: &str) -> Result<(), AuthError> {
        let key = self.key(name);
        self.storage.remove_many(&[key.as_str()])
    }

    pub fn skip_confirmation(&self) -> Result<bool, AuthError> {
        Ok(self.preference(SKIP_CONFIRMATIONS)?.as_deref() == Some("true"))
    }

    pub fn set_skip_confirmation(&self, skip: bool) -> Result<(), AuthError> {
        if skip {
            self.set_preference(SKIP_CONFIRMATIONS, "true")
        } else {
            self.clear_preference(SKIP_CONFIRMATIONS)
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}
