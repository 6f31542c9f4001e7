use fairydust_api::endpoints::auth::TokenResponse;
use secrecy::{ExposeSecret, SecretString};

/// Access + refresh token, always handled as a unit.
#[derive(Debug)]
pub struct TokenPair {
    access_token: SecretString,
    refresh_token: SecretString,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    pub fn into_parts(self) -> (SecretString, SecretString) {
        (self.access_token, self.refresh_token)
    }
}

impl Clone for TokenPair {
    fn clone(&self) -> Self {
        Self::new(
            self.access_token.expose_secret(),
            self.refresh_token.expose_secret(),
        )
    }
}

impl From<TokenResponse> for TokenPair {
    fn from(tokens: TokenResponse) -> Self {
        Self::new(tokens.access_token, tokens.refresh_token)
    }
}

impl From<&TokenResponse> for TokenPair {
    fn from(tokens: &TokenResponse) -> Self {
        Self::new(tokens.access_token.as_str(), tokens.refresh_token.as_str())
    }
}
