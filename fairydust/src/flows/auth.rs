use super::TransientMessage;
use crate::timers::DelayedActions;
use fairydust_api::endpoints::{users::User, IdentifierType};
use fairydust_auth::{common::TokenPair, AuthError, DustApi};
use std::fmt;
use std::sync::Arc;

pub const CODE_LENGTH: usize = 6;

/// Result of a completed sign-in. The tokens are already persisted.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: User,
    pub tokens: TokenPair,
    pub is_new_user: bool,
}

#[derive(Debug, Clone)]
pub enum AuthStep {
    Input,
    CodeEntry,
    Success(AuthOutcome),
    Cancelled,
}

impl AuthStep {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthStep::Success(_) | AuthStep::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthInput {
    SubmitIdentifier(String),
    /// Raw code field contents; non-digits are dropped.
    EnterCode(String),
    SubmitCode,
    UseDifferentIdentifier,
    Cancel,
}

/// Sign-in with a one-time code: identifier first, then the code.
pub struct AuthFlow {
    api: Arc<dyn DustApi>,
    step: AuthStep,
    identifier: String,
    identifier_type: IdentifierType,
    code: String,
    error: TransientMessage,
    timers: DelayedActions,
}

impl AuthFlow {
    pub fn new(api: Arc<dyn DustApi>) -> Self {
        Self {
            api,
            step: AuthStep::Input,
            identifier: String::new(),
            identifier_type: IdentifierType::default(),
            code: String::new(),
            error: TransientMessage::default(),
            timers: DelayedActions::new(),
        }
    }

    pub fn step(&self) -> &AuthStep {
        &self.step
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn identifier_type(&self) -> IdentifierType {
        self.identifier_type
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn error(&self) -> Option<String> {
        self.error.get()
    }

    pub fn is_finished(&self) -> bool {
        self.step.is_terminal()
    }

    pub fn outcome(&self) -> Option<&AuthOutcome> {
        match &self.step {
            AuthStep::Success(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn into_outcome(self) -> Option<AuthOutcome> {
        match self.step {
            AuthStep::Success(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub async fn handle(&mut self, input: AuthInput) {
        if self.is_finished() {
            tracing::debug!("Ignoring {:?} in step {:?}", input, self.step);
            return;
        }

        match input {
            AuthInput::Cancel => {
                self.error.clear(&mut self.timers);
                self.step = AuthStep::Cancelled;
            }
            AuthInput::SubmitIdentifier(identifier) => {
                if matches!(self.step, AuthStep::Input) {
                    self.submit_identifier(identifier).await;
                }
            }
            AuthInput::EnterCode(raw) => {
                if matches!(self.step, AuthStep::CodeEntry) {
                    self.code = sanitize_code(&raw);
                    if self.code.len() == CODE_LENGTH {
                        self.submit_code().await;
                    }
                }
            }
            AuthInput::SubmitCode => {
                if matches!(self.step, AuthStep::CodeEntry) {
                    self.submit_code().await;
                }
            }
            AuthInput::UseDifferentIdentifier => {
                if matches!(self.step, AuthStep::CodeEntry) {
                    self.code.clear();
                    self.error.clear(&mut self.timers);
                    self.step = AuthStep::Input;
                }
            }
        }
    }

    async fn submit_identifier(&mut self, identifier: String) {
        let identifier = match validate_identifier(&identifier) {
            Ok(identifier) => identifier,
            Err(message) => {
                self.error.show(message, &mut self.timers);
                return;
            }
        };

        self.identifier_type = IdentifierType::detect(&identifier);
        self.identifier = identifier;
        self.error.clear(&mut self.timers);

        let result = self.api.request_code(&self.identifier).await;

        match result {
            Ok(_) => {
                tracing::debug!(
                    "Code sent to {}, awaiting entry",
                    self.identifier_type.display_name()
                );
                self.code.clear();
                self.step = AuthStep::CodeEntry;
            }
            Err(e) => {
                tracing::warn!("Failed to request code: {}", e);
                self.error.show(e.to_string(), &mut self.timers);
            }
        }
    }

    async fn submit_code(&mut self) {
        if let Err(message) = validate_code(&self.code) {
            self.error.show(message, &mut self.timers);
            return;
        }
        self.error.clear(&mut self.timers);

        let result = self.api.verify_code(&self.identifier, &self.code).await;

        match result {
            Ok(response) => {
                tracing::debug!("Signed in as {}", response.user.fairyname);
                self.step = AuthStep::Success(AuthOutcome {
                    tokens: TokenPair::from(&response.token),
                    user: response.user,
                    is_new_user: response.is_new_user,
                });
            }
            Err(e) => {
                tracing::warn!("Code verification failed: {}", e);
                self.code.clear();
                let message = match e {
                    AuthError::Unauthenticated => "Invalid verification code".to_string(),
                    other => other.to_string(),
                };
                self.error.show(message, &mut self.timers);
            }
        }
    }
}

impl fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFlow")
            .field("step", &self.step)
            .field("identifier_type", &self.identifier_type)
            .field("code_len", &self.code.len())
            .field("error", &self.error.get())
            .finish()
    }
}

/// Validate the identifier field.
fn validate_identifier(identifier: &str) -> Result<String, String> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err("Please enter an email or phone number".to_string());
    }
    Ok(trimmed.to_string())
}

/// Validate a full one-time code.
fn validate_code(code: &str) -> Result<(), String> {
    if code.len() != CODE_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err("Please enter a 6-digit code".to_string());
    }
    Ok(())
}

/// Keep digits only, capped at the code length.
fn sanitize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit())
        .take(CODE_LENGTH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;
    use std::time::Duration;

    fn flow(api: &Arc<MockApi>) -> AuthFlow {
        AuthFlow::new(api.clone())
    }

    #[test]
    fn test_sanitize_code() {
        assert_eq!(sanitize_code("12a3-45"), "12345");
        assert_eq!(sanitize_code("12345678"), "123456");
        assert_eq!(sanitize_code(""), "");
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("123456").is_ok());
        assert!(validate_code("12345").is_err());
        assert!(validate_code("").is_err());
    }

    #[tokio::test]
    async fn test_empty_identifier_sends_nothing() {
        let api = Arc::new(MockApi::new());
        let mut flow = flow(&api);

        flow.handle(AuthInput::SubmitIdentifier("   ".to_string()))
            .await;

        assert!(matches!(flow.step(), AuthStep::Input));
        assert_eq!(
            flow.error().as_deref(),
            Some("Please enter an email or phone number")
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_identifier_moves_to_code_entry() {
        let api = Arc::new(MockApi::new());
        let mut flow = flow(&api);

        flow.handle(AuthInput::SubmitIdentifier("a@b.com".to_string()))
            .await;

        assert!(matches!(flow.step(), AuthStep::CodeEntry));
        assert_eq!(flow.identifier_type(), IdentifierType::Email);
        assert_eq!(api.calls(), vec!["request_code:a@b.com".to_string()]);
    }

    #[tokio::test]
    async fn test_phone_identifier_classified() {
        let api = Arc::new(MockApi::new());
        let mut flow = flow(&api);

        flow.handle(AuthInput::SubmitIdentifier("+1 555 123".to_string()))
            .await;

        assert_eq!(flow.identifier_type(), IdentifierType::Phone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_failure_stays_in_input_and_clears() {
        let api = Arc::new(MockApi::new());
        api.fail_next_code_request("Too many requests");
        let mut flow = flow(&api);

        flow.handle(AuthInput::SubmitIdentifier("a@b.com".to_string()))
            .await;

        assert!(matches!(flow.step(), AuthStep::Input));
        assert_eq!(flow.error().as_deref(), Some("Too many requests"));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(flow.error().is_none());
    }

    #[tokio::test]
    async fn test_six_digits_auto_submit() {
        let api = Arc::new(MockApi::new());
        let mut flow = flow(&api);

        flow.handle(AuthInput::SubmitIdentifier("a@b.com".to_string()))
            .await;
        flow.handle(AuthInput::EnterCode("12345".to_string())).await;
        assert!(matches!(flow.step(), AuthStep::CodeEntry));

        flow.handle(AuthInput::EnterCode("123456".to_string())).await;

        let outcome = flow.outcome().expect("signed in");
        assert_eq!(outcome.user.fairyname, MockApi::DEFAULT_FAIRYNAME);
        assert!(api.is_authenticated());
    }

    #[tokio::test]
    async fn test_short_code_rejected_before_request() {
        let api = Arc::new(MockApi::new());
        let mut flow = flow(&api);

        flow.handle(AuthInput::SubmitIdentifier("a@b.com".to_string()))
            .await;
        flow.handle(AuthInput::EnterCode("123".to_string())).await;
        flow.handle(AuthInput::SubmitCode).await;

        assert_eq!(flow.error().as_deref(), Some("Please enter a 6-digit code"));
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_code_clears_input() {
        let api = Arc::new(MockApi::new());
        let mut flow = flow(&api);

        flow.handle(AuthInput::SubmitIdentifier("a@b.com".to_string()))
            .await;
        flow.handle(AuthInput::EnterCode("000000".to_string())).await;

        assert!(matches!(flow.step(), AuthStep::CodeEntry));
        assert_eq!(flow.code(), "");
        assert_eq!(flow.error().as_deref(), Some("Invalid verification code"));
        assert!(!api.is_authenticated());
    }

    #[tokio::test]
    async fn test_use_different_identifier() {
        let api = Arc::new(MockApi::new());
        let mut flow = flow(&api);

        flow.handle(AuthInput::SubmitIdentifier("a@b.com".to_string()))
            .await;
        flow.handle(AuthInput::EnterCode("12".to_string())).await;
        flow.handle(AuthInput::UseDifferentIdentifier).await;

        assert!(matches!(flow.step(), AuthStep::Input));
        assert_eq!(flow.code(), "");
    }

    #[tokio::test]
    async fn test_cancel_is_terminal() {
        let api = Arc::new(MockApi::new());
        let mut flow = flow(&api);

        flow.handle(AuthInput::SubmitIdentifier("a@b.com".to_string()))
            .await;
        flow.handle(AuthInput::Cancel).await;
        assert!(matches!(flow.step(), AuthStep::Cancelled));

        flow.handle(AuthInput::EnterCode("123456".to_string())).await;
        assert!(matches!(flow.step(), AuthStep::Cancelled));
        assert!(!api.is_authenticated());
    }
}
