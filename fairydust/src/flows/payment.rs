use super::auth::{AuthFlow, AuthInput, AuthStep};
use super::LoadingIndicator;
use crate::timers::DelayedActions;
use fairydust_api::endpoints::{transactions::Transaction, users::User, Dust};
use fairydust_auth::{AuthError, DustApi};
use std::fmt;
use std::sync::Arc;

const DEFAULT_APP_NAME: &str = "App";

/// Configuration of one payment button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentProps {
    pub cost: Dust,
    pub label: String,
    pub disabled: bool,
    pub app_name: Option<String>,
}

impl PaymentProps {
    pub fn new(cost: Dust, label: impl Into<String>) -> Self {
        Self {
            cost,
            label: label.into(),
            disabled: false,
            app_name: None,
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Description recorded on the debit.
    pub fn action(&self) -> String {
        format!(
            "{} - {}",
            self.label,
            self.app_name.as_deref().unwrap_or(DEFAULT_APP_NAME)
        )
    }
}

/// What the embedding host hears about a payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Succeeded(Transaction),
    Failed(String),
    /// The user chose to buy more dust; carries the top-up URL.
    TopUpRequested(String),
}

pub type OutcomeCallback = Arc<dyn Fn(&PaymentOutcome) + Send + Sync>;

#[derive(Debug)]
pub enum PaymentState {
    Idle,
    CheckingAuth,
    NeedsAuth(Box<AuthFlow>),
    CheckingBalance,
    InsufficientBalance { deficit: Dust },
    Confirming,
    Consuming,
    Success(Transaction),
    Error(String),
}

impl PaymentState {
    /// States from which a click starts a new attempt.
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            PaymentState::Idle | PaymentState::Success(_) | PaymentState::Error(_)
        )
    }

    fn name(&self) -> &'static str {
        match self {
            PaymentState::Idle => "Idle",
            PaymentState::CheckingAuth => "CheckingAuth",
            PaymentState::NeedsAuth(_) => "NeedsAuth",
            PaymentState::CheckingBalance => "CheckingBalance",
            PaymentState::InsufficientBalance { .. } => "InsufficientBalance",
            PaymentState::Confirming => "Confirming",
            PaymentState::Consuming => "Consuming",
            PaymentState::Success(_) => "Success",
            PaymentState::Error(_) => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInput {
    Click,
    /// Confirm the charge; `skip_future` is the "don't ask again" checkbox.
    Confirm { skip_future: bool },
    Cancel,
    TopUp,
    /// Forwarded to the nested sign-in while in `NeedsAuth`.
    Auth(AuthInput),
}

/// Metered payment for one button: auth check, balance check,
/// confirmation and the idempotent debit.
pub struct PaymentFlow {
    api: Arc<dyn DustApi>,
    props: PaymentProps,
    state: PaymentState,
    user: Option<User>,
    loading: LoadingIndicator,
    on_outcome: OutcomeCallback,
    timers: DelayedActions,
}

impl PaymentFlow {
    pub fn new(api: Arc<dyn DustApi>, props: PaymentProps, on_outcome: OutcomeCallback) -> Self {
        Self {
            api,
            props,
            state: PaymentState::Idle,
            user: None,
            loading: LoadingIndicator::default(),
            on_outcome,
            timers: DelayedActions::new(),
        }
    }

    pub fn state(&self) -> &PaymentState {
        &self.state
    }

    pub fn props(&self) -> &PaymentProps {
        &self.props
    }

    /// Last user record seen by this flow, with the balance adjusted
    /// locally after each successful debit.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_active()
    }

    /// Whether the trigger control should render disabled.
    pub fn controls_disabled(&self) -> bool {
        self.props.disabled
    }

    pub fn auth_flow(&self) -> Option<&AuthFlow> {
        match &self.state {
            PaymentState::NeedsAuth(flow) => Some(flow),
            _ => None,
        }
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.props.disabled = disabled;
    }

    /// Replace the props without resetting the attempt in progress.
    pub fn update_props(&mut self, props: PaymentProps) {
        self.props = props;
    }

    /// Re-fetch the user when connected. Failures drop the cached user.
    pub async fn refresh(&mut self) {
        if !self.api.is_authenticated() {
            self.user = None;
            return;
        }
        match self.api.current_user().await {
            Ok(user) => self.user = Some(user),
            Err(e) => {
                tracing::debug!("Payment button refresh failed: {}", e);
                if e.is_unauthenticated() {
                    self.clear_credentials();
                }
                self.user = None;
            }
        }
    }

    pub async fn handle(&mut self, input: PaymentInput) {
        tracing::debug!("Payment flow {} <- {:?}", self.state.name(), input);

        match input {
            PaymentInput::Click => {
                if self.controls_disabled() || !self.state.is_ready() {
                    return;
                }
                self.check_auth().await;
            }
            PaymentInput::Confirm { skip_future } => {
                if self.props.disabled || !matches!(self.state, PaymentState::Confirming) {
                    return;
                }
                // Props may have changed since the balance check
                if let Some(balance) = self.user.as_ref().map(|user| user.dust_balance) {
                    if !balance.covers(self.props.cost) {
                        let deficit = balance.shortfall(self.props.cost);
                        tracing::debug!("Cost changed to {}, short by {}", self.props.cost, deficit);
                        self.state = PaymentState::InsufficientBalance { deficit };
                        return;
                    }
                }
                if skip_future {
                    if let Err(e) = self.api.credentials().set_skip_confirmation(true) {
                        tracing::warn!("Failed to save confirmation preference: {}", e);
                    }
                }
                self.consume().await;
            }
            PaymentInput::Cancel => {
                if matches!(
                    self.state,
                    PaymentState::CheckingAuth | PaymentState::CheckingBalance | PaymentState::Consuming
                ) {
                    return;
                }
                if let PaymentState::NeedsAuth(flow) = &mut self.state {
                    flow.handle(AuthInput::Cancel).await;
                }
                self.state = PaymentState::Idle;
            }
            PaymentInput::TopUp => {
                if matches!(self.state, PaymentState::InsufficientBalance { .. }) {
                    let url = self.api.settings().top_up_url.clone();
                    self.state = PaymentState::Idle;
                    (self.on_outcome)(&PaymentOutcome::TopUpRequested(url));
                }
            }
            PaymentInput::Auth(auth_input) => self.forward_auth(auth_input).await,
        }
    }

    async fn forward_auth(&mut self, input: AuthInput) {
        let PaymentState::NeedsAuth(flow) = &mut self.state else {
            return;
        };
        flow.handle(input).await;

        let signed_in = match flow.step() {
            AuthStep::Success(outcome) => outcome.user.clone(),
            AuthStep::Cancelled => {
                self.state = PaymentState::Idle;
                return;
            }
            AuthStep::Input | AuthStep::CodeEntry => return,
        };

        tracing::debug!("Signed in as {}, resuming payment", signed_in.fairyname);
        self.user = Some(signed_in);
        self.check_auth().await;
    }

    async fn check_auth(&mut self) {
        if !self.api.is_authenticated() {
            self.needs_auth();
            return;
        }

        self.state = PaymentState::CheckingAuth;
        match self.api.current_user().await {
            Ok(user) => self.check_balance(user).await,
            Err(AuthError::Unauthenticated) => {
                tracing::info!("Stored session rejected, signing in again");
                self.clear_credentials();
                self.needs_auth();
            }
            Err(e) => {
                tracing::warn!("Failed to load account: {}", e);
                let message = e.to_string();
                self.state = PaymentState::Error(message.clone());
                (self.on_outcome)(&PaymentOutcome::Failed(message));
            }
        }
    }

    async fn check_balance(&mut self, user: User) {
        self.state = PaymentState::CheckingBalance;
        let balance = user.dust_balance;
        self.user = Some(user);

        if !balance.covers(self.props.cost) {
            let deficit = balance.shortfall(self.props.cost);
            tracing::debug!("Balance {} short by {}", balance, deficit);
            self.state = PaymentState::InsufficientBalance { deficit };
            return;
        }

        let skip = self
            .api
            .credentials()
            .skip_confirmation()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to read confirmation preference: {}", e);
                false
            });

        if skip {
            self.consume().await;
        } else {
            self.state = PaymentState::Confirming;
        }
    }

    async fn consume(&mut self) {
        self.state = PaymentState::Consuming;
        self.loading.start(&mut self.timers);

        let cost = self.props.cost;
        let action = self.props.action();
        tracing::info!("Consuming {} dust for {}", cost, action);
        let result = self.api.consume_dust(cost, &action).await;

        match result {
            Ok(transaction) => {
                tracing::info!("Consumed {} dust, transaction {}", cost, transaction.id);
                if let Some(user) = self.user.as_mut() {
                    user.dust_balance -= cost;
                }
                self.state = PaymentState::Success(transaction.clone());
                (self.on_outcome)(&PaymentOutcome::Succeeded(transaction));
            }
            Err(AuthError::Unauthenticated) => {
                tracing::info!("Session expired before the debit, signing in again");
                self.clear_credentials();
                self.needs_auth();
            }
            Err(e) => {
                tracing::error!("Failed to consume dust: {}", e);
                self.state = PaymentState::Idle;
                (self.on_outcome)(&PaymentOutcome::Failed(e.to_string()));
            }
        }
    }

    fn needs_auth(&mut self) {
        self.user = None;
        self.state = PaymentState::NeedsAuth(Box::new(AuthFlow::new(self.api.clone())));
    }

    fn clear_credentials(&self) {
        if let Err(e) = self.api.clear_credentials() {
            tracing::warn!("Failed to clear credentials: {}", e);
        }
    }
}

impl fmt::Debug for PaymentFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentFlow")
            .field("props", &self.props)
            .field("state", &self.state)
            .field("user", &self.user.as_ref().map(|user| &user.fairyname))
            .finish()
    }
}
