//! In-memory doubles for the services and the host page.

use crate::account::{AccountEvent, EventCallback};
use crate::flows::payment::{OutcomeCallback, PaymentOutcome};
use crate::page::{ElementId, Mutation, Notification, Page};
use async_trait::async_trait;
use chrono::Utc;
use fairydust_api::endpoints::{
    auth::{AuthResponse, OtpResponse, TokenResponse},
    transactions::{Transaction, TransactionKind},
    users::User,
    Dust, IdempotencyKey,
};
use fairydust_auth::{
    common::TokenPair, AuthError, CredentialStore, DustApi, MemoryStorage, Settings,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct MockState {
    user: User,
    token_valid: bool,
    fail_next_code_request: Option<String>,
    fail_next_consume: Option<String>,
    consume_gate: Option<Arc<Notify>>,
    calls: Vec<String>,
    consume_calls: Vec<(Dust, String)>,
    next_transaction: u128,
}

/// Scripted account and ledger service.
///
/// Credentials live in a real [`CredentialStore`] over [`MemoryStorage`], so
/// flows see the same persistence behaviour as in production.
pub struct MockApi {
    settings: Settings,
    store: CredentialStore,
    state: Mutex<MockState>,
}

impl MockApi {
    pub const APP_ID: &'static str = "test-app";
    pub const VALID_CODE: &'static str = "123456";
    pub const DEFAULT_FAIRYNAME: &'static str = "sparkle-fox-42";
    pub const DEFAULT_BALANCE: i64 = 25;

    pub fn new() -> Self {
        let settings = Settings::for_app(Self::APP_ID, "http://localhost:8001")
            .with_ledger_url("http://localhost:8002");
        let store = CredentialStore::new(Self::APP_ID, Arc::new(MemoryStorage::new()));

        Self {
            settings,
            store,
            state: Mutex::new(MockState {
                user: User {
                    id: Uuid::from_u128(1),
                    fairyname: Self::DEFAULT_FAIRYNAME.to_string(),
                    dust_balance: Dust::new(Self::DEFAULT_BALANCE),
                    email: Some("a@b.com".to_string()),
                    phone: None,
                    avatar_url: None,
                },
                token_valid: false,
                fail_next_code_request: None,
                fail_next_consume: None,
                consume_gate: None,
                calls: Vec::new(),
                consume_calls: Vec::new(),
                next_transaction: 1000,
            }),
        }
    }

    /// Start with a stored, valid token pair.
    pub fn signed_in(self) -> Self {
        self.sign_in();
        self
    }

    pub fn with_user(self, user: User) -> Self {
        lock(&self.state).user = user;
        self
    }

    pub fn sign_in(&self) {
        self.store
            .set(&TokenPair::new("access-token", "refresh-token"))
            .expect("memory storage");
        lock(&self.state).token_valid = true;
    }

    /// Keep the stored tokens but have the server reject them.
    pub fn expire_token(&self) {
        lock(&self.state).token_valid = false;
    }

    pub fn set_balance(&self, balance: i64) {
        lock(&self.state).user.dust_balance = Dust::new(balance);
    }

    pub fn user(&self) -> User {
        lock(&self.state).user.clone()
    }

    pub fn fail_next_code_request(&self, message: &str) {
        lock(&self.state).fail_next_code_request = Some(message.to_string());
    }

    pub fn fail_next_consume(&self, message: &str) {
        lock(&self.state).fail_next_consume = Some(message.to_string());
    }

    /// Debits wait on the returned handle until `notify_one` is called.
    pub fn hold_consumes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.state).consume_gate = Some(gate.clone());
        gate
    }

    /// Every service call, in order, as `name` or `name:argument`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn consume_calls(&self) -> Vec<(Dust, String)> {
        lock(&self.state).consume_calls.clone()
    }

    fn record(&self, call: String) {
        lock(&self.state).calls.push(call);
    }

    fn check_token(&self) -> Result<(), AuthError> {
        if self.store.access_token()?.is_none() || !lock(&self.state).token_valid {
            return Err(AuthError::Unauthenticated);
        }
        Ok(())
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DustApi for MockApi {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    fn is_authenticated(&self) -> bool {
        matches!(self.store.access_token(), Ok(Some(_)))
    }

    fn clear_credentials(&self) -> Result<(), AuthError> {
        self.store.clear()
    }

    async fn request_code(&self, identifier: &str) -> Result<OtpResponse, AuthError> {
        self.record(format!("request_code:{}", identifier));
        if let Some(message) = lock(&self.state).fail_next_code_request.take() {
            return Err(AuthError::Network {
                status: 429,
                message,
            });
        }
        Ok(OtpResponse {
            success: true,
            message: Some("Code sent".to_string()),
        })
    }

    async fn verify_code(&self, identifier: &str, code: &str) -> Result<AuthResponse, AuthError> {
        self.record(format!("verify_code:{}", identifier));
        if code != Self::VALID_CODE {
            return Err(AuthError::Unauthenticated);
        }

        let token = TokenResponse {
            access_token: "access-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: Some(3600),
        };
        self.store.set(&TokenPair::from(&token))?;

        let mut state = lock(&self.state);
        state.token_valid = true;
        Ok(AuthResponse {
            user: state.user.clone(),
            token,
            is_new_user: false,
        })
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.record("logout".to_string());
        lock(&self.state).token_valid = false;
        self.store.clear()
    }

    async fn current_user(&self) -> Result<User, AuthError> {
        self.record("current_user".to_string());
        self.check_token()?;
        Ok(lock(&self.state).user.clone())
    }

    async fn consume_dust(&self, amount: Dust, action: &str) -> Result<Transaction, AuthError> {
        self.record("consume_dust".to_string());
        let gate = lock(&self.state).consume_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_token()?;

        let mut state = lock(&self.state);
        if let Some(message) = state.fail_next_consume.take() {
            return Err(AuthError::Network {
                status: 500,
                message,
            });
        }
        if !state.user.dust_balance.covers(amount) {
            return Err(AuthError::Network {
                status: 400,
                message: "Insufficient balance".to_string(),
            });
        }

        state.user.dust_balance -= amount;
        state.consume_calls.push((amount, action.to_string()));
        state.next_transaction += 1;

        Ok(Transaction {
            id: Uuid::from_u128(state.next_transaction),
            amount,
            user_id: Some(state.user.id),
            kind: Some(TransactionKind::Consume),
            status: Some("completed".to_string()),
            description: Some(action.to_string()),
            app_id: Some(Self::APP_ID.to_string()),
            idempotency_key: Some(IdempotencyKey::mint(&state.user.id)),
            created_at: Some(Utc::now()),
        })
    }
}

/// Collects payment outcomes for assertions.
#[derive(Clone, Default)]
pub struct OutcomeLog {
    outcomes: Arc<Mutex<Vec<PaymentOutcome>>>,
}

impl OutcomeLog {
    pub fn callback(&self) -> OutcomeCallback {
        let outcomes = self.outcomes.clone();
        Arc::new(move |outcome: &PaymentOutcome| lock(&outcomes).push(outcome.clone()))
    }

    pub fn outcomes(&self) -> Vec<PaymentOutcome> {
        lock(&self.outcomes).clone()
    }
}

/// Collects account widget events for assertions.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<AccountEvent>>>,
}

impl EventLog {
    pub fn callback(&self) -> EventCallback {
        let events = self.events.clone();
        Arc::new(move |event: &AccountEvent| lock(&events).push(event.clone()))
    }

    pub fn events(&self) -> Vec<AccountEvent> {
        lock(&self.events).clone()
    }
}

#[derive(Debug, Default)]
struct MockElement {
    tag: String,
    attributes: HashMap<String, String>,
    inner_html: String,
    parent: Option<ElementId>,
    hidden: bool,
    original_clicks: usize,
    notifications: Vec<Notification>,
}

impl MockElement {
    fn matches(&self, selector: &str) -> bool {
        if let Some(id) = selector.strip_prefix('#') {
            return self.attributes.get("id").map(String::as_str) == Some(id);
        }

        let mut parts = selector.split('.');
        let tag = parts.next().unwrap_or_default();
        if !tag.is_empty() && tag != self.tag {
            return false;
        }
        let classes: Vec<&str> = self
            .attributes
            .get("class")
            .map(|class| class.split_whitespace().collect())
            .unwrap_or_default();
        parts.all(|class| classes.contains(&class))
    }
}

#[derive(Default)]
struct PageState {
    title: Option<String>,
    next_id: ElementId,
    elements: BTreeMap<ElementId, MockElement>,
    observers: Vec<UnboundedSender<Mutation>>,
    opened_urls: Vec<String>,
}

impl PageState {
    fn emit(&mut self, mutation: Mutation) {
        self.observers
            .retain(|observer| observer.send(mutation.clone()).is_ok());
    }

    fn insert(&mut self, element: MockElement) -> ElementId {
        self.next_id += 1;
        let id = self.next_id;
        self.elements.insert(id, element);
        self.emit(Mutation::NodesAdded);
        id
    }
}

/// Document stand-in with a live mutation feed.
#[derive(Default)]
pub struct MockPage {
    state: Mutex<PageState>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(self, title: &str) -> Self {
        lock(&self.state).title = Some(title.to_string());
        self
    }

    pub fn add_element(&self, tag: &str, attributes: &[(&str, &str)]) -> ElementId {
        lock(&self.state).insert(MockElement {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            ..Default::default()
        })
    }

    /// A `button.fairydust-button`, with `data-cost` when given.
    pub fn add_button(&self, label: &str, cost: Option<&str>) -> ElementId {
        let mut attributes = HashMap::from([("class".to_string(), "fairydust-button".to_string())]);
        if let Some(cost) = cost {
            attributes.insert("data-cost".to_string(), cost.to_string());
        }
        lock(&self.state).insert(MockElement {
            tag: "button".to_string(),
            attributes,
            inner_html: label.to_string(),
            ..Default::default()
        })
    }

    pub fn set_disabled(&self, element: ElementId, disabled: bool) {
        let mut state = lock(&self.state);
        if let Some(el) = state.elements.get_mut(&element) {
            if disabled {
                el.attributes
                    .insert("disabled".to_string(), String::new());
            } else {
                el.attributes.remove("disabled");
            }
        }
        state.emit(Mutation::AttributeChanged {
            element,
            name: "disabled".to_string(),
        });
    }

    pub fn is_hidden(&self, element: ElementId) -> bool {
        lock(&self.state)
            .elements
            .get(&element)
            .is_some_and(|el| el.hidden)
    }

    pub fn parent(&self, element: ElementId) -> Option<ElementId> {
        lock(&self.state)
            .elements
            .get(&element)
            .and_then(|el| el.parent)
    }

    pub fn original_clicks(&self, element: ElementId) -> usize {
        lock(&self.state)
            .elements
            .get(&element)
            .map_or(0, |el| el.original_clicks)
    }

    pub fn notifications(&self, element: ElementId) -> Vec<Notification> {
        lock(&self.state)
            .elements
            .get(&element)
            .map(|el| el.notifications.clone())
            .unwrap_or_default()
    }

    pub fn notification_names(&self, element: ElementId) -> Vec<String> {
        self.notifications(element)
            .iter()
            .map(|notification| notification.event_name().to_string())
            .collect()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        lock(&self.state).opened_urls.clone()
    }
}

impl Page for MockPage {
    fn find(&self, selector: &str) -> Vec<ElementId> {
        lock(&self.state)
            .elements
            .iter()
            .filter(|(_, el)| el.matches(selector))
            .map(|(id, _)| *id)
            .collect()
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        lock(&self.state)
            .elements
            .get(&element)
            .and_then(|el| el.attributes.get(name).cloned())
    }

    fn set_attribute(&self, element: ElementId, name: &str, value: &str) {
        let mut state = lock(&self.state);
        if let Some(el) = state.elements.get_mut(&element) {
            el.attributes.insert(name.to_string(), value.to_string());
        }
        state.emit(Mutation::AttributeChanged {
            element,
            name: name.to_string(),
        });
    }

    fn inner_html(&self, element: ElementId) -> String {
        lock(&self.state)
            .elements
            .get(&element)
            .map(|el| el.inner_html.clone())
            .unwrap_or_default()
    }

    fn title(&self) -> Option<String> {
        lock(&self.state).title.clone()
    }

    fn wrap_and_hide(&self, element: ElementId) -> ElementId {
        let mut state = lock(&self.state);
        let container = state.insert(MockElement {
            tag: "div".to_string(),
            attributes: HashMap::from([(
                "class".to_string(),
                "fairydust-button-wrapper".to_string(),
            )]),
            ..Default::default()
        });
        if let Some(el) = state.elements.get_mut(&element) {
            el.parent = Some(container);
            el.hidden = true;
        }
        container
    }

    fn invoke_original_click(&self, element: ElementId) {
        if let Some(el) = lock(&self.state).elements.get_mut(&element) {
            el.original_clicks += 1;
        }
    }

    fn dispatch(&self, element: ElementId, notification: Notification) {
        if let Some(el) = lock(&self.state).elements.get_mut(&element) {
            el.notifications.push(notification);
        }
    }

    fn open_url(&self, url: &str) {
        lock(&self.state).opened_urls.push(url.to_string());
    }

    fn observe(&self) -> UnboundedReceiver<Mutation> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.state).observers.push(tx);
        rx
    }
}
