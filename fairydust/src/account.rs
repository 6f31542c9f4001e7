use crate::flows::auth::{AuthFlow, AuthInput, AuthStep};
use fairydust_api::endpoints::{users::User, Dust};
use fairydust_auth::DustApi;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    Connected(User),
    Disconnected,
    BalanceUpdated(Dust),
}

pub type EventCallback = Arc<dyn Fn(&AccountEvent) + Send + Sync>;

#[derive(Debug)]
pub enum WidgetOverlay {
    Closed,
    /// Balance, top-up link and the disconnect action.
    Details,
    Authenticating(Box<AuthFlow>),
}

/// Passive account badge: shows who is connected and their balance.
pub struct AccountWidget {
    api: Arc<dyn DustApi>,
    user: Option<User>,
    overlay: WidgetOverlay,
    on_event: EventCallback,
}

impl AccountWidget {
    pub fn new(api: Arc<dyn DustApi>, on_event: EventCallback) -> Self {
        Self {
            api,
            user: None,
            overlay: WidgetOverlay::Closed,
            on_event,
        }
    }

    /// Derive the initial connection state.
    pub async fn init(&mut self) {
        self.refresh().await;
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.user.is_some()
    }

    pub fn balance(&self) -> Option<Dust> {
        self.user.as_ref().map(|user| user.dust_balance)
    }

    pub fn overlay(&self) -> &WidgetOverlay {
        &self.overlay
    }

    pub fn top_up_url(&self) -> &str {
        &self.api.settings().top_up_url
    }

    pub fn site_url(&self) -> &str {
        &self.api.settings().site_url
    }

    /// Re-derive connected/disconnected from a fresh user fetch. Any failure
    /// counts as disconnected.
    pub async fn refresh(&mut self) {
        if !self.api.is_authenticated() {
            self.set_disconnected();
            return;
        }

        match self.api.current_user().await {
            Ok(user) => self.set_connected(user),
            Err(e) => {
                tracing::debug!("Account refresh failed: {}", e);
                self.set_disconnected();
            }
        }
    }

    /// Open details when connected, sign-in otherwise.
    pub fn click(&mut self) {
        self.overlay = if self.is_connected() {
            WidgetOverlay::Details
        } else {
            WidgetOverlay::Authenticating(Box::new(AuthFlow::new(self.api.clone())))
        };
    }

    pub async fn auth(&mut self, input: AuthInput) {
        let WidgetOverlay::Authenticating(flow) = &mut self.overlay else {
            return;
        };
        flow.handle(input).await;

        let user = match flow.step() {
            AuthStep::Success(outcome) => outcome.user.clone(),
            AuthStep::Cancelled => {
                self.overlay = WidgetOverlay::Closed;
                return;
            }
            AuthStep::Input | AuthStep::CodeEntry => return,
        };

        self.overlay = WidgetOverlay::Closed;
        self.set_connected(user);
    }

    /// Log out remotely (best effort) and forget local credentials.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.api.logout().await {
            tracing::warn!("Logout failed: {}", e);
            if let Err(e) = self.api.clear_credentials() {
                tracing::warn!("Failed to clear credentials: {}", e);
            }
        }
        self.overlay = WidgetOverlay::Closed;
        self.set_disconnected();
    }

    pub fn close_overlay(&mut self) {
        self.overlay = WidgetOverlay::Closed;
    }

    fn set_connected(&mut self, user: User) {
        let event = match &self.user {
            Some(previous) if previous.id == user.id => {
                if previous.dust_balance == user.dust_balance {
                    None
                } else {
                    Some(AccountEvent::BalanceUpdated(user.dust_balance))
                }
            }
            _ => Some(AccountEvent::Connected(user.clone())),
        };

        self.user = Some(user);
        if let Some(event) = event {
            (self.on_event)(&event);
        }
    }

    fn set_disconnected(&mut self) {
        if self.user.take().is_some() {
            (self.on_event)(&AccountEvent::Disconnected);
        }
    }
}

impl fmt::Debug for AccountWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountWidget")
            .field("user", &self.user)
            .field("overlay", &self.overlay)
            .finish()
    }
}

pub type SharedAccount = Arc<tokio::sync::Mutex<AccountWidget>>;

/// Account widgets mounted by one context, refreshed together after a
/// successful debit.
#[derive(Clone, Default)]
pub struct AccountRegistry {
    widgets: Arc<Mutex<Vec<SharedAccount>>>,
}

impl AccountRegistry {
    pub fn register(&self, widget: AccountWidget) -> SharedAccount {
        let widget = Arc::new(tokio::sync::Mutex::new(widget));
        self.lock_widgets().push(widget.clone());
        widget
    }

    pub fn len(&self) -> usize {
        self.lock_widgets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_widgets().is_empty()
    }

    pub async fn refresh_all(&self) {
        // Snapshot so no std guard is held across the awaits
        let widgets = self.lock_widgets().clone();
        tracing::debug!("Refreshing {} account widget(s)", widgets.len());
        for widget in widgets {
            widget.lock().await.refresh().await;
        }
    }

    fn lock_widgets(&self) -> std::sync::MutexGuard<'_, Vec<SharedAccount>> {
        self.widgets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
