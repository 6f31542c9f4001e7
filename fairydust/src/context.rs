use crate::account::{AccountRegistry, AccountWidget, EventCallback, SharedAccount};
use crate::flows::auth::AuthFlow;
use crate::flows::payment::{OutcomeCallback, PaymentFlow, PaymentProps};
use crate::page::{ElementId, Page};
use crate::watcher::Watcher;
use fairydust_api::endpoints::users::User;
use fairydust_auth::{AuthError, DustApi, Session, Settings, Storage};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Element hosting the account widget.
pub const ACCOUNT_SELECTOR: &str = "#fairydust-account";

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Connected(User),
    Disconnected,
}

/// Handles returned by [`Fairydust::attach`].
pub struct Attached {
    pub watcher: Watcher,
    /// Background mutation loop; ends when the page's feed closes.
    pub task: JoinHandle<()>,
    pub account: Option<(ElementId, SharedAccount)>,
}

/// Application context shared by every widget of one embed.
#[derive(Clone)]
pub struct Fairydust {
    api: Arc<dyn DustApi>,
    accounts: AccountRegistry,
}

impl Fairydust {
    pub fn new(settings: Settings, storage: Arc<dyn Storage>) -> Result<Self, AuthError> {
        let session = Session::new(settings, storage)?;
        Ok(Self::with_api(Arc::new(session)))
    }

    pub fn with_api(api: Arc<dyn DustApi>) -> Self {
        Self {
            api,
            accounts: AccountRegistry::default(),
        }
    }

    pub fn api(&self) -> &Arc<dyn DustApi> {
        &self.api
    }

    pub fn settings(&self) -> &Settings {
        self.api.settings()
    }

    /// Connection state from a fresh user fetch. A rejected token is
    /// cleared.
    pub async fn auth_state(&self) -> AuthState {
        if !self.api.is_authenticated() {
            return AuthState::Disconnected;
        }
        match self.api.current_user().await {
            Ok(user) => AuthState::Connected(user),
            Err(AuthError::Unauthenticated) => {
                if let Err(e) = self.api.clear_credentials() {
                    tracing::warn!("Failed to clear credentials: {}", e);
                }
                AuthState::Disconnected
            }
            Err(e) => {
                tracing::debug!("Could not load account: {}", e);
                AuthState::Disconnected
            }
        }
    }

    /// Payment flow for one button; the configured app name fills in a
    /// missing one.
    pub fn payment_flow(&self, mut props: PaymentProps, on_outcome: OutcomeCallback) -> PaymentFlow {
        if props.app_name.is_none() {
            props.app_name = self.settings().app_name.clone();
        }
        PaymentFlow::new(self.api.clone(), props, on_outcome)
    }

    pub fn authentication_flow(&self) -> AuthFlow {
        AuthFlow::new(self.api.clone())
    }

    /// New account widget, registered so payments made through this
    /// context keep its balance current.
    pub fn account_widget(&self, on_event: EventCallback) -> SharedAccount {
        self.accounts
            .register(AccountWidget::new(self.api.clone(), on_event))
    }

    pub async fn refresh_account_widgets(&self) {
        self.accounts.refresh_all().await;
    }

    pub fn watcher(&self, page: Arc<dyn Page>) -> Watcher {
        Watcher::new(self.api.clone(), page).with_accounts(self.accounts.clone())
    }

    /// Enhance the page's buttons, keep watching it, and mount the account
    /// widget when the page has a host element for it.
    pub async fn attach(&self, page: Arc<dyn Page>, on_event: EventCallback) -> Attached {
        let watcher = self.watcher(page.clone());
        let enhanced = watcher.scan();
        let task = watcher.start();
        tracing::info!("Attached to page, {} button(s) enhanced", enhanced);

        let account = match page.find(ACCOUNT_SELECTOR).first() {
            Some(&element) => {
                let widget = self.account_widget(on_event);
                widget.lock().await.init().await;
                Some((element, widget))
            }
            None => None,
        };

        Attached {
            watcher,
            task,
            account,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountEvent;
    use crate::flows::payment::PaymentInput;
    use crate::testing::{EventLog, MockApi, MockPage, OutcomeLog};
    use fairydust_api::endpoints::Dust;
    use std::time::Duration;

    #[tokio::test]
    async fn test_auth_state() {
        let api = Arc::new(MockApi::new());
        let fairydust = Fairydust::with_api(api.clone());
        assert_eq!(fairydust.auth_state().await, AuthState::Disconnected);

        api.sign_in();
        assert!(matches!(
            fairydust.auth_state().await,
            AuthState::Connected(_)
        ));

        api.expire_token();
        assert_eq!(fairydust.auth_state().await, AuthState::Disconnected);
        assert!(!api.is_authenticated());
    }

    #[test]
    fn test_payment_flow_uses_configured_app_name() {
        let api = Arc::new(MockApi::new());
        let fairydust = Fairydust::with_api(api);
        let log = OutcomeLog::default();

        let flow = fairydust.payment_flow(PaymentProps::new(Dust::new(2), "Draw"), log.callback());
        assert_eq!(flow.props().action(), "Draw - App");
    }

    #[tokio::test]
    async fn test_attach_mounts_account_widget() {
        let api = Arc::new(MockApi::new().signed_in());
        let page = Arc::new(MockPage::new());
        page.add_button("Generate", Some("3"));
        let host = page.add_element("div", &[("id", "fairydust-account")]);
        let log = EventLog::default();

        let attached = Fairydust::with_api(api)
            .attach(page.clone(), log.callback())
            .await;

        assert_eq!(attached.watcher.binding_count(), 1);
        let (element, widget) = attached.account.expect("account widget");
        assert_eq!(element, host);
        assert!(widget.lock().await.is_connected());
        attached.task.abort();
    }

    #[tokio::test]
    async fn test_refresh_account_widgets() {
        let api = Arc::new(MockApi::new().signed_in());
        let fairydust = Fairydust::with_api(api.clone());
        let log = EventLog::default();
        let widget = fairydust.account_widget(log.callback());
        widget.lock().await.init().await;

        api.set_balance(3);
        fairydust.refresh_account_widgets().await;

        assert_eq!(widget.lock().await.balance(), Some(Dust::new(3)));
        assert_eq!(
            log.events().last(),
            Some(&AccountEvent::BalanceUpdated(Dust::new(3)))
        );
    }

    #[tokio::test]
    async fn test_enhanced_payment_updates_account_widget() {
        let api = Arc::new(MockApi::new().signed_in());
        let page = Arc::new(MockPage::new());
        let button = page.add_button("Generate", Some("5"));
        page.add_element("div", &[("id", "fairydust-account")]);
        let log = EventLog::default();

        let attached = Fairydust::with_api(api)
            .attach(page.clone(), log.callback())
            .await;
        let (_, widget) = attached.account.expect("account widget");
        assert_eq!(widget.lock().await.balance(), Some(Dust::new(25)));

        assert!(attached.watcher.click(button).await);
        assert!(
            attached
                .watcher
                .input(button, PaymentInput::Confirm { skip_future: false })
                .await
        );

        tokio::time::timeout(Duration::from_secs(1), async {
            while widget.lock().await.balance() != Some(Dust::new(20)) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("account widget refreshed");
        assert_eq!(
            log.events().last(),
            Some(&AccountEvent::BalanceUpdated(Dust::new(20)))
        );
        attached.task.abort();
    }

    #[tokio::test]
    async fn test_attach_without_account_host() {
        let api = Arc::new(MockApi::new());
        let page = Arc::new(MockPage::new());

        let attached = Fairydust::with_api(api)
            .attach(page, EventLog::default().callback())
            .await;

        assert!(attached.account.is_none());
        assert_eq!(attached.watcher.binding_count(), 0);
        attached.task.abort();
    }
}
