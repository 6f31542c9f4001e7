use crate::account::AccountRegistry;
use crate::flows::payment::{OutcomeCallback, PaymentFlow, PaymentInput, PaymentOutcome, PaymentProps};
use crate::page::{ElementId, Mutation, Notification, Page};
use fairydust_api::endpoints::Dust;
use fairydust_auth::DustApi;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

pub const BUTTON_SELECTOR: &str = "button.fairydust-button";
pub const ENHANCED_ATTRIBUTE: &str = "data-fairydust-enhanced";
pub const COST_ATTRIBUTE: &str = "data-cost";
pub const DISABLED_ATTRIBUTE: &str = "disabled";

const DEFAULT_COST: i64 = 1;

pub type SharedFlow = Arc<tokio::sync::Mutex<PaymentFlow>>;

struct Binding {
    container: ElementId,
    flow: SharedFlow,
}

/// Turns marked page buttons into payment buttons and keeps them in sync
/// with the page.
#[derive(Clone)]
pub struct Watcher {
    api: Arc<dyn DustApi>,
    page: Arc<dyn Page>,
    bindings: Arc<Mutex<HashMap<ElementId, Binding>>>,
    // Held for a whole pass so check-and-enhance is atomic across scans
    scan_lock: Arc<Mutex<()>>,
    accounts: AccountRegistry,
}

impl Watcher {
    pub fn new(api: Arc<dyn DustApi>, page: Arc<dyn Page>) -> Self {
        Self {
            api,
            page,
            bindings: Arc::new(Mutex::new(HashMap::new())),
            scan_lock: Arc::new(Mutex::new(())),
            accounts: AccountRegistry::default(),
        }
    }

    /// Account widgets to refresh after each successful debit.
    pub fn with_accounts(mut self, accounts: AccountRegistry) -> Self {
        self.accounts = accounts;
        self
    }

    /// Enhance every eligible button not enhanced yet. Returns how many
    /// were enhanced by this pass.
    pub fn scan(&self) -> usize {
        let _scan = self.scan_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut enhanced = 0;

        for element in self.page.find(BUTTON_SELECTOR) {
            if self.page.attribute(element, ENHANCED_ATTRIBUTE).as_deref() == Some("true") {
                continue;
            }
            if self.lock_bindings().contains_key(&element) {
                continue;
            }

            let cost = match parse_cost(self.page.attribute(element, COST_ATTRIBUTE).as_deref()) {
                Ok(cost) => cost,
                Err(message) => {
                    tracing::warn!("Skipping button {}: {}", element, message);
                    continue;
                }
            };

            self.enhance(element, cost);
            enhanced += 1;
        }

        enhanced
    }

    fn enhance(&self, element: ElementId, cost: Dust) {
        let label = self.page.inner_html(element).trim().to_string();
        let disabled = self.page.attribute(element, DISABLED_ATTRIBUTE).is_some();
        let app_name = self
            .page
            .title()
            .filter(|title| !title.is_empty())
            .or_else(|| self.api.settings().app_name.clone());

        let mut props = PaymentProps::new(cost, label).disabled(disabled);
        props.app_name = app_name;

        // Marked before wrapping: the wrap itself emits NodesAdded
        self.page.set_attribute(element, ENHANCED_ATTRIBUTE, "true");
        let container = self.page.wrap_and_hide(element);
        let flow = PaymentFlow::new(self.api.clone(), props, self.outcome_handler(element));

        tracing::debug!("Enhanced button {} (cost {})", element, cost);
        self.lock_bindings().insert(
            element,
            Binding {
                container,
                flow: Arc::new(tokio::sync::Mutex::new(flow)),
            },
        );
    }

    /// Success chains the element's original click handler, notifies the
    /// host page and refreshes the account widgets.
    fn outcome_handler(&self, element: ElementId) -> OutcomeCallback {
        let page = self.page.clone();
        let accounts = self.accounts.clone();
        Arc::new(move |outcome: &PaymentOutcome| match outcome {
            PaymentOutcome::Succeeded(transaction) => {
                page.invoke_original_click(element);
                page.dispatch(element, Notification::Success(transaction.clone()));
                if !accounts.is_empty() {
                    let accounts = accounts.clone();
                    tokio::spawn(async move { accounts.refresh_all().await });
                }
            }
            PaymentOutcome::Failed(message) => {
                tracing::error!("Payment failed: {}", message);
                page.dispatch(element, Notification::Error(message.clone()));
            }
            PaymentOutcome::TopUpRequested(url) => page.open_url(url),
        })
    }

    /// Never waits on a busy flow; a disabled change for one is applied by a
    /// task once the flow is released.
    pub fn handle_mutation(&self, mutation: Mutation) {
        match mutation {
            Mutation::NodesAdded => {
                self.scan();
            }
            Mutation::AttributeChanged { element, name } if name == DISABLED_ATTRIBUTE => {
                let Some(flow) = self.flow(element) else {
                    return;
                };
                if let Ok(mut flow) = flow.try_lock() {
                    self.apply_disabled(element, &mut flow);
                    return;
                }

                tracing::debug!("Button {} busy, deferring disabled change", element);
                let watcher = self.clone();
                tokio::spawn(async move {
                    let mut flow = flow.lock().await;
                    watcher.apply_disabled(element, &mut flow);
                });
            }
            Mutation::AttributeChanged { .. } => {}
        }
    }

    // Reads the attribute when applied, so deferred updates land in order
    fn apply_disabled(&self, element: ElementId, flow: &mut PaymentFlow) {
        let disabled = self.page.attribute(element, DISABLED_ATTRIBUTE).is_some();
        tracing::debug!("Button {} disabled={}", element, disabled);
        flow.set_disabled(disabled);
    }

    pub async fn run(self, mut mutations: UnboundedReceiver<Mutation>) {
        while let Some(mutation) = mutations.recv().await {
            self.handle_mutation(mutation);
        }
        tracing::debug!("Mutation feed closed, watcher stopped");
    }

    /// Subscribe to the page and process mutations in the background.
    pub fn start(&self) -> JoinHandle<()> {
        let mutations = self.page.observe();
        tokio::spawn(self.clone().run(mutations))
    }

    /// Click an enhanced button. Returns false when the click was dropped
    /// because the button's flow is still busy.
    pub async fn click(&self, element: ElementId) -> bool {
        self.input(element, PaymentInput::Click).await
    }

    /// Deliver input to an enhanced button's flow. Input arriving while a
    /// request is in flight is dropped, never queued.
    pub async fn input(&self, element: ElementId, input: PaymentInput) -> bool {
        let Some(flow) = self.flow(element) else {
            return false;
        };
        let Ok(mut flow) = flow.try_lock() else {
            tracing::debug!("Button {} busy, ignoring {:?}", element, input);
            return false;
        };
        flow.handle(input).await;
        true
    }

    /// Whether the button's flow has a request in flight.
    pub fn is_busy(&self, element: ElementId) -> bool {
        self.flow(element)
            .is_some_and(|flow| flow.try_lock().is_err())
    }

    pub fn flow(&self, element: ElementId) -> Option<SharedFlow> {
        self.lock_bindings()
            .get(&element)
            .map(|binding| binding.flow.clone())
    }

    pub fn container(&self, element: ElementId) -> Option<ElementId> {
        self.lock_bindings()
            .get(&element)
            .map(|binding| binding.container)
    }

    pub fn binding_count(&self) -> usize {
        self.lock_bindings().len()
    }

    fn lock_bindings(&self) -> std::sync::MutexGuard<'_, HashMap<ElementId, Binding>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cost attribute: missing means 1, anything else must be a positive integer.
fn parse_cost(raw: Option<&str>) -> Result<Dust, String> {
    let Some(raw) = raw else {
        return Ok(Dust::new(DEFAULT_COST));
    };
    let cost: i64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid {} {:?}", COST_ATTRIBUTE, raw))?;
    if cost <= 0 {
        return Err(format!("{} must be positive, got {}", COST_ATTRIBUTE, cost));
    }
    Ok(Dust::new(cost))
}
