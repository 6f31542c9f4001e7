pub mod account;
pub mod context;
pub mod flows;
pub mod logging;
pub mod page;
pub mod timers;
pub mod watcher;

pub use account::{AccountEvent, AccountRegistry, AccountWidget, SharedAccount, WidgetOverlay};
pub use context::{Attached, AuthState, Fairydust};
pub use flows::auth::{AuthFlow, AuthInput, AuthOutcome, AuthStep};
pub use flows::payment::{PaymentFlow, PaymentInput, PaymentOutcome, PaymentProps, PaymentState};
pub use page::{ElementId, Mutation, Notification, Page};
pub use watcher::Watcher;

// Always expose testing module (integration tests need it)
pub mod testing;
