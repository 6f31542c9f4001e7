pub mod auth;
pub mod payment;

use crate::timers::DelayedActions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// How long an inline error stays visible.
pub const ERROR_DISMISS_DELAY: Duration = Duration::from_secs(5);

/// Minimum time the loading indication stays on after a debit starts.
pub const MIN_LOADING_DURATION: Duration = Duration::from_millis(1500);

const DISMISS_ERROR: &str = "dismiss-error";
const END_LOADING: &str = "end-loading";

/// Inline error message that clears itself after [`ERROR_DISMISS_DELAY`].
#[derive(Debug, Clone, Default)]
pub struct TransientMessage {
    message: Arc<RwLock<Option<String>>>,
}

impl TransientMessage {
    pub fn get(&self) -> Option<String> {
        self.message
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, message: Option<String>) {
        *self
            .message
            .write()
            .unwrap_or_else(PoisonError::into_inner) = message;
    }

    /// Shows `message`, restarting the dismissal timer.
    pub fn show(&self, message: impl Into<String>, timers: &mut DelayedActions) {
        self.set(Some(message.into()));
        let handle = self.clone();
        timers.schedule(DISMISS_ERROR, ERROR_DISMISS_DELAY, move || handle.set(None));
    }

    pub fn clear(&self, timers: &mut DelayedActions) {
        timers.cancel(DISMISS_ERROR);
        self.set(None);
    }
}

/// Loading flag that stays raised for at least [`MIN_LOADING_DURATION`],
/// independent of when the request completes.
#[derive(Debug, Clone, Default)]
pub struct LoadingIndicator {
    active: Arc<AtomicBool>,
}

impl LoadingIndicator {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn start(&self, timers: &mut DelayedActions) {
        self.active.store(true, Ordering::SeqCst);
        let active = self.active.clone();
        timers.schedule(END_LOADING, MIN_LOADING_DURATION, move || {
            active.store(false, Ordering::SeqCst)
        });
    }
}
