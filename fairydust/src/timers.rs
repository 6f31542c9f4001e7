use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Delayed actions owned by a flow instance.
///
/// Scheduling under an id that is still pending replaces the earlier action,
/// and everything still pending is aborted when the owner is dropped.
#[derive(Debug, Default)]
pub struct DelayedActions {
    tasks: HashMap<&'static str, JoinHandle<()>>,
}

impl DelayedActions {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Run `action` after `delay` unless cancelled first. Needs a tokio runtime.
    pub fn schedule<F>(&mut self, id: &'static str, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel(id);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });
        self.tasks.insert(id, handle);
    }

    pub fn cancel(&mut self, id: &'static str) {
        if let Some(handle) = self.tasks.remove(id) {
            handle.abort();
        }
    }

    pub fn is_pending(&self, id: &'static str) -> bool {
        self.tasks
            .get(id)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

impl Drop for DelayedActions {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
