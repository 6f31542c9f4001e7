use fairydust_api::endpoints::transactions::Transaction;
use tokio::sync::mpsc::UnboundedReceiver;

/// Handle to an element owned by the host page.
pub type ElementId = u64;

/// Custom events dispatched on an enhanced button's original element.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Success(Transaction),
    Error(String),
}

impl Notification {
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::Success(_) => "fairydust:success",
            Notification::Error(_) => "fairydust:error",
        }
    }
}

/// Change reported by the page's mutation feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Nodes were added somewhere under the body.
    NodesAdded,
    AttributeChanged { element: ElementId, name: String },
}

/// What the toolkit needs from the document it is embedded in.
pub trait Page: Send + Sync {
    /// Elements matching a CSS selector, in document order.
    fn find(&self, selector: &str) -> Vec<ElementId>;

    fn attribute(&self, element: ElementId, name: &str) -> Option<String>;

    fn set_attribute(&self, element: ElementId, name: &str, value: &str);

    fn inner_html(&self, element: ElementId) -> String;

    fn title(&self) -> Option<String>;

    /// Wrap `element` in a fresh container, hide it, and return the container.
    fn wrap_and_hide(&self, element: ElementId) -> ElementId;

    /// Run the click handler the element carried before enhancement.
    fn invoke_original_click(&self, element: ElementId);

    fn dispatch(&self, element: ElementId, notification: Notification);

    fn open_url(&self, url: &str);

    /// Subscribe to node additions and attribute changes.
    fn observe(&self) -> UnboundedReceiver<Mutation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(
            Notification::Error("boom".to_string()).event_name(),
            "fairydust:error"
        );
    }
}
