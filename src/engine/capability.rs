//! Caller-supplied behavior the engine invokes by name
//!
//! Graphs stay plain data: a state refers to `{"type": "custom", "capability": "collect"}`
//! or `"check": "belowLimit"`, and the implementations are registered on
//! [`Capabilities`] when the engine is built.

use crate::browser::Page;
use crate::checkpoint::CheckpointStore;
use crate::engine::state::ContextMap;
use crate::logging::Logger;
use crate::resolver::Resolution;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a custom action gets to work with besides the resolved elements
pub struct ActionContext<'a> {
    /// The page the run is driving, for reading the resolved elements
    pub page: &'a dyn Page,

    /// The run's accumulator data
    pub data: &'a mut ContextMap,

    pub notifier: &'a dyn ProgressNotifier,

    pub logger: &'a Logger,
}

/// Page-specific logic run as a state's action
///
/// Returning `false` counts as an action failure and routes to the state's
/// `fallback`, if any.
#[async_trait]
pub trait CustomAction: Send + Sync {
    async fn execute(&self, resolution: &Resolution, context: &mut ActionContext<'_>) -> bool;
}

#[async_trait]
impl<F> CustomAction for F
where
    F: Fn(&Resolution, &mut ContextMap) -> bool + Send + Sync,
{
    async fn execute(&self, resolution: &Resolution, context: &mut ActionContext<'_>) -> bool {
        self(resolution, &mut *context.data)
    }
}

/// Decision evaluated by a state's `check`
pub trait Predicate: Send + Sync {
    fn evaluate(&self, context: &mut ContextMap) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&mut ContextMap) -> bool + Send + Sync,
{
    fn evaluate(&self, context: &mut ContextMap) -> bool {
        self(context)
    }
}

/// Status sink for a host UI; only custom actions call it
pub trait ProgressNotifier: Send + Sync {
    fn notify(&self, message: &str, percent: f32);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ProgressNotifier for NoopNotifier {
    fn notify(&self, _message: &str, _percent: f32) {}
}

/// Writes progress to a [`Logger`]
#[derive(Debug, Clone)]
pub struct LogNotifier {
    logger: Logger,
}

impl LogNotifier {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl ProgressNotifier for LogNotifier {
    fn notify(&self, message: &str, percent: f32) {
        self.logger.info(format!("[{:>5.1}%] {}", percent, message));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub message: String,
    pub percent: f32,
}

/// Forwards progress over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Progress>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Progress>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressNotifier for ChannelNotifier {
    fn notify(&self, message: &str, percent: f32) {
        // a dropped receiver just means nobody is watching
        let _ = self.sender.send(Progress {
            message: message.to_string(),
            percent,
        });
    }
}

/// Named custom actions and predicates
#[derive(Clone, Default)]
pub struct Capabilities {
    actions: HashMap<String, Arc<dyn CustomAction>>,
    predicates: HashMap<String, Arc<dyn Predicate>>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, name: impl Into<String>, action: impl CustomAction + 'static) -> Self {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    pub fn with_predicate(mut self, name: impl Into<String>, predicate: impl Predicate + 'static) -> Self {
        self.predicates.insert(name.into(), Arc::new(predicate));
        self
    }

    pub fn action(&self, name: &str) -> Option<Arc<dyn CustomAction>> {
        self.actions.get(name).cloned()
    }

    pub fn predicate(&self, name: &str) -> Option<Arc<dyn Predicate>> {
        self.predicates.get(name).cloned()
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_predicate(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<_> = self.actions.keys().collect();
        let mut predicates: Vec<_> = self.predicates.keys().collect();
        actions.sort();
        predicates.sort();
        f.debug_struct("Capabilities")
            .field("actions", &actions)
            .field("predicates", &predicates)
            .finish()
    }
}

/// Everything the engine needs from its host, passed in explicitly
#[derive(Clone)]
pub struct AutomationContext {
    pub capabilities: Capabilities,
    pub notifier: Arc<dyn ProgressNotifier>,
    pub checkpoints: CheckpointStore,
    pub logger: Logger,
}

impl AutomationContext {
    /// No capabilities, no progress reporting, in-memory checkpoints
    pub fn new(logger: Logger) -> Self {
        Self {
            capabilities: Capabilities::new(),
            notifier: Arc::new(NoopNotifier),
            checkpoints: CheckpointStore::in_memory(logger.scoped("checkpoint")),
            logger,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_notifier(mut self, notifier: impl ProgressNotifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: CheckpointStore) -> Self {
        self.checkpoints = checkpoints;
        self
    }
}

impl Default for AutomationContext {
    fn default() -> Self {
        Self::new(Logger::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MemoryPage;
    use crate::dom::ElementNode;
    use serde_json::json;

    #[tokio::test]
    async fn test_closure_capabilities() {
        let caps = Capabilities::new()
            .with_action("count", |resolution: &Resolution, data: &mut ContextMap| {
                data.insert("seen".into(), json!(resolution.len()));
                true
            })
            .with_predicate("hasSeen", |data: &mut ContextMap| data.contains_key("seen"));

        let page = MemoryPage::new(ElementNode::new("body"));
        let logger = Logger::default();
        let mut data = ContextMap::new();

        assert!(!caps.predicate("hasSeen").unwrap().evaluate(&mut data));

        let action = caps.action("count").unwrap();
        let mut context = ActionContext {
            page: &page,
            data: &mut data,
            notifier: &NoopNotifier,
            logger: &logger,
        };
        assert!(action.execute(&Resolution::None, &mut context).await);

        assert_eq!(data["seen"], json!(0));
        assert!(caps.predicate("hasSeen").unwrap().evaluate(&mut data));
        assert!(caps.action("missing").is_none());
        assert!(!caps.has_predicate("missing"));
    }

    #[test]
    fn test_channel_notifier() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify("page 1", 25.0);
        assert_eq!(
            rx.try_recv().unwrap(),
            Progress {
                message: "page 1".into(),
                percent: 25.0
            }
        );

        drop(rx);
        notifier.notify("nobody listening", 50.0);
    }

    #[test]
    fn test_log_notifier_records() {
        let logger = Logger::default();
        LogNotifier::new(logger.clone()).notify("collected 3", 30.0);
        assert!(logger.history().records()[0].message.ends_with("collected 3"));
    }
}
