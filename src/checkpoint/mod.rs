//! Run checkpoints
//!
//! [`CheckpointStore`] snapshots a [`RunState`] under `"<namespace>:<run key>"` in any
//! [`KeyValueStore`]. Every operation is best effort: failures are logged and
//! never reach the run.

mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

use crate::engine::RunState;
use crate::logging::Logger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_NAMESPACE: &str = "fsm_checkpoint";

/// A [`RunState`] stamped with the time it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub state: RunState,
}

impl Checkpoint {
    pub fn new(state: RunState) -> Self {
        Self {
            timestamp: Utc::now(),
            state,
        }
    }

    /// The run state to resume from
    pub fn into_state(self) -> RunState {
        self.state
    }
}

/// Namespaced checkpoint persistence over a [`KeyValueStore`]
#[derive(Clone)]
pub struct CheckpointStore {
    backend: Arc<dyn KeyValueStore>,
    namespace: String,
    logger: Logger,
}

impl CheckpointStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, logger: Logger) -> Self {
        Self {
            backend,
            namespace: DEFAULT_NAMESPACE.to_string(),
            logger,
        }
    }

    /// In-memory store, mostly for tests
    pub fn in_memory(logger: Logger) -> Self {
        Self::new(Arc::new(MemoryStore::new()), logger)
    }

    /// Builder method: set key namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Backend key for `run_key`
    pub fn key(&self, run_key: &str) -> String {
        format!("{}:{}", self.namespace, run_key)
    }

    /// Overwrite the checkpoint for `run_key`
    pub async fn save(&self, run_key: &str, state: &RunState) {
        let key = self.key(run_key);
        let value = match serde_json::to_value(Checkpoint::new(state.clone())) {
            Ok(value) => value,
            Err(e) => {
                self.logger.error(format!("Failed to serialize checkpoint {}: {}", key, e));
                return;
            }
        };

        match self.backend.set(&key, value).await {
            Ok(()) => self.logger.trace(format!("checkpoint {} at '{}'", key, state.current)),
            Err(e) => self.logger.error(format!("Failed to save checkpoint {}: {}", key, e)),
        }
    }

    /// The last checkpoint for `run_key`, if one exists and is readable
    pub async fn load(&self, run_key: &str) -> Option<Checkpoint> {
        let key = self.key(run_key);
        let value = match self.backend.get(&key).await {
            Ok(value) => value?,
            Err(e) => {
                self.logger.error(format!("Failed to load checkpoint {}: {}", key, e));
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                self.logger.warn(format!("Ignoring unreadable checkpoint {}: {}", key, e));
                None
            }
        }
    }

    pub async fn clear(&self, run_key: &str) {
        let key = self.key(run_key);
        if let Err(e) = self.backend.remove(&key).await {
            self.logger.error(format!("Failed to clear checkpoint {}: {}", key, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ContextMap;
    use crate::error::{AutomationError, Result};
    use crate::logging::LogHistory;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn set(&self, _key: &str, _value: Value) -> Result<()> {
            Err(AutomationError::Storage("quota exceeded".into()))
        }

        async fn get(&self, _key: &str) -> Result<Option<Value>> {
            Err(AutomationError::Storage("unavailable".into()))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(AutomationError::Storage("unavailable".into()))
        }
    }

    fn sample_state() -> RunState {
        let mut context = ContextMap::new();
        context.insert("count".into(), json!(2));
        context.insert("names".into(), json!(["Ada", "Grace"]));
        let mut state = RunState::new("A", context);
        state.transition_to("B");
        state
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = CheckpointStore::in_memory(Logger::default());
        let state = sample_state();

        store.save("run-1", &state).await;
        let checkpoint = store.load("run-1").await.unwrap();
        assert_eq!(checkpoint.state, state);

        let raw = store.backend().get("fsm_checkpoint:run-1").await.unwrap().unwrap();
        assert!(raw.get("timestamp").is_some());
        assert_eq!(raw["current"], "B");
        assert_eq!(raw["history"], json!(["A"]));

        assert_eq!(checkpoint.into_state(), state);
    }

    #[tokio::test]
    async fn test_namespaces_do_not_collide() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let a = CheckpointStore::new(Arc::clone(&backend), Logger::default()).with_namespace("site_a");
        let b = CheckpointStore::new(backend, Logger::default()).with_namespace("site_b");

        a.save("run", &RunState::new("A", ContextMap::new())).await;
        assert!(b.load("run").await.is_none());
        assert_eq!(a.load("run").await.unwrap().state.current, "A");

        a.clear("run").await;
        assert!(a.load("run").await.is_none());
    }

    #[tokio::test]
    async fn test_backend_failures_are_logged_only() {
        let history = LogHistory::shared(10);
        let store = CheckpointStore::new(Arc::new(BrokenStore), Logger::new("checkpoint", Arc::clone(&history)));

        store.save("run", &sample_state()).await;
        assert!(store.load("run").await.is_none());
        store.clear("run").await;

        assert_eq!(history.len(), 3);
        assert!(history.records().iter().all(|r| r.level == log::Level::Error));
    }

    #[tokio::test]
    async fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(Arc::new(FileStore::new(dir.path())), Logger::default());

        store.save("connections", &sample_state()).await;
        let reopened = CheckpointStore::new(Arc::new(FileStore::new(dir.path())), Logger::default());
        assert_eq!(reopened.load("connections").await.unwrap().state, sample_state());
    }

    #[tokio::test]
    async fn test_file_backed_run_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
        let store = CheckpointStore::new(Arc::clone(&backend), Logger::default());

        store.save("site/a", &RunState::new("fromSlash", ContextMap::new())).await;
        store.save("site_a", &RunState::new("fromUnderscore", ContextMap::new())).await;
        assert_eq!(store.load("site/a").await.unwrap().state.current, "fromSlash");
        assert_eq!(store.load("site_a").await.unwrap().state.current, "fromUnderscore");

        let other = CheckpointStore::new(backend, Logger::default()).with_namespace("fsm:checkpoint");
        other.save("a", &RunState::new("other", ContextMap::new())).await;
        assert_eq!(store.with_namespace("fsm_checkpoint").load("a").await.map(|c| c.state.current), None);
        assert_eq!(other.load("a").await.unwrap().state.current, "other");
    }
}
