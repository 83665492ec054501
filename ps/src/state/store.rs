//! PlanStore - the plan-state sink
//!
//! Holds the latest plan snapshot and the generation-complete flag, published
//! through a `watch` channel so observers always see the newest state.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::Plan;

/// The two updates a session pushes into application state
pub trait PlanSink: Send + Sync {
    /// Overwrite the current plan snapshot wholesale
    fn replace_snapshot(&self, snapshot: Value);

    /// Flag the current generation as finished
    fn mark_complete(&self);
}

/// Current plan state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanState {
    /// Latest snapshot; `None` until the first plan update
    pub snapshot: Option<Value>,
    /// Set by the `completed` event
    pub complete: bool,
    /// Bumped on every snapshot replacement
    pub revision: u64,
    /// How many times completion was signalled
    pub completions: u64,
}

/// In-memory [`PlanSink`] with change notification
#[derive(Clone)]
pub struct PlanStore {
    tx: Arc<watch::Sender<PlanState>>,
}

impl Default for PlanStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanStore {
    pub fn new() -> Self {
        debug!("PlanStore::new: called");
        let (tx, _) = watch::channel(PlanState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Copy of the full state
    pub fn state(&self) -> PlanState {
        self.tx.borrow().clone()
    }

    /// Latest snapshot, if any
    pub fn snapshot(&self) -> Option<Value> {
        self.tx.borrow().snapshot.clone()
    }

    /// Typed view of the latest snapshot
    pub fn plan(&self) -> Option<Plan> {
        self.tx.borrow().snapshot.as_ref().map(Plan::from_snapshot)
    }

    pub fn is_complete(&self) -> bool {
        self.tx.borrow().complete
    }

    /// Watch every state change
    pub fn subscribe(&self) -> watch::Receiver<PlanState> {
        self.tx.subscribe()
    }

    /// Resolve once the generation is marked complete
    pub async fn wait_complete(&self) -> PlanState {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|state| state.complete).await {
            Ok(state) => state.clone(),
            // Unreachable while `self` holds the sender
            Err(_) => self.state(),
        }
    }

    /// Clear everything before a new generation
    pub fn reset(&self) {
        debug!("PlanStore::reset: called");
        self.tx.send_replace(PlanState::default());
    }
}

impl PlanSink for PlanStore {
    fn replace_snapshot(&self, snapshot: Value) {
        self.tx.send_modify(|state| {
            state.snapshot = Some(snapshot);
            state.revision += 1;
            debug!(revision = state.revision, "PlanStore::replace_snapshot: stored");
        });
    }

    fn mark_complete(&self) {
        self.tx.send_modify(|state| {
            state.complete = true;
            state.completions += 1;
        });
        info!("Plan generation marked complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_starts_empty() {
        let store = PlanStore::new();
        assert_eq!(store.state(), PlanState::default());
        assert!(store.snapshot().is_none());
        assert!(store.plan().is_none());
        assert!(!store.is_complete());
    }

    #[test]
    fn test_replace_overwrites_not_merges() {
        let store = PlanStore::new();
        store.replace_snapshot(json!({"title": "A", "days": [1]}));
        store.replace_snapshot(json!({"budget": 300}));

        assert_eq!(store.snapshot(), Some(json!({"budget": 300})));
        assert_eq!(store.state().revision, 2);
    }

    #[test]
    fn test_mark_complete_counts() {
        let store = PlanStore::new();
        store.mark_complete();
        let state = store.state();
        assert!(state.complete);
        assert_eq!(state.completions, 1);
    }

    #[test]
    fn test_reset() {
        let store = PlanStore::new();
        store.replace_snapshot(json!({"title": "A"}));
        store.mark_complete();
        store.reset();
        assert_eq!(store.state(), PlanState::default());
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let store = PlanStore::new();
        let mut rx = store.subscribe();

        store.replace_snapshot(json!({"title": "B"}));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().snapshot, Some(json!({"title": "B"})));
    }

    #[tokio::test]
    async fn test_wait_complete() {
        let store = PlanStore::new();
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_complete().await })
        };

        store.replace_snapshot(json!({"title": "C"}));
        store.mark_complete();

        let state = waiter.await.unwrap();
        assert!(state.complete);
        assert_eq!(state.snapshot, Some(json!({"title": "C"})));
    }
}
