//! Message dispatcher - inbound frame to state update
//!
//! Stateless across frames and last-write-wins: every qualifying plan update
//! replaces the snapshot wholesale. Nothing is buffered, merged or reordered.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::events::EventEmitter;
use crate::protocol::{InboundEvent, is_present};
use crate::state::PlanSink;

/// What the session should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    /// `completed` arrived; close the connection
    Complete,
}

/// Per-session dispatch counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    frames: AtomicU64,
    snapshots: AtomicU64,
    empty_updates: AtomicU64,
    malformed: AtomicU64,
    unrecognized: AtomicU64,
    server_errors: AtomicU64,
    status: AtomicU64,
    progress: AtomicU64,
    completions: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchCounts {
    pub frames: u64,
    pub snapshots: u64,
    pub empty_updates: u64,
    pub malformed: u64,
    pub unrecognized: u64,
    pub server_errors: u64,
    pub status: u64,
    pub progress: u64,
    pub completions: u64,
}

impl DispatchCounts {
    /// Frames that were dropped without touching state
    pub fn dropped(&self) -> u64 {
        self.malformed + self.unrecognized
    }
}

impl DispatchStats {
    pub fn counts(&self) -> DispatchCounts {
        DispatchCounts {
            frames: self.frames.load(Ordering::Relaxed),
            snapshots: self.snapshots.load(Ordering::Relaxed),
            empty_updates: self.empty_updates.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            status: self.status.load(Ordering::Relaxed),
            progress: self.progress.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Routes classified frames into a [`PlanSink`]
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn PlanSink>,
    emitter: EventEmitter,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn PlanSink>, emitter: EventEmitter) -> Self {
        debug!(session_id = emitter.session_id(), "Dispatcher::new: called");
        Self {
            sink,
            emitter,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Parse, classify and apply one raw text frame
    ///
    /// Malformed frames are logged, counted and dropped; they never reach the
    /// caller or the sink.
    pub fn handle_frame(&self, raw: &str) -> Disposition {
        let session_id = self.emitter.session_id();
        debug!(%session_id, len = raw.len(), "handle_frame: called");
        bump(&self.stats.frames);
        self.emitter.frame_received(raw);

        match InboundEvent::parse(raw) {
            Ok(event) => self.handle_event(event),
            Err(e) => {
                warn!(%session_id, error = %e, "Dropping malformed frame");
                bump(&self.stats.malformed);
                self.emitter.frame_dropped(&e.to_string());
                Disposition::Continue
            }
        }
    }

    /// Apply one classified event
    pub fn handle_event(&self, event: InboundEvent) -> Disposition {
        let session_id = self.emitter.session_id();
        match event {
            InboundEvent::PlanUpdate { kind, response } => {
                match response.filter(is_present) {
                    Some(payload) => {
                        debug!(%session_id, %kind, "handle_event: replacing snapshot");
                        self.sink.replace_snapshot(payload);
                        bump(&self.stats.snapshots);
                        self.emitter.snapshot_replaced(kind);
                    }
                    None => {
                        debug!(%session_id, %kind, "handle_event: update without payload, ignoring");
                        bump(&self.stats.empty_updates);
                    }
                }
                Disposition::Continue
            }
            InboundEvent::Completed => {
                info!(%session_id, "Plan generation completed");
                self.sink.mark_complete();
                bump(&self.stats.completions);
                self.emitter.completed();
                Disposition::Complete
            }
            InboundEvent::Error { message, response } => {
                let text = message
                    .or_else(|| response.map(|r| r.to_string()))
                    .unwrap_or_else(|| "unspecified server error".to_string());
                error!(%session_id, error = %text, "Server reported error");
                bump(&self.stats.server_errors);
                self.emitter.server_error(&text);
                Disposition::Continue
            }
            InboundEvent::Status { message } => {
                let text = message.unwrap_or_default();
                info!(%session_id, status = %text, "Server status");
                bump(&self.stats.status);
                self.emitter.status(&text);
                Disposition::Continue
            }
            InboundEvent::Progress { message } => {
                let text = message.unwrap_or_default();
                info!(%session_id, progress = %text, "Server progress");
                bump(&self.stats.progress);
                self.emitter.progress(&text);
                Disposition::Continue
            }
            InboundEvent::Unrecognized { kind } => {
                warn!(%session_id, %kind, "Ignoring unrecognized frame type");
                bump(&self.stats.unrecognized);
                self.emitter.frame_unrecognized(&kind);
                Disposition::Continue
            }
        }
    }
}

/// Result of [`dispatch_frames`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Frames consumed, including the terminal one
    pub frames_handled: usize,
    pub completed: bool,
}

/// Feed a sequence of raw frames through a dispatcher, stopping at `completed`
pub fn dispatch_frames<I, S>(dispatcher: &Dispatcher, frames: I) -> DispatchOutcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut outcome = DispatchOutcome {
        frames_handled: 0,
        completed: false,
    };
    for raw in frames {
        outcome.frames_handled += 1;
        if dispatcher.handle_frame(raw.as_ref()) == Disposition::Complete {
            outcome.completed = true;
            break;
        }
    }
    debug!(?outcome, "dispatch_frames: done");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, SessionEvent};
    use crate::state::PlanStore;
    use proptest::prelude::*;
    use serde_json::json;

    fn dispatcher() -> (Dispatcher, PlanStore) {
        let store = PlanStore::new();
        let dispatcher = Dispatcher::new(Arc::new(store.clone()), EventEmitter::detached("test"));
        (dispatcher, store)
    }

    #[test]
    fn test_plan_created_replaces_snapshot() {
        let (dispatcher, store) = dispatcher();
        let d = dispatcher.handle_frame(r#"{"type":"plan_created","response":{"title":"Pokhara Trip"}}"#);
        assert_eq!(d, Disposition::Continue);
        assert_eq!(store.snapshot(), Some(json!({"title": "Pokhara Trip"})));
    }

    #[test]
    fn test_updates_overwrite_not_merge() {
        let (dispatcher, store) = dispatcher();
        dispatcher.handle_frame(r#"{"type":"plan_created","response":{"title":"T","days":[]}}"#);
        dispatcher.handle_frame(r#"{"type":"day_added","response":{"days":[{"day":1}]}}"#);
        assert_eq!(store.snapshot(), Some(json!({"days": [{"day": 1}]})));

        dispatcher.handle_frame(r#"{"type":"step_added","response":{"title":"T2"}}"#);
        assert_eq!(store.snapshot(), Some(json!({"title": "T2"})));
        assert_eq!(dispatcher.stats().counts().snapshots, 3);
    }

    #[test]
    fn test_update_without_payload_keeps_snapshot() {
        let (dispatcher, store) = dispatcher();
        dispatcher.handle_frame(r#"{"type":"plan_created","response":{"title":"Keep"}}"#);
        dispatcher.handle_frame(r#"{"type":"day_added"}"#);
        dispatcher.handle_frame(r#"{"type":"step_added","response":null}"#);
        dispatcher.handle_frame(r#"{"type":"step_added","response":""}"#);

        assert_eq!(store.snapshot(), Some(json!({"title": "Keep"})));
        assert_eq!(dispatcher.stats().counts().empty_updates, 3);
    }

    #[test]
    fn test_completed_marks_once() {
        let (dispatcher, store) = dispatcher();
        let d = dispatcher.handle_frame(r#"{"type":"completed"}"#);
        assert_eq!(d, Disposition::Complete);
        assert!(store.is_complete());
        assert_eq!(store.state().completions, 1);
    }

    #[test]
    fn test_malformed_never_mutates() {
        let (dispatcher, store) = dispatcher();
        for raw in ["{oops", "", "null", r#"{"response":{"title":"x"}}"#, "[]"] {
            assert_eq!(dispatcher.handle_frame(raw), Disposition::Continue);
        }
        assert_eq!(store.state(), crate::state::PlanState::default());
        let counts = dispatcher.stats().counts();
        assert_eq!(counts.malformed, 5);
        assert_eq!(counts.frames, 5);
    }

    #[test]
    fn test_error_status_progress_unknown_do_not_mutate() {
        let (dispatcher, store) = dispatcher();
        dispatcher.handle_frame(r#"{"type":"error","message":"quota exceeded"}"#);
        dispatcher.handle_frame(r#"{"type":"status","message":"planning"}"#);
        dispatcher.handle_frame(r#"{"type":"progress","message":"40%"}"#);
        dispatcher.handle_frame(r#"{"type":"heartbeat"}"#);

        assert_eq!(store.state(), crate::state::PlanState::default());
        let counts = dispatcher.stats().counts();
        assert_eq!(counts.server_errors, 1);
        assert_eq!(counts.status, 1);
        assert_eq!(counts.progress, 1);
        assert_eq!(counts.unrecognized, 1);
        assert_eq!(counts.dropped(), 1);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        let store = PlanStore::new();
        let dispatcher = Dispatcher::new(Arc::new(store), bus.emitter_for("s-ev"));

        dispatcher.handle_frame("garbage");
        dispatcher.handle_frame(r#"{"type":"mystery"}"#);
        dispatcher.handle_frame(r#"{"type":"error","response":{"code":503}}"#);

        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type());
            if let SessionEvent::ServerError { message, .. } = &event {
                assert_eq!(message, r#"{"code":503}"#);
            }
        }
        assert_eq!(
            types,
            vec![
                "FrameReceived",
                "FrameDropped",
                "FrameReceived",
                "FrameUnrecognized",
                "FrameReceived",
                "ServerError"
            ]
        );
    }

    #[test]
    fn test_dispatch_frames_stops_at_completed() {
        let (dispatcher, store) = dispatcher();
        let frames = [
            r#"{"type":"plan_created","response":{"title":"Pokhara Trip"}}"#,
            r#"{"type":"completed"}"#,
            r#"{"type":"plan_created","response":{"title":"after"}}"#,
        ];
        let outcome = dispatch_frames(&dispatcher, frames);
        assert_eq!(
            outcome,
            DispatchOutcome {
                frames_handled: 2,
                completed: true
            }
        );
        assert_eq!(store.snapshot(), Some(json!({"title": "Pokhara Trip"})));
    }

    #[test]
    fn test_dispatch_frames_without_completion() {
        let (dispatcher, _store) = dispatcher();
        let frames = vec![r#"{"type":"status"}"#.to_string()];
        let outcome = dispatch_frames(&dispatcher, &frames);
        assert!(!outcome.completed);
        assert_eq!(outcome.frames_handled, 1);
    }

    proptest! {
        #[test]
        fn prop_snapshot_is_last_present_payload(
            updates in proptest::collection::vec((0u8..3, proptest::option::of(0u32..1000)), 0..20)
        ) {
            let (dispatcher, store) = dispatcher();
            let mut expected = None;
            for (kind, payload) in &updates {
                let tag = ["plan_created", "day_added", "step_added"][*kind as usize];
                let frame = match payload {
                    Some(n) => json!({"type": tag, "response": {"n": n}}),
                    None => json!({"type": tag}),
                };
                dispatcher.handle_frame(&frame.to_string());
                if let Some(n) = payload {
                    expected = Some(json!({"n": n}));
                }
            }
            prop_assert_eq!(store.snapshot(), expected);
        }
    }
}
