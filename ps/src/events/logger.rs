//! Event Logger - persists session events to JSONL files
//!
//! One file per session at `{runs_dir}/{session_id}/events.jsonl`. Because
//! every raw inbound frame is logged as `FrameReceived`, a session log doubles
//! as a replayable transcript.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::Context;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, SessionEvent};

/// Event logger that writes events to JSONL files
pub struct EventLogger {
    runs_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    /// Create a new event logger rooted at `runs_dir`
    pub fn new(runs_dir: impl AsRef<Path>) -> Self {
        let runs_dir = runs_dir.as_ref().to_path_buf();
        debug!(?runs_dir, "EventLogger::new: creating logger");
        Self {
            runs_dir,
            writers: HashMap::new(),
        }
    }

    /// Write an event to its session's log file
    pub fn write_event(&mut self, event: &SessionEvent) -> eyre::Result<()> {
        let session_id = event.session_id();
        debug!(%session_id, event_type = event.event_type(), "EventLogger::write_event");

        if !self.writers.contains_key(session_id) {
            let session_dir = self.runs_dir.join(session_id);
            fs::create_dir_all(&session_dir).context("Failed to create session log directory")?;

            let log_path = session_dir.join("events.jsonl");
            debug!(?log_path, "EventLogger: creating new log file");

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .context("Failed to open session log file")?;
            self.writers.insert(session_id.to_string(), BufWriter::new(file));
        }

        let Some(writer) = self.writers.get_mut(session_id) else {
            return Err(eyre::eyre!("No writer for session {}", session_id));
        };

        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Close the writer for a session
    pub fn close_session(&mut self, session_id: &str) {
        debug!(%session_id, "EventLogger::close_session");
        if let Some(mut writer) = self.writers.remove(session_id) {
            let _ = writer.flush();
        }
    }

    /// Consume events from the bus until it closes
    pub async fn run(mut self, mut rx: broadcast::Receiver<SessionEvent>) {
        debug!("EventLogger::run: starting event logger");

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let session_id = event.session_id().to_string();
                    let is_final = event.is_final();

                    if let Err(e) = self.write_event(&event) {
                        error!(%session_id, error = %e, "EventLogger: failed to write event");
                    }

                    if is_final {
                        self.close_session(&session_id);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        for (session_id, mut writer) in self.writers.drain() {
            debug!(%session_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// Read events from a session's log file
pub fn read_session_events(runs_dir: impl AsRef<Path>, session_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = runs_dir.as_ref().join(session_id).join("events.jsonl");
    debug!(?log_path, "read_session_events: reading log file");

    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path).context("Failed to read session log")?;
    let mut entries = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_session_events: failed to parse line");
            }
        }
    }

    debug!(count = entries.len(), "read_session_events: loaded entries");
    Ok(entries)
}

/// Raw inbound frames recorded in a session log, in arrival order
pub fn recorded_frames(entries: &[EventLogEntry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| match &entry.event {
            SessionEvent::FrameReceived { raw, .. } => Some(raw.clone()),
            _ => None,
        })
        .collect()
}

/// Spawn the event logger as a background task
///
/// Subscribes before returning, so no event emitted after this call is missed.
pub fn spawn_event_logger(event_bus: &Arc<EventBus>, runs_dir: impl AsRef<Path>) -> tokio::task::JoinHandle<()> {
    let logger = EventLogger::new(runs_dir);
    let rx = event_bus.subscribe();
    tokio::spawn(logger.run(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CloseReason;
    use tempfile::tempdir;

    fn opened(id: &str) -> SessionEvent {
        SessionEvent::Opened {
            session_id: id.to_string(),
        }
    }

    #[test]
    fn test_write_event() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&opened("s-123")).unwrap();

        let log_path = temp.path().join("s-123").join("events.jsonl");
        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("Opened"));
        assert!(content.contains("s-123"));
    }

    #[test]
    fn test_multiple_sessions() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&opened("s-1")).unwrap();
        logger.write_event(&opened("s-2")).unwrap();

        assert!(temp.path().join("s-1").join("events.jsonl").exists());
        assert!(temp.path().join("s-2").join("events.jsonl").exists());
    }

    #[test]
    fn test_read_session_events_and_frames() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&opened("s-read")).unwrap();
        logger
            .write_event(&SessionEvent::FrameReceived {
                session_id: "s-read".to_string(),
                raw: r#"{"type":"plan_created","response":{"title":"A"}}"#.to_string(),
            })
            .unwrap();
        logger
            .write_event(&SessionEvent::FrameReceived {
                session_id: "s-read".to_string(),
                raw: r#"{"type":"completed"}"#.to_string(),
            })
            .unwrap();

        let entries = read_session_events(temp.path(), "s-read").unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].event.event_type(), "Opened");

        let frames = recorded_frames(&entries);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], r#"{"type":"completed"}"#);
    }

    #[test]
    fn test_read_nonexistent_session() {
        let temp = tempdir().unwrap();
        assert!(read_session_events(temp.path(), "missing").unwrap().is_empty());
    }

    #[test]
    fn test_close_session() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&opened("s-close")).unwrap();
        assert!(logger.writers.contains_key("s-close"));
        logger.close_session("s-close");
        assert!(!logger.writers.contains_key("s-close"));
    }

    #[tokio::test]
    async fn test_run_closes_writer_on_final_event() {
        let temp = tempdir().unwrap();
        let bus = Arc::new(EventBus::new(16));
        let handle = spawn_event_logger(&bus, temp.path());

        let emitter = bus.emitter_for("s-run");
        emitter.opened();
        emitter.closed(CloseReason::Completed);
        drop(emitter);
        drop(bus);

        handle.await.unwrap();
        let entries = read_session_events(temp.path(), "s-run").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].event.is_final());
    }
}
