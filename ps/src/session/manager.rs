//! ConnectionManager - at most one live plan session
//!
//! Starting a new generation closes whatever session is still current. Each
//! `connect` returns a [`Teardown`] that only ever closes its own session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tracing::{debug, info};

use super::connection::{ConnectionState, PlanClient, PlanSession};

#[derive(Default)]
struct Slot {
    generation: u64,
    session: Option<PlanSession>,
}

/// Owns the current session slot
pub struct ConnectionManager {
    client: PlanClient,
    slot: Arc<Mutex<Slot>>,
}

impl ConnectionManager {
    pub fn new(client: PlanClient) -> Self {
        debug!("ConnectionManager::new: called");
        Self {
            client,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn client(&self) -> &PlanClient {
        &self.client
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close any current session and start a new one for `prompt`
    ///
    /// Returns immediately; the new session is CONNECTING.
    pub fn connect(&self, prompt: &str, token: &str) -> Teardown {
        debug!("ConnectionManager::connect: called");
        let mut slot = self.lock();
        if let Some(previous) = slot.session.take() {
            info!(session_id = %previous.id(), state = %previous.state(), "Closing previous session");
            previous.close();
        }

        let session = self.client.start(prompt, token);
        slot.generation += 1;
        slot.session = Some(session.clone());
        info!(session_id = %session.id(), generation = slot.generation, "Session started");

        Teardown {
            session,
            generation: slot.generation,
            slot: Arc::downgrade(&self.slot),
        }
    }

    /// Close the current session, if any
    pub fn disconnect(&self) {
        debug!("ConnectionManager::disconnect: called");
        if let Some(session) = self.lock().session.take() {
            session.close();
        }
    }

    /// Send through the current session; false unless it is OPEN
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        self.lock().session.as_ref().is_some_and(|s| s.send(message))
    }

    /// State of the current session, CLOSED when there is none
    pub fn state(&self) -> ConnectionState {
        self.lock()
            .session
            .as_ref()
            .map_or(ConnectionState::Closed, PlanSession::state)
    }

    /// Handle to the current session
    pub fn current(&self) -> Option<PlanSession> {
        self.lock().session.clone()
    }
}

/// Closes the session opened by one `connect` call
#[must_use = "dropping a Teardown leaves the session running"]
pub struct Teardown {
    session: PlanSession,
    generation: u64,
    slot: Weak<Mutex<Slot>>,
}

impl Teardown {
    pub fn session(&self) -> &PlanSession {
        &self.session
    }

    /// Close this session; clears the manager's slot only if it still holds it
    pub fn run(self) {
        debug!(session_id = %self.session.id(), "Teardown::run: called");
        self.session.close();
        if let Some(slot) = self.slot.upgrade() {
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.generation == self.generation {
                slot.session = None;
            }
        }
    }
}
