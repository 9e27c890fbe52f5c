use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tracing::info;

use crate::models::{SessionState, Stage};

/// In-memory session registry keyed by caller-supplied session id. Each
/// session lives behind its own async lock which the chat handler holds for
/// the whole turn, so two messages for the same id are serialized and
/// neither can overwrite the other's collected fields. Sessions idle past
/// the timeout are abandoned rather than deleted, so a late message still
/// gets a coherent "this session ended" reply.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<SessionState>>>>,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(timeout_minutes: i64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout: Duration::minutes(timeout_minutes),
        }
    }

    /// The shared handle for one session, created on first use. Callers
    /// lock it for the duration of a turn.
    pub fn session(&self, session_id: &str) -> Arc<tokio::sync::Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(SessionState::new(session_id))))
            .clone()
    }

    /// Abandons a session whose idle time exceeds the timeout. Called with
    /// the turn lock already held.
    pub fn expire_if_idle(&self, state: &mut SessionState) {
        if !state.stage.is_terminal() && Utc::now() - state.last_activity > self.timeout {
            info!("session {} expired, abandoning", state.session_id);
            state.stage = Stage::Abandoned;
        }
    }

    /// Marks every idle non-terminal session abandoned and drops terminal
    /// ones older than the timeout. Sessions with a turn in flight are left
    /// alone. Returns how many were swept.
    pub fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        let cutoff = Utc::now() - self.timeout;
        let mut swept = 0;
        sessions.retain(|_, slot| {
            let Ok(mut state) = slot.try_lock() else {
                return true;
            };
            if state.last_activity >= cutoff {
                return true;
            }
            swept += 1;
            if state.stage.is_terminal() {
                false
            } else {
                state.stage = Stage::Abandoned;
                true
            }
        });
        swept
    }

    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.lock().expect("session map poisoned");
        sessions
            .values()
            .filter(|slot| {
                slot.try_lock()
                    .map(|state| !state.stage.is_terminal())
                    .unwrap_or(true)
            })
            .count()
    }
}
