//! In-memory session state shared by the engine and the tool dispatcher.
//!
//! All mutation goes through [`SessionState`]; when auto-persist is on,
//! every change is followed by a full snapshot save made under the same
//! lock, so the stored record never lags behind a later change. A failed
//! save is logged and the session carries on in memory.

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::session::{HistoryEntry, HistoryKind, Session};
use crate::persistence::session_repo::SessionRepo;

/// Current session plus its optional durable store.
#[derive(Debug)]
pub struct SessionState {
    current: Mutex<Option<Session>>,
    store: Option<SessionRepo>,
    auto_persist: bool,
}

impl SessionState {
    /// Empty state. Saves happen only when `store` is set and
    /// `auto_persist` is `true`.
    #[must_use]
    pub fn new(store: Option<SessionRepo>, auto_persist: bool) -> Self {
        Self {
            current: Mutex::new(None),
            store,
            auto_persist,
        }
    }

    /// Durable store, if configured.
    #[must_use]
    pub fn store(&self) -> Option<&SessionRepo> {
        self.store.as_ref()
    }

    /// Identifier of the current session, if one exists.
    pub async fn session_id(&self) -> Option<String> {
        self.current.lock().await.as_ref().map(|s| s.id.clone())
    }

    /// Copy of the current session.
    pub async fn snapshot(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }

    /// Install a freshly created session and persist it.
    pub async fn install(&self, session: Session) {
        let mut guard = self.current.lock().await;
        self.persist(&session).await;
        *guard = Some(session);
    }

    /// Replace the current session wholesale without saving it back.
    pub async fn replace(&self, session: Session) {
        *self.current.lock().await = Some(session);
    }

    /// Append a history entry to the current session and persist it.
    ///
    /// The state lock is held across the save, so snapshots reach the
    /// store in the order the entries were appended.
    ///
    /// Returns `false` when there is no session to append to.
    pub async fn append(&self, kind: HistoryKind, payload: Value) -> bool {
        let mut guard = self.current.lock().await;
        let Some(session) = guard.as_mut() else {
            warn!(?kind, "session state: no active session, history entry dropped");
            return false;
        };
        session.record(HistoryEntry::new(kind, payload));
        self.persist(session).await;
        true
    }

    async fn persist(&self, session: &Session) {
        if !self.auto_persist {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };
        match store.save(session).await {
            Ok(()) => debug!(
                session_id = session.id.as_str(),
                entries = session.history.len(),
                "session state: snapshot saved"
            ),
            Err(err) => warn!(
                %err,
                session_id = session.id.as_str(),
                "session state: save failed, continuing in memory"
            ),
        }
    }
}
