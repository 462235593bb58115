use std::collections::HashMap;
use std::sync::Arc;

use assess_core::model::SessionId;
use tokio::sync::RwLock;
use tracing::debug;

use super::session::AssessmentSession;

/// Live sessions keyed by ID. Sessions are independent; the registry only
/// tracks them.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, AssessmentSession>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: AssessmentSession) -> SessionId {
        let id = session.id();
        self.sessions.write().await.insert(id, session);
        id
    }

    pub async fn get(&self, id: SessionId) -> Option<AssessmentSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Drop a session, aborting it first if it is still running.
    pub async fn remove(&self, id: SessionId) -> Option<AssessmentSession> {
        let session = self.sessions.write().await.remove(&id)?;
        if session.abort().await.is_err() {
            debug!(session = %id, "removed completed session");
        } else {
            debug!(session = %id, "removed and aborted session");
        }
        Some(session)
    }

    pub async fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
