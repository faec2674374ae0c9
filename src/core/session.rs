/// Session Table
///
/// Process-wide registry of live sessions keyed by session id. Owned by the
/// server's composition root and handed to the router as shared app data.
/// The whole map sits behind one mutex since actix runs handlers on several
/// worker threads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::transport::SseTransport;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} is already registered")]
    Duplicate(String),
}

#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<String, Arc<SseTransport>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<SseTransport>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a transport under its own session id.
    ///
    /// An id that is already present is rejected and the live session is
    /// left untouched.
    ///
    /// # Arguments
    /// * `transport` - Freshly connected transport; its id becomes the key
    ///
    /// # Returns
    /// `SessionError::Duplicate` if the id is already live
    pub fn register(&self, transport: Arc<SseTransport>) -> Result<(), SessionError> {
        let id = transport.session_id().to_string();
        let mut sessions = self.sessions();
        if sessions.contains_key(&id) {
            warn!(session_id = %id, "refusing to overwrite live session");
            return Err(SessionError::Duplicate(id));
        }
        sessions.insert(id.clone(), transport);
        info!(session_id = %id, live = sessions.len(), "session registered");
        Ok(())
    }

    /// Find a live session.
    ///
    /// # Arguments
    /// * `id` - Session id from the `sessionId` query parameter
    ///
    /// # Returns
    /// A shared handle to the transport, or None if it was never registered
    /// or has since closed
    pub fn lookup(&self, id: &str) -> Option<Arc<SseTransport>> {
        self.sessions().get(id).cloned()
    }

    /// Remove a session. Removing an absent id is a no-op.
    ///
    /// # Returns
    /// The removed transport, if the id was live
    pub fn unregister(&self, id: &str) -> Option<Arc<SseTransport>> {
        let removed = self.sessions().remove(id);
        if removed.is_some() {
            debug!(session_id = %id, "session unregistered");
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Close every live session, used on server shutdown.
    ///
    /// Transports are drained from the map before closing so their close
    /// observers never re-enter the lock.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.sessions().drain().map(|(_, t)| t).collect();
        if !drained.is_empty() {
            info!(count = drained.len(), "closing live sessions");
        }
        for transport in drained {
            transport.close();
        }
    }
}
