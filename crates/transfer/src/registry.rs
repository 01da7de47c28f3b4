//! In-memory session registry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::TransferError;
use crate::types::UploadSession;

/// Maps upload ids to their sessions. Single source of truth for which
/// chunks a session holds.
///
/// Every method takes the lock for a short, I/O-free critical section.
/// Removal is atomic, so of two operations racing to remove the same id
/// exactly one observes the session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, UploadSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session.
    pub async fn insert(&self, session: UploadSession) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.id().to_string(), session);
    }

    /// Runs `f` against a session under the lock.
    pub async fn inspect<R>(
        &self,
        upload_id: &str,
        f: impl FnOnce(&UploadSession) -> R,
    ) -> Result<R, TransferError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(upload_id)
            .map(f)
            .ok_or_else(|| TransferError::SessionNotFound(upload_id.to_string()))
    }

    /// Runs `f` against a mutable session under the lock.
    pub async fn update<R>(
        &self,
        upload_id: &str,
        f: impl FnOnce(&mut UploadSession) -> R,
    ) -> Result<R, TransferError> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .get_mut(upload_id)
            .map(f)
            .ok_or_else(|| TransferError::SessionNotFound(upload_id.to_string()))
    }

    /// Claims a session for completion if every chunk has been received.
    ///
    /// The session leaves the registry atomically, so concurrent `cancel`,
    /// `complete`, and `ingest_chunk` calls see it as absent. An incomplete
    /// session is left untouched and reported with its missing indices.
    pub async fn take_complete(
        self: &Arc<Self>,
        upload_id: &str,
    ) -> Result<ClaimedSession, TransferError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get(upload_id)
            .ok_or_else(|| TransferError::SessionNotFound(upload_id.to_string()))?;

        if !session.is_complete() {
            return Err(TransferError::IncompleteUpload {
                missing: session.missing_chunks(),
            });
        }

        let session = sessions
            .remove(upload_id)
            .ok_or_else(|| TransferError::SessionNotFound(upload_id.to_string()))?;
        Ok(ClaimedSession {
            registry: Arc::clone(self),
            session,
            armed: true,
        })
    }

    /// Puts back a session that was claimed but not completed.
    async fn restore(&self, session: UploadSession) {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session.id().to_string())
            .or_insert(session);
    }

    /// Removes and returns a session.
    pub async fn remove(&self, upload_id: &str) -> Result<UploadSession, TransferError> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .remove(upload_id)
            .ok_or_else(|| TransferError::SessionNotFound(upload_id.to_string()))
    }

    /// Returns `true` if a session is registered under `upload_id`.
    pub async fn contains(&self, upload_id: &str) -> bool {
        self.sessions.lock().await.contains_key(upload_id)
    }

    /// Ids of sessions whose expiry is at or before `now`.
    pub async fn expired_ids(&self, now: DateTime<Utc>) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id().to_string())
            .collect()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

/// A session taken out of the registry for completion.
///
/// Unless [`disarm`](Self::disarm)ed, the session goes back into the
/// registry when the claim is dropped, so an abandoned completion (e.g. a
/// dropped request future) never loses the session.
#[derive(Debug)]
pub struct ClaimedSession {
    registry: Arc<SessionRegistry>,
    session: UploadSession,
    armed: bool,
}

impl ClaimedSession {
    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Marks the session as consumed; dropping the claim no longer restores it.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Returns the session to the registry now.
    pub async fn restore(mut self) {
        self.armed = false;
        self.registry.restore(self.session.clone()).await;
    }
}

impl Drop for ClaimedSession {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let registry = Arc::clone(&self.registry);
        let session = self.session.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { registry.restore(session).await });
            }
            Err(_) => tracing::warn!(
                upload_id = self.session.id(),
                "claimed session dropped outside a runtime, not restored"
            ),
        }
    }
}
