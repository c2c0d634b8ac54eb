//! Authoritative in-memory session store.

use crate::error::SessionError;
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// In-memory rental session store.
///
/// Sessions are never removed, so an id seen once stays unique for the
/// lifetime of the store. Readers get cloned snapshots; every mutation goes
/// through [`RentalSession::apply`] and reports a [`SessionChange`].
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, RentalSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        info!("In-memory session store initialized");
        Self::default()
    }

    /// Insert a brand new session.
    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn create(&self, session: RentalSession) -> Result<SessionChange, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.session_id) {
            return Err(SessionError::Duplicate(session.session_id));
        }

        debug!("Created {} session ({})", session.provider, session.status);
        sessions.insert(session.session_id.clone(), session.clone());

        Ok(SessionChange {
            previous: None,
            current: session,
        })
    }

    /// Insert a session or merge it into the cached one.
    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn upsert(&self, session: RentalSession) -> SessionChange {
        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(&session.session_id) {
            Some(existing) => {
                let previous = existing.clone();
                if existing.apply(&SessionPatch::from_snapshot(&session)) {
                    debug!("Merged snapshot ({} -> {})", previous.status, existing.status);
                }
                SessionChange {
                    previous: Some(previous),
                    current: existing.clone(),
                }
            }
            None => {
                sessions.insert(session.session_id.clone(), session.clone());
                SessionChange {
                    previous: None,
                    current: session,
                }
            }
        }
    }

    /// Apply field updates to one session.
    #[instrument(skip(self, patch))]
    pub async fn patch(
        &self,
        session_id: &str,
        patch: &SessionPatch,
    ) -> Result<SessionChange, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let previous = session.clone();
        if session.apply(patch) {
            debug!("Patched session ({} -> {})", previous.status, session.status);
        } else {
            debug!("Patch was a no-op");
        }

        Ok(SessionChange {
            previous: Some(previous),
            current: session.clone(),
        })
    }

    pub async fn get(&self, session_id: &str) -> Option<RentalSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Snapshot of every session, oldest first.
    pub async fn all(&self) -> Vec<RentalSession> {
        let sessions = self.sessions.read().await;
        let mut snapshot: Vec<RentalSession> = sessions.values().cloned().collect();
        snapshot.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        snapshot
    }

    /// Look up a session by the identifier the rental API assigned.
    pub async fn find_by_request_id(&self, request_id: &str) -> Option<RentalSession> {
        self.sessions
            .read()
            .await
            .values()
            .find(|s| s.provider_request_id.as_deref() == Some(request_id))
            .cloned()
    }

    /// Ids of sessions that currently need an active poll.
    pub async fn needing_poll(&self, now: DateTime<Utc>) -> Vec<SessionId> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.needs_poll(now))
            .map(|s| s.session_id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
