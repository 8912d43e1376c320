//! In-memory session registry
//!
//! Maps session ids to recording or replay sessions for the lifetime of the
//! daemon. The map lock is only ever held for a lookup or an update and never
//! across an await; recording sessions carry their own async mutex which
//! serializes operations on one id.

use parking_lot::RwLock;
use recplay_common::{Error, Result, SessionKind, SessionSummary};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::recorder::RecordingSession;

/// Shared handle to a recording session
pub type RecordingHandle = Arc<Mutex<RecordingSession>>;

/// A registered recording session
#[derive(Clone)]
pub struct RecordingEntry {
    pub target_url: String,
    pub started_at: i64,
    pub session: RecordingHandle,
}

/// A replay in progress
#[derive(Debug, Clone)]
pub struct ReplayEntry {
    pub target_url: String,
    pub started_at: i64,
}

/// One registry entry
#[derive(Clone)]
pub enum SessionEntry {
    Recording(RecordingEntry),
    Replay(ReplayEntry),
}

impl SessionEntry {
    pub fn kind(&self) -> SessionKind {
        match self {
            SessionEntry::Recording(_) => SessionKind::Recording,
            SessionEntry::Replay(_) => SessionKind::Replay,
        }
    }

    fn summary(&self, session_id: &str) -> SessionSummary {
        let (target_url, started_at) = match self {
            SessionEntry::Recording(r) => (r.target_url.clone(), r.started_at),
            SessionEntry::Replay(r) => (r.target_url.clone(), r.started_at),
        };
        SessionSummary {
            session_id: session_id.to_string(),
            kind: self.kind(),
            started_at,
            target_url,
        }
    }
}

/// Process-lifetime mapping of session id to session
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id: `<prefix>-<unix millis>-<8 hex>`
    pub fn new_session_id(kind: SessionKind) -> String {
        let prefix = match kind {
            SessionKind::Recording => "rec",
            SessionKind::Replay => "run",
        };
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            prefix,
            chrono::Utc::now().timestamp_millis(),
            &suffix[..8]
        )
    }

    /// Register a session; an id that is already present is rejected
    pub fn insert(&self, session_id: &str, entry: SessionEntry) -> Result<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(session_id) {
            return Err(Error::AlreadyExists {
                kind: "session".to_string(),
                id: session_id.to_string(),
            });
        }
        debug!("Registered {:?} session {}", entry.kind(), session_id);
        sessions.insert(session_id.to_string(), entry);
        Ok(())
    }

    pub fn get(&self, session_id: &str) -> Option<SessionEntry> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Look up a recording session, failing with `NotFound` for unknown ids
    /// and for ids that belong to a replay
    pub fn get_recording(&self, session_id: &str) -> Result<RecordingHandle> {
        match self.sessions.read().get(session_id) {
            Some(SessionEntry::Recording(r)) => Ok(r.session.clone()),
            _ => Err(Error::session_not_found(session_id)),
        }
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionEntry> {
        let removed = self.sessions.write().remove(session_id);
        if removed.is_some() {
            debug!("Deregistered session {}", session_id);
        }
        removed
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Summaries of every session, oldest first
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut list: Vec<_> = self
            .sessions
            .read()
            .iter()
            .map(|(id, entry)| entry.summary(id))
            .collect();
        list.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        list
    }

    /// Snapshot of all recording sessions
    pub fn recordings(&self) -> Vec<(String, RecordingEntry)> {
        self.sessions
            .read()
            .iter()
            .filter_map(|(id, entry)| match entry {
                SessionEntry::Recording(r) => Some((id.clone(), r.clone())),
                SessionEntry::Replay(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
