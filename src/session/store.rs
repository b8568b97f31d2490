// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Redshell Contributors

//! Session store and persistence
//!
//! Holds the mutable collection of sessions. All mutation is by whole-
//! session clone/modify/replace so concurrent readers always observe a
//! consistent snapshot, never a half-written entry. After every mutation
//! the full session list is handed to a [`SessionSink`]; the store does
//! not know or care how the sink stores it.

use std::path::PathBuf;
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::{RedshellError, Result};
use crate::session::model::{
    Artifact, CreateSession, LogEntry, Report, Session, SessionStatus,
};

/// Persistence collaborator notified after every mutation
pub trait SessionSink: Send + Sync {
    fn persist(&self, sessions: &[Session]) -> Result<()>;
}

/// Sink that discards everything; used for ephemeral stores and tests
pub struct NullSink;

impl SessionSink for NullSink {
    fn persist(&self, _sessions: &[Session]) -> Result<()> {
        Ok(())
    }
}

/// Sink that writes the full session list to a JSON file
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the initial session list; corrupt or missing data yields an
    /// empty collection, never an error
    pub fn load(&self) -> Vec<Session> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e,
                    "session file corrupt, starting with empty collection");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }
}

impl SessionSink for JsonFileSink {
    fn persist(&self, sessions: &[Session]) -> Result<()> {
        let content = serde_json::to_string_pretty(sessions)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// The single piece of shared mutable state: the session collection
pub struct SessionStore {
    sessions: RwLock<Vec<Session>>,
    sink: Box<dyn SessionSink>,
}

impl SessionStore {
    /// Create a store over an initial session list and a sink
    pub fn new(initial: Vec<Session>, sink: Box<dyn SessionSink>) -> Self {
        Self {
            sessions: RwLock::new(initial),
            sink,
        }
    }

    /// Ephemeral store for tests and one-shot invocations
    pub fn in_memory() -> Self {
        Self::new(Vec::new(), Box::new(NullSink))
    }

    /// Create and register a new session, newest first
    pub fn create(&self, params: CreateSession) -> Result<Session> {
        let session = Session::new(params);
        {
            let mut sessions = self.write_lock();
            sessions.insert(0, session.clone());
            self.sink.persist(&sessions)?;
        }
        Ok(session)
    }

    /// Snapshot of one session
    pub fn get(&self, id: Uuid) -> Option<Session> {
        self.read_lock().iter().find(|s| s.id == id).cloned()
    }

    /// Snapshot of all sessions
    pub fn list(&self) -> Vec<Session> {
        self.read_lock().clone()
    }

    /// Delete a session outright; returns whether it existed
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut sessions = self.write_lock();
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        let removed = sessions.len() < before;
        if removed {
            self.sink.persist(&sessions)?;
        }
        Ok(removed)
    }

    /// Mark a session terminated (lifecycle transition, not deletion)
    pub fn terminate(&self, id: Uuid) -> Result<()> {
        self.set_status(id, SessionStatus::Completed)
    }

    /// Set the lifecycle status
    pub fn set_status(&self, id: Uuid, status: SessionStatus) -> Result<()> {
        self.mutate(id, |s| s.status = status)
    }

    /// Append a transcript entry and touch last-activity
    pub fn push_entry(&self, id: Uuid, entry: LogEntry) -> Result<()> {
        self.mutate(id, |s| {
            s.logs.push(entry);
            s.touch();
        })
    }

    /// Replace the content of one entry by id (copy-on-write: the entry
    /// value is rebuilt, never edited through a shared reference)
    pub fn set_entry_content(&self, id: Uuid, entry_id: Uuid, content: &str) -> Result<()> {
        self.mutate(id, |s| {
            if let Some(slot) = s.logs.iter_mut().find(|e| e.id == entry_id) {
                *slot = slot.with_content(content);
            }
            s.touch();
        })
    }

    /// Merge extracted artifacts, dropping filenames the session already
    /// has; returns how many were added
    pub fn merge_artifacts(&self, id: Uuid, new: Vec<Artifact>) -> Result<usize> {
        let mut added = 0;
        self.mutate(id, |s| {
            for artifact in new {
                if !s.has_artifact(&artifact.filename) {
                    s.artifacts.push(artifact);
                    added += 1;
                }
            }
            s.touch();
        })?;
        Ok(added)
    }

    /// Attach a report, most-recent-first
    pub fn push_report(&self, id: Uuid, report: Report) -> Result<()> {
        self.mutate(id, |s| {
            s.reports.insert(0, report);
            s.touch();
        })
    }

    /// Remove a report by id; returns whether it existed
    pub fn delete_report(&self, id: Uuid, report_id: Uuid) -> Result<bool> {
        let mut removed = false;
        self.mutate(id, |s| {
            let before = s.reports.len();
            s.reports.retain(|r| r.id != report_id);
            removed = s.reports.len() < before;
        })?;
        Ok(removed)
    }

    /// Record that the hidden boot send has been issued
    pub fn mark_booted(&self, id: Uuid) -> Result<()> {
        self.mutate(id, |s| s.has_booted = true)
    }

    /// Record that the hidden mission-start send has been issued
    pub fn mark_auto_started(&self, id: Uuid) -> Result<()> {
        self.mutate(id, |s| s.has_auto_started = true)
    }

    /// Clone-modify-replace one session and notify the sink
    fn mutate(&self, id: Uuid, f: impl FnOnce(&mut Session)) -> Result<()> {
        let mut sessions = self.write_lock();
        let slot = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| RedshellError::Session(format!("unknown session: {id}")))?;

        let mut updated = slot.clone();
        f(&mut updated);
        *slot = updated;

        self.sink.persist(&sessions)
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Vec<Session>> {
        self.sessions.read().unwrap_or_else(|poisoned| {
            tracing::warn!("session store read lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Session>> {
        self.sessions.write().unwrap_or_else(|poisoned| {
            tracing::warn!("session store write lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
