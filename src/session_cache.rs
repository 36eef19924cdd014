//! Session-scoped result cache between the preview and download passes
//!
//! A preview run stores its assets under a fresh id; a later download
//! consumes them exactly once. Entries older than the TTL are swept at the
//! start of every public operation, so an abandoned preview never outlives
//! the TTL by more than one request.

use crate::error::{CatalogError, Result};
use crate::types::{ItemError, ProcessedAsset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Opaque session identifier, generated per run and never reused
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// What a preview run leaves for its download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedRun {
    /// Delivered assets, batches in order
    pub assets: Vec<ProcessedAsset>,
    /// Per-item failures for the error report
    pub errors: Vec<ItemError>,
    /// Jobs in the run
    pub total: usize,
}

impl CachedRun {
    #[must_use]
    pub fn new(assets: Vec<ProcessedAsset>, errors: Vec<ItemError>, total: usize) -> Self {
        Self {
            assets,
            errors,
            total,
        }
    }
}

/// A run's results, written once and never mutated
#[derive(Debug)]
struct Session {
    run: CachedRun,
    created_at: Instant,
}

/// Session cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCacheStats {
    /// Sessions currently held
    pub live_sessions: usize,
    /// Assets across all live sessions
    pub live_assets: usize,
    /// Sessions handed to a download
    pub consumed: u64,
    /// Sessions removed by the TTL sweep
    pub expired: u64,
    /// Consumption attempts that found nothing
    pub misses: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    sessions: HashMap<SessionId, Session>,
    consumed: u64,
    expired: u64,
    misses: u64,
}

impl CacheState {
    fn sweep(&mut self, ttl: Duration, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.saturating_duration_since(session.created_at) < ttl);
        let removed = before - self.sessions.len();
        self.expired += removed as u64;
        removed
    }
}

/// Process-wide map of pending sessions, shared by handle
#[derive(Debug)]
pub struct SessionCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl SessionCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lock and sweep; a poisoned lock still holds a consistent map
    fn lock_swept(&self) -> MutexGuard<'_, CacheState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = state.sweep(self.ttl, Instant::now());
        if removed > 0 {
            info!(removed, "Swept expired sessions");
        }
        state
    }

    /// Store a run's results under a fresh id
    pub fn store(&self, run: CachedRun) -> SessionId {
        let id = SessionId::generate();
        let mut state = self.lock_swept();
        debug!(session = %id, assets = run.assets.len(), "Storing session");
        state.sessions.insert(
            id.clone(),
            Session {
                run,
                created_at: Instant::now(),
            },
        );
        id
    }

    /// Take a session's results, removing the entry
    ///
    /// # Errors
    /// - `SessionExpired` when the id is unknown, already consumed or past the TTL
    pub fn consume(&self, id: &SessionId) -> Result<CachedRun> {
        let mut state = self.lock_swept();
        match state.sessions.remove(id) {
            Some(session) => {
                state.consumed += 1;
                debug!(session = %id, assets = session.run.assets.len(), "Consumed session");
                Ok(session.run)
            },
            None => {
                state.misses += 1;
                Err(CatalogError::SessionExpired(id.to_string()))
            },
        }
    }

    /// Drop every session older than the TTL, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.sweep(self.ttl, Instant::now())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_swept().sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> SessionCacheStats {
        let state = self.lock_swept();
        SessionCacheStats {
            live_sessions: state.sessions.len(),
            live_assets: state.sessions.values().map(|s| s.run.assets.len()).sum(),
            consumed: state.consumed,
            expired: state.expired,
            misses: state.misses,
        }
    }
}
