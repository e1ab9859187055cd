//! Context Store
//!
//! Keeps every live session behind one mutex and stores each session as
//! `{session_id}.json` in the context directory. Writes happen while the
//! lock is held, so a mutation and its file write are one step.

use super::phase::Phase;
use super::session::{ContextPatch, SessionContext};
use crate::config::ContextConfig;
use crate::error::{handle_lock_poison, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lightweight listing entry for a persisted session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id
    pub session_id: Uuid,
    /// Plugin name, if known
    pub plugin_name: Option<String>,
    /// Phase at the last write
    pub current_phase: Phase,
    /// When the run started
    pub start_time: DateTime<Utc>,
    /// Progress percentage at the last write
    pub progress: f64,
}

impl From<&SessionContext> for SessionSummary {
    fn from(ctx: &SessionContext) -> Self {
        Self {
            session_id: ctx.session_id(),
            plugin_name: ctx.plugin_name.clone(),
            current_phase: ctx.current_phase,
            start_time: ctx.start_time,
            progress: ctx.progress_percentage(),
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    contexts: HashMap<Uuid, SessionContext>,
    current: Option<Uuid>,
}

/// Session table with JSON file persistence
#[derive(Debug)]
pub struct ContextStore {
    context_dir: PathBuf,
    default_max_retries: u32,
    inner: Mutex<StoreInner>,
}

impl ContextStore {
    /// Create a store from configuration, creating the directory if needed
    pub fn new(config: &ContextConfig) -> Result<Self> {
        let store = Self::with_path(&config.context_dir)?;
        Ok(Self {
            default_max_retries: config.max_retries,
            ..store
        })
    }

    /// Create a store rooted at `path`
    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let context_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&context_dir).map_err(|e| {
            Error::Persistence(format!(
                "Failed to create context directory {:?}: {}",
                context_dir, e
            ))
        })?;

        Ok(Self {
            context_dir,
            default_max_retries: crate::config::DEFAULT_MAX_RETRIES,
            inner: Mutex::new(StoreInner::default()),
        })
    }

    /// Return context directory path
    #[must_use]
    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    /// Create a fresh session and make it current
    pub fn create(&self) -> Result<SessionContext> {
        self.create_with(ContextPatch::default())
    }

    /// Create a fresh session with initial field values and make it current
    pub fn create_with(&self, patch: ContextPatch) -> Result<SessionContext> {
        let mut inner = self.inner.lock().map_err(handle_lock_poison)?;

        let mut ctx = SessionContext::new(self.default_max_retries);
        ctx.apply(patch);
        let id = ctx.session_id();

        self.write_file(&ctx)?;
        inner.contexts.insert(id, ctx.clone());
        inner.current = Some(id);

        info!(session_id = %id, "Created new session context");
        Ok(ctx)
    }

    /// Snapshot of a session by id, or of the current one
    pub fn get(&self, session_id: Option<Uuid>) -> Result<Option<SessionContext>> {
        let inner = self.inner.lock().map_err(handle_lock_poison)?;
        let id = match session_id.or(inner.current) {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(inner.contexts.get(&id).cloned())
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Result<Option<SessionContext>> {
        self.get(None)
    }

    /// Id of the current session
    pub fn current_id(&self) -> Result<Option<Uuid>> {
        Ok(self.inner.lock().map_err(handle_lock_poison)?.current)
    }

    /// Apply a partial update and persist
    pub fn update(&self, session_id: Uuid, patch: ContextPatch) -> Result<SessionContext> {
        self.mutate(session_id, |ctx| {
            ctx.apply(patch);
            ctx.clone()
        })
    }

    /// Run `f` against a session and persist the result.
    ///
    /// When the file write fails the in-memory session is restored to its
    /// state before `f` ran and the write error is returned.
    pub fn mutate<T>(&self, session_id: Uuid, f: impl FnOnce(&mut SessionContext) -> T) -> Result<T> {
        let mut inner = self.inner.lock().map_err(handle_lock_poison)?;
        let ctx = inner
            .contexts
            .get_mut(&session_id)
            .ok_or(Error::SessionNotFound(session_id))?;

        let before = ctx.clone();
        let out = f(ctx);
        if let Err(e) = self.write_file(ctx) {
            *ctx = before;
            warn!(session_id = %session_id, error = %e, "Session update rolled back");
            return Err(e);
        }
        debug!(session_id = %session_id, "Session context updated");
        Ok(out)
    }

    /// Write a full snapshot, replacing the in-memory copy
    pub fn save(&self, ctx: &SessionContext) -> Result<PathBuf> {
        let mut inner = self.inner.lock().map_err(handle_lock_poison)?;
        let path = self.write_file(ctx)?;
        inner.contexts.insert(ctx.session_id(), ctx.clone());
        Ok(path)
    }

    /// Load a persisted session and make it current
    pub fn load(&self, session_id: Uuid) -> Result<Option<SessionContext>> {
        let path = self.file_path(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let ctx = Self::read_file(&path)?;
        let mut inner = self.inner.lock().map_err(handle_lock_poison)?;
        inner.contexts.insert(session_id, ctx.clone());
        inner.current = Some(session_id);

        info!(session_id = %session_id, "Loaded session context");
        Ok(Some(ctx))
    }

    /// All persisted sessions, newest first
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions = Vec::new();

        for path in self.json_files()? {
            match Self::read_file(&path) {
                Ok(ctx) => sessions.push(SessionSummary::from(&ctx)),
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to read session file");
                }
            }
        }

        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    /// Delete session files not modified within `max_age`.
    ///
    /// Returns the number of files removed.
    pub fn cleanup(&self, max_age: Duration) -> Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut inner = self.inner.lock().map_err(handle_lock_poison)?;
        let mut removed = 0;

        for path in self.json_files()? {
            let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to stat session file");
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    let id = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(|s| Uuid::parse_str(s).ok());
                    if let Some(id) = id {
                        inner.contexts.remove(&id);
                        if inner.current == Some(id) {
                            inner.current = None;
                        }
                    }
                    debug!(path = ?path, "Removed expired session file");
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to delete expired session file");
                }
            }
        }

        if removed > 0 {
            info!(removed, "Cleaned up expired sessions");
        }
        Ok(removed)
    }

    fn file_path(&self, session_id: Uuid) -> PathBuf {
        self.context_dir.join(format!("{}.json", session_id))
    }

    fn json_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.context_dir).map_err(|e| {
            Error::Persistence(format!(
                "Failed to read context directory {:?}: {}",
                self.context_dir, e
            ))
        })?;

        Ok(entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect())
    }

    fn write_file(&self, ctx: &SessionContext) -> Result<PathBuf> {
        let path = self.file_path(ctx.session_id());
        let tmp = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(ctx)?;
        let written = std::fs::write(&tmp, content).and_then(|()| std::fs::rename(&tmp, &path));

        if let Err(e) = written {
            error!(session_id = %ctx.session_id(), error = %e, "Failed to persist session context");
            return Err(Error::Persistence(format!(
                "Failed to write session to {:?}: {}",
                path, e
            )));
        }
        Ok(path)
    }

    fn read_file(path: &Path) -> Result<SessionContext> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Persistence(format!("Failed to read {:?}: {}", path, e)))?;
        Ok(serde_json::from_str(&content)?)
    }
}
