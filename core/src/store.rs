//! Persistence of the single session record.
//!
//! # Design
//! The record is one JSON object `{"token": ..., "expiry": ...}` with the
//! expiry as an RFC 3339 UTC timestamp. Every operation takes the store's
//! mutex, so a reader never observes a half-written record from another
//! thread. `FileCredentialStore` additionally writes through a temporary
//! sibling file and renames it into place, so a crash mid-write leaves
//! either the old record or the new one on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::{ApiError, Result};
use crate::session::Session;

/// Single owner of persisted auth state.
pub trait CredentialStore: Send + Sync {
    /// Persist the record, replacing any previous one.
    fn save(&self, session: &Session) -> Result<()>;

    /// `Ok(None)` when nothing was saved or the record was cleared.
    fn load(&self) -> Result<Option<Session>>;

    /// Remove the record. Clearing an absent record succeeds.
    fn clear(&self) -> Result<()>;
}

/// Stores the record as a JSON file at a fixed path.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn storage_error(action: &str, path: &Path, err: impl std::fmt::Display) -> ApiError {
    ApiError::Storage(format!("{action} {}: {err}", path.display()))
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, session: &Session) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let json = serde_json::to_string(session).map_err(|e| ApiError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| storage_error("creating", parent, e))?;
        }
        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|e| storage_error("writing", &temp, e))?;
        fs::rename(&temp, &self.path).map_err(|e| storage_error("replacing", &self.path, e))?;

        debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<Session>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("reading", &self.path, e)),
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            warn!(path = %self.path.display(), "credential record is corrupt");
            storage_error("parsing", &self.path, e)
        })
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "credentials cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("removing", &self.path, e)),
        }
    }
}

/// Keeps the record in memory only.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<Session>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            record: Mutex::new(Some(session)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, session: &Session) -> Result<()> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<Session>> {
        Ok(self.record.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn clear(&self) -> Result<()> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}
