use crate::models::StoredSession;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use uuid::Uuid;

const REPORT_FILE: &str = "report.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session not found: {0}")]
    NotFound(String),
}

pub struct SessionStorage {
    base_path: PathBuf,
}

impl SessionStorage {
    pub fn new(base_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn create_session(&self) -> std::io::Result<String> {
        let session_id = Uuid::new_v4().to_string();
        fs::create_dir_all(self.base_path.join(&session_id))?;
        debug!("Created session directory for {}", session_id);
        Ok(session_id)
    }

    /// Only well-formed session ids map to a directory, so a request can
    /// never point outside the data directory.
    pub fn session_path(&self, session_id: &str) -> Result<PathBuf, StorageError> {
        Uuid::parse_str(session_id).map_err(|_| StorageError::NotFound(session_id.to_string()))?;
        Ok(self.base_path.join(session_id))
    }

    pub fn delete_session(&self, session_id: &str) -> Result<(), StorageError> {
        let session_path = self.session_path(session_id)?;
        if !session_path.exists() {
            return Err(StorageError::NotFound(session_id.to_string()));
        }
        fs::remove_dir_all(session_path)?;
        Ok(())
    }

    /// Create a session directory and write the session built for its id.
    /// The directory is removed again if the write fails.
    pub fn store_session(
        &self,
        build: impl FnOnce(String) -> StoredSession,
    ) -> Result<StoredSession, StorageError> {
        let session_id = self.create_session()?;
        let session = build(session_id.clone());

        if let Err(e) = self.write_session(&session) {
            error!("Failed to write session {}: {}", session_id, e);
            if let Err(cleanup) = fs::remove_dir_all(self.base_path.join(&session_id)) {
                warn!("Failed to remove session directory {}: {}", session_id, cleanup);
            }
            return Err(e);
        }

        Ok(session)
    }

    pub fn write_session(&self, session: &StoredSession) -> Result<(), StorageError> {
        let report_path = self.session_path(&session.session_id)?.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(session)?;
        fs::write(report_path, json)?;
        Ok(())
    }

    pub fn read_session(&self, session_id: &str) -> Result<StoredSession, StorageError> {
        let report_path = self.session_path(session_id)?.join(REPORT_FILE);
        let json = fs::read_to_string(report_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(session_id.to_string()),
            _ => StorageError::Io(e),
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
