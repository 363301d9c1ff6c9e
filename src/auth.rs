//! Stored-credential access. The bearer token is issued by an external login
//! flow; this console only reads, replaces, and clears it.

use directories::ProjectDirs;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("no writable config directory on this platform")]
    NoConfigDir,
}

/// Seam for the shared credential. The loader and submit handler depend on
/// this trait, never on the file behind it, so clear-on-401 can be exercised
/// with a test double.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, token: &str) -> Result<(), CredentialError>;
    /// Removing an already-absent credential is not an error.
    fn clear(&self);
}

/// Token kept in a plain file under the platform config directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> Result<Self, CredentialError> {
        let dirs = ProjectDirs::from("", "", "stockdesk").ok_or(CredentialError::NoConfigDir)?;
        Ok(Self::new(dirs.config_dir().join("token")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<String> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let token = raw.trim().to_string();
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }

    fn store(&self, token: &str) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(%err, path = %self.path.display(), "failed to remove stored credential"),
        }
    }
}

#[cfg(test)]
pub(crate) struct MemoryCredentialStore(pub std::sync::Mutex<Option<String>>);

#[cfg(test)]
impl MemoryCredentialStore {
    pub fn with_token(token: &str) -> Self {
        Self(std::sync::Mutex::new(Some(token.to_string())))
    }
}

#[cfg(test)]
impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<String> {
        self.0.lock().unwrap().clone()
    }

    fn store(&self, token: &str) -> Result<(), CredentialError> {
        *self.0.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) {
        *self.0.lock().unwrap() = None;
    }
}
