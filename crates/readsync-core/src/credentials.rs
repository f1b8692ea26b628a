//! API credential storage
//!
//! A pure cache for the remote service token. Nothing here talks to the
//! network: whether the token is actually valid is only discovered when the
//! remote client uses it.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::RwLock;

use thiserror::Error;
use tracing::debug;

use crate::models::Credential;
use crate::storage::atomic_write_private;

/// Errors from the credential backing store
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to read credential from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to store credential at '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Credential store lock poisoned")]
    Poisoned,
}

/// Holds the current API credential
///
/// At most one credential is current. A blank stored value reads as absent.
pub trait CredentialStore: Send + Sync {
    /// Return the current credential, if one is configured
    fn try_get(&self) -> Result<Option<Credential>, CredentialError>;

    /// Store a credential, replacing any previous one
    ///
    /// Storing a blank value clears the store.
    fn upsert(&self, value: &str) -> Result<(), CredentialError>;

    /// Forget the credential
    fn clear(&self) -> Result<(), CredentialError>;
}

/// Credential kept in a file under the data directory
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn try_get(&self) -> Result<Option<Credential>, CredentialError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Credential::new(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CredentialError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn upsert(&self, value: &str) -> Result<(), CredentialError> {
        let Some(credential) = Credential::new(value) else {
            return self.clear();
        };

        atomic_write_private(&self.path, credential.expose().as_bytes()).map_err(|source| {
            CredentialError::Write {
                path: self.path.clone(),
                source,
            }
        })?;

        debug!("Stored credential at {:?}", self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed credential at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CredentialError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Process-local credential (command-line token, tests)
#[derive(Default)]
pub struct MemoryCredentialStore {
    value: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(value.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn try_get(&self) -> Result<Option<Credential>, CredentialError> {
        let value = self.value.read().map_err(|_| CredentialError::Poisoned)?;
        Ok(value.as_deref().and_then(Credential::new))
    }

    fn upsert(&self, value: &str) -> Result<(), CredentialError> {
        let mut slot = self.value.write().map_err(|_| CredentialError::Poisoned)?;
        *slot = Credential::new(value).map(|c| c.expose().to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        let mut slot = self.value.write().map_err(|_| CredentialError::Poisoned)?;
        *slot = None;
        Ok(())
    }
}
