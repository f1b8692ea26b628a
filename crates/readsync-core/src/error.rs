//! Sync error taxonomy
//!
//! Every failure a sync run can hit, as one enum. The orchestrator turns
//! each of these into a state transition, a user-visible message and a log
//! entry; nothing here aborts the process.

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::notes::NoteError;
use crate::remote::FetchError;
use crate::render::RenderError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// No credential was available, even after prompting
    #[error("No API token configured")]
    CredentialMissing,

    /// The remote rejected the credential; the user must enter a new one
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(#[source] FetchError),

    /// The fetch failed; the same window is retried next run
    #[error(transparent)]
    Fetch(FetchError),

    /// Templates or storage folder could not be prepared
    #[error(transparent)]
    Setup(#[from] RenderError),

    #[error("Failed to render document {document_id}: {source}")]
    Render {
        document_id: String,
        #[source]
        source: RenderError,
    },

    #[error("Failed to write note for document {document_id}: {source}")]
    Write {
        document_id: String,
        #[source]
        source: NoteError,
    },

    #[error("Failed to persist sync watermark: {0:#}")]
    Watermark(anyhow::Error),

    #[error("Credential store error: {0}")]
    Credential(#[from] CredentialError),
}

impl SyncError {
    /// Classify a fetch failure
    pub fn from_fetch(error: FetchError) -> Self {
        if error.is_auth() {
            SyncError::AuthorizationFailed(error)
        } else {
            SyncError::Fetch(error)
        }
    }

    /// Whether recovering needs a new credential from the user
    pub fn needs_credential(&self) -> bool {
        matches!(
            self,
            SyncError::CredentialMissing | SyncError::AuthorizationFailed(_)
        )
    }
}
