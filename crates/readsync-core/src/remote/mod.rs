//! Remote highlight source
//!
//! Fetches documents-with-highlights for a [`SyncWindow`] from the remote
//! service. A fetch either returns every document in the window or fails as
//! a whole; partially fetched pages are never returned.
//!
//! ## Usage
//!
//! ```ignore
//! let client = ReadwiseClient::new(&credential, ClientOptions::default())?;
//! let documents = client
//!     .fetch_documents_with_highlights(&SyncWindow::new(since, Some(now)))
//!     .await?;
//! ```

mod client;
mod wire;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Document, SyncWindow};

pub use client::{ClientOptions, ReadwiseClient, EXPORT_PATH};

/// Why a fetch failed
#[derive(Error, Debug)]
pub enum FetchError {
    /// No usable credential was supplied
    #[error("No API token configured")]
    CredentialMissing,

    /// The remote rejected the credential
    #[error("The API token was rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The remote asked us to slow down
    #[error("Rate limited by the remote service{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    /// The request did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection or protocol failure
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Unexpected HTTP status
    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be understood
    #[error("Malformed response: {details}")]
    Malformed { details: String },
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|secs| format!(", retry after {}s", secs))
        .unwrap_or_default()
}

impl FetchError {
    /// Whether the user must provide a (new) credential to recover
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            FetchError::Unauthorized { .. } | FetchError::CredentialMissing
        )
    }

    /// Whether retrying the same window later is likely to succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Transport(_) | FetchError::RateLimited { .. } => {
                true
            }
            FetchError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn malformed(details: impl Into<String>) -> Self {
        FetchError::Malformed {
            details: details.into(),
        }
    }
}

/// Anything that can list documents with highlights for a time window
#[async_trait]
pub trait HighlightSource: Send + Sync {
    /// Fetch every document with highlights changed inside `window`
    ///
    /// Documents come back in server order, unique by id.
    async fn fetch_documents_with_highlights(
        &self,
        window: &SyncWindow,
    ) -> Result<Vec<Document>, FetchError>;
}
