//! Sync orchestration
//!
//! Ties the credential store, remote client, renderer and note writer
//! together for one sync run and owns the watermark.
//!
//! ## Run sequence
//!
//! 1. `idle -> checking`, or return immediately if a run is in flight
//! 2. Make sure a credential exists, prompting the user once if needed
//! 3. Fetch `[watermark, now)` from the remote
//! 4. `checking -> syncing`; render and write each document in order
//! 5. Advance the watermark to the fetch time if every document was written
//! 6. Back to `idle`
//!
//! ## Usage
//!
//! ```ignore
//! let orchestrator = SyncOrchestrator::new(context);
//! match orchestrator.sync().await {
//!     SyncOutcome::Synced { documents } => println!("{} files synced", documents),
//!     other => println!("{:?}", other),
//! }
//! ```

mod orchestrator;
mod scheduler;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::credentials::{CredentialError, CredentialStore};
use crate::models::SyncState;

pub use orchestrator::{
    ClientFactory, DocumentFailure, OrchestratorContext, SyncOrchestrator, SyncOutcome,
};
pub use scheduler::{run_auto_sync, Schedule};

/// Asks the user for a credential
///
/// Implementations store whatever the user enters in the given store; the
/// orchestrator re-reads the store afterwards instead of receiving the value.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    async fn request_credential(&self, store: &dyn CredentialStore)
        -> Result<(), CredentialError>;
}

/// Prompt for non-interactive runs: never obtains anything
pub struct NoPrompt;

#[async_trait]
impl CredentialPrompt for NoPrompt {
    async fn request_credential(
        &self,
        _store: &dyn CredentialStore,
    ) -> Result<(), CredentialError> {
        Ok(())
    }
}

/// Status and notification sink
///
/// Purely observational: nothing it does feeds back into the orchestrator.
pub trait Notifier: Send + Sync {
    /// The orchestrator moved to a new state
    fn state_changed(&self, _state: SyncState) {}

    /// Transient informational banner
    fn message(&self, text: &str, timeout: Duration);

    /// Error banner (a zero timeout means it stays until dismissed)
    fn error(&self, text: &str, timeout: Duration);
}

/// Notifier that only writes to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn message(&self, text: &str, _timeout: Duration) {
        info!("{}", text);
    }

    fn error(&self, text: &str, _timeout: Duration) {
        warn!("{}", text);
    }
}
