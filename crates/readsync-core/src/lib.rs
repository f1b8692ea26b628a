//! readsync Core Library
//!
//! This crate provides the core functionality for readsync, which pulls
//! highlights from a Readwise-style export API and keeps one Markdown note
//! per source document up to date in a local notes vault.
//!
//! # Architecture
//!
//! - **Remote client**: fetches documents changed since the last sync
//! - **Renderer**: turns a document into note text using user templates
//! - **Note writer**: replaces only the managed region of each note, so edits
//!   made around it survive
//! - **Orchestrator**: runs one sync at a time and owns the watermark
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let orchestrator = SyncOrchestrator::new(OrchestratorContext { .. });
//!
//! match orchestrator.sync().await {
//!     SyncOutcome::Synced { documents } => println!("{} files synced", documents),
//!     SyncOutcome::UpToDate => println!("Everything up-to-date"),
//!     other => eprintln!("{:?}", other),
//! }
//! ```
//!
//! # Modules
//!
//! - `config`: Application configuration
//! - `credentials`: API token storage
//! - `remote`: Export API client
//! - `template` / `render`: Note rendering
//! - `notes`: Managed-region note storage
//! - `watermark`: Persisted sync position
//! - `sync`: Orchestrator and auto-sync scheduler

pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod notes;
pub mod remote;
pub mod render;
mod storage;
pub mod sync;
pub mod template;
pub mod watermark;

pub use config::{Config, SyncSettings};
pub use credentials::{CredentialError, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::SyncError;
pub use models::{Credential, Document, Highlight, RenderedNote, SyncState, SyncWindow};
pub use notes::{FsNoteStore, NoteError, NoteStore, NoteWriter, WriteOutcome};
pub use remote::{ClientOptions, FetchError, HighlightSource, ReadwiseClient};
pub use render::{NoteRenderer, RenderError};
pub use sync::{
    run_auto_sync, ClientFactory, CredentialPrompt, DocumentFailure, LogNotifier, NoPrompt,
    Notifier, OrchestratorContext, Schedule, SyncOrchestrator, SyncOutcome,
};
pub use template::{Template, TemplateError};
pub use watermark::Watermark;
