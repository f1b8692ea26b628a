//! Note storage
//!
//! Persists rendered notes into the vault. Each note is addressed by its
//! storage key (a path relative to the vault root) and only its managed
//! region is rewritten, so user edits elsewhere in the file survive.
//!
//! ## Architecture
//!
//! - [`merge`]: pure text transform `(existing, rendered) -> new content`
//! - [`NoteStore`]: read/write surface (filesystem in production)
//! - [`NoteWriter`]: read-merge-write for one rendered note

mod error;
pub mod merge;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

pub use error::NoteError;
pub use merge::{escape_markers, merge_managed_region, Markers, MergeError};

use crate::models::RenderedNote;
use crate::storage::atomic_write;

/// A path-addressed text store
pub trait NoteStore: Send + Sync {
    /// Read a note, `None` if it does not exist
    fn read(&self, path: &Path) -> Result<Option<String>, NoteError>;

    /// Create or replace a note
    fn write(&self, path: &Path, content: &str) -> Result<(), NoteError>;
}

/// Notes stored as files under a vault directory
pub struct FsNoteStore {
    root: PathBuf,
}

impl FsNoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl NoteStore for FsNoteStore {
    fn read(&self, path: &Path) -> Result<Option<String>, NoteError> {
        let full_path = self.resolve(path);
        match fs::read_to_string(&full_path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NoteError::from_read(e, full_path)),
        }
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), NoteError> {
        let full_path = self.resolve(path);
        atomic_write(&full_path, content.as_bytes())
            .map_err(|e| NoteError::from_write(e, full_path.clone()))?;
        debug!("Wrote note {:?}", full_path);
        Ok(())
    }
}

/// What [`NoteWriter::create_or_update`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    /// The managed region already held the rendered content
    Unchanged,
}

/// Writes rendered notes through a [`NoteStore`]
pub struct NoteWriter<'a> {
    store: &'a dyn NoteStore,
}

impl<'a> NoteWriter<'a> {
    pub fn new(store: &'a dyn NoteStore) -> Self {
        Self { store }
    }

    /// Create the note or replace its managed region
    pub fn create_or_update(&self, note: &RenderedNote) -> Result<WriteOutcome, NoteError> {
        let existing = self.store.read(&note.path)?;
        let markers = Markers::for_document(&note.document_id);

        let merged = merge_managed_region(existing.as_deref(), &markers, &note.content).map_err(
            |source| NoteError::Merge {
                path: note.path.clone(),
                source,
            },
        )?;

        let outcome = match existing {
            None => WriteOutcome::Created,
            Some(ref current) if *current == merged => return Ok(WriteOutcome::Unchanged),
            Some(_) => WriteOutcome::Updated,
        };

        self.store.write(&note.path, &merged)?;
        Ok(outcome)
    }
}
