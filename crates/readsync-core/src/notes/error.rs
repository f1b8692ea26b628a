//! Note store error handling
//!
//! Provides typed errors for note reads and writes with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::merge::MergeError;

/// Errors that can occur while reading or writing a note
#[derive(Error, Debug)]
pub enum NoteError {
    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read the existing note
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write the note
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The note is not valid UTF-8 text
    #[error("'{path}' is not a UTF-8 text file")]
    NotText { path: PathBuf },

    /// The managed region markers in the existing note are broken
    #[error("Cannot update '{path}': {source}")]
    Merge {
        path: PathBuf,
        #[source]
        source: MergeError,
    },
}

impl NoteError {
    /// Create an error from a failed read, classifying by error kind
    pub fn from_read(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => NoteError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::InvalidData => NoteError::NotText { path },
            _ => NoteError::ReadError {
                path,
                source: error,
            },
        }
    }

    /// Create an error from a failed write, classifying by error kind
    pub fn from_write(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => NoteError::PermissionDenied {
                path,
                source: error,
            },
            _ if is_disk_full_error(&error) => NoteError::DiskFull {
                path,
                source: error,
            },
            _ => NoteError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            NoteError::DiskFull { .. } => Some("Free up disk space and sync again."),
            NoteError::PermissionDenied { .. } => {
                Some("Check that the vault folder is writable by the current user.")
            }
            NoteError::Merge { .. } => Some(
                "Restore the missing readsync marker comment in the note, or delete the note to regenerate it.",
            ),
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = NoteError::from_write(io_err, PathBuf::from("/vault/note.md"));

        assert!(matches!(err, NoteError::PermissionDenied { .. }));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_disk_full_detection() {
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = NoteError::from_write(io_err, PathBuf::from("/full/disk"));

        assert!(matches!(err, NoteError::DiskFull { .. }));
    }

    #[test]
    fn test_invalid_utf8_read() {
        let io_err = io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8");
        let err = NoteError::from_read(io_err, PathBuf::from("/vault/image.md"));

        assert!(matches!(err, NoteError::NotText { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = NoteError::WriteError {
            path: PathBuf::from("/vault/note.md"),
            source: io::Error::new(io::ErrorKind::Other, "boom"),
        };

        let msg = err.to_string();
        assert!(msg.contains("Failed to write"));
        assert!(msg.contains("/vault/note.md"));
        assert!(err.recovery_suggestion().is_none());
    }
}
