//! Managed region merge
//!
//! A note may hold user-authored text around the region readsync owns. The
//! region is delimited by a start/end marker pair tied to the document id,
//! and only the bytes between the markers are ever replaced.

use thiserror::Error;

/// Every marker readsync writes starts with this
const MARKER_PREFIX: &str = "<!--rw-";

/// Stand-in for [`MARKER_PREFIX`] inside region content
const ESCAPED_PREFIX: &str = "<!-- rw-";

/// The marker pair delimiting a managed region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub start: String,
    pub end: String,
}

impl Markers {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Markers unique to one document
    pub fn for_document(document_id: &str) -> Self {
        Self::new(
            format!("{}start:{}-->", MARKER_PREFIX, document_id),
            format!("{}end:{}-->", MARKER_PREFIX, document_id),
        )
    }
}

/// Break up anything in `content` that could be read back as a marker
///
/// Region content comes from remote text. A literal end marker in a highlight
/// would otherwise close the region early on the next merge. The escaped form
/// still renders as an HTML comment.
pub fn escape_markers(content: &str) -> String {
    content.replace(MARKER_PREFIX, ESCAPED_PREFIX)
}

/// The existing note's markers are unusable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("start marker '{marker}' has no matching end marker")]
    UnterminatedRegion { marker: String },

    #[error("end marker '{marker}' appears without a start marker")]
    DanglingEnd { marker: String },
}

/// Merge rendered content into a note's managed region
///
/// - No existing note: the result is just the region.
/// - Existing note with the markers: only the text between them changes.
/// - Existing note without the markers: the region is appended on its own line.
pub fn merge_managed_region(
    existing: Option<&str>,
    markers: &Markers,
    content: &str,
) -> Result<String, MergeError> {
    let Some(existing) = existing else {
        return Ok(format!("{}{}{}\n", markers.start, content, markers.end));
    };

    match existing.find(&markers.start) {
        Some(start_idx) => {
            let body_start = start_idx + markers.start.len();
            let Some(end_offset) = existing[body_start..].find(&markers.end) else {
                return Err(MergeError::UnterminatedRegion {
                    marker: markers.start.clone(),
                });
            };
            let body_end = body_start + end_offset;

            let mut merged = String::with_capacity(existing.len() + content.len());
            merged.push_str(&existing[..body_start]);
            merged.push_str(content);
            merged.push_str(&existing[body_end..]);
            Ok(merged)
        }
        None if existing.contains(&markers.end) => Err(MergeError::DanglingEnd {
            marker: markers.end.clone(),
        }),
        None => {
            let mut merged = existing.to_string();
            if !merged.is_empty() && !merged.ends_with('\n') {
                merged.push('\n');
            }
            merged.push_str(&markers.start);
            merged.push_str(content);
            merged.push_str(&markers.end);
            merged.push('\n');
            Ok(merged)
        }
    }
}
