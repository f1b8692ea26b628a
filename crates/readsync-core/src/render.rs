//! Note rendering
//!
//! Turns a fetched [`Document`] into the text of its managed region and the
//! storage key it belongs at. Rendering does no I/O and is deterministic:
//! the same document and template always produce the same bytes, whatever
//! order the remote returned the highlights in.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::models::{Document, Highlight, RenderedNote};
use crate::notes::escape_markers;
use crate::template::{render_template, Template, TemplateError};

/// Longest file stem derived from a title
const MAX_STEM_CHARS: usize = 120;

/// Characters that are not allowed in note file names
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '#', '^', '[', ']'];

/// Errors raised while preparing or rendering notes
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The configured storage folder would escape the vault
    #[error("Invalid highlight storage path '{path}': must be a relative path inside the vault")]
    InvalidStoragePath { path: String },

    #[error("Document has no identifier")]
    MissingDocumentId,
}

/// Renders documents with one template into one storage folder
#[derive(Debug, Clone)]
pub struct NoteRenderer {
    template: Template,
    storage_dir: PathBuf,
}

impl NoteRenderer {
    /// Create a renderer, validating the storage folder
    pub fn new(template: Template, storage_path: &str) -> Result<Self, RenderError> {
        Ok(Self {
            template,
            storage_dir: validate_storage_path(storage_path)?,
        })
    }

    /// Render a document into note content plus its storage key
    pub fn render(&self, document: &Document) -> Result<RenderedNote, RenderError> {
        if document.id.trim().is_empty() {
            return Err(RenderError::MissingDocumentId);
        }

        let highlights = document.ordered_highlights();
        let rendered_highlights: Vec<String> = highlights
            .iter()
            .map(|h| render_highlight(&self.template.highlight, document, h))
            .collect();
        let highlight_list = rendered_highlights.join("\n");

        let content = render_template(&self.template.header, |name| match name {
            "id" => Some(document.id.clone()),
            "title" => Some(document.title.clone()),
            "author" => document.author.clone(),
            "source" => document.source.clone(),
            "category" => document.category.clone(),
            "url" => document.url.clone(),
            "num_highlights" => Some(highlights.len().to_string()),
            "highlights" => Some(highlight_list.clone()),
            _ => None,
        });

        Ok(RenderedNote {
            document_id: document.id.clone(),
            path: self.storage_dir.join(note_file_name(document)),
            content: escape_markers(&content),
        })
    }
}

fn render_highlight(template: &str, document: &Document, highlight: &Highlight) -> String {
    render_template(template, |name| match name {
        "id" => Some(highlight.id.clone()),
        "text" => Some(highlight.text.clone()),
        "note" => highlight.note.clone(),
        "note_block" => highlight
            .note
            .as_ref()
            .map(|note| format!("\n  > {}", note.trim())),
        "location" => highlight.location.map(|l| l.to_string()),
        "updated" => Some(highlight.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        "url" => highlight.url.clone(),
        "title" => Some(document.title.clone()),
        _ => None,
    })
}

/// Reject absolute paths and parent-directory hops
fn validate_storage_path(storage_path: &str) -> Result<PathBuf, RenderError> {
    let trimmed = storage_path.trim();
    let path = Path::new(trimmed);

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            _ => {
                return Err(RenderError::InvalidStoragePath {
                    path: storage_path.to_string(),
                })
            }
        }
    }

    Ok(normalized)
}

/// File name for a document's note
///
/// Derived from the title; documents whose title sanitizes to nothing fall
/// back to their id.
pub fn note_file_name(document: &Document) -> String {
    let stem = sanitize_file_stem(&document.title);
    if stem.is_empty() {
        format!("document-{}.md", sanitize_file_stem(&document.id))
    } else {
        format!("{}.md", stem)
    }
}

fn sanitize_file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_control() || FORBIDDEN_CHARS.contains(&c) {
                ' '
            } else {
                c
            }
        })
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_STEM_CHARS).collect();
    truncated
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}
