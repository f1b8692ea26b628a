//! Export API response types (JSON deserialization)
//!
//! Represents the JSON returned by `GET /api/v2/export/`. These types are
//! private to the remote module so the wire format can change without
//! touching the rest of the crate.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{Document, Highlight};

/// One page of the export listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ExportPage {
    #[serde(default)]
    pub results: Vec<ExportBook>,

    /// Cursor for the next page, null on the last page
    #[serde(default)]
    pub next_page_cursor: Option<WireId>,
}

/// Identifiers arrive as numbers or strings depending on the endpoint version
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum WireId {
    Int(i64),
    Str(String),
}

impl WireId {
    pub fn into_string(self) -> String {
        match self {
            WireId::Int(n) => n.to_string(),
            WireId::Str(s) => s,
        }
    }
}

/// A book/article with its highlights
#[derive(Debug, Deserialize)]
pub(super) struct ExportBook {
    pub user_book_id: WireId,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub readable_title: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub source_url: Option<String>,

    #[serde(default)]
    pub unique_url: Option<String>,

    #[serde(default)]
    pub readwise_url: Option<String>,

    #[serde(default)]
    pub highlights: Vec<ExportHighlight>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ExportHighlight {
    pub id: WireId,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub note: Option<String>,

    #[serde(default)]
    pub location: Option<i64>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub highlighted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_deleted: bool,
}

/// A converted highlight plus the deletion flag the domain model doesn't carry
pub(super) struct WireHighlight {
    pub highlight: Highlight,
    pub is_deleted: bool,
}

impl ExportHighlight {
    /// Convert to a domain highlight
    ///
    /// The update time falls back to the highlight/creation time.
    /// Returns `None` when the payload carries no timestamp at all.
    pub fn into_domain(self) -> Option<WireHighlight> {
        let updated_at = self
            .updated_at
            .or(self.highlighted_at)
            .or(self.created_at)?;

        Some(WireHighlight {
            highlight: Highlight {
                id: self.id.into_string(),
                text: self.text,
                note: self.note.filter(|n| !n.trim().is_empty()),
                updated_at,
                location: self.location,
                url: self.url.filter(|u| !u.is_empty()),
            },
            is_deleted: self.is_deleted,
        })
    }
}

impl ExportBook {
    /// Split into document metadata and raw highlights
    pub fn into_parts(self) -> (Document, Vec<ExportHighlight>) {
        let title = self
            .readable_title
            .filter(|t| !t.trim().is_empty())
            .or(self.title.filter(|t| !t.trim().is_empty()))
            .unwrap_or_else(|| "Untitled".to_string());

        let url = self
            .source_url
            .or(self.unique_url)
            .or(self.readwise_url)
            .filter(|u| !u.is_empty());

        let mut document = Document::new(self.user_book_id.into_string(), title);
        document.author = self.author.filter(|a| !a.trim().is_empty());
        document.source = self.source.filter(|s| !s.is_empty());
        document.category = self.category.filter(|c| !c.is_empty());
        document.url = url;

        (document, self.highlights)
    }
}
