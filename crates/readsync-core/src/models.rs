//! Data models for readsync
//!
//! Defines the values that flow through a sync run: the API credential,
//! the time window requested from the remote service, the documents and
//! highlights it returns, and the rendered notes written to the vault.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An API credential
///
/// Opaque secret. Empty or whitespace-only input is not a credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Create a credential, returning `None` for blank input
    pub fn new(secret: impl AsRef<str>) -> Option<Self> {
        let secret = secret.as_ref().trim();
        if secret.is_empty() {
            None
        } else {
            Some(Self(secret.to_string()))
        }
    }

    /// The raw secret, for building request headers
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Time range requested from the remote service
///
/// Half-open: `[since, until)`. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl SyncWindow {
    pub fn new(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        Self { since, until }
    }

    /// Everything the remote has
    pub fn all() -> Self {
        Self::default()
    }

    /// Check whether a timestamp falls inside the window
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| ts >= since) && self.until.map_or(true, |until| ts < until)
    }
}

/// A remote grouping of highlights (a book, article, tweet thread, ...)
///
/// Maps 1:1 to a local note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Remote-assigned unique identifier
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    /// Where the document came from (kindle, instapaper, ...)
    pub source: Option<String>,
    /// books, articles, tweets, podcasts, ...
    pub category: Option<String>,
    pub url: Option<String>,
    pub highlights: Vec<Highlight>,
}

impl Document {
    /// Create a document with no highlights
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: None,
            source: None,
            category: None,
            url: None,
            highlights: Vec::new(),
        }
    }

    /// Highlights in their stable render order
    pub fn ordered_highlights(&self) -> Vec<&Highlight> {
        let mut highlights: Vec<&Highlight> = self.highlights.iter().collect();
        highlights.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        highlights
    }

    /// Insert or replace a highlight, keeping highlights unique by id
    pub fn upsert_highlight(&mut self, highlight: Highlight) {
        match self.highlights.iter_mut().find(|h| h.id == highlight.id) {
            Some(existing) => *existing = highlight,
            None => self.highlights.push(highlight),
        }
    }
}

/// A single highlighted passage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Highlight {
    /// Remote-assigned unique identifier
    pub id: String,
    pub text: String,
    /// Reader's note attached to the passage
    pub note: Option<String>,
    /// Creation or last update time
    pub updated_at: DateTime<Utc>,
    /// Position inside the document, when the source reports one
    pub location: Option<i64>,
    pub url: Option<String>,
}

impl Highlight {
    pub fn new(id: impl Into<String>, text: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            note: None,
            updated_at,
            location: None,
            url: None,
        }
    }

    /// Key used to keep highlight ordering stable across re-renders
    ///
    /// Highlights without a location sort after located ones.
    pub fn order_key(&self) -> (i64, DateTime<Utc>, &str) {
        (
            self.location.unwrap_or(i64::MAX),
            self.updated_at,
            self.id.as_str(),
        )
    }
}

/// Sync orchestrator state, as shown by status surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Idle,
    /// Acquiring the credential and fetching from the remote
    Checking,
    /// Writing notes
    Syncing,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncState::Idle => "idle",
            SyncState::Checking => "checking",
            SyncState::Syncing => "syncing",
        };
        f.write_str(label)
    }
}

/// Materialized note text for a document, plus where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNote {
    pub document_id: String,
    /// Storage key, relative to the vault root
    pub path: PathBuf,
    pub content: String,
}
