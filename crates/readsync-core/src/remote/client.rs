//! Export API client
//!
//! HTTP client for the highlight export endpoint. Incremental fetches run in
//! two passes: the `updatedAfter` listing tells us which documents changed,
//! then those documents are re-fetched by id so each note is rendered from
//! the document's complete highlight set rather than just the new entries.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::wire::{ExportBook, ExportPage, WireId};
use super::{FetchError, HighlightSource};
use crate::config::DEFAULT_API_URL;
use crate::models::{Credential, Document, SyncWindow};

/// Path of the export listing, relative to the API base URL
pub const EXPORT_PATH: &str = "/api/v2/export/";

/// Number of document ids requested per by-id export call
const IDS_PER_REQUEST: usize = 100;

/// Longest error body kept in a [`FetchError::Status`]
const MAX_ERROR_BODY: usize = 200;

/// Transport options for [`ReadwiseClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API base URL (scheme and host, no trailing path)
    pub base_url: String,
    /// Per-request timeout, `None` for the transport default
    pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Client for the highlight export API
pub struct ReadwiseClient {
    http: Client,
    base_url: String,
    credential: Credential,
}

impl ReadwiseClient {
    /// Create a client bound to a credential
    pub fn new(credential: &Credential, options: ClientOptions) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(concat!(
            "readsync/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(FetchError::Transport)?;

        Ok(Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            credential: credential.clone(),
        })
    }

    /// Create a client from a raw secret, failing fast when it is blank
    pub fn from_secret(secret: &str, options: ClientOptions) -> Result<Self, FetchError> {
        let credential = Credential::new(secret).ok_or(FetchError::CredentialMissing)?;
        Self::new(&credential, options)
    }

    /// Follow the export listing until the server reports no further pages
    async fn export_all(&self, filter: &[(&'static str, String)]) -> Result<Vec<ExportBook>, FetchError> {
        let mut books = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();
        let mut pages = 0usize;

        loop {
            let mut query = filter.to_vec();
            if let Some(ref cursor) = cursor {
                query.push(("pageCursor", cursor.clone()));
            }

            let page = self.fetch_page(&query).await?;
            pages += 1;
            debug!(
                "Fetched export page {} ({} documents)",
                pages,
                page.results.len()
            );
            books.extend(page.results);

            match page.next_page_cursor.map(WireId::into_string) {
                Some(next) => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(FetchError::malformed(format!(
                            "pagination cursor '{}' was returned twice",
                            next
                        )));
                    }
                    cursor = Some(next);
                }
                None => break,
            }
        }

        Ok(books)
    }

    /// Fetch and decode a single page
    async fn fetch_page(&self, query: &[(&'static str, String)]) -> Result<ExportPage, FetchError> {
        let url = format!("{}{}", self.base_url, EXPORT_PATH);

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Token {}", self.credential.expose()))
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(FetchError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::malformed(e.to_string()))
    }
}

#[async_trait]
impl HighlightSource for ReadwiseClient {
    async fn fetch_documents_with_highlights(
        &self,
        window: &SyncWindow,
    ) -> Result<Vec<Document>, FetchError> {
        let mut filter = Vec::new();
        if let Some(since) = window.since {
            filter.push(("updatedAfter", since.to_rfc3339()));
        }

        let listed = self.export_all(&filter).await?;
        let mut documents: Vec<Document> = merge_books(listed, window)?
            .into_iter()
            .filter_map(|(document, touched)| touched.then_some(document))
            .collect();

        // A full export already carries every highlight
        if window.since.is_some() && !documents.is_empty() {
            let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
            let mut complete = HashMap::new();

            for chunk in ids.chunks(IDS_PER_REQUEST) {
                let books = self.export_all(&[("ids", chunk.join(","))]).await?;
                for (document, _) in merge_books(books, &SyncWindow::all())? {
                    complete.insert(document.id.clone(), document);
                }
            }

            for document in documents.iter_mut() {
                match complete.remove(&document.id) {
                    Some(full) => *document = full,
                    None => warn!(
                        "Document {} missing from by-id export, using listed highlights",
                        document.id
                    ),
                }
            }
        }

        info!("Fetched {} changed documents", documents.len());
        Ok(documents)
    }
}

/// Fold export books into documents unique by id, in first-seen order
///
/// The flag reports whether any highlight of the document (deleted ones
/// included) was updated inside `window`. Deleted highlights are dropped.
fn merge_books(
    books: Vec<ExportBook>,
    window: &SyncWindow,
) -> Result<Vec<(Document, bool)>, FetchError> {
    let mut merged: Vec<(Document, bool)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for book in books {
        let (document, raw_highlights) = book.into_parts();

        let slot = match index.get(&document.id) {
            Some(&i) => {
                let existing = &mut merged[i].0;
                existing.title = document.title;
                existing.author = document.author;
                existing.source = document.source;
                existing.category = document.category;
                existing.url = document.url;
                i
            }
            None => {
                index.insert(document.id.clone(), merged.len());
                merged.push((document, false));
                merged.len() - 1
            }
        };

        for raw in raw_highlights {
            let highlight_id = raw.id.clone().into_string();
            let converted = raw.into_domain().ok_or_else(|| {
                FetchError::malformed(format!(
                    "highlight {} in document {} has no timestamp",
                    highlight_id, merged[slot].0.id
                ))
            })?;

            let (document, touched) = &mut merged[slot];
            if window.contains(converted.highlight.updated_at) {
                *touched = true;
            }
            if converted.is_deleted {
                document.highlights.retain(|h| h.id != highlight_id);
            } else {
                document.upsert_highlight(converted.highlight);
            }
        }
    }

    Ok(merged)
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
