//! Sync orchestrator state machine

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::{CredentialPrompt, Notifier};
use crate::config::SyncSettings;
use crate::credentials::CredentialStore;
use crate::error::SyncError;
use crate::models::{Credential, Document, SyncState, SyncWindow};
use crate::notes::{NoteStore, NoteWriter, WriteOutcome};
use crate::remote::{FetchError, HighlightSource};
use crate::render::NoteRenderer;
use crate::template::Template;
use crate::watermark::Watermark;

/// How long informational banners stay up
const MESSAGE_TIMEOUT: Duration = Duration::from_secs(4);

/// Error banners stay until dismissed
const ERROR_TIMEOUT: Duration = Duration::ZERO;

const CREDENTIAL_MISSING_MESSAGE: &str =
    "Token was empty or was not provided, please configure it to sync with Readwise";

/// Builds a remote client for a credential
pub type ClientFactory =
    Box<dyn Fn(&Credential) -> Result<Box<dyn HighlightSource>, FetchError> + Send + Sync>;

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Collaborators of one orchestrator
pub struct OrchestratorContext {
    pub credentials: Box<dyn CredentialStore>,
    pub client_factory: ClientFactory,
    pub notes: Box<dyn NoteStore>,
    pub prompt: Box<dyn CredentialPrompt>,
    pub notifier: Box<dyn Notifier>,
    pub watermark: Watermark,
    pub settings: SyncSettings,
}

/// A document that could not be synced in an otherwise completed batch
#[derive(Debug)]
pub struct DocumentFailure {
    pub document_id: String,
    pub title: String,
    pub error: SyncError,
}

/// Result of one call to [`SyncOrchestrator::sync`]
#[derive(Debug)]
pub enum SyncOutcome {
    /// Another run was in flight; nothing happened
    AlreadyRunning,
    /// No credential, even after prompting; nothing was fetched
    CredentialMissing,
    /// The remote had nothing new; watermark advanced
    UpToDate,
    /// Every fetched document was written; watermark advanced
    Synced { documents: usize },
    /// Some documents failed; watermark left in place
    Partial {
        synced: usize,
        failures: Vec<DocumentFailure>,
    },
    /// The run failed as a whole; watermark left in place
    Failed(SyncError),
}

impl SyncOutcome {
    /// Whether the run completed and advanced the watermark
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::UpToDate | SyncOutcome::Synced { .. })
    }
}

/// Drives sync runs; at most one run is in flight at a time
pub struct SyncOrchestrator {
    credentials: Box<dyn CredentialStore>,
    client_factory: ClientFactory,
    notes: Box<dyn NoteStore>,
    prompt: Box<dyn CredentialPrompt>,
    notifier: Box<dyn Notifier>,
    settings: SyncSettings,
    watermark: Mutex<Watermark>,
    state: watch::Sender<SyncState>,
    clock: Clock,
}

/// Returns the orchestrator to idle when a run ends, however it ends
struct RunGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.set_state(SyncState::Idle);
    }
}

impl SyncOrchestrator {
    pub fn new(context: OrchestratorContext) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            credentials: context.credentials,
            client_factory: context.client_factory,
            notes: context.notes,
            prompt: context.prompt,
            notifier: context.notifier,
            settings: context.settings,
            watermark: Mutex::new(context.watermark),
            state,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the wall clock (tests)
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Current state
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// End of the last fully synced window
    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.watermark.lock().await.last_update()
    }

    /// Run one sync
    ///
    /// Returns [`SyncOutcome::AlreadyRunning`] without doing anything if a
    /// run is already in flight. Manual and scheduled syncs both come here.
    pub async fn sync(&self) -> SyncOutcome {
        let Some(_guard) = self.try_begin() else {
            debug!("Sync requested while {}, ignoring", self.state());
            return SyncOutcome::AlreadyRunning;
        };

        self.run().await
    }

    /// Atomically move `idle -> checking`
    fn try_begin(&self) -> Option<RunGuard<'_>> {
        let started = self.state.send_if_modified(|state| {
            if *state == SyncState::Idle {
                *state = SyncState::Checking;
                true
            } else {
                false
            }
        });

        if !started {
            return None;
        }

        self.notifier.state_changed(SyncState::Checking);
        Some(RunGuard { orchestrator: self })
    }

    fn set_state(&self, state: SyncState) {
        self.state.send_replace(state);
        self.notifier.state_changed(state);
    }

    async fn run(&self) -> SyncOutcome {
        let credential = match self.acquire_credential().await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                warn!("No API token available, sync aborted");
                self.notifier.error(CREDENTIAL_MISSING_MESSAGE, ERROR_TIMEOUT);
                return SyncOutcome::CredentialMissing;
            }
            Err(e) => return self.fail(e),
        };

        let until = (self.clock)();
        let window = self.window_until(until).await;
        info!(
            "Checking for highlights updated since {}",
            window
                .since
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "the beginning".to_string())
        );

        let documents = match self.fetch(&credential, &window).await {
            Ok(documents) => documents,
            Err(e) => return self.fail(e),
        };

        if documents.is_empty() {
            if let Err(e) = self.advance_watermark(until).await {
                return self.fail(e);
            }
            self.inform("Readwise: Everything up-to-date");
            return SyncOutcome::UpToDate;
        }

        self.set_state(SyncState::Syncing);
        self.write_batch(&documents, until).await
    }

    /// Read the credential, prompting once if there is none
    async fn acquire_credential(&self) -> Result<Option<Credential>, SyncError> {
        if let Some(credential) = self.credentials.try_get()? {
            return Ok(Some(credential));
        }

        debug!("No API token stored, asking the user");
        self.prompt
            .request_credential(self.credentials.as_ref())
            .await?;

        Ok(self.credentials.try_get()?)
    }

    /// Window for this run, ending at `until`
    async fn window_until(&self, until: DateTime<Utc>) -> SyncWindow {
        let since = match self.watermark.lock().await.last_update() {
            Some(last_update) => Some(last_update),
            None if self.settings.sync_all_highlights_on_first_sync => None,
            None => Some(until),
        };
        SyncWindow::new(since, Some(until))
    }

    async fn fetch(
        &self,
        credential: &Credential,
        window: &SyncWindow,
    ) -> Result<Vec<Document>, SyncError> {
        let result = match (self.client_factory)(credential) {
            Ok(client) => client.fetch_documents_with_highlights(window).await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            let error = SyncError::from_fetch(e);
            if error.needs_credential() {
                // Forget the rejected token so the next run prompts for a new one
                if let Err(clear_err) = self.credentials.clear() {
                    warn!("Failed to clear rejected API token: {}", clear_err);
                }
            }
            error
        })
    }

    /// Render and write every document, in order, one at a time
    async fn write_batch(&self, documents: &[Document], until: DateTime<Utc>) -> SyncOutcome {
        let renderer = match self.prepare_renderer() {
            Ok(renderer) => renderer,
            Err(e) => return self.fail(e),
        };
        let writer = NoteWriter::new(self.notes.as_ref());

        let mut synced = 0;
        let mut failures = Vec::new();

        for document in documents {
            match sync_document(&renderer, &writer, document) {
                Ok(outcome) => {
                    debug!("Document {} ({}): {:?}", document.id, document.title, outcome);
                    synced += 1;
                }
                Err(error) => {
                    warn!("Skipping document {} ({}): {}", document.id, document.title, error);
                    failures.push(DocumentFailure {
                        document_id: document.id.clone(),
                        title: document.title.clone(),
                        error,
                    });
                }
            }
        }

        if !failures.is_empty() {
            let message = format!(
                "Readwise: Synced {} of {} files; {} failed ({})",
                synced,
                documents.len(),
                failures.len(),
                failures[0].error
            );
            warn!("{}", message);
            self.notifier.error(&message, ERROR_TIMEOUT);
            return SyncOutcome::Partial { synced, failures };
        }

        if let Err(e) = self.advance_watermark(until).await {
            return self.fail(e);
        }

        self.inform(&format!(
            "Readwise: Synced new changes. {} files synced",
            synced
        ));
        SyncOutcome::Synced { documents: synced }
    }

    fn prepare_renderer(&self) -> Result<NoteRenderer, SyncError> {
        let header = self
            .settings
            .resolve_template(&self.settings.header_template_path);
        let highlight = self
            .settings
            .resolve_template(&self.settings.highlight_template_path);

        let template = Template::load(header.as_deref(), highlight.as_deref())
            .map_err(|e| SyncError::Setup(e.into()))?;
        Ok(NoteRenderer::new(
            template,
            &self.settings.highlight_storage_path,
        )?)
    }

    async fn advance_watermark(&self, until: DateTime<Utc>) -> Result<(), SyncError> {
        let mut watermark = self.watermark.lock().await;
        let previous = watermark.last_update();
        watermark.advance(until);

        if let Err(e) = watermark.save() {
            // Keep memory and disk in agreement
            match previous {
                Some(previous) => {
                    watermark.reset();
                    watermark.advance(previous);
                }
                None => watermark.reset(),
            }
            return Err(SyncError::Watermark(e));
        }

        debug!("Watermark advanced to {}", until.to_rfc3339());
        Ok(())
    }

    /// Informational message, unless notifications are disabled
    fn inform(&self, message: &str) {
        info!("{}", message);
        if !self.settings.disable_notifications {
            self.notifier.message(message, MESSAGE_TIMEOUT);
        }
    }

    fn fail(&self, error: SyncError) -> SyncOutcome {
        warn!("Sync failed: {}", error);
        let message = if error.needs_credential() {
            format!(
                "Readwise: {}. Enter a new token and sync again",
                error
            )
        } else {
            format!("Unexpected error: {}", error)
        };
        self.notifier.error(&message, ERROR_TIMEOUT);
        SyncOutcome::Failed(error)
    }
}

/// Render then write one document; nothing is written if rendering fails
fn sync_document(
    renderer: &NoteRenderer,
    writer: &NoteWriter<'_>,
    document: &Document,
) -> Result<WriteOutcome, SyncError> {
    let note = renderer.render(document).map_err(|source| SyncError::Render {
        document_id: document.id.clone(),
        source,
    })?;

    writer
        .create_or_update(&note)
        .map_err(|source| SyncError::Write {
            document_id: document.id.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    use crate::credentials::{CredentialError, MemoryCredentialStore};
    use crate::models::Highlight;
    use crate::notes::{FsNoteStore, NoteError};
    use crate::sync::NoPrompt;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    const T0: i64 = 1_700_000_000;
    const NOW: i64 = 1_700_086_400;

    fn document(id: &str, title: &str, updated: i64) -> Document {
        let mut doc = Document::new(id, title);
        doc.author = Some("Author".to_string());
        doc.highlights = vec![Highlight::new(
            format!("{}-h1", id),
            format!("Passage from {}", title),
            ts(updated),
        )];
        doc
    }

    /// Remote double: replays scripted responses and records windows
    #[derive(Clone, Default)]
    struct FakeRemote {
        responses: Arc<StdMutex<VecDeque<Result<Vec<Document>, FetchError>>>>,
        windows: Arc<StdMutex<Vec<SyncWindow>>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeRemote {
        fn push(&self, response: Result<Vec<Document>, FetchError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn calls(&self) -> usize {
            self.windows.lock().unwrap().len()
        }

        fn windows(&self) -> Vec<SyncWindow> {
            self.windows.lock().unwrap().clone()
        }

        fn factory(&self) -> ClientFactory {
            let remote = self.clone();
            Box::new(move |_credential: &Credential| {
                Ok(Box::new(remote.clone()) as Box<dyn HighlightSource>)
            })
        }
    }

    #[async_trait]
    impl HighlightSource for FakeRemote {
        async fn fetch_documents_with_highlights(
            &self,
            window: &SyncWindow,
        ) -> Result<Vec<Document>, FetchError> {
            self.windows.lock().unwrap().push(*window);
            if let Some(ref gate) = self.gate {
                gate.notified().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Note store double that can fail writes for chosen paths
    #[derive(Clone, Default)]
    struct MemoryNotes {
        files: Arc<StdMutex<HashMap<PathBuf, String>>>,
        fail_writes: Arc<StdMutex<HashSet<PathBuf>>>,
    }

    impl MemoryNotes {
        fn get(&self, path: &str) -> Option<String> {
            self.files.lock().unwrap().get(Path::new(path)).cloned()
        }

        fn put(&self, path: &str, content: &str) {
            self.files
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), content.to_string());
        }

        fn fail_on(&self, path: &str) {
            self.fail_writes.lock().unwrap().insert(PathBuf::from(path));
        }
    }

    impl NoteStore for MemoryNotes {
        fn read(&self, path: &Path) -> Result<Option<String>, NoteError> {
            Ok(self.files.lock().unwrap().get(path).cloned())
        }

        fn write(&self, path: &Path, content: &str) -> Result<(), NoteError> {
            if self.fail_writes.lock().unwrap().contains(path) {
                return Err(NoteError::from_write(
                    std::io::Error::new(std::io::ErrorKind::Other, "No space left on device"),
                    path.to_path_buf(),
                ));
            }
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), content.to_string());
            Ok(())
        }
    }

    /// Note store whose writes block until the test releases them
    struct HeldNotes {
        inner: MemoryNotes,
        entered: Arc<Notify>,
        release: StdMutex<mpsc::Receiver<()>>,
    }

    impl NoteStore for HeldNotes {
        fn read(&self, path: &Path) -> Result<Option<String>, NoteError> {
            self.inner.read(path)
        }

        fn write(&self, path: &Path, content: &str) -> Result<(), NoteError> {
            self.entered.notify_one();
            let _ = self.release.lock().unwrap().recv();
            self.inner.write(path, content)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        State(SyncState),
        Message(String),
        Error(String),
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        events: Arc<StdMutex<Vec<Event>>>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    Event::Message(m) => Some(m.clone()),
                    _ => None,
                })
                .collect()
        }

        fn errors(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    Event::Error(m) => Some(m.clone()),
                    _ => None,
                })
                .collect()
        }

        fn states(&self) -> Vec<SyncState> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    Event::State(s) => Some(*s),
                    _ => None,
                })
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn state_changed(&self, state: SyncState) {
            self.events.lock().unwrap().push(Event::State(state));
        }

        fn message(&self, text: &str, _timeout: Duration) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Message(text.to_string()));
        }

        fn error(&self, text: &str, _timeout: Duration) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Error(text.to_string()));
        }
    }

    /// Prompt double that stores a fixed answer (or nothing) and counts calls
    #[derive(Clone, Default)]
    struct ScriptedPrompt {
        answer: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CredentialPrompt for ScriptedPrompt {
        async fn request_credential(
            &self,
            store: &dyn CredentialStore,
        ) -> Result<(), CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(ref answer) => store.upsert(answer),
                None => Ok(()),
            }
        }
    }

    struct Harness {
        remote: FakeRemote,
        notes: MemoryNotes,
        notifier: RecordingNotifier,
        settings: SyncSettings,
        watermark: Option<DateTime<Utc>>,
        token: Option<&'static str>,
        prompt: Option<ScriptedPrompt>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                remote: FakeRemote::default(),
                notes: MemoryNotes::default(),
                notifier: RecordingNotifier::default(),
                settings: SyncSettings {
                    sync_all_highlights_on_first_sync: true,
                    ..SyncSettings::default()
                },
                watermark: Some(ts(T0)),
                token: Some("token"),
                prompt: None,
            }
        }

        fn build(&self) -> SyncOrchestrator {
            self.build_with_notes(Box::new(self.notes.clone()))
        }

        fn build_with_notes(&self, notes: Box<dyn NoteStore>) -> SyncOrchestrator {
            let mut watermark = Watermark::new();
            if let Some(last) = self.watermark {
                watermark.advance(last);
            }
            let credentials = match self.token {
                Some(token) => MemoryCredentialStore::with_value(token),
                None => MemoryCredentialStore::new(),
            };
            let prompt: Box<dyn CredentialPrompt> = match self.prompt {
                Some(ref prompt) => Box::new(prompt.clone()),
                None => Box::new(NoPrompt),
            };

            SyncOrchestrator::new(OrchestratorContext {
                credentials: Box::new(credentials),
                client_factory: self.remote.factory(),
                notes,
                prompt,
                notifier: Box::new(self.notifier.clone()),
                watermark,
                settings: self.settings.clone(),
            })
            .with_clock(|| ts(NOW))
        }
    }

    #[tokio::test]
    async fn test_three_documents_synced_and_watermark_advanced() {
        let harness = Harness::new();
        harness.remote.push(Ok(vec![
            document("1", "Alpha", T0 + 10),
            document("2", "Beta", T0 + 20),
            document("3", "Gamma", T0 + 30),
        ]));
        let orchestrator = harness.build();

        let outcome = orchestrator.sync().await;

        assert!(matches!(outcome, SyncOutcome::Synced { documents: 3 }));
        assert_eq!(orchestrator.last_update().await, Some(ts(NOW)));
        assert_eq!(orchestrator.state(), SyncState::Idle);
        assert!(harness.notes.get("Alpha.md").is_some());
        assert!(harness.notes.get("Beta.md").is_some());
        assert!(harness.notes.get("Gamma.md").is_some());
        assert_eq!(
            harness.notifier.messages(),
            vec!["Readwise: Synced new changes. 3 files synced".to_string()]
        );
        assert_eq!(
            harness.notifier.states(),
            vec![SyncState::Checking, SyncState::Syncing, SyncState::Idle]
        );
        assert_eq!(
            harness.remote.windows(),
            vec![SyncWindow::new(Some(ts(T0)), Some(ts(NOW)))]
        );
    }

    #[tokio::test]
    async fn test_second_run_without_changes_is_idempotent() {
        let harness = Harness::new();
        let docs = vec![document("1", "Alpha", T0 + 10)];
        harness.remote.push(Ok(docs.clone()));
        harness.remote.push(Ok(docs));
        let orchestrator = harness.build();

        orchestrator.sync().await;
        let first = harness.notes.get("Alpha.md").unwrap();
        orchestrator.sync().await;
        let second = harness.notes.get("Alpha.md").unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_user_edits_outside_region_survive_sync() {
        let harness = Harness::new();
        harness.notes.put(
            "Alpha.md",
            "My thoughts\n<!--rw-start:1-->stale<!--rw-end:1-->\nMore thoughts\n",
        );
        harness.remote.push(Ok(vec![document("1", "Alpha", T0 + 10)]));
        let orchestrator = harness.build();

        orchestrator.sync().await;

        let note = harness.notes.get("Alpha.md").unwrap();
        assert!(note.starts_with("My thoughts\n<!--rw-start:1--># Alpha\n"));
        assert!(note.ends_with("<!--rw-end:1-->\nMore thoughts\n"));
        assert!(!note.contains("stale"));
    }

    #[tokio::test]
    async fn test_empty_fetch_reports_up_to_date() {
        let harness = Harness::new();
        harness.remote.push(Ok(Vec::new()));
        let orchestrator = harness.build();

        let outcome = orchestrator.sync().await;

        assert!(matches!(outcome, SyncOutcome::UpToDate));
        assert_eq!(orchestrator.last_update().await, Some(ts(NOW)));
        assert_eq!(
            harness.notifier.messages(),
            vec!["Readwise: Everything up-to-date".to_string()]
        );
        // Never entered the syncing state
        assert_eq!(
            harness.notifier.states(),
            vec![SyncState::Checking, SyncState::Idle]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_watermark() {
        let harness = Harness::new();
        harness.remote.push(Err(FetchError::Timeout));
        let orchestrator = harness.build();

        let outcome = orchestrator.sync().await;

        assert!(matches!(
            outcome,
            SyncOutcome::Failed(SyncError::Fetch(FetchError::Timeout))
        ));
        assert_eq!(orchestrator.last_update().await, Some(ts(T0)));
        assert_eq!(orchestrator.state(), SyncState::Idle);
        assert_eq!(
            harness.notifier.errors(),
            vec!["Unexpected error: Request timed out".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token_and_next_run_prompts() {
        let mut harness = Harness::new();
        let prompt = ScriptedPrompt::default();
        harness.prompt = Some(prompt.clone());
        harness
            .remote
            .push(Err(FetchError::Unauthorized { status: 401 }));
        let orchestrator = harness.build();

        let outcome = orchestrator.sync().await;
        assert!(matches!(
            outcome,
            SyncOutcome::Failed(SyncError::AuthorizationFailed(_))
        ));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 0);

        let outcome = orchestrator.sync().await;
        assert!(matches!(outcome, SyncOutcome::CredentialMissing));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_cancelled_prompt_aborts_before_fetch() {
        let mut harness = Harness::new();
        harness.token = None;
        let prompt = ScriptedPrompt::default();
        harness.prompt = Some(prompt.clone());
        let orchestrator = harness.build();

        let outcome = orchestrator.sync().await;

        assert!(matches!(outcome, SyncOutcome::CredentialMissing));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.remote.calls(), 0);
        assert_eq!(orchestrator.last_update().await, Some(ts(T0)));
        assert_eq!(orchestrator.state(), SyncState::Idle);
        assert_eq!(
            harness.notifier.errors(),
            vec![CREDENTIAL_MISSING_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_prompt_supplies_credential() {
        let mut harness = Harness::new();
        harness.token = None;
        harness.prompt = Some(ScriptedPrompt {
            answer: Some("fresh-token".to_string()),
            ..ScriptedPrompt::default()
        });
        harness.remote.push(Ok(Vec::new()));
        let orchestrator = harness.build();

        let outcome = orchestrator.sync().await;

        assert!(matches!(outcome, SyncOutcome::UpToDate));
        assert_eq!(harness.remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_sync_is_rejected() {
        let mut harness = Harness::new();
        let gate = Arc::new(Notify::new());
        harness.remote.gate = Some(gate.clone());
        harness.remote.push(Ok(vec![document("1", "Alpha", T0 + 10)]));
        let orchestrator = harness.build();
        let mut state_rx = orchestrator.subscribe();

        let (first, second) = tokio::join!(orchestrator.sync(), async {
            state_rx
                .wait_for(|state| *state != SyncState::Idle)
                .await
                .unwrap();
            let second = orchestrator.sync().await;
            gate.notify_one();
            second
        });

        assert!(matches!(second, SyncOutcome::AlreadyRunning));
        assert!(matches!(first, SyncOutcome::Synced { documents: 1 }));
        assert_eq!(harness.remote.calls(), 1);
        assert_eq!(orchestrator.state(), SyncState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sync_is_rejected_while_writing_notes() {
        let harness = Harness::new();
        harness.remote.push(Ok(vec![document("1", "Alpha", T0 + 10)]));
        let entered = Arc::new(Notify::new());
        let (release_tx, release_rx) = mpsc::channel();
        let notes = HeldNotes {
            inner: harness.notes.clone(),
            entered: entered.clone(),
            release: StdMutex::new(release_rx),
        };
        let orchestrator = Arc::new(harness.build_with_notes(Box::new(notes)));

        let first = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.sync().await }
        });

        entered.notified().await;
        assert_eq!(orchestrator.state(), SyncState::Syncing);
        let second = orchestrator.sync().await;
        release_tx.send(()).unwrap();
        let first = first.await.unwrap();

        assert!(matches!(second, SyncOutcome::AlreadyRunning));
        assert!(matches!(first, SyncOutcome::Synced { documents: 1 }));
        assert_eq!(harness.remote.calls(), 1);
        assert!(harness.notes.get("Alpha.md").is_some());
        assert_eq!(orchestrator.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_marker_text_in_highlight_keeps_note_stable() {
        let harness = Harness::new();
        let mut doc = document("1", "Alpha", T0 + 10);
        doc.highlights[0].text = "see <!--rw-end:1--> in html".to_string();
        for _ in 0..3 {
            harness.remote.push(Ok(vec![doc.clone()]));
        }
        let orchestrator = harness.build();

        let mut notes = Vec::new();
        for _ in 0..3 {
            assert!(orchestrator.sync().await.is_success());
            notes.push(harness.notes.get("Alpha.md").unwrap());
        }

        assert_eq!(notes[0], notes[1]);
        assert_eq!(notes[1], notes[2]);
        assert_eq!(notes[0].matches("<!--rw-end:1-->").count(), 1);
        assert!(notes[0].contains("see <!-- rw-end:1--> in html"));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_watermark_and_continues() {
        let harness = Harness::new();
        harness.notes.fail_on("Beta.md");
        harness.remote.push(Ok(vec![
            document("1", "Alpha", T0 + 10),
            document("2", "Beta", T0 + 20),
            document("3", "Gamma", T0 + 30),
        ]));
        let orchestrator = harness.build();

        let outcome = orchestrator.sync().await;

        match outcome {
            SyncOutcome::Partial { synced, failures } => {
                assert_eq!(synced, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].document_id, "2");
                assert!(matches!(failures[0].error, SyncError::Write { .. }));
            }
            other => panic!("expected partial outcome, got {:?}", other),
        }
        assert!(harness.notes.get("Alpha.md").is_some());
        assert!(harness.notes.get("Gamma.md").is_some());
        assert_eq!(orchestrator.last_update().await, Some(ts(T0)));
        assert_eq!(harness.notifier.errors().len(), 1);
        assert!(harness.notifier.errors()[0].contains("Synced 2 of 3 files; 1 failed"));
    }

    #[tokio::test]
    async fn test_render_failure_writes_nothing_for_that_document() {
        let harness = Harness::new();
        harness.remote.push(Ok(vec![
            Document::new("", "Broken"),
            document("2", "Beta", T0 + 20),
        ]));
        let orchestrator = harness.build();

        let outcome = orchestrator.sync().await;

        assert!(matches!(outcome, SyncOutcome::Partial { synced: 1, .. }));
        assert!(harness.notes.get("Broken.md").is_none());
        assert!(harness.notes.get("Beta.md").is_some());
    }

    #[tokio::test]
    async fn test_first_sync_window() {
        let mut harness = Harness::new();
        harness.watermark = None;
        let orchestrator = harness.build();
        orchestrator.sync().await;

        harness.settings.sync_all_highlights_on_first_sync = false;
        let capped = harness.build();
        capped.sync().await;

        assert_eq!(
            harness.remote.windows(),
            vec![
                SyncWindow::new(None, Some(ts(NOW))),
                SyncWindow::new(Some(ts(NOW)), Some(ts(NOW))),
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_notifications_still_show_errors() {
        let mut harness = Harness::new();
        harness.settings.disable_notifications = true;
        harness.remote.push(Ok(Vec::new()));
        harness.remote.push(Err(FetchError::malformed("truncated body")));
        let orchestrator = harness.build();

        orchestrator.sync().await;
        orchestrator.sync().await;

        assert!(harness.notifier.messages().is_empty());
        assert_eq!(harness.notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_template_fails_run() {
        let mut harness = Harness::new();
        harness.settings.header_template_path = "/nonexistent/header.md".to_string();
        harness.remote.push(Ok(vec![document("1", "Alpha", T0 + 10)]));
        let orchestrator = harness.build();

        let outcome = orchestrator.sync().await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Setup(_))));
        assert_eq!(orchestrator.last_update().await, Some(ts(T0)));
        assert!(harness.notes.get("Alpha.md").is_none());
    }

    #[tokio::test]
    async fn test_sync_into_filesystem_vault_with_persisted_watermark() {
        let temp_dir = TempDir::new().unwrap();
        let vault = temp_dir.path().join("vault");
        let state_path = temp_dir.path().join("sync_state.json");

        let remote = FakeRemote::default();
        remote.push(Ok(vec![document("1", "Alpha", T0 + 10)]));

        let orchestrator = SyncOrchestrator::new(OrchestratorContext {
            credentials: Box::new(MemoryCredentialStore::with_value("token")),
            client_factory: remote.factory(),
            notes: Box::new(FsNoteStore::new(&vault)),
            prompt: Box::new(NoPrompt),
            notifier: Box::new(RecordingNotifier::default()),
            watermark: Watermark::with_path(state_path.clone()).unwrap(),
            settings: SyncSettings {
                vault_dir: vault.clone(),
                highlight_storage_path: "Readwise".to_string(),
                sync_all_highlights_on_first_sync: true,
                ..SyncSettings::default()
            },
        })
        .with_clock(|| ts(NOW));

        let outcome = orchestrator.sync().await;
        assert!(outcome.is_success());

        let note = std::fs::read_to_string(vault.join("Readwise").join("Alpha.md")).unwrap();
        assert!(note.contains("- Passage from Alpha"));

        let reloaded = Watermark::with_path(state_path).unwrap();
        assert_eq!(reloaded.last_update(), Some(ts(NOW)));
    }
}
