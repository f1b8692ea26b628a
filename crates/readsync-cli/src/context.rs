//! Wiring the orchestrator from configuration

use anyhow::{Context, Result};

use readsync_core::{
    ClientOptions, Config, Credential, CredentialPrompt, CredentialStore, FileCredentialStore,
    FsNoteStore, HighlightSource, MemoryCredentialStore, NoPrompt, OrchestratorContext,
    ReadwiseClient, SyncOrchestrator, Watermark,
};

use crate::console::{ConsoleNotifier, StdinPrompt};
use crate::output::Output;

/// Credential store for this invocation
///
/// A token given on the command line (or `READSYNC_TOKEN`) is used for this
/// run only and never written to disk.
pub fn credential_store(config: &Config, token: Option<&str>) -> Box<dyn CredentialStore> {
    match token {
        Some(token) => Box::new(MemoryCredentialStore::with_value(token)),
        None => Box::new(FileCredentialStore::new(config.token_path())),
    }
}

/// Load the persisted watermark
pub fn load_watermark(config: &Config) -> Result<Watermark> {
    Watermark::with_path(config.sync_state_path()).context(
        "Failed to load sync state. Run `readsync reset` to start over from a full sync",
    )
}

/// Build an orchestrator for the CLI
pub fn build_orchestrator(
    config: &Config,
    token: Option<&str>,
    notifier: ConsoleNotifier,
    output: &Output,
) -> Result<SyncOrchestrator> {
    let options = ClientOptions {
        base_url: config.api_url.clone(),
        timeout: config.request_timeout(),
    };

    let prompt: Box<dyn CredentialPrompt> =
        if token.is_none() && !output.is_json() && StdinPrompt::is_available() {
            Box::new(StdinPrompt)
        } else {
            Box::new(NoPrompt)
        };

    Ok(SyncOrchestrator::new(OrchestratorContext {
        credentials: credential_store(config, token),
        client_factory: Box::new(move |credential: &Credential| {
            let client = ReadwiseClient::new(credential, options.clone())?;
            Ok(Box::new(client) as Box<dyn HighlightSource>)
        }),
        notes: Box::new(FsNoteStore::new(config.vault_dir.clone())),
        prompt,
        notifier: Box::new(notifier),
        watermark: load_watermark(config)?,
        settings: config.sync_settings(),
    }))
}
