//! Terminal implementations of the orchestrator's user-facing seams

use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use readsync_core::{CredentialError, CredentialPrompt, CredentialStore, Notifier, SyncState};

use crate::output::{Output, OutputFormat};

pub const TOKEN_HELP: &str = "Get your access token from https://readwise.io/access_token";

/// Asks for the API token on stdin
pub struct StdinPrompt;

impl StdinPrompt {
    /// Whether there is a terminal to ask on
    pub fn is_available() -> bool {
        io::stdin().is_terminal()
    }
}

#[async_trait]
impl CredentialPrompt for StdinPrompt {
    async fn request_credential(
        &self,
        store: &dyn CredentialStore,
    ) -> Result<(), CredentialError> {
        let answer = tokio::task::spawn_blocking(read_token).await;

        match answer {
            Ok(Ok(Some(token))) => store.upsert(&token),
            Ok(Ok(None)) => {
                debug!("Token prompt left empty");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Could not read token from stdin: {}", e);
                Ok(())
            }
            Err(e) => {
                warn!("Token prompt aborted: {}", e);
                Ok(())
            }
        }
    }
}

/// Print the token prompt and read one line
pub fn read_token() -> io::Result<Option<String>> {
    eprintln!("{}", TOKEN_HELP);
    eprint!("Access token: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let token = line.trim();

    Ok((!token.is_empty()).then(|| token.to_string()))
}

/// Prints orchestrator messages to the terminal
pub struct ConsoleNotifier {
    output: Output,
    show_states: bool,
}

impl ConsoleNotifier {
    pub fn new(output: Output) -> Self {
        Self {
            output,
            show_states: false,
        }
    }

    /// Also print every state transition
    pub fn with_states(mut self) -> Self {
        self.show_states = true;
        self
    }
}

impl Notifier for ConsoleNotifier {
    fn state_changed(&self, state: SyncState) {
        if !self.show_states {
            return;
        }
        match self.output.format {
            OutputFormat::Human => println!("[{}]", state),
            OutputFormat::Json => println!("{}", serde_json::json!({"state": state})),
            OutputFormat::Quiet => {}
        }
    }

    fn message(&self, text: &str, _timeout: Duration) {
        self.output.message(text);
    }

    fn error(&self, text: &str, _timeout: Duration) {
        self.output.error(text);
    }
}
