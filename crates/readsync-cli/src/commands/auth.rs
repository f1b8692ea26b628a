//! Auth command handlers

use anyhow::{bail, Context, Result};

use readsync_core::{Config, CredentialStore, FileCredentialStore};

use crate::console;
use crate::output::{Output, OutputFormat};

/// Store an API token, prompting for it if not given
pub fn login(config: &Config, token: Option<String>, output: &Output) -> Result<()> {
    let token = match token {
        Some(token) => Some(token),
        None => console::read_token().context("Failed to read token")?,
    };

    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        bail!("Token was empty. {}", console::TOKEN_HELP);
    };

    let store = FileCredentialStore::new(config.token_path());
    store.upsert(&token).context("Failed to store token")?;

    output.success(&format!("Token saved to {}", store.path().display()));
    Ok(())
}

/// Forget the stored API token
pub fn logout(config: &Config, output: &Output) -> Result<()> {
    let store = FileCredentialStore::new(config.token_path());
    store.clear().context("Failed to remove token")?;

    output.success("Token removed");
    Ok(())
}

/// Show whether a token is configured
pub fn status(config: &Config, env_token: Option<&str>, output: &Output) -> Result<()> {
    let store = FileCredentialStore::new(config.token_path());
    let stored = store.try_get().context("Failed to read token")?.is_some();

    let source = if env_token.is_some() {
        Some("command line / READSYNC_TOKEN")
    } else if stored {
        Some("token file")
    } else {
        None
    };

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "configured": source.is_some(),
            "source": source,
            "token_path": store.path(),
        })),
        OutputFormat::Quiet => println!("{}", source.is_some()),
        OutputFormat::Human => match source {
            Some(source) => println!("Token configured ({})", source),
            None => {
                println!("No token configured.");
                println!("Set one with: readsync auth login");
            }
        },
    }

    Ok(())
}
