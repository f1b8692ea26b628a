//! Sync command handler

use std::process::ExitCode;

use anyhow::Result;

use readsync_core::{Config, DocumentFailure, SyncError, SyncOutcome};

use crate::console::ConsoleNotifier;
use crate::context::build_orchestrator;
use crate::output::{Output, OutputFormat};

/// Run one manual sync
pub async fn sync(config: &Config, token: Option<&str>, output: &Output) -> Result<ExitCode> {
    let orchestrator = build_orchestrator(config, token, ConsoleNotifier::new(*output), output)?;

    output.message(&format!(
        "Syncing highlights into {}...",
        config.vault_dir.display()
    ));

    let outcome = orchestrator.sync().await;

    match output.format {
        OutputFormat::Json => output.json(&outcome_json(&outcome)),
        OutputFormat::Human => {
            if let SyncOutcome::Partial { ref failures, .. } = outcome {
                print_failures(failures);
            }
        }
        OutputFormat::Quiet => {}
    }

    Ok(exit_code(&outcome))
}

/// Exit status for an outcome
pub fn exit_code(outcome: &SyncOutcome) -> ExitCode {
    if is_failure(outcome) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn is_failure(outcome: &SyncOutcome) -> bool {
    matches!(
        outcome,
        SyncOutcome::CredentialMissing | SyncOutcome::Partial { .. } | SyncOutcome::Failed(_)
    )
}

fn print_failures(failures: &[DocumentFailure]) {
    println!();
    println!("Failed documents:");
    for failure in failures {
        println!("  {} ({}): {}", failure.title, failure.document_id, failure.error);
        if let SyncError::Write { ref source, .. } = failure.error {
            if let Some(hint) = source.recovery_suggestion() {
                println!("    {}", hint);
            }
        }
    }
}

/// Structured summary for `--json`
pub fn outcome_json(outcome: &SyncOutcome) -> serde_json::Value {
    match outcome {
        SyncOutcome::AlreadyRunning => serde_json::json!({"outcome": "already_running"}),
        SyncOutcome::CredentialMissing => serde_json::json!({"outcome": "credential_missing"}),
        SyncOutcome::UpToDate => serde_json::json!({"outcome": "up_to_date", "documents": 0}),
        SyncOutcome::Synced { documents } => {
            serde_json::json!({"outcome": "synced", "documents": documents})
        }
        SyncOutcome::Partial { synced, failures } => serde_json::json!({
            "outcome": "partial",
            "documents": synced,
            "failures": failures
                .iter()
                .map(|f| serde_json::json!({
                    "document_id": f.document_id,
                    "title": f.title,
                    "error": f.error.to_string()
                }))
                .collect::<Vec<_>>()
        }),
        SyncOutcome::Failed(error) => serde_json::json!({
            "outcome": "failed",
            "error": error.to_string()
        }),
    }
}
