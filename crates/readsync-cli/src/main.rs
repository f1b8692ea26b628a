//! readsync CLI
//!
//! Command-line interface for readsync - highlight sync into Markdown notes.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use readsync_core::config::MAX_AUTO_SYNC_INTERVAL;
use readsync_core::Config;

mod commands;
mod console;
mod context;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "readsync")]
#[command(about = "readsync - Sync Readwise highlights into Markdown notes")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// API token for this run (not saved)
    #[arg(long, global = true, env = "READSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync new highlights once (default)
    Sync,
    /// Keep syncing on the configured interval until Ctrl-C
    Watch {
        /// Minutes between syncs (overrides auto_sync_interval)
        #[arg(
            short,
            long,
            value_parser = clap::value_parser!(u64).range(1..=MAX_AUTO_SYNC_INTERVAL)
        )]
        interval: Option<u64>,
    },
    /// Manage the API token
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show sync status (token, last sync, paths)
    Status,
    /// Forget the last sync time so the next sync fetches everything
    Reset,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Save an API token (prompts if not given)
    Login {
        /// Token value
        #[arg(long = "with-token", value_name = "TOKEN")]
        with_token: Option<String>,
    },
    /// Remove the saved API token
    Logout,
    /// Show whether a token is configured
    Status,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (vault_dir, auto_sync_interval, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match run(cli, &output).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<ExitCode> {
    let config_path = cli.config.as_ref();

    // Config commands load their own config; `set` edits the file without env overrides
    if let Some(Commands::Config { command }) = &cli.command {
        handle_config_command(command.clone(), config_path, output)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load_with_cli_override(config_path)?;
    init_logging(&config, cli.verbose);

    let token = cli.token.as_deref().filter(|t| !t.trim().is_empty());

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => commands::sync::sync(&config, token, output).await,
        Commands::Watch { interval } => {
            commands::watch::watch(&config, token, interval, output).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Auth { command } => {
            match command {
                AuthCommands::Login { with_token } => {
                    commands::auth::login(&config, with_token, output)?
                }
                AuthCommands::Logout => commands::auth::logout(&config, output)?,
                AuthCommands::Status => commands::auth::status(&config, token, output)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            commands::status::show(&config, token, output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reset => {
            commands::reset::reset(&config, output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// `RUST_LOG` wins when set. Otherwise `--verbose` logs readsync at info and
/// everything else only logs warnings. Output goes to `log_file` when
/// configured, stderr otherwise.
fn init_logging(config: &Config, verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,readsync_core={},readsync_cli={}",
            default_level, default_level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    // Ignore the error if a subscriber is already installed
    if let Some(ref log_path) = config.log_file {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => {
                let _ = builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = builder.with_writer(std::io::stderr).try_init();
}
