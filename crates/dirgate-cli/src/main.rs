//! Dirgate - LDAP credential check
//!
//! Validates a username/password pair against the directory described in a config
//! file and prints the verdict.

mod config;
mod output;

use anyhow::Context;
use clap::Parser;
use dialoguer::{Input, Password};
use dirgate_auth::{AuthError, Validator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dirgate")]
#[command(author = "Dirgate Team")]
#[command(version = dirgate_core::VERSION)]
#[command(about = "Check LDAP credentials and group membership", long_about = None)]
struct Cli {
    /// Configuration file path
    config: PathBuf,

    /// Username to check; prompted for when omitted
    username: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DIRGATE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for the result
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(output::EXIT_SETUP);
        }
    };
    let validator = Validator::new(config);

    let (username, password) = match prompt_credentials(cli.username) {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(output::EXIT_SETUP);
        }
    };

    match run(&validator, &username, &password).await {
        Ok(code) => code,
        Err(e) => {
            if let Some(auth) = e.downcast_ref::<AuthError>() {
                error!(url = ?auth.url(), timeout = auth.is_timeout(), "Directory unavailable");
            }
            eprintln!("Error: {:#}", e);
            ExitCode::from(output::EXIT_DIRECTORY)
        }
    }
}

fn prompt_credentials(username: Option<String>) -> anyhow::Result<(String, String)> {
    let username = match username {
        Some(username) => username,
        None => Input::<String>::new()
            .with_prompt("Username")
            .interact_text()
            .context("Failed to read username")?,
    };
    let password = Password::new()
        .with_prompt("Password")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read password")?;
    Ok((username, password))
}

async fn run(validator: &Validator, username: &str, password: &str) -> anyhow::Result<ExitCode> {
    let result = validator.validate(username, password).await?;

    println!("{}", output::result_line(&result)?);
    println!("{}", output::status_line(username, &result));

    Ok(output::exit_code(result.status))
}
