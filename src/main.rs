use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use yieldbook::config::Config;
use yieldbook::pipeline::{indices_once, user_returns_once};

#[derive(Debug, Parser)]
#[command(name = "yieldbook", version, about = "Writes annual yield files for the comparison page")]
struct Cli {
    /// TOML file overriding the built-in configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compound a trader's monthly returns into user_data.js
    UserReturns {
        #[arg(long)]
        username: Option<String>,
        /// leave out years before this one
        #[arg(long)]
        start_year: Option<i32>,
    },
    /// Yearly index returns into indices_data.js
    Indices,
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::UserReturns {
            username,
            start_year,
        } => {
            if let Some(username) = username {
                config.user.username = username;
            }
            if start_year.is_some() {
                config.user.start_year = start_year;
            }
            config.validate()?;
            user_returns_once(&config).await?;
        }
        Command::Indices => {
            indices_once(&config).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // walk the chain so the root cause is visible
            let mut message = e.to_string();
            let mut source = e.source();
            while let Some(cause) = source {
                message.push_str(&format!(": {cause}"));
                source = cause.source();
            }
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}
