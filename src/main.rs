mod cli;
mod commands;
mod config;
mod error;
mod pipeline;
mod story;

use clap::Parser;
use cli::{Cli, Command};
use colored::*;
use error::StoryResult;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Pick up service base-URL overrides from a local .env
    let _ = dotenvy::dotenv();

    // Tracing is gated on RUST_LOG so normal runs stay quiet
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        if let Some(hint) = e.hint() {
            eprintln!("{} {}", "hint:".yellow().bold(), hint);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> StoryResult<()> {
    match cli.command {
        Command::Generate {
            prompt,
            duration,
            fps,
            output,
            config,
            batch_size,
            retries,
            json,
        } => {
            commands::generate::run(
                &prompt,
                duration,
                fps,
                output.as_deref(),
                config.as_deref(),
                batch_size,
                retries,
                json,
            )
            .await
        }
        Command::Doctor => commands::doctor::run(),
    }
}
