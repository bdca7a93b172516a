//! tandem CLI — the main entry point.
//!
//! Commands:
//! - `run`   — Answer one prompt and exit
//! - `chat`  — Interactive session with slash commands
//! - `init`  — Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tandem",
    about = "tandem — a streaming coding agent for the terminal",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.tandem/config.toml
    #[arg(long, global = true, env = "TANDEM_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single prompt, then exit
    Run {
        /// The prompt (joined with spaces)
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,

        /// Approve commands and file writes without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Start an interactive session
    Chat {
        /// Approve commands and file writes without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed answers on stdout stay clean.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run { prompt, yes } => commands::run::run(config, &prompt.join(" "), yes).await?,
        Commands::Chat { yes } => commands::chat::run(config, yes).await?,
        Commands::Init => commands::init::run(config)?,
    }

    Ok(())
}
