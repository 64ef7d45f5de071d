//! taskpilot - autonomous task agent for local language models

use clap::Parser;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use taskpilot_config::Strategy;

mod commands;

use commands::{init_command, run_command, RunOptions};

/// taskpilot - hand a task to a local model and let it work
#[derive(Parser)]
#[command(name = "taskpilot")]
#[command(about = "◆ Autonomous task agent for local language models")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Task text, or a path to a file containing the task. Omit for interactive mode
    task: Option<String>,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// Backend base URL
    #[arg(long)]
    host: Option<String>,

    /// Backend context window in tokens
    #[arg(long = "context-length")]
    context_length: Option<u32>,

    /// Tool provider: a configured server name or a command line (repeatable)
    #[arg(long = "mcp", value_name = "PROVIDER")]
    mcp: Vec<String>,

    /// Generation strategy: tool-calling or code-emission
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Config file (default ~/.taskpilot/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the default config file and exit
    #[arg(long)]
    init: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = if cli.init {
        init_command(cli.config).await
    } else {
        run_command(RunOptions {
            task: cli.task,
            model: cli.model,
            host: cli.host,
            context_length: cli.context_length,
            mcp: cli.mcp,
            strategy: cli.strategy,
            config: cli.config,
        })
        .await
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
