//! taskpilot command implementations

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use taskpilot_agent::{AgentLoop, TaskOutcome, ToolRegistry};
use taskpilot_config::{self, Config, McpServerConfig, Overrides, Strategy};
use taskpilot_provider::{OllamaProvider, Provider};

/// Arguments for a task run
pub struct RunOptions {
    pub task: Option<String>,
    pub model: Option<String>,
    pub host: Option<String>,
    pub context_length: Option<u32>,
    pub mcp: Vec<String>,
    pub strategy: Option<Strategy>,
    pub config: Option<PathBuf>,
}

/// Write the default config file
pub async fn init_command(path: Option<PathBuf>) -> Result<()> {
    println!("◆ Initializing taskpilot...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let path = match path {
        Some(path) => {
            if path.exists() {
                warn!("◆ CONFIG ALREADY PRESENT AT {:?}", path);
            } else {
                Config::default()
                    .save_to(&path)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            path
        }
        None => {
            taskpilot_config::init()
                .await
                .context("failed to initialize config")?;
            taskpilot_config::config_path()
        }
    };

    println!("\n◆ Config at {}", path.display());
    println!("\nNext steps:");
    println!("  1. Start a local backend: ollama serve");
    println!("  2. Run a task: taskpilot \"write hello.py that prints hello\"");

    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_required(path)
            .await
            .with_context(|| format!("failed to load {}", path.display())),
        None => Config::load().await.context("failed to load config"),
    }
}

/// An existing file's contents become the task; anything else is the task text
pub async fn read_task(arg: &str) -> Result<String> {
    let path = Path::new(arg);
    if path.is_file() {
        info!("◆ READING TASK FROM {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read task file {}", path.display()))?;
        Ok(content.trim().to_string())
    } else {
        Ok(arg.trim().to_string())
    }
}

fn resolve_providers(config: &Config, selectors: &[String]) -> Vec<(String, McpServerConfig)> {
    selectors
        .iter()
        .filter_map(|selector| match config.resolve_mcp(selector) {
            Some(server) => Some(server),
            None => {
                warn!("◆ IGNORING EMPTY TOOL PROVIDER '{}'", selector);
                None
            }
        })
        .collect()
}

/// Run one task, or an interactive session when no task is given
pub async fn run_command(options: RunOptions) -> Result<()> {
    let mut config = load_config(options.config.as_deref()).await?;
    config
        .apply_overrides(Overrides {
            model: options.model,
            host: options.host,
            context_length: options.context_length,
            strategy: options.strategy,
        })
        .context("invalid command-line setting")?;

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let provider = OllamaProvider::new(&config.backend.host, &config.backend.model);
    info!(
        "◆ BACKEND {} MODEL {} ({} strategy)",
        provider.host(),
        provider.default_model(),
        config.agent.strategy
    );

    let mut tools = ToolRegistry::with_builtins(&cwd, config.agent.command_timeout_secs);
    let servers = resolve_providers(&config, &options.mcp);
    if !servers.is_empty() {
        tools.connect_providers(&servers, &cwd).await;
    }
    debug!("Tools: {}", tools.names().join(", "));

    let agent = AgentLoop::new(provider, tools, &config, &cwd);

    let result = match options.task {
        Some(task) => match read_task(&task).await {
            Ok(task) if task.is_empty() => Err(anyhow::anyhow!("task is empty")),
            Ok(task) => run_once(&agent, &task).await,
            Err(e) => Err(e),
        },
        None => interactive(&agent).await,
    };

    agent.shutdown().await;
    result
}

fn report(outcome: &TaskOutcome) {
    match outcome {
        TaskOutcome::Chat { reply } => println!("\n◆ {}", reply),
        TaskOutcome::Completed {
            iterations,
            summary,
        } => {
            println!("\n◆ Task complete after {} iterations", iterations);
            if !summary.is_empty() {
                println!("{}", summary);
            }
        }
        TaskOutcome::GaveUp { iterations, reason } => {
            println!("\n◆ Gave up after {} iterations: {}", iterations, reason);
        }
    }
}

async fn run_once<P: Provider>(agent: &AgentLoop<P>, task: &str) -> Result<()> {
    let outcome = agent.run_task(task).await.context("backend failure")?;
    report(&outcome);
    if let TaskOutcome::GaveUp { .. } = outcome {
        anyhow::bail!("task was not completed");
    }
    Ok(())
}

async fn interactive<P: Provider>(agent: &AgentLoop<P>) -> Result<()> {
    println!("◆ Interactive mode (type 'exit' to quit)");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("◆ ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" {
            break;
        }

        match agent.run_task(input).await {
            Ok(outcome) => report(&outcome),
            Err(e) => error!("◆ TASK ABORTED: {}", e),
        }
        println!();
    }

    Ok(())
}
