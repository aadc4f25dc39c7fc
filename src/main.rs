//! chain-orchestrator
//!
//! Runs the orchestrator in-process and feeds it actions.
//!
//! ```text
//! stdin (JSON lines) ──▶ ActionRequest ──▶ Orchestrator ──▶ ActionResult ──▶ stdout
//!                                              │
//!                                              └── detached confirmation tasks
//! ```
//!
//! Logs go to stderr, so stdout stays one JSON result per line.

use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use chain_orchestrator::config::{load_config, OrchestratorConfig};
use chain_orchestrator::lifecycle::{signals, start};
use chain_orchestrator::observability::logging::init_logging;
use chain_orchestrator::{ActionRequest, ActionResult, Orchestrator};

#[derive(Parser)]
#[command(name = "chain-orchestrator")]
#[command(about = "Execute wallet, deployment and transfer actions", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Execute a single JSON action and exit instead of reading stdin.
    #[arg(short, long)]
    action: Option<String>,

    /// Session used when an action names none.
    #[arg(short, long)]
    session: Option<String>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => OrchestratorConfig::default(),
    };
    init_logging(cli.log_level.as_deref().unwrap_or(&config.observability.log_level));

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "chain-orchestrator starting"
    );

    let runtime = start(&config).await?;
    let orchestrator = runtime.orchestrator.clone();

    match cli.action {
        Some(line) => {
            let result = execute(&orchestrator, &line, cli.session.as_deref()).await;
            println!("{}", serde_json::to_string(&result)?);
        }
        None => {
            let mut shutdown = runtime.shutdown_handle().subscribe();
            let _signals = signals::spawn_signal_handler(runtime.shutdown_handle());

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut stdout = tokio::io::stdout();
            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        let Some(line) = line? else { break };
                        if line.trim().is_empty() {
                            continue;
                        }
                        let result = execute(&orchestrator, &line, cli.session.as_deref()).await;
                        let mut out = serde_json::to_vec(&result)?;
                        out.push(b'\n');
                        stdout.write_all(&out).await?;
                        stdout.flush().await?;
                    }
                    _ = shutdown.recv() => break,
                }
            }
        }
    }

    runtime.shutdown().await;
    Ok(())
}

async fn execute(orchestrator: &Orchestrator, line: &str, session: Option<&str>) -> ActionResult {
    match serde_json::from_str::<ActionRequest>(line) {
        Ok(mut request) => {
            if request.session_id.is_none() {
                request.session_id = session.map(str::to_string);
            }
            orchestrator.handle_action(request).await
        }
        Err(e) => ActionResult::failed("INVALID_REQUEST", format!("Invalid action JSON: {}", e)),
    }
}
