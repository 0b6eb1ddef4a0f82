//! DocSage: question answering over internal documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docsage_core::{AppConfig, ServiceMode};
use docsage_ingest::Ingester;
use docsage_runtime::ChatOrchestrator;
use docsage_server::{build_router, AppState};

fn config_path() -> PathBuf {
    std::env::var("DOCSAGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("docsage.json"))
}

fn print_help() {
    println!("DocSage: question answering over internal documents");
    println!();
    println!("Usage: docsage [command]");
    println!();
    println!("Commands:");
    println!("  serve                    Start the HTTP server (default)");
    println!("  ingest [data] [index]    Build the vector index from a document directory");
    println!("  ask <question>           Answer one question and print the JSON result");
    println!("  help                     Show this help message");
    println!();
    println!("Configuration is read from docsage.json (or $DOCSAGE_CONFIG) and DOCSAGE_* variables.");
    println!("Send SIGHUP to a running server to load a rebuilt index.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");

    if matches!(command, "--help" | "-h" | "help") {
        print_help();
        return Ok(());
    }

    let config = AppConfig::load(Some(&config_path())).context("invalid configuration")?;

    match command {
        "serve" => serve(config).await,
        "ingest" => {
            let data_dir = args.get(2).map(PathBuf::from).unwrap_or(config.paths.data_dir.clone());
            let index_dir = args.get(3).map(PathBuf::from).unwrap_or(config.paths.index_dir.clone());
            ingest(&config, &data_dir, &index_dir).await
        }
        "ask" => {
            let question = args[2..].join(" ");
            ask(&config, &question).await
        }
        other => {
            eprintln!("Unknown command: {}. Use 'docsage help' for usage.", other);
            std::process::exit(1);
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let port = config.port;
    let mode = config.mode;
    info!(?mode, "Starting DocSage");

    let state = Arc::new(
        AppState::from_config(config).context("failed to initialize the chat pipeline")?,
    );
    if mode == ServiceMode::Generative {
        reload_on_hangup(Arc::clone(&state));
    }
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("DocSage server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(unix)]
fn reload_on_hangup(state: Arc<AppState>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Index reload on SIGHUP unavailable: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            let state = Arc::clone(&state);
            match tokio::task::spawn_blocking(move || state.reload_index()).await {
                Ok(Ok(entries)) => info!(entries, "Vector index reloaded"),
                Ok(Err(e)) => warn!("Index reload failed, keeping the current index: {}", e),
                Err(e) => warn!("Index reload task failed: {}", e),
            }
        }
    });
}

#[cfg(not(unix))]
fn reload_on_hangup(_state: Arc<AppState>) {}

async fn ingest(config: &AppConfig, data_dir: &Path, index_dir: &Path) -> anyhow::Result<()> {
    let ingester = Ingester::from_config(config)?;
    let report = ingester
        .run(data_dir, index_dir)
        .await
        .with_context(|| format!("ingestion of {} failed", data_dir.display()))?;

    for skipped in &report.skipped {
        println!("skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn ask(config: &AppConfig, question: &str) -> anyhow::Result<()> {
    let orchestrator = ChatOrchestrator::from_config(config)?;
    let answer = orchestrator.ask(question).await?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}
