//! verdict CLI: run the engine over a directory, analyze one-off text, and
//! inspect or reset the persisted cache.

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};
use verdict_rs::analyzer::HttpAnalyzer;
use verdict_rs::cache::{CacheBackend, CacheStore, FileBackend, PgBackend};
use verdict_rs::config::Config;
use verdict_rs::document::dir::{DirDocument, signature};
use verdict_rs::engine::{ControlHandle, ControlLoop, Engine};
use verdict_rs::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "verdict", about = "Analyze each unique item once, cache the verdict")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a directory of *.txt items and annotate them
    Serve {
        /// Directory holding the items
        dir: PathBuf,
        /// How often to check the directory for changes, in milliseconds
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
        /// Do not read control commands from stdin
        #[arg(long)]
        no_stdin: bool,
    },
    /// Analyze a single piece of text through the cache
    Analyze {
        /// Text to analyze
        text: String,
    },
    /// Persisted cache operations
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count and last update
    Stats,
    /// Remove every entry
    Clear,
    /// Remove expired entries
    Evict,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let guard = init_telemetry(TelemetryConfig::from_config(&config, "verdict"))?;

    let outcome = match cli.command {
        Command::Serve {
            dir,
            poll_ms,
            no_stdin,
        } => cmd_serve(&config, dir, Duration::from_millis(poll_ms), no_stdin).await,
        Command::Analyze { text } => cmd_analyze(&config, &text).await,
        Command::Cache { action } => cmd_cache(&config, action).await,
    };
    guard.force_flush();
    outcome
}

async fn open_backend(config: &Config) -> anyhow::Result<Box<dyn CacheBackend>> {
    match &config.database_url {
        Some(url) => {
            let backend = PgBackend::connect(url.expose_secret()).await?;
            backend.migrate().await?;
            Ok(Box::new(backend))
        }
        None => Ok(Box::new(FileBackend::new(&config.cache_dir))),
    }
}

async fn open_engine(config: &Config) -> anyhow::Result<Engine> {
    let engine_config = config.engine()?;
    let backend = open_backend(config).await?;
    let analyzer = HttpAnalyzer::new(&config.analyzer_url, config.analyzer_timeout)?;
    Ok(Engine::init(engine_config, backend, Arc::new(analyzer)).await)
}

async fn cmd_serve(
    config: &Config,
    dir: PathBuf,
    poll: Duration,
    no_stdin: bool,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let engine = open_engine(config).await?;
    let (control, handle) = ControlLoop::new(engine, DirDocument::new(&dir));

    let ctrl = handle.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl.shutdown();
    });

    tokio::spawn(watch_dir(dir.clone(), poll, handle.clone()));

    if !no_stdin {
        tokio::spawn(read_commands(handle.clone()));
    }

    info!(dir = %dir.display(), analyzer = %config.analyzer_url, "serving");
    control.run().await;
    Ok(())
}

/// Poll the directory signature and report changes as mutations.
async fn watch_dir(dir: PathBuf, poll: Duration, handle: ControlHandle) {
    let mut last = signature(&dir).ok();
    let mut interval = tokio::time::interval(poll);
    loop {
        interval.tick().await;
        match signature(&dir) {
            Ok(current) => {
                if last.as_ref() != Some(&current) {
                    last = Some(current);
                    handle.source_mutated();
                }
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "cannot read directory"),
        }
    }
}

/// Relay `stats`, `clear`, `reprocess`, `status`, and `quit` from stdin.
async fn read_commands(handle: ControlHandle) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match line.trim() {
            "" => continue,
            "stats" => handle.cache_stats().await.map(|s| to_json(&s)),
            "clear" => handle
                .clear_cache()
                .await
                .map(|()| "cache cleared".to_string()),
            "reprocess" => handle.reprocess_all().await.map(|r| to_json(&r)),
            "status" => handle.status().await.map(|s| to_json(&s)),
            "quit" | "exit" => {
                handle.shutdown();
                break;
            }
            other => Ok(format!(
                "unknown command '{other}' (stats, clear, reprocess, status, quit)"
            )),
        };
        match reply {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("{e}");
                break;
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

async fn cmd_analyze(config: &Config, text: &str) -> anyhow::Result<()> {
    let mut engine = open_engine(config).await?;
    let (identity, outcome) = engine.analyze_content(text).await;
    let category = outcome.category();

    println!("Identity:  {identity}");
    println!("Origin:    {}", outcome.origin);
    println!("Category:  {category}");
    println!("Verdict:   {}", category.display_text(&outcome.result));

    engine.teardown().await;
    Ok(())
}

async fn cmd_cache(config: &Config, action: CacheAction) -> anyhow::Result<()> {
    let ttl = config.engine()?.cache_ttl();
    let mut store = CacheStore::load(open_backend(config).await?, ttl).await;

    match action {
        CacheAction::Stats => {
            let stats = store.stats();
            println!("Entries:     {}", stats.count);
            println!("Backend:     {}", backend_label(config, &config.cache_dir));
        }
        CacheAction::Clear => {
            store.clear().await;
            println!("Cache cleared.");
        }
        CacheAction::Evict => {
            let removed = store.evict_expired().await;
            println!("Evicted {removed} expired entr{}.", if removed == 1 { "y" } else { "ies" });
        }
    }
    Ok(())
}

fn backend_label(config: &Config, dir: &Path) -> String {
    if config.database_url.is_some() {
        "postgres".to_string()
    } else {
        format!("file ({})", dir.display())
    }
}
