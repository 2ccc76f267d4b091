//! murmur - Terminal Chat for a Local Ollama Server
//!
//! # Usage
//!
//! ```bash
//! # Chat with the configured (or first installed) model
//! murmur
//!
//! # Pick a model and a remote server
//! murmur --model qwen3:8b --host gpu-box --port 11434
//!
//! # List installed models
//! murmur models
//!
//! # Verbose logging to a file
//! RUST_LOG=debug murmur --log-file /tmp/murmur.log
//! ```
//!
//! # Environment Variables
//!
//! - `OLLAMA_HOST` / `OLLAMA_PORT`: model server address
//! - `MURMUR_MODEL`: default model
//! - `MURMUR_CONVERSATIONS_DIR`: where conversations are saved
//! - `MURMUR_CONFIG`: configuration file
//! - `RUST_LOG`: log filter

mod repl;
mod view;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::tty::IsTty;
use tokio::sync::mpsc;
use tracing::{info, warn};

use murmur_core::backend::{ChatBackend, OllamaBackend};
use murmur_core::config::{load_config_from_path, ConfigOverrides, MurmurConfig};
use murmur_core::{Conductor, ConductorConfig, JsonConversationStore, PersistingHooks};

use repl::Repl;
use view::TerminalView;

/// View updates buffered between the conductor and the renderer
const VIEW_CHANNEL_CAPACITY: usize = 1024;

/// murmur - streaming chat with a local model server
#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to chat with
    #[arg(short = 'm', long, value_name = "NAME")]
    model: Option<String>,

    /// Model server host
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Model server port
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "MURMUR_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Do not save conversations
    #[arg(long)]
    no_persist: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// List installed models and exit
    Models,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(host) = &self.host {
            overrides = overrides.with_host(host.clone());
        }
        if let Some(port) = self.port {
            overrides = overrides.with_port(port);
        }
        if let Some(model) = &self.model {
            overrides = overrides.with_default_model(model.clone());
        }
        if self.no_persist {
            overrides = overrides.without_persistence();
        }
        overrides
    }
}

/// Initialize logging to stderr or `log_file`
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("murmur=info,murmur_core=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}

/// Resolve configuration: defaults < file < environment < command line
fn resolve_config(args: &Args) -> Result<MurmurConfig> {
    let mut config = load_config_from_path(args.config.clone())?;

    args.overrides().apply(&mut config);

    config.validate()?;
    Ok(config)
}

/// The configured model, or the first one the server has installed
async fn pick_model(backend: &OllamaBackend, configured: Option<String>) -> Option<String> {
    if configured.is_some() {
        return configured;
    }
    match backend.list_models().await {
        Ok(models) => {
            let first = models.into_iter().next().map(|m| m.name);
            if let Some(model) = &first {
                info!(model = %model, "No model configured, using first installed model");
            }
            first
        }
        Err(e) => {
            warn!(error = %e, "Could not list models");
            None
        }
    }
}

fn terminal_width() -> usize {
    crossterm::terminal::size().map_or(80, |(cols, _)| usize::from(cols))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let config = resolve_config(&args)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        source = %config.source(),
        server = %format!("{}:{}", config.server.host, config.server.port),
        "murmur starting"
    );

    let backend = OllamaBackend::from_config(&config.server)?;
    let styled = std::io::stdout().is_tty();
    let width = terminal_width();

    if args.command == Some(Command::Models) {
        let models = backend
            .list_models()
            .await
            .with_context(|| format!("Could not reach Ollama at {}", backend.base_url()))?;
        let view = TerminalView::new(width, styled);
        print!("{}", view.model_list(&models, config.default_model.as_deref()));
        return Ok(());
    }

    if !backend.health_check().await {
        eprintln!(
            "Ollama is not answering at {}. Start it with `ollama serve`.",
            backend.base_url()
        );
    }

    let model = pick_model(&backend, config.default_model.clone()).await;
    let conductor_config = ConductorConfig {
        model,
        ..ConductorConfig::from(&config)
    };

    let (tx, rx) = mpsc::channel(VIEW_CHANNEL_CAPACITY);
    let mut conductor = Conductor::new(backend, conductor_config, tx);

    let store = if config.storage.persist {
        let store = JsonConversationStore::new(&config.storage.conversations_dir);
        match store.load_all().await {
            Ok(conversations) => {
                info!(count = conversations.len(), dir = %store.dir().display(), "Loaded conversations");
                conductor.restore(conversations);
            }
            Err(e) => warn!(error = %e, "Could not load saved conversations"),
        }
        conductor = conductor.with_hooks(Arc::new(PersistingHooks::new(store.clone())));
        Some(store)
    } else {
        None
    };

    if let Some(model) = conductor.model() {
        println!("murmur · {model}");
    } else {
        println!("murmur · no model selected (see /models)");
    }

    Repl::new(conductor, store, width, styled).run(rx).await?;

    info!("murmur exiting");
    Ok(())
}
