//! Background removal API server
//!
//! Parses arguments, installs the tracing subscriber, loads the model and
//! serves the HTTP API until interrupted.

use crate::{
    backends::OnnxBackend,
    config::{ExecutionProvider, RemovalConfig, ServerConfig, DEFAULT_HOST, DEFAULT_PORT},
    models::{ModelKind, ModelManager, ModelSpec},
    remover::ProcessorRemover,
    server,
    tracing_config::{TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing::info;

/// Background removal HTTP API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-api")]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "BGREMOVE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "BGREMOVE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Segmentation model (u2net, u2netp, isnet-general-use, silueta)
    #[arg(short, long, env = "BGREMOVE_MODEL", default_value_t = ModelKind::U2net)]
    pub model: ModelKind,

    /// Explicit ONNX model file [default: $U2NET_HOME/<model>.onnx or ~/.u2net/<model>.onnx]
    #[arg(long, env = "BGREMOVE_MODEL_PATH", value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Execution provider (auto, cpu, cuda, coreml)
    #[arg(short, long, env = "BGREMOVE_EXECUTION_PROVIDER", default_value_t = ExecutionProvider::Auto)]
    pub execution_provider: ExecutionProvider,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long, env = "BGREMOVE_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format (console, compact, json)
    #[arg(long, env = "BGREMOVE_LOG_FORMAT", default_value_t = TracingFormat::Console)]
    pub log_format: TracingFormat,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// List supported models with their resolved file locations and exit
    #[arg(long)]
    pub list_models: bool,
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.host.clone(), self.port)
    }

    pub fn removal_config(&self) -> Result<RemovalConfig> {
        let mut model_spec = ModelSpec::new(self.model);
        if let Some(path) = &self.model_path {
            model_spec = model_spec.with_path(path);
        }

        RemovalConfig::builder()
            .execution_provider(self.execution_provider)
            .num_threads(self.threads)
            .model_spec(model_spec)
            .build()
            .context("Invalid removal configuration")
    }

    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig::new()
            .with_verbosity(self.verbose)
            .with_format(self.log_format)
    }
}

/// Main entry point for the server binary
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    cli.tracing_config()
        .init()
        .context("Failed to initialize tracing subscriber")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    if cli.list_models {
        list_models();
        return Ok(());
    }

    let server_config = cli.server_config();
    // Fail on a bad host before paying for model load
    server_config
        .socket_addr()
        .context("Invalid server address")?;

    let removal_config = cli.removal_config()?;
    info!(
        model = %removal_config.model_spec.display_name(),
        provider = %removal_config.execution_provider,
        threads = cli.threads,
        "Starting background removal API"
    );

    let remover =
        ProcessorRemover::with_onnx(removal_config).context("Failed to resolve model file")?;
    let remover = tokio::task::spawn_blocking(move || remover.initialize().map(|()| remover))
        .await
        .context("Model loading task failed")?
        .context("Failed to load model")?;

    server::serve(&server_config, Arc::new(remover))
        .await
        .context("Server error")?;

    Ok(())
}

fn show_provider_diagnostics() {
    println!("Execution Provider Diagnostics");
    println!("------------------------------");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected");

    println!("\nExecution Providers:");
    for (name, available, description) in OnnxBackend::list_providers() {
        let status = if available {
            "available"
        } else {
            "not available"
        };
        println!("  {name}: {status} - {description}");
    }

    println!("\nUsage:");
    println!("  --execution-provider auto    # CUDA, then CoreML, then CPU (default)");
    println!("  --execution-provider cuda    # NVIDIA CUDA, falls back to CPU");
    println!("  --execution-provider coreml  # Apple CoreML, falls back to CPU");
    println!("  --execution-provider cpu     # Force CPU execution");
}

fn list_models() {
    println!("Supported models:");
    for kind in ModelKind::ALL {
        let size = kind.input_size();
        match ModelManager::from_spec(&ModelSpec::new(kind)) {
            Ok(manager) => {
                let path = manager.model_path();
                let status = if path.is_file() { "present" } else { "missing" };
                println!(
                    "  {kind} ({size}x{size}): {} [{status}]",
                    path.display()
                );
            },
            Err(e) => println!("  {kind} ({size}x{size}): {e}"),
        }
    }
}
