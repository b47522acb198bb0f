//! Storj Worker - Authenticated note storage over S3
//!
//! Serves the note API, or helps prepare and check its configuration.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storj_worker::api::HttpServer;
use storj_worker::config::{redact, WorkerConfig};
use storj_worker::error::{Error, Result};
use storj_worker::storage::open_store;

/// Storj Worker - note storage over S3-compatible object storage
#[derive(Parser)]
#[command(name = "storj-worker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (optional; environment variables also apply)
    #[arg(short, long, default_value = "storj-worker.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Listening port; overrides PORT and the config file
    #[arg(short, long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Write a configuration file template
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "storj-worker.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the effective configuration
    Validate,

    /// Show the effective configuration with secrets hidden
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { ref output, force }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), "pretty");
            run_init(output, force)
        }
        Some(Commands::Validate) => run_validate(&cli),
        Some(Commands::Info) => run_info(&cli),
        Some(Commands::Serve) | None => run_serve(&cli).await,
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let (pretty, json) = if format.eq_ignore_ascii_case("json") {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(json)
        .init();
}

/// Load configuration, applying command-line overrides
fn load_config(cli: &Cli) -> Result<WorkerConfig> {
    let mut config = WorkerConfig::load(Some(&cli.config))?;
    if let Some(port) = cli.port {
        config.set_port(port);
        config.validate()?;
    }
    Ok(config)
}

/// Start the HTTP server
async fn run_serve(cli: &Cli) -> Result<()> {
    let config = load_config(cli);

    let (level, format) = match &config {
        Ok(c) => (c.logging.level.clone(), c.logging.format.clone()),
        Err(_) => ("info".to_string(), "pretty".to_string()),
    };
    init_logging(cli.log_level.as_deref().unwrap_or(&level), &format);

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            tracing::error!("Set STORJ_S3_* variables or provide {:?}", cli.config);
            return Err(e);
        }
    };

    tracing::info!("Starting Storj Worker v{}", env!("CARGO_PKG_VERSION"));

    let store = match open_store(&config.storage) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to initialize note store: {}", e);
            return Err(e);
        }
    };

    let server = HttpServer::new(config.api.clone(), store);
    if let Err(e) = server.start(shutdown_signal()).await {
        tracing::error!("HTTP server error: {}", e);
        return Err(e);
    }

    tracing::info!("Storj Worker stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Received shutdown signal");
}

/// Initialize configuration file
fn run_init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(Error::Config(format!(
            "{:?} already exists, use --force to overwrite",
            output
        )));
    }

    let config_content = r#"# Storj Worker Configuration
# Every value can also come from the environment (or a .env file):
# STORJ_S3_ACCESS_KEY, STORJ_S3_SECRET_KEY, STORJ_S3_ENDPOINT,
# STORJ_S3_BUCKET, STORJ_S3_REGION, BACKEND_TOKEN, PORT

[storage]
backend = "s3"              # "s3" or "memory"
endpoint = "https://gateway.storjshare.io"
region = "us1"
bucket = "notes"
access_key = ""
secret_key = ""
path_style = true

[api]
bind_address = "0.0.0.0:5000"
# token = "change-me"       # BACKEND_TOKEN; leave unset to disable auth
cors_enabled = false
max_body_bytes = 10485760

[logging]
level = "info"
format = "pretty"           # "pretty" or "json"
"#;

    std::fs::write(output, config_content)?;
    tracing::info!("Configuration written to {:?}", output);
    println!("Configuration written to {:?}", output);
    println!("Fill in the storage credentials, then run: storj-worker --config {:?}", output);

    Ok(())
}

/// Validate configuration
fn run_validate(cli: &Cli) -> Result<()> {
    match load_config(cli) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  Backend: {:?}", config.storage.backend);
            println!("  Listen:  {}", config.api.bind_address);
            if config.token().is_none() {
                println!("  Warning: no BACKEND_TOKEN set, note endpoints are unauthenticated");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration is invalid: {}", e);
            Err(e)
        }
    }
}

/// Show effective configuration
fn run_info(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    println!("Storj Worker v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Storage:");
    println!("  Backend:    {:?}", config.storage.backend);
    println!("  Endpoint:   {}", config.storage.endpoint);
    println!("  Region:     {}", config.storage.region);
    println!("  Bucket:     {}", config.storage.bucket);
    println!("  Access key: {}", redact(&config.storage.access_key));
    println!("  Secret key: {}", redact(&config.storage.secret_key));
    println!("  Path style: {}", config.storage.path_style);
    println!();
    println!("API:");
    println!("  Listen:     {}", config.api.bind_address);
    println!("  Token:      {}", redact(config.token().unwrap_or("")));
    println!("  CORS:       {}", config.api.cors_enabled);
    println!("  Body limit: {} bytes", config.api.max_body_bytes);
    println!();
    println!("Logging:");
    println!("  Level:      {}", config.logging.level);
    println!("  Format:     {}", config.logging.format);

    Ok(())
}
