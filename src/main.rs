//! `scs`: serves templated configuration files over HTTP.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use simple_config_server::config::{self, AppConfig, LogsConfig, CONFIG_DIR_ENV};
use simple_config_server::http::HttpServer;
use simple_config_server::lifecycle::{signals, startup, Shutdown, StartupError};
use simple_config_server::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "scs", version, about = "Simple Configuration Server")]
struct Cli {
    /// Directory containing scs-configuration.yaml.
    #[arg(long, global = true, env = CONFIG_DIR_ENV, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the server (default).
    Serve,
    /// Check the configuration, users file, env files and templates, then exit.
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config_dir) {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init(&LogsConfig::default());
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&config.logs) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Validate => validate(&cli.config_dir, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), StartupError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "scs starting");

    if config.metrics.enabled {
        let addr = config
            .metrics
            .bind_address
            .parse()
            .map_err(|e: std::net::AddrParseError| StartupError::Metrics(e.to_string()))?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
    }

    let bind_address = config.server.bind_address.clone();
    let ctx = Arc::new(tokio::task::spawn_blocking(move || startup::prepare(config)).await.map_err(
        |e| StartupError::Server(std::io::Error::other(e)),
    )??);
    let _watcher = startup::start_watcher(&ctx)?;

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    HttpServer::new(ctx).run(listener, server_shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn validate(config_dir: &Path, config: &AppConfig) -> Result<(), StartupError> {
    let endpoints = startup::validate_configuration(config)?;
    tracing::info!(
        config_dir = %config_dir.display(),
        endpoints,
        "Configuration is valid"
    );
    Ok(())
}
