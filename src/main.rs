//! Entra ID phishing detection (v1)
//!
//! Serves a tiny SVG that is embedded in the custom branding of an Entra ID
//! login page. Browsers send the page URL as `Referer`; a login page hosted
//! anywhere but the allow-listed Microsoft hosts gets a warning image instead
//! of the transparent one.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ global middleware ──▶ group middleware ──▶ handler
//!                     (timeout)       real_ip, real_host    secret_key /         image:
//!                                     metrics, recover      access_log           DecisionEngine
//!                                                                                 ├─ OriginMatcher
//!                                                                                 ├─ Accept-Language
//!                                                                                 └─ ImageSet
//!
//!     Cross-cutting: config (TOML + ENTRA_ env), logging (tracing),
//!                    metrics (Prometheus, separate listener), lifecycle (signals)
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use entra_phishing_detection::config::{load_config, ConfigError, DetectionConfig};
use entra_phishing_detection::detection::{ImageClass, ImageSet};
use entra_phishing_detection::http::{HttpServer, MetricsServer, ServerOptions};
use entra_phishing_detection::lifecycle::{shutdown_on_signal, Shutdown};
use entra_phishing_detection::observability::logging::init_logging;
use entra_phishing_detection::observability::MetricsSet;

#[derive(Parser, Debug)]
#[command(name = "entra-phishing-detection", version)]
#[command(about = "Serves a warning image to Entra ID login pages hosted on foreign domains", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults and ENTRA_* variables are used without it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging and no secret header check.
    #[arg(long)]
    debug: bool,

    /// Validate the configuration and exit.
    #[arg(long)]
    configcheck: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(ConfigError::Validation(errors)) => {
            for error in &errors {
                eprintln!("config error: {error}");
            }
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("could not load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.configcheck {
        println!("config is valid");
        return ExitCode::SUCCESS;
    }

    let _guard = match init_logging(&config.logging, cli.debug) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("could not set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config, cli.debug).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: DetectionConfig, debug: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "entra-phishing-detection starting");
    if debug {
        let mut shown = config.clone();
        shown.server.secret_key_header_value = "<redacted>".to_string();
        tracing::debug!(config = ?shown, "Configuration loaded");
    }

    let metrics = Arc::new(MetricsSet::new()?);
    let images = ImageSet::from_config(&config.images)?;
    tracing::info!(
        ok = ?images.languages(ImageClass::Ok),
        phishing = ?images.languages(ImageClass::Phishing),
        "Images loaded"
    );

    let grace = Duration::from_secs(config.server.graceful_timeout_secs);
    let listen = config.server.listen.clone();
    let listen_metrics = config.server.listen_metrics.clone();

    let server = HttpServer::new(ServerOptions {
        config,
        debug,
        metrics: metrics.clone(),
        images,
    })?;

    let listener = TcpListener::bind(&listen).await?;
    let metrics_listener = if listen_metrics.is_empty() {
        None
    } else {
        Some(TcpListener::bind(&listen_metrics).await?)
    };

    let shutdown = Shutdown::new();
    let main_server = server.run(listener, &shutdown);
    let metrics_server = async {
        match metrics_listener {
            Some(listener) => MetricsServer::new(metrics.clone(), grace).run(listener, &shutdown).await,
            None => Ok(()),
        }
    };
    let servers = async { tokio::try_join!(main_server, metrics_server).map(|_| ()) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => result?,
        _ = shutdown_on_signal(&shutdown) => servers.await?,
    }
    Ok(())
}
