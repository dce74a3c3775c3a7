use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use config_engine::{DeploymentEnvironment, RuntimeSettings};
use tracing::{info, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use carehub_server::Runtime;

/// CareHub runtime HTTP server
#[derive(Parser, Debug)]
#[command(name = "carehub-server")]
#[command(about = "Hosts CareHub modules and plugins behind one HTTP API")]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // a missing .env is fine
    let _ = dotenvy::dotenv();

    let mut settings = RuntimeSettings::load(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    init_tracing(args.verbose, settings.environment);

    info!(version = env!("CARGO_PKG_VERSION"), environment = ?settings.environment, "Starting CareHub server");

    let runtime = Runtime::build(settings).await?;
    runtime.start().await?;

    let address = runtime.settings().server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;

    let api = &runtime.settings().api;
    info!(address = %address, "Server listening");
    info!(
        versioned = %format!("{}/{}", api.base_path, api.version),
        legacy = %api.base_path,
        "Module routes mounted"
    );

    axum::serve(listener, runtime.router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    runtime.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing(verbose: bool, environment: DeploymentEnvironment) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "carehub_server={level},plugin_runtime_core={level},events_bus={level},\
             cache_manager={level},crypto={level},config_engine={level},tower_http=info"
        )
        .into()
    });

    if environment.is_production() {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(std::env::var_os("NO_COLOR").is_none())
                    .with_level(true),
            )
            .init();
    }
}
