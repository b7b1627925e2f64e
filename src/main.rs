//! Cement Ops - plant operations backend
//!
//! Serves process analytics, optimisation opportunities, the plant location
//! catalogue and the chat assistant over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Against PostgreSQL
//! DATABASE_URL=postgres://... cargo run --release
//!
//! # Seeded sample data, no database
//! cargo run --release -- --demo
//!
//! # Explicit config and JSON logs
//! ./cement-ops --config plant_config.toml --log-format json
//! ```
//!
//! # Environment Variables
//!
//! - `CEMENT_OPS_CONFIG`: Path to the plant TOML config
//! - `DATABASE_URL`: PostgreSQL URL (unset runs without a data store)
//! - `PORT` / `BIND_ADDRESS`: Listen address overrides
//! - `CORS_ORIGINS`: Comma-separated allowed origins, or `*`
//! - `LLM_API_KEY`: Hosted model key; chat is disabled without it
//! - `RUST_LOG`: Logging filter (default: `info,cement_ops=debug`)

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use cement_ops::agent::guard::spawn_guard_cleanup;
use cement_ops::api::{create_app, AppState};
use cement_ops::config::PlantConfig;
use cement_ops::store::{db, MemoryStore, PgStore, PlantStore};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "cement-ops")]
#[command(about = "Cement plant operations backend")]
#[command(version)]
struct CliArgs {
    /// Path to the plant TOML config (overrides CEMENT_OPS_CONFIG)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// PostgreSQL URL (overrides config and DATABASE_URL)
    #[arg(long, value_name = "URL")]
    database_url: Option<String>,

    /// Listen address, e.g. "0.0.0.0:8000"
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Listen port on all interfaces (ignored when --addr is given)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", env = "LOG_FORMAT")]
    log_format: LogFormat,

    /// Serve seeded sample data instead of a database
    #[arg(long)]
    demo: bool,

    /// Skip running database migrations on startup
    #[arg(long)]
    no_migrate: bool,

    /// Load and validate the config, print it, and exit
    #[arg(long)]
    check_config: bool,
}

// ============================================================================
// Startup helpers
// ============================================================================

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,cement_ops=debug"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init(),
    }
}

/// Config file, then environment, then command line.
fn load_config(args: &CliArgs) -> Result<PlantConfig> {
    let mut config = PlantConfig::load(args.config.as_deref()).context("Failed to load plant config")?;
    config.apply_env_overrides();

    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }
    if let Some(addr) = &args.addr {
        config.server.bind_address = addr.clone();
    } else if let Some(port) = args.port {
        config.server.bind_address = format!("0.0.0.0:{port}");
    }
    if args.no_migrate {
        config.database.run_migrations = false;
    }

    config.validate().context("Invalid plant config")?;
    Ok(config)
}

async fn build_store(config: &PlantConfig, demo: bool) -> Result<Arc<dyn PlantStore>> {
    if demo {
        warn!("Demo mode: serving seeded sample data, no database");
        return Ok(Arc::new(MemoryStore::demo()));
    }
    if config.database.url.trim().is_empty() {
        warn!("No DATABASE_URL configured; analytics will report no data");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if config.database.run_migrations {
        db::run_migrations(&pool).await.context("Failed to run migrations")?;
    }
    Ok(Arc::new(PgStore::new(
        pool,
        Duration::from_secs(config.database.query_timeout_secs),
    )))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Received shutdown signal");
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let dotenv = dotenvy::dotenv();

    let args = CliArgs::parse();
    init_logging(args.log_format);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let config = load_config(&args)?;
    if args.check_config {
        let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
        println!("{rendered}");
        return Ok(());
    }

    info!(
        plant = %config.plant.name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting cement-ops"
    );

    let store = build_store(&config, args.demo).await?;
    info!(backend = store.backend_name(), "Data store ready");

    let bind_address = config.server.bind_address.clone();
    let state = AppState::new(store, Arc::new(config)).context("Failed to build app state")?;
    spawn_guard_cleanup(Arc::clone(&state.guard));
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {bind_address}"))?;
    info!(address = %bind_address, "HTTP server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("cement-ops shutdown complete");
    Ok(())
}
