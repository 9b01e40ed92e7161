//! gatehouse server binary.
//!
//! Launches the membership service: selects a storage backend, seeds the
//! admin account, and serves the HTTP API until Ctrl-C/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Start with a config file
//! gatehouse --config /etc/gatehouse/config.toml
//!
//! # Start from environment variables with a durable store
//! GATEHOUSE__TOKEN_SECRET=change-me \
//! GATEHOUSE__DATA_PATH=/var/lib/gatehouse/data.sqlite \
//! gatehouse --listen 0.0.0.0:3000
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use gatehouse_registry::{Registry, RegistryError};
use gatehouse_server::{
    AppState, AuthError, AuthService, Config, ConfigError, password, router, shutdown,
};
use gatehouse_storage::{Backend, StorageError};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// gatehouse - membership-gated community service
#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen address
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Override the SQLite database path
    #[arg(long)]
    data: Option<PathBuf>,
}

/// Top-level error type for the server binary.
#[derive(Debug, Error)]
enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("bootstrap error: {0}")]
    Bootstrap(#[from] RegistryError),
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let args = Args::parse();

    init_logging();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(data) = args.data {
        config.data_path = Some(data);
    }

    let backend = match &config.data_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using sqlite backend");
            Backend::sqlite(path)?
        },
        None => {
            tracing::warn!(
                "no data_path configured; running in-memory. All data will be lost on \
                 shutdown. Set --data or GATEHOUSE__DATA_PATH for persistent storage."
            );
            Backend::memory()
        },
    };

    let registry = Registry::new(backend);

    // Seed the admin account (idempotent; never overwrites an existing one)
    let admin_hash = password::hash(&config.admin.password)?;
    let admin = registry.ensure_admin(&config.admin.username, &admin_hash).await?;
    tracing::info!(username = %admin.username, "admin account ready");

    let auth = AuthService::new(registry.clone(), &config.token_secret, config.token_validity_secs);
    let app = router(AppState { registry, auth });

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(listen_addr = %config.listen_addr, "starting gatehouse");

    axum::serve(listener, app).with_graceful_shutdown(shutdown::shutdown_signal()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
