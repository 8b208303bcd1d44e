use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::{AppConfig, TransportKind};
use services::{
    metadata::{self, MetadataBackend},
    slicer_service::SlicerService,
    transport::{Transport, discord::DiscordTransport, local::LocalTransport},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting chunkvault: metadata={:?} transport={:?} chunk_size={} staging={}",
        cfg.metadata_backend,
        cfg.transport,
        cfg.chunk_size,
        cfg.staging_dir.display()
    );

    // --- Ensure working directories exist ---
    for dir in [&cfg.staging_dir, &cfg.download_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir).await?;
            tracing::info!("Created directory {}", dir.display());
        }
    }

    // --- Initialize metadata index ---
    if cfg.metadata_backend == MetadataBackend::Local {
        ensure_sqlite_parent(&cfg.database_url).await?;
    }
    let index = metadata::connect(cfg.metadata_backend, cfg.metadata_url())
        .await
        .with_context(|| format!("connecting to {:?} metadata store", cfg.metadata_backend))?;

    // --- Handle migration mode ---
    if migrate {
        index.migrate().await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }
    index
        .migrate()
        .await
        .context("applying pending metadata migrations")?;

    // --- Initialize core service ---
    let transport = build_transport(&cfg)?;
    let service = SlicerService::new(index, transport, cfg.pipeline_settings());
    let state = handlers::AppState::new(service, cfg.authorized_owners.clone());

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the directory holding the SQLite file named by `database_url`.
async fn ensure_sqlite_parent(database_url: &str) -> Result<()> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    Ok(())
}

fn build_transport(cfg: &AppConfig) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match cfg.transport {
        TransportKind::Local => {
            tracing::info!("Using local transport at {}", cfg.transport_root.display());
            Arc::new(LocalTransport::new(cfg.transport_root.clone()))
        }
        TransportKind::Discord => {
            let token = cfg
                .discord_token
                .clone()
                .context("CHUNKVAULT_DISCORD_TOKEN is not set")?;
            let guild_id = cfg
                .discord_guild_id
                .clone()
                .context("CHUNKVAULT_DISCORD_GUILD_ID is not set")?;
            Arc::new(DiscordTransport::new(token, guild_id)?)
        }
    };
    Ok(transport)
}
