use crate::services::{
    metadata::MetadataBackend,
    slicer_service::{DEFAULT_CHUNK_SIZE, DEFAULT_GROUPING_NAME, PipelineSettings},
};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf, str::FromStr};

/// Which message provider stores the parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Directory-backed provider for development.
    Local,
    Discord,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub staging_dir: PathBuf,
    pub download_dir: PathBuf,
    pub metadata_backend: MetadataBackend,
    pub database_url: String,
    pub remote_database_url: Option<String>,
    pub transport: TransportKind,
    pub transport_root: PathBuf,
    pub discord_token: Option<String>,
    pub discord_guild_id: Option<String>,
    pub chunk_size: u64,
    pub grouping_name: String,
    /// Empty means every owner is allowed.
    pub authorized_owners: Vec<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Chunked object store over a message service")]
pub struct Args {
    /// Host to bind to (overrides CHUNKVAULT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CHUNKVAULT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Root of the upload/download working directories (overrides CHUNKVAULT_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Where downloaded files are written (overrides CHUNKVAULT_DOWNLOAD_DIR)
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Metadata backend (overrides CHUNKVAULT_METADATA_BACKEND)
    #[arg(long, value_enum)]
    pub metadata_backend: Option<MetadataBackend>,

    /// Local SQLite URL (overrides CHUNKVAULT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Remote PostgreSQL URL (overrides CHUNKVAULT_REMOTE_DATABASE_URL)
    #[arg(long)]
    pub remote_database_url: Option<String>,

    /// Message provider (overrides CHUNKVAULT_TRANSPORT)
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Root directory of the local transport (overrides CHUNKVAULT_TRANSPORT_ROOT)
    #[arg(long)]
    pub transport_root: Option<PathBuf>,

    /// Part size in bytes (overrides CHUNKVAULT_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Grouping container name (overrides CHUNKVAULT_GROUPING_NAME)
    #[arg(long)]
    pub grouping_name: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args, |key| env::var(key).ok())?, migrate))
    }

    /// Merge `args` over variables read through `lookup`, then defaults.
    fn merge(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(&format!("CHUNKVAULT_{key}")).filter(|v| !v.is_empty());

        let env_port = parse_var(&var, "PORT")?.unwrap_or(3000);
        let env_backend = match var("METADATA_BACKEND") {
            Some(value) => MetadataBackend::from_str(&value, true).map_err(|err| {
                anyhow::anyhow!("parsing CHUNKVAULT_METADATA_BACKEND value `{value}`: {err}")
            })?,
            None => MetadataBackend::Local,
        };
        let env_transport = match var("TRANSPORT") {
            Some(value) => TransportKind::from_str(&value, true).map_err(|err| {
                anyhow::anyhow!("parsing CHUNKVAULT_TRANSPORT value `{value}`: {err}")
            })?,
            None => TransportKind::Local,
        };
        let env_download_dir = var("DOWNLOAD_DIR").map(PathBuf::from).unwrap_or_else(|| {
            lookup("HOME")
                .map(|home| PathBuf::from(home).join("Downloads"))
                .filter(|dir| dir.is_dir())
                .unwrap_or_else(|| PathBuf::from("./downloads"))
        });

        let cfg = Self {
            host: args
                .host
                .or_else(|| var("HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.unwrap_or(env_port),
            staging_dir: args
                .staging_dir
                .or_else(|| var("STAGING_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("./files")),
            download_dir: args.download_dir.unwrap_or(env_download_dir),
            metadata_backend: args.metadata_backend.unwrap_or(env_backend),
            database_url: args
                .database_url
                .or_else(|| var("DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/chunkvault.db".into()),
            remote_database_url: args
                .remote_database_url
                .or_else(|| var("REMOTE_DATABASE_URL")),
            transport: args.transport.unwrap_or(env_transport),
            transport_root: args
                .transport_root
                .or_else(|| var("TRANSPORT_ROOT").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("./data/transport")),
            discord_token: var("DISCORD_TOKEN"),
            discord_guild_id: var("DISCORD_GUILD_ID"),
            chunk_size: match args.chunk_size {
                Some(size) => size,
                None => parse_var(&var, "CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE),
            },
            grouping_name: args
                .grouping_name
                .or_else(|| var("GROUPING_NAME"))
                .unwrap_or_else(|| DEFAULT_GROUPING_NAME.into()),
            authorized_owners: var("AUTHORIZED_OWNERS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk size must be greater than zero");
        }
        if self.metadata_backend == MetadataBackend::Remote && self.remote_database_url.is_none() {
            bail!("CHUNKVAULT_REMOTE_DATABASE_URL is required for the remote metadata backend");
        }
        if self.transport == TransportKind::Discord
            && (self.discord_token.is_none() || self.discord_guild_id.is_none())
        {
            bail!("CHUNKVAULT_DISCORD_TOKEN and CHUNKVAULT_DISCORD_GUILD_ID are required for the discord transport");
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL of the metadata store the selected backend talks to.
    pub fn metadata_url(&self) -> &str {
        match self.metadata_backend {
            MetadataBackend::Local => &self.database_url,
            MetadataBackend::Remote => self
                .remote_database_url
                .as_deref()
                .unwrap_or(&self.database_url),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            staging_dir: self.staging_dir.clone(),
            download_dir: self.download_dir.clone(),
            chunk_size: self.chunk_size,
            grouping_name: self.grouping_name.clone(),
        }
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("parsing CHUNKVAULT_{key} value `{value}`"))
        })
        .transpose()
}
