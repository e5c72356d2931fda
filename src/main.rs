use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use songbridge_server::catalog::{CatalogSource, HttpCatalogSource};
use songbridge_server::config::{AppConfig, CliConfig, FileConfig};
use songbridge_server::identity_store::SqliteIdentityStore;
use songbridge_server::server::run_server;
use songbridge_server::service::MatchingService;
use songbridge_server::{PlatformTag, TrackResolver};

/// Canonicalize a CLI path argument, tolerating paths that don't exist yet
/// (the identity db is created on first start).
fn parse_path(s: &str) -> Result<PathBuf> {
    let raw = PathBuf::from(s);
    let resolved = match raw.canonicalize() {
        Ok(path) => path,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => raw,
        Err(e) => return Err(e).with_context(|| format!("could not resolve path {:?}", s)),
    };
    if resolved.is_absolute() {
        Ok(resolved)
    } else {
        Ok(std::env::current_dir()?.join(resolved))
    }
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite identity database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8090)]
    pub port: u16,

    /// Path to a TOML config file. File values override CLI values.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("failed to initialize logging")?;

    info!(
        "Starting songbridge-server {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_path: cli_args.db_path,
        port: cli_args.port,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening identity database at {:?}...", config.db_path);
    let store = Arc::new(SqliteIdentityStore::open(&config.db_path)?);

    let mut sources: Vec<Arc<dyn CatalogSource>> = Vec::new();
    for source in &config.sources {
        info!(
            "Registering catalog source {} at {}",
            source.platform, source.base_url
        );
        sources.push(Arc::new(HttpCatalogSource::new(
            PlatformTag::new(&source.platform),
            source.base_url.clone(),
            source.timeout_sec,
        )?));
    }

    let resolver = TrackResolver::new(store, config.resolver.clone());
    let service = Arc::new(MatchingService::new(
        resolver,
        sources,
        config.merge_policy,
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    run_server(addr, service).await
}
