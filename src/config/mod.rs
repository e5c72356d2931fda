mod file_config;

pub use file_config::{FileConfig, MergeConfig, ResolverFileConfig, SourceConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::dedup::MergePolicy;
use crate::matching::ResolverSettings;

const DEFAULT_SOURCE_TIMEOUT_SEC: u64 = 10;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
}

/// One resolved catalog source.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub platform: String,
    pub base_url: String,
    pub timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub sources: Vec<SourceSettings>,
    pub resolver: ResolverSettings,
    pub merge_policy: MergePolicy,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let port = file.port.unwrap_or(cli.port);

        let mut sources = Vec::new();
        for source in file.sources.unwrap_or_default() {
            let platform = source.platform.trim().to_lowercase();
            if platform.is_empty() {
                bail!("Catalog source with empty platform tag");
            }
            if source.base_url.trim().is_empty() {
                bail!("Catalog source {:?} has an empty base_url", platform);
            }
            sources.push(SourceSettings {
                platform,
                base_url: source.base_url,
                timeout_sec: source.timeout_sec.unwrap_or(DEFAULT_SOURCE_TIMEOUT_SEC),
            });
        }

        let resolver_file = file.resolver.unwrap_or_default();
        let defaults = ResolverSettings::default();
        let resolver = ResolverSettings {
            candidate_limit: resolver_file.candidate_limit.unwrap_or(defaults.candidate_limit),
            batch_chunk_size: resolver_file
                .batch_chunk_size
                .unwrap_or(defaults.batch_chunk_size),
            batch_chunk_delay_ms: resolver_file
                .batch_chunk_delay_ms
                .unwrap_or(defaults.batch_chunk_delay_ms),
        };
        if resolver.candidate_limit == 0 {
            bail!("resolver.candidate_limit must be at least 1");
        }
        if resolver.batch_chunk_size == 0 {
            bail!("resolver.batch_chunk_size must be at least 1");
        }

        let merge_policy = file.merge.map(|m| m.policy).unwrap_or_default();

        Ok(Self {
            db_path,
            port,
            sources,
            resolver,
            merge_policy,
        })
    }
}
