use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::dedup::MergePolicy;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub port: Option<u16>,

    /// Catalog sources searched by the unified search endpoint.
    pub sources: Option<Vec<SourceConfig>>,

    // Feature configs
    pub resolver: Option<ResolverFileConfig>,
    pub merge: Option<MergeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub platform: String,
    pub base_url: String,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ResolverFileConfig {
    pub candidate_limit: Option<usize>,
    pub batch_chunk_size: Option<usize>,
    pub batch_chunk_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MergeConfig {
    #[serde(flatten)]
    pub policy: MergePolicy,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
