use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub vault: VaultConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    /// Root folder of the markdown vault.
    pub root: PathBuf,
    /// Extra directory names to skip at any depth, on top of the built-in
    /// tooling set (.git, .obsidian, .trash, node_modules, the store dir).
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Overlap between consecutive fixed-slice fragments, in characters.
    #[serde(default = "default_fragment_overlap")]
    pub fragment_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            fragment_overlap: default_fragment_overlap(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    1000
}
fn default_fragment_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Default number of results returned per search.
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    /// Upper bound on keyword candidates scanned per query.
    #[serde(default = "default_keyword_scan_cap")]
    pub keyword_scan_cap: i64,
    /// Content preview length in characters.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// RRF weight of the semantic channel.
    #[serde(default = "default_weight")]
    pub semantic_weight: f64,
    /// RRF weight of the keyword channel.
    #[serde(default = "default_weight")]
    pub keyword_weight: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_results: default_n_results(),
            keyword_scan_cap: default_keyword_scan_cap(),
            preview_chars: default_preview_chars(),
            semantic_weight: default_weight(),
            keyword_weight: default_weight(),
        }
    }
}

fn default_n_results() -> usize {
    10
}
fn default_keyword_scan_cap() -> i64 {
    200
}
fn default_preview_chars() -> usize {
    500
}
fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chunk_size == 0 {
        anyhow::bail!("chunking.max_chunk_size must be > 0");
    }

    if config.retrieval.n_results < 1 {
        anyhow::bail!("retrieval.n_results must be >= 1");
    }
    if config.retrieval.keyword_scan_cap < 1 {
        anyhow::bail!("retrieval.keyword_scan_cap must be >= 1");
    }
    if config.retrieval.semantic_weight < 0.0 || config.retrieval.keyword_weight < 0.0 {
        anyhow::bail!("retrieval weights must be >= 0");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(config)
}
