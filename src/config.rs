use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

pub const DEFAULT_DIMENSION: usize = 384;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "all-minilm";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbedderConfig {
    /// Model-free feature hashing, always available.
    Hashing {
        #[serde(default = "default_dimension")]
        dimension: usize,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        url: String,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        EmbedderConfig::Hashing {
            dimension: DEFAULT_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub embedding_timeout_ms: u64,
    pub default_top_k: usize,
    pub similar_top_k: usize,
    pub preview_chars: usize,
    pub embedder: EmbedderConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_timeout_ms: 30_000,
            default_top_k: 3,
            similar_top_k: 5,
            preview_chars: 200,
            embedder: EmbedderConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Resolves configuration from an explicit file, the per-user config file,
    /// or built-in defaults, in that order, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("semantic-retrieval").join("config.json"))
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = env::var("RETRIEVAL_EMBED_TIMEOUT_MS") {
            self.embedding_timeout_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("RETRIEVAL_EMBED_TIMEOUT_MS is not a number: {raw}"))?;
        }

        let url = env::var("RETRIEVAL_OLLAMA_URL").ok();
        let model = env::var("RETRIEVAL_OLLAMA_MODEL").ok();
        if url.is_some() || model.is_some() {
            let (base_url, base_model) = match &self.embedder {
                EmbedderConfig::Ollama { url, model } => (url.clone(), model.clone()),
                EmbedderConfig::Hashing { .. } => (default_ollama_url(), default_ollama_model()),
            };
            self.embedder = EmbedderConfig::Ollama {
                url: url.unwrap_or(base_url),
                model: model.unwrap_or(base_model),
            };
        }
        Ok(())
    }
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_ollama_model() -> String {
    DEFAULT_OLLAMA_MODEL.to_string()
}
