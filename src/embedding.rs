use crate::config::EmbedderConfig;
use crate::error::{Result, RetrievalError};
use lazy_static::lazy_static;
use ndarray::Array1;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use serde::Deserialize;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Maps ordered text to ordered vectors of one fixed dimension.
///
/// Implementations are blocking; callers dispatch them through
/// [`embed_with_deadline`] so inference never runs on an async worker.
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub type SharedEmbedder = Arc<dyn EmbeddingProvider>;

pub fn from_config(config: &EmbedderConfig) -> Result<SharedEmbedder> {
    match config {
        EmbedderConfig::Hashing { dimension } => Ok(Arc::new(HashingEmbedder::new(*dimension)?)),
        EmbedderConfig::Ollama { url, model } => {
            Ok(Arc::new(OllamaEmbedder::new(url.clone(), model.clone())))
        }
    }
}

/// Runs the provider on the blocking pool under `deadline`.
///
/// On timeout the blocking task is abandoned and its result discarded.
pub async fn embed_with_deadline(
    provider: &SharedEmbedder,
    texts: Vec<String>,
    deadline: Duration,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let expected = texts.len();
    let provider = Arc::clone(provider);
    let task = tokio::task::spawn_blocking(move || provider.embed(&texts));

    let vectors = match tokio::time::timeout(deadline, task).await {
        Ok(joined) => joined
            .map_err(|e| RetrievalError::EmbeddingProvider(format!("Join error: {e}")))??,
        Err(_) => return Err(RetrievalError::Timeout(deadline)),
    };

    if vectors.len() != expected {
        return Err(RetrievalError::EmbeddingProvider(format!(
            "Expected {expected} embeddings, provider returned {}",
            vectors.len()
        )));
    }
    Ok(vectors)
}

lazy_static! {
    static ref STOP_WORDS: FxHashSet<&'static str> = {
        let words = vec![
            "a", "an", "and", "are", "as", "at", "be", "by", "for", "from",
            "has", "he", "in", "is", "it", "its", "of", "on", "that", "the",
            "to", "was", "were", "will", "with"
        ];
        words.into_iter().collect()
    };
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").unwrap();
}

pub fn tokenize(text: &str) -> Vec<String> {
    let text = text.nfc().collect::<String>().to_lowercase();
    let text = NON_WORD.replace_all(&text, " ");

    text.split_whitespace()
        .filter(|&token| !STOP_WORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

/// Feature-hashing bag-of-words embedder.
///
/// Each token lands in a bucket picked by its Fx hash, with a sign taken from
/// another hash bit so collisions tend to cancel. Weights are sublinear term
/// frequencies and the result is L2-normalized, so identical text maps to an
/// identical vector and unrelated text sits at squared distance near 2.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RetrievalError::validation("Embedding dimension must be at least 1"));
        }
        Ok(Self { dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut term_freq: FxHashMap<String, f32> = FxHashMap::default();
        for token in tokenize(text) {
            *term_freq.entry(token).or_insert(0.0) += 1.0;
        }

        let mut vector = Array1::<f32>::zeros(self.dimension);
        for (term, tf) in &term_freq {
            let mut hasher = FxHasher::default();
            term.hash(&mut hasher);
            let hash = hasher.finish();

            // Fx mixes poorly into the low bits, so index from the high word.
            let bucket = ((hash >> 32) % self.dimension as u64) as usize;
            let sign = if (hash >> 31) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign * (1.0 + tf.ln());
        }

        let norm = vector.dot(&vector).sqrt();
        if norm > 0.0 {
            vector /= norm;
        }
        vector.to_vec()
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!(count = texts.len(), dimension = self.dimension, "hashing embed");
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embeds through an Ollama-compatible `/api/embed` endpoint.
pub struct OllamaEmbedder {
    url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(url: String, model: String) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let endpoint = format!("{}/api/embed", self.url);
        debug!(%endpoint, count = texts.len(), "ollama embed");

        // Blocking client is built per call: it must not be created or dropped
        // on an async worker thread.
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(&endpoint)
            .json(&serde_json::json!({ "model": self.model, "input": texts }))
            .send()
            .map_err(|e| RetrievalError::EmbeddingProvider(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RetrievalError::EmbeddingProvider(format!(
                "{endpoint} returned {status}: {body}"
            )));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .map_err(|e| RetrievalError::EmbeddingProvider(format!("Malformed response: {e}")))?;
        Ok(parsed.embeddings)
    }
}
