use crate::embedding::{self, SharedEmbedder};
use crate::error::{Result, RetrievalError};
use crate::score;
use crate::vector_db::VectorIndex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub rank: usize,
    pub document: String,
    pub score: f64,
    pub distance: f64,
}

/// A corpus kept in lockstep with its vector index.
///
/// Document ids are positions in `corpus` and always match row ids in `index`.
pub struct RetrievalStore {
    embedder: SharedEmbedder,
    embedding_timeout: Duration,
    corpus: Vec<String>,
    index: VectorIndex,
}

impl RetrievalStore {
    pub fn new(embedder: SharedEmbedder, embedding_timeout: Duration) -> Self {
        RetrievalStore {
            embedder,
            embedding_timeout,
            corpus: Vec::new(),
            index: VectorIndex::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.index.dimension()
    }

    pub fn document(&self, id: usize) -> Option<&str> {
        self.corpus.get(id).map(String::as_str)
    }

    /// Embeds and appends `docs`, returning the new corpus size.
    ///
    /// All-or-nothing: a provider failure, timeout or dimension mismatch
    /// leaves corpus and index exactly as they were.
    pub async fn add_documents(&mut self, docs: Vec<String>) -> Result<usize> {
        if docs.is_empty() {
            debug!("No documents provided to add");
            return Ok(self.corpus.len());
        }

        let vectors =
            embedding::embed_with_deadline(&self.embedder, docs.clone(), self.embedding_timeout)
                .await?;

        self.index.add(&vectors)?;
        self.corpus.extend(docs);
        debug_assert_eq!(self.corpus.len(), self.index.len());

        info!(
            added = vectors.len(),
            total = self.corpus.len(),
            embedder = self.embedder.name(),
            "Added documents to retrieval store"
        );
        Ok(self.corpus.len())
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<QueryResult>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::validation("empty query"));
        }
        if top_k < 1 {
            return Err(RetrievalError::validation("top_k must be at least 1"));
        }
        if self.index.is_empty() {
            debug!("No documents in retrieval store");
            return Ok(Vec::new());
        }

        let mut vectors = embedding::embed_with_deadline(
            &self.embedder,
            vec![query.to_string()],
            self.embedding_timeout,
        )
        .await?;
        let query_vector = vectors.pop().ok_or_else(|| {
            RetrievalError::EmbeddingProvider("Empty embedding result".to_string())
        })?;

        let neighbors = self.index.search(&query_vector, top_k)?;
        let results: Vec<QueryResult> = neighbors
            .into_iter()
            .enumerate()
            .filter_map(|(i, neighbor)| {
                self.document(neighbor.id).map(|doc| QueryResult {
                    rank: i + 1,
                    document: doc.to_string(),
                    score: score::reported_score(neighbor.distance),
                    distance: f64::from(neighbor.distance),
                })
            })
            .collect();

        debug!(top_k, found = results.len(), "Searched retrieval store");
        Ok(results)
    }

    pub fn clear(&mut self) {
        self.corpus.clear();
        self.corpus.shrink_to_fit();
        self.index.clear();
        info!("Cleared retrieval store");
    }
}

/// Shared handle to a long-lived store. Every operation takes the store's
/// lock exclusively, so adds and searches on one knowledge base never overlap.
#[derive(Clone)]
pub struct KnowledgeBase {
    store: Arc<Mutex<RetrievalStore>>,
}

impl KnowledgeBase {
    pub async fn build(
        embedder: SharedEmbedder,
        embedding_timeout: Duration,
        docs: Vec<String>,
    ) -> Result<Self> {
        let mut store = RetrievalStore::new(embedder, embedding_timeout);
        store.add_documents(docs).await?;
        Ok(KnowledgeBase {
            store: Arc::new(Mutex::new(store)),
        })
    }

    pub async fn add_documents(&self, docs: Vec<String>) -> Result<usize> {
        self.store.lock().await.add_documents(docs).await
    }

    /// Searches and reports the corpus size the results were drawn from,
    /// both under one hold of the lock.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<(Vec<QueryResult>, usize)> {
        let store = self.store.lock().await;
        let results = store.search(query, top_k).await?;
        Ok((results, store.len()))
    }

    pub async fn document_count(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn clear(&self) {
        self.store.lock().await.clear();
    }
}
