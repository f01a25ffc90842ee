//! Caller-facing retrieval operations.
//!
//! Ephemeral calls (`search_documents`, `multi_query_search`,
//! `find_similar_documents`) build a throwaway store and embed the whole
//! corpus every time. Only a knowledge base built through
//! [`QueryOrchestrator::build_knowledge_base`] keeps its embeddings between
//! calls, and it lives only as long as this process.

use crate::config::RetrievalConfig;
use crate::embedding::SharedEmbedder;
use crate::error::{Result, RetrievalError};
use crate::retriever::{KnowledgeBase, QueryResult, RetrievalStore};
use rustc_hash::FxHashMap;
use serde::{Serialize, Serializer};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_documents: usize,
    pub returned_results: usize,
    pub results: Vec<QueryResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeBaseInfo {
    pub knowledge_base_id: Uuid,
    pub success: bool,
    pub document_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub query: String,
    pub results: Vec<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiQueryResponse {
    pub total_queries: usize,
    pub total_documents: usize,
    pub results: QueryOutcomes,
}

/// Per-query outcomes keyed `query_1`, `query_2`, ..., serialized as a JSON
/// object whose keys stay in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcomes(Vec<(String, QueryOutcome)>);

impl QueryOutcomes {
    pub fn get(&self, key: &str) -> Option<&QueryOutcome> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryOutcome)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for QueryOutcomes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarDocumentsResponse {
    pub target_document: String,
    pub corpus_size: usize,
    pub similar_documents: Vec<QueryResult>,
}

/// Owns the process-wide embedder and the registry of live knowledge bases.
pub struct QueryOrchestrator {
    embedder: SharedEmbedder,
    config: RetrievalConfig,
    knowledge_bases: RwLock<FxHashMap<Uuid, KnowledgeBase>>,
}

impl QueryOrchestrator {
    pub fn new(embedder: SharedEmbedder, config: RetrievalConfig) -> Self {
        QueryOrchestrator {
            embedder,
            config,
            knowledge_bases: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        self.config.embedding_timeout()
    }

    async fn ephemeral_store(&self, documents: &[String]) -> Result<RetrievalStore> {
        let mut store = RetrievalStore::new(self.embedder.clone(), self.timeout());
        store.add_documents(documents.to_vec()).await?;
        Ok(store)
    }

    pub async fn search_documents(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(RetrievalError::validation("empty query"));
        }
        if documents.is_empty() {
            return Err(RetrievalError::validation("empty corpus"));
        }
        validate_top_k(top_k)?;

        let store = self.ephemeral_store(documents).await?;
        let results = store.search(query, top_k).await.inspect_err(|e| {
            error!("Error performing RAG search: {e}");
        })?;

        Ok(SearchResponse {
            query: query.to_string(),
            total_documents: documents.len(),
            returned_results: results.len(),
            results,
        })
    }

    pub async fn build_knowledge_base(&self, documents: Vec<String>) -> Result<KnowledgeBaseInfo> {
        if documents.is_empty() {
            return Err(RetrievalError::validation("empty corpus"));
        }

        let document_count = documents.len();
        let kb = KnowledgeBase::build(self.embedder.clone(), self.timeout(), documents).await?;
        let id = Uuid::new_v4();
        self.knowledge_bases.write().await.insert(id, kb);

        info!(%id, document_count, "Built knowledge base");
        Ok(KnowledgeBaseInfo {
            knowledge_base_id: id,
            success: true,
            document_count,
            message: "Knowledge base built successfully".to_string(),
        })
    }

    pub async fn knowledge_base(&self, id: Uuid) -> Result<KnowledgeBase> {
        self.knowledge_bases
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RetrievalError::UnknownKnowledgeBase(id))
    }

    pub async fn search_knowledge_base(
        &self,
        id: Uuid,
        query: &str,
        top_k: usize,
    ) -> Result<SearchResponse> {
        let kb = self.knowledge_base(id).await?;
        let (results, total_documents) = kb.search(query, top_k).await?;
        Ok(SearchResponse {
            query: query.to_string(),
            total_documents,
            returned_results: results.len(),
            results,
        })
    }

    pub async fn add_to_knowledge_base(&self, id: Uuid, documents: Vec<String>) -> Result<usize> {
        let kb = self.knowledge_base(id).await?;
        kb.add_documents(documents).await
    }

    /// Clears the knowledge base and forgets its id.
    pub async fn drop_knowledge_base(&self, id: Uuid) -> Result<()> {
        let kb = self
            .knowledge_bases
            .write()
            .await
            .remove(&id)
            .ok_or(RetrievalError::UnknownKnowledgeBase(id))?;
        kb.clear().await;
        info!(%id, "Dropped knowledge base");
        Ok(())
    }

    /// Runs every query against one shared store. A failing query is
    /// recorded in its own entry and never aborts the rest of the batch.
    pub async fn multi_query_search(
        &self,
        queries: &[String],
        documents: &[String],
        top_k: usize,
    ) -> Result<MultiQueryResponse> {
        if queries.is_empty() || documents.is_empty() {
            return Err(RetrievalError::validation(
                "Both queries and documents must be provided",
            ));
        }
        validate_top_k(top_k)?;

        let store = self.ephemeral_store(documents).await?;

        let mut results = Vec::with_capacity(queries.len());
        for (idx, query) in queries.iter().enumerate() {
            let outcome = match store.search(query, top_k).await {
                Ok(hits) => QueryOutcome {
                    query: query.clone(),
                    results: hits,
                    error: None,
                },
                Err(e) => {
                    error!("Error searching query {}: {e}", idx + 1);
                    QueryOutcome {
                        query: query.clone(),
                        results: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push((query_key(idx), outcome));
        }

        Ok(MultiQueryResponse {
            total_queries: queries.len(),
            total_documents: documents.len(),
            results: QueryOutcomes(results),
        })
    }

    /// Searches the corpus with `target_doc` as the query. The target is not
    /// excluded even if it is part of `documents`.
    pub async fn find_similar_documents(
        &self,
        target_doc: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<SimilarDocumentsResponse> {
        if target_doc.trim().is_empty() || documents.is_empty() {
            return Err(RetrievalError::validation(
                "Target document and documents list must be provided",
            ));
        }
        validate_top_k(top_k)?;

        let store = self.ephemeral_store(documents).await?;
        let similar_documents = store.search(target_doc, top_k).await?;

        Ok(SimilarDocumentsResponse {
            target_document: preview(target_doc, self.config.preview_chars),
            corpus_size: documents.len(),
            similar_documents,
        })
    }
}

fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k < 1 {
        return Err(RetrievalError::validation("top_k must be at least 1"));
    }
    Ok(())
}

fn query_key(idx: usize) -> String {
    format!("query_{}", idx + 1)
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
