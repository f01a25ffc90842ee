//! Named-tool entry points for a JSON tool-serving layer.

use crate::error::{Result, RetrievalError};
use crate::rag_search::QueryOrchestrator;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    documents: Vec<String>,
    top_k: Option<i64>,
}

#[derive(Deserialize)]
struct BuildArgs {
    documents: Vec<String>,
}

#[derive(Deserialize)]
struct KnowledgeBaseSearchArgs {
    knowledge_base_id: Uuid,
    query: String,
    top_k: Option<i64>,
}

#[derive(Deserialize)]
struct MultiQueryArgs {
    queries: Vec<String>,
    documents: Vec<String>,
    top_k: Option<i64>,
}

#[derive(Deserialize)]
struct SimilarArgs {
    target_doc: String,
    documents: Vec<String>,
    top_k: Option<i64>,
}

#[derive(Deserialize)]
struct DropArgs {
    knowledge_base_id: Uuid,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| RetrievalError::InvalidArguments(format!("{tool}: {e}")))
}

fn top_k(requested: Option<i64>, default: usize) -> Result<usize> {
    match requested {
        None => Ok(default),
        Some(k) if k >= 1 => Ok(k as usize),
        Some(k) => Err(RetrievalError::validation(format!(
            "top_k must be at least 1, got {k}"
        ))),
    }
}

/// Runs the tool called `name` and returns its JSON result.
pub async fn dispatch(orchestrator: &QueryOrchestrator, name: &str, arguments: Value) -> Result<Value> {
    debug!(tool = name, "Dispatching tool call");
    let defaults = orchestrator.config();

    let result = match name {
        "rag_search" => {
            let args: SearchArgs = parse_args(name, arguments)?;
            let k = top_k(args.top_k, defaults.default_top_k)?;
            serde_json::to_value(orchestrator.search_documents(&args.query, &args.documents, k).await?)?
        }
        "build_knowledge_base" => {
            let args: BuildArgs = parse_args(name, arguments)?;
            serde_json::to_value(orchestrator.build_knowledge_base(args.documents).await?)?
        }
        "search_knowledge_base" => {
            let args: KnowledgeBaseSearchArgs = parse_args(name, arguments)?;
            let k = top_k(args.top_k, defaults.default_top_k)?;
            serde_json::to_value(
                orchestrator
                    .search_knowledge_base(args.knowledge_base_id, &args.query, k)
                    .await?,
            )?
        }
        "multi_query_search" => {
            let args: MultiQueryArgs = parse_args(name, arguments)?;
            let k = top_k(args.top_k, defaults.default_top_k)?;
            serde_json::to_value(
                orchestrator
                    .multi_query_search(&args.queries, &args.documents, k)
                    .await?,
            )?
        }
        "find_similar_documents" => {
            let args: SimilarArgs = parse_args(name, arguments)?;
            let k = top_k(args.top_k, defaults.similar_top_k)?;
            serde_json::to_value(
                orchestrator
                    .find_similar_documents(&args.target_doc, &args.documents, k)
                    .await?,
            )?
        }
        "drop_knowledge_base" => {
            let args: DropArgs = parse_args(name, arguments)?;
            orchestrator.drop_knowledge_base(args.knowledge_base_id).await?;
            json!({ "success": true, "knowledge_base_id": args.knowledge_base_id })
        }
        other => return Err(RetrievalError::UnknownTool(other.to_string())),
    };
    Ok(result)
}

/// Tool descriptors with JSON-schema inputs.
pub fn list_tools() -> Value {
    let documents = json!({
        "type": "array",
        "items": { "type": "string" },
        "description": "List of documents to search in"
    });
    let kb_id = json!({ "type": "string", "description": "Id returned by build_knowledge_base" });

    json!([
        {
            "name": "rag_search",
            "description": "Semantic search over documents using vector embeddings.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" },
                    "documents": documents,
                    "top_k": { "type": "integer", "description": "Number of top results to return", "default": 3 }
                },
                "required": ["query", "documents"]
            }
        },
        {
            "name": "build_knowledge_base",
            "description": "Index documents once for repeated searches in this process.",
            "inputSchema": {
                "type": "object",
                "properties": { "documents": documents },
                "required": ["documents"]
            }
        },
        {
            "name": "search_knowledge_base",
            "description": "Search a knowledge base built earlier.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "knowledge_base_id": kb_id,
                    "query": { "type": "string" },
                    "top_k": { "type": "integer", "default": 3 }
                },
                "required": ["knowledge_base_id", "query"]
            }
        },
        {
            "name": "multi_query_search",
            "description": "Run several queries against the same documents.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "queries": { "type": "array", "items": { "type": "string" } },
                    "documents": documents,
                    "top_k": { "type": "integer", "default": 3 }
                },
                "required": ["queries", "documents"]
            }
        },
        {
            "name": "find_similar_documents",
            "description": "Find documents similar to a target document.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "target_doc": { "type": "string" },
                    "documents": documents,
                    "top_k": { "type": "integer", "default": 5 }
                },
                "required": ["target_doc", "documents"]
            }
        },
        {
            "name": "drop_knowledge_base",
            "description": "Release a knowledge base and its vectors.",
            "inputSchema": {
                "type": "object",
                "properties": { "knowledge_base_id": kb_id },
                "required": ["knowledge_base_id"]
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::embedding::HashingEmbedder;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn orchestrator() -> QueryOrchestrator {
        let embedder = Arc::new(HashingEmbedder::new(384).unwrap());
        QueryOrchestrator::new(embedder, RetrievalConfig::default())
    }

    fn corpus() -> Value {
        json!([
            "Python is a programming language.",
            "Cats are mammals.",
            "Machine learning uses data."
        ])
    }

    #[tokio::test]
    async fn test_rag_search_uses_default_top_k() -> Result<()> {
        let value = dispatch(
            &orchestrator(),
            "rag_search",
            json!({ "query": "What is machine learning?", "documents": corpus() }),
        )
        .await?;

        assert_eq!(value["total_documents"], 3);
        assert_eq!(value["returned_results"], 3);
        assert_eq!(value["results"][0]["rank"], 1);
        assert_eq!(value["results"][0]["document"], "Machine learning uses data.");
        Ok(())
    }

    #[tokio::test]
    async fn test_multi_query_reports_every_query() -> Result<()> {
        let queries: Vec<String> = (1..=11).map(|i| format!("query number {i}")).collect();
        let value = dispatch(
            &orchestrator(),
            "multi_query_search",
            json!({ "queries": queries, "documents": corpus(), "top_k": 1 }),
        )
        .await?;

        assert_eq!(value["total_queries"], 11);
        assert_eq!(value["results"].as_object().unwrap().len(), 11);
        assert_eq!(value["results"]["query_11"]["query"], "query number 11");
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_batch_item_serializes_error() -> Result<()> {
        let value = dispatch(
            &orchestrator(),
            "multi_query_search",
            json!({ "queries": ["machine learning", "  "], "documents": corpus() }),
        )
        .await?;

        assert_eq!(value["total_queries"], 2);
        assert!(value["results"]["query_1"].get("error").is_none());
        assert_eq!(value["results"]["query_2"]["error"], "empty query");
        assert_eq!(value["results"]["query_2"]["results"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn test_knowledge_base_round_trip_through_tools() -> Result<()> {
        let orchestrator = orchestrator();
        let built = dispatch(&orchestrator, "build_knowledge_base", json!({ "documents": corpus() })).await?;
        assert_eq!(built["document_count"], 3);
        let id = built["knowledge_base_id"].clone();

        let found = dispatch(
            &orchestrator,
            "search_knowledge_base",
            json!({ "knowledge_base_id": id, "query": "cats", "top_k": 1 }),
        )
        .await?;
        assert_eq!(found["results"][0]["document"], "Cats are mammals.");

        dispatch(&orchestrator, "drop_knowledge_base", json!({ "knowledge_base_id": id })).await?;
        let err = dispatch(
            &orchestrator,
            "search_knowledge_base",
            json!({ "knowledge_base_id": id, "query": "cats" }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RetrievalError::UnknownKnowledgeBase(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_calls_are_rejected() {
        let orchestrator = orchestrator();

        let err = dispatch(&orchestrator, "kpi_generator", json!({})).await.unwrap_err();
        assert!(matches!(err, RetrievalError::UnknownTool(_)));

        let err = dispatch(&orchestrator, "rag_search", json!({ "query": "q" })).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidArguments(_)));

        let err = dispatch(
            &orchestrator,
            "rag_search",
            json!({ "query": "q", "documents": corpus(), "top_k": -2 }),
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_every_listed_tool_is_dispatchable() {
        let tools = list_tools();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "rag_search",
                "build_knowledge_base",
                "search_knowledge_base",
                "multi_query_search",
                "find_similar_documents",
                "drop_knowledge_base"
            ]
        );
    }
}
