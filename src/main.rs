use anyhow::{Result, anyhow};
use clap::Parser;
use semantic_retrieval::{QueryOrchestrator, RetrievalConfig, embedding, utils};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "semantic-retrieval")]
#[command(about = "Index documents and answer semantic search queries", long_about = None)]
struct Cli {
    #[arg(default_value = "docs", help = "Directory of .txt files, or a JSON / line-delimited file")]
    docs_path: PathBuf,

    #[arg(short, long, help = "Config file (overrides the per-user config)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Split documents into chunks of at most this many characters")]
    chunk_chars: Option<usize>,

    #[arg(short = 'k', long, help = "Results per query (overrides config)")]
    top_k: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = RetrievalConfig::load(args.config.as_deref())?;
    let top_k = args.top_k.unwrap_or(config.default_top_k);

    // One embedder for the whole process; every store shares it.
    let embedder = embedding::from_config(&config.embedder)?;
    info!(embedder = embedder.name(), "Embedding provider ready");
    let orchestrator = QueryOrchestrator::new(embedder, config);

    info!("Loading documents from {:?}", args.docs_path);
    let documents = match utils::load_documents(&args.docs_path, args.chunk_chars) {
        Ok(docs) => docs,
        Err(e) => {
            warn!("Failed to load documents: {e}");
            Vec::new()
        }
    };
    if documents.is_empty() {
        return Err(anyhow!("No documents to index at {:?}", args.docs_path));
    }

    let kb = orchestrator.build_knowledge_base(documents).await?;
    println!(
        "Indexed {} documents. Enter your queries (Ctrl+D to exit)",
        kb.document_count
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        match orchestrator
            .search_knowledge_base(kb.knowledge_base_id, query, top_k)
            .await
        {
            Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    orchestrator.drop_knowledge_base(kb.knowledge_base_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["semantic-retrieval"]).unwrap();
        assert_eq!(cli.docs_path, PathBuf::from("docs"));
        assert!(cli.config.is_none());
        assert!(cli.chunk_chars.is_none());
        assert!(cli.top_k.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "semantic-retrieval",
            "corpus.json",
            "--config",
            "retrieval.json",
            "--chunk-chars",
            "500",
            "-k",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.docs_path, PathBuf::from("corpus.json"));
        assert_eq!(cli.config, Some(PathBuf::from("retrieval.json")));
        assert_eq!(cli.chunk_chars, Some(500));
        assert_eq!(cli.top_k, Some(7));
    }

    #[test]
    fn test_cli_rejects_non_numeric_top_k() {
        assert!(Cli::try_parse_from(["semantic-retrieval", "--top-k", "many"]).is_err());
    }
}
