//! Orchestration API server binary
//!
//! Run with: cargo run -p science-rag --bin science-rag-server [-- --config <file>]

use clap::Parser;
use science_rag::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "science-rag-server", version, about = "RAG orchestration API server")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "SCIENCE_RAG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Credentials usually live in a .env next to the working directory
    let dotenv_loaded = dotenv::dotenv().is_ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "science_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                     Science RAG API                       ║
║        Dataset ingestion, retrieval and answering         ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    if dotenv_loaded {
        tracing::info!("Loaded environment from .env");
    }

    let config = RagConfig::load(args.config.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Document service: {}", config.document_service.base_url);
    tracing::info!("  - Completion service: {}", config.llm.base_url);
    tracing::info!("  - Default model: {}", config.llm.default_model);
    tracing::info!(
        "  - Parse polling: every {}ms, giving up after {}s",
        config.document_service.parse_poll_interval_ms,
        config.document_service.parse_timeout_secs
    );
    if config.llm.api_key.is_none() {
        tracing::warn!("LLM_API_KEY is not set; completion calls are sent without credentials");
    }

    let server = RagServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /upload-dataset/                 - Create a dataset from files");
    println!("  POST /parse-documents/?dataset_id=... - Parse a dataset");
    println!("  POST /retrieve/                       - Similarity search");
    println!("  POST /generate/                       - Answer with sources");
    println!("  GET  /datasets/:id/documents          - List documents");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_config_flag_forms() {
        let args = Args::try_parse_from(["science-rag-server", "--config", "/etc/rag.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/rag.toml")));

        let args = Args::try_parse_from(["science-rag-server", "--config=/etc/rag.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/rag.toml")));
    }

    #[test]
    fn test_help_and_unknown_flags_stop_startup() {
        let err = Args::try_parse_from(["science-rag-server", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        let err = Args::try_parse_from(["science-rag-server", "--port", "1"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }
}
