//! Console client and smoke test for the orchestration API
//!
//! Run with: cargo run -p science-rag --bin science-rag -- --help

use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use science_rag::client::{repl::Console, run_smoke, ApiClient, SmokeOptions};
use science_rag::config::ClientConfig;

#[derive(Parser)]
#[command(name = "science-rag", version, about = "Client for the science-rag API")]
struct Cli {
    /// Base URL of the API
    #[arg(long, env = "SCIENCE_RAG_API_URL", default_value = "http://localhost:8025", global = true)]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload, parse and ask questions interactively (default)
    Interactive,

    /// Run health, upload, parse, retrieve and generate once
    Smoke {
        /// Directory whose files are uploaded
        #[arg(long)]
        data_dir: PathBuf,

        /// Question used for retrieval and generation
        #[arg(long)]
        query: String,

        /// Dataset name
        #[arg(long, default_value = "test_API_small")]
        name: String,

        /// Completion model
        #[arg(long, default_value = "mistral-tiny")]
        model: String,

        #[arg(long, default_value_t = 3)]
        limit: usize,

        #[arg(long, default_value_t = 0.2)]
        threshold: f32,
    },

    /// Check that the API answers
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "science_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(ClientConfig::default().with_base_url(cli.api_url))?;

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Interactive => Console::new(client).run().await?,
        Commands::Smoke {
            data_dir,
            query,
            name,
            model,
            limit,
            threshold,
        } => {
            let mut options = SmokeOptions::new(data_dir, query);
            options.dataset_name = name;
            options.model = model;
            options.limit = limit;
            options.similarity_threshold = threshold;

            println!("Smoke test against {}\n", client.base_url());
            let report = run_smoke(&client, &options).await;
            for step in &report.steps {
                println!("{}", step);
            }

            if report.passed() {
                println!("\n{}", style("All steps passed").green().bold());
            } else {
                println!("\n{}", style("Smoke test failed").red().bold());
                std::process::exit(1);
            }
        }
        Commands::Health => {
            let health = client.health().await?;
            println!(
                "{} {} ({})",
                health.service,
                health.status,
                health.timestamp.to_rfc3339()
            );
        }
    }

    Ok(())
}
