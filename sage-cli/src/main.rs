//! ABOUTME: Entry point for the `sage` binary: serves the RAG core or runs ingestion

mod bootstrap;
mod cli;
mod ingest;

use std::io;

use clap::Parser;
use cli::{Cli, Command, IndexArgs};
use sage_config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Index(args) => run_index(config, args).await,
    }
}

/// Tracing goes to stderr so stdout stays clean for ingestion output;
/// `RUST_LOG` takes precedence over the crate's default filter.
fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).init();
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let core = bootstrap::build_core(&config)?;

    let http_addr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let grpc_addr = format!("{}:{}", config.server.grpc_host, config.server.grpc_port).parse()?;

    let http = tokio::spawn(bootstrap::run_http(std::sync::Arc::clone(&core), http_addr, bootstrap::shutdown_signal()));
    let grpc = tokio::spawn(bootstrap::run_grpc(core, grpc_addr, bootstrap::shutdown_signal()));

    let (http_result, _) = tokio::join!(http, grpc);
    http_result??;
    Ok(())
}

async fn run_index(config: Config, args: IndexArgs) -> anyhow::Result<()> {
    use sage_storage::{HashingEmbedder, InMemoryVectorIndex, VectorIndex};
    use std::sync::Arc;

    let raw = std::fs::read_to_string(&args.input)?;
    let mut items: Vec<ingest::IngestItem> = serde_json::from_str(&raw)?;
    for item in &mut items {
        item.class_num = args.class_num;
    }

    let embedder = Arc::new(HashingEmbedder::default());
    let index: Arc<dyn VectorIndex> =
        Arc::new(InMemoryVectorIndex::open(embedder, config.paths.vector_store_dir.clone())?);

    let outcomes = ingest::batch_index_questions(&index, items, args.paraphrase).await;
    let failed = outcomes.iter().filter(|o| !o.success).count();
    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    if failed > 0 {
        tracing::warn!(failed, total = outcomes.len(), "some ingestion items failed");
    }
    Ok(())
}
