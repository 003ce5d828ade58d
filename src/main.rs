use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use codescope_core::config::{Config, resolve_config_path};
use codescope_index::{
    CodeIndex, CodeIndexer, CodeParser, CodeRetriever, Embedder, GrammarRegistry, Lang, TargetType,
    chunk_display_header,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "codescope", version, about = "Index a codebase and retrieve related code")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the index persistence prefix.
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse, chunk and embed every supported file under DIR, then save the index.
    Index { dir: PathBuf },
    /// Rank indexed chunks against a free-text query.
    Search {
        query: String,
        #[arg(short, long, default_value_t = 5)]
        k: usize,
        /// Restrict results to one language.
        #[arg(long)]
        language: Option<Lang>,
    },
    /// Print the documentation context assembled for a source file.
    Context {
        file: PathBuf,
        #[arg(long, default_value = "function")]
        kind: TargetType,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let prefix = cli.index.clone().unwrap_or_else(|| config.index_prefix());

    match cli.command {
        Command::Index { dir } => run_index(&config, &dir, &prefix).await,
        Command::Search { query, k, language } => {
            run_search(&config, &prefix, &query, k, language).await
        }
        Command::Context { file, kind } => run_context(&config, &prefix, &file, kind).await,
    }
}

/// Model loading downloads and mmaps weights, so it runs on the blocking pool.
async fn load_embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || config.embedder())
        .await
        .context("embedder load task failed")?
}

async fn run_index(config: &Config, dir: &Path, prefix: &Path) -> anyhow::Result<()> {
    let index = Arc::new(CodeIndex::new(load_embedder(config).await?));
    let parser = CodeParser::new(GrammarRegistry::new(), config.parser_config());

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        signal_token.cancel();
    });

    let indexer = CodeIndexer::new(parser, Arc::clone(&index), config.indexer_config())
        .with_cancellation(cancel);
    let report = indexer
        .index_project(dir)
        .await
        .with_context(|| format!("failed to index {}", dir.display()))?;
    let artifacts = index.save(prefix).await.context("failed to save index")?;

    println!(
        "indexed {} of {} files ({} skipped, {} with syntax errors)",
        report.files_parsed,
        report.files_scanned,
        report.files_skipped,
        report.files_with_syntax_errors
    );
    println!(
        "{} functions, {} classes, {} chunks in {}ms",
        report.functions, report.classes, report.chunks_created, report.duration_ms
    );
    let languages: Vec<&str> = report.languages.iter().map(|l| l.id()).collect();
    println!("languages: {}", languages.join(", "));
    for lang in &report.unsupported {
        println!("unsupported: {lang}");
    }
    for err in &report.errors {
        println!("skipped: {err}");
    }
    println!("saved {}", artifacts.vectors.display());
    Ok(())
}

async fn open_index(
    config: &Config,
    prefix: &Path,
) -> anyhow::Result<Arc<CodeIndex<dyn Embedder>>> {
    let index = Arc::new(CodeIndex::new(load_embedder(config).await?));
    let report = index
        .load(prefix)
        .await
        .with_context(|| format!("failed to load index from {}", prefix.display()))?;
    if let Some(warning) = &report.warning {
        eprintln!("warning: {warning}");
    }
    Ok(index)
}

async fn run_search(
    config: &Config,
    prefix: &Path,
    query: &str,
    k: usize,
    language: Option<Lang>,
) -> anyhow::Result<()> {
    let index = open_index(config, prefix).await?;
    let retriever = CodeRetriever::new(index, config.retrieval_config());
    let results = match language {
        Some(lang) => retriever.search_filtered(query, k, lang)?,
        None => retriever.search(query, k)?,
    };

    if results.is_empty() {
        println!("no results");
    }
    for result in &results {
        println!(
            "{}. [{:.3}] {}",
            result.rank,
            result.score,
            chunk_display_header(&result.chunk)
        );
    }
    Ok(())
}

async fn run_context(
    config: &Config,
    prefix: &Path,
    file: &Path,
    kind: TargetType,
) -> anyhow::Result<()> {
    let code = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let index = open_index(config, prefix).await?;
    let retriever = CodeRetriever::new(index, config.retrieval_config());
    let context = retriever.context_for_documentation(&code, kind)?;
    if context.is_empty() {
        println!("no related code above the relevance threshold");
    } else {
        println!("{context}");
    }
    Ok(())
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
