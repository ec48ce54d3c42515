use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;

use carerag_core::catalog::{category_counts, save_catalog, CatalogBuilder};
use carerag_core::config::{Config, Settings};
use carerag_core::data_processor::DataProcessor;
use carerag_core::logging;
use carerag_core::traits::Backend;
use carerag_embed::load_embedder;
use carerag_service::{format_hits, KnowledgeService, QueryRequest, QueryResponse, NOTHING_FOUND};
use carerag_vector::IndexBuilder;

#[derive(Parser)]
#[command(name = "carerag")]
#[command(version)]
#[command(about = "Retrieval over the customer-care knowledge base", long_about = None)]
struct Cli {
    /// Directory containing config.toml and config.<env>.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the flat index and metadata from the knowledge base
    Index {
        /// Knowledge-base root (defaults to knowledge_base.root)
        root: Option<PathBuf>,
        /// Index at most this many source files
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        no_progress: bool,
    },
    /// Answer one question from the persisted index
    Query {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Write the document catalog (category, language, review date per file)
    Catalog {
        root: Option<PathBuf>,
        /// Output file (defaults to index.catalog_file in the artifact directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Read one {"query","k"} JSON request per stdin line, answer one JSON line each
    Serve,
    /// Interactive assistant over an in-memory index of the knowledge base
    Chat {
        #[arg(short, long)]
        k: Option<usize>,
    },
}

/// With `--config-dir`, relative paths in the config are taken from that directory.
fn load_settings(config_dir: Option<&PathBuf>) -> Result<Settings> {
    match config_dir {
        Some(dir) => {
            let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
            let settings = Config::load_from(dir, &env_name)?.settings()?;
            Ok(settings.relative_to(dir))
        }
        None => Ok(Config::load()?.settings()?),
    }
}

fn index_command(mut settings: Settings, root: Option<PathBuf>, limit: Option<usize>, no_progress: bool) -> Result<()> {
    if let Some(root) = root {
        settings.knowledge_base.root = root.to_string_lossy().into_owned();
    }
    let root = settings.kb_root();
    let embedder = load_embedder(&settings.embedding).context("loading embedding model")?;
    let builder = IndexBuilder::from_settings(&settings, embedder)?
        .show_progress(settings.index.show_progress && !no_progress)
        .limit(limit);
    let report = builder.build(&root)?;

    println!("✅ Indexed {} chunks from {} files (dim {})", report.chunks, report.files, report.dim);
    println!("   index:    {}", report.index_path.display());
    println!("   metadata: {}", report.metadata_path.display());
    if !report.skipped.is_empty() {
        println!("⚠️  Skipped {} unreadable files:", report.skipped.len());
        for (path, reason) in &report.skipped {
            println!("   {}: {}", path.display(), reason);
        }
    }
    if !report.empty_documents.is_empty() {
        println!("⚠️  {} documents produced no text", report.empty_documents.len());
    }
    Ok(())
}

fn query_command(settings: &Settings, query: String, k: Option<usize>, json: bool) -> Result<()> {
    let service = KnowledgeService::initialize(settings)?;
    let request = QueryRequest::new(query, k.unwrap_or(settings.retriever.top_k));
    let response = service.query(&request);
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    match response {
        QueryResponse::Success { hits, .. } => {
            for (rank, hit) in hits.iter().enumerate() {
                println!("{}. [{:.3}] {}", rank + 1, hit.score, hit.file_path);
                println!("   {}", hit.chunk_text.trim().replace('\n', "\n   "));
            }
        }
        QueryResponse::Failure { error } => println!("{error}"),
    }
    Ok(())
}

fn catalog_command(settings: &Settings, root: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let root = root.unwrap_or_else(|| settings.kb_root());
    let output = output.unwrap_or_else(|| settings.catalog_path());
    let processor = DataProcessor::from_settings(settings);
    let entries = CatalogBuilder::new(&processor, settings.knowledge_base.default_language.clone()).build(&root)?;
    save_catalog(&entries, &output)?;

    println!("Catalogued {} files into {}", entries.len(), output.display());
    for (category, count) in category_counts(&entries) {
        println!("  {category:<20} {count}");
    }
    Ok(())
}

fn serve_command(settings: &Settings) -> Result<()> {
    let service = KnowledgeService::initialize(settings)?;
    info!(docs = service.status().docs, "serving line-delimited JSON on stdin");
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("reading request")?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(stdout, "{}", service.handle_json(&line))?;
        stdout.flush()?;
    }
    Ok(())
}

fn chat_command(mut settings: Settings, k: Option<usize>) -> Result<()> {
    settings.retriever.backend = Backend::Memory;
    let k = k.unwrap_or(settings.retriever.top_k);
    let service = KnowledgeService::initialize(&settings)?;
    println!("Loaded {} knowledge chunks. Ask a question (empty line or Ctrl-D to quit).", service.status().docs);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let question = line.context("reading question")?;
        if question.trim().is_empty() {
            break;
        }
        match service.query(&QueryRequest::new(question, k)) {
            QueryResponse::Success { hits, .. } => println!("{}\n", format_hits(&hits)),
            QueryResponse::Failure { error } if error == NOTHING_FOUND => {
                println!("Sorry, I couldn't find anything about that in the knowledge base.\n")
            }
            QueryResponse::Failure { error } => println!("Error: {error}\n"),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let settings = load_settings(cli.config_dir.as_ref())?;

    match cli.command {
        Commands::Index { root, limit, no_progress } => index_command(settings, root, limit, no_progress),
        Commands::Query { query, k, json } => query_command(&settings, query, k, json),
        Commands::Catalog { root, output } => catalog_command(&settings, root, output),
        Commands::Serve => serve_command(&settings),
        Commands::Chat { k } => chat_command(settings, k),
    }
}
