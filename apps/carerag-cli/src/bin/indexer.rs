use anyhow::{Context, Result};
use std::{env, path::PathBuf, process};

use carerag_core::config::Config;
use carerag_core::logging;
use carerag_embed::load_embedder;
use carerag_vector::IndexBuilder;

fn usage() -> ! {
    eprintln!("Usage: carerag-indexer [KNOWLEDGE_BASE_DIR] [--limit N] [--no-progress]");
    process::exit(1)
}

fn main() -> Result<()> {
    logging::init();
    let mut settings = Config::load()?.settings()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut limit = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" => {
                i += 1;
                limit = Some(args.get(i).and_then(|n| n.parse::<usize>().ok()).unwrap_or_else(|| usage()));
            }
            "--no-progress" => settings.index.show_progress = false,
            "-h" | "--help" => usage(),
            arg if !arg.starts_with('-') => settings.knowledge_base.root = arg.to_string(),
            _ => usage(),
        }
        i += 1;
    }

    let root: PathBuf = settings.kb_root();
    println!("Knowledge-base indexer\n======================");
    println!("Knowledge base: {}", root.display());
    println!("Model:          {}", settings.embedding.model);
    if let Some(limit) = limit {
        println!("🔢 Limiting to {} files", limit);
    }

    let embedder = load_embedder(&settings.embedding).context("loading embedding model")?;
    let report = IndexBuilder::from_settings(&settings, embedder)?.limit(limit).build(&root)?;

    println!("\n✅ Indexing completed successfully!");
    println!("📊 {} files -> {} chunks (dim {})", report.files, report.chunks, report.dim);
    if !report.skipped.is_empty() {
        println!("⚠️  {} files skipped (see log)", report.skipped.len());
    }
    println!("💾 {}\n💾 {}", report.index_path.display(), report.metadata_path.display());
    println!("\n💡 To search, use: cargo run --bin carerag -- query '<question>'");
    Ok(())
}
