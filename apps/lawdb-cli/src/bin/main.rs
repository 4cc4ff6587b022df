use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use lawdb_core::config::{Config, Settings};
use lawdb_core::data_processor::{DataProcessor, LawPassage};
use lawdb_hybrid::HybridRetriever;

const USAGE: &str = "Usage: lawdb <ingest|query|stats|clean> [args...]
  ingest [PATH] [--append]                    load a statute file or a directory of .txt files
                                              (skipped when the index already holds passages unless --append)
  query \"<text>\" [--top-k N] [--top-n N] [--json]
  stats [--json]
  clean                                       drop duplicate passages and rebuild the index";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let base = env::current_dir()?;
    let (cmd, args) = parse_args();
    let mut retriever = HybridRetriever::from_settings(&settings, &base)
        .with_context(|| format!("opening index at {}", settings.data.index_dir(&base).display()))?;

    match cmd.as_str() {
        "ingest" => {
            let append = args.iter().any(|a| a == "--append");
            let path = args
                .iter()
                .find(|a| !a.starts_with("--"))
                .map(PathBuf::from)
                .unwrap_or_else(|| settings.data.corpus_path(&base));
            match ingest(&mut retriever, &path, append)? {
                IngestOutcome::Skipped { existing } => {
                    println!("索引已存在，跳过创建 ({existing} passages; pass --append to add more)")
                }
                IngestOutcome::Ingested { passages } => {
                    println!("✅ Ingest complete ({} passages, {} in corpus)", passages, retriever.store().len())
                }
            }
        }
        "query" => query(&retriever, &settings, &args)?,
        "stats" => {
            let stats = retriever.stats();
            if args.iter().any(|a| a == "--json") {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("📚 {} passages, dim {}, embedder {}", stats.count, stats.dim.map_or("-".to_string(), |d| d.to_string()), stats.embedder_id);
                for (law, count) in &stats.laws { println!("  {law}: {count}"); }
            }
        }
        "clean" => {
            let report = retriever.rebuild_deduplicated()?;
            println!("✅ Rebuilt index: {} -> {} passages ({} duplicates removed)", report.before, report.after, report.before - report.after);
        }
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum IngestOutcome {
    Skipped { existing: usize },
    Ingested { passages: usize },
}

/// Build the index from `path`. An index that already holds passages is left
/// alone unless `append` is set.
fn ingest(retriever: &mut HybridRetriever, path: &Path, append: bool) -> anyhow::Result<IngestOutcome> {
    let existing = retriever.store().len();
    if existing > 0 && !append {
        tracing::info!(existing, "index already populated; skipping ingest");
        return Ok(IngestOutcome::Skipped { existing });
    }
    if !path.exists() { bail!("corpus path {} does not exist", path.display()); }
    let processor = DataProcessor::new();
    let files = if path.is_dir() { processor.list_txt_files(path) } else { vec![path.to_path_buf()] };
    println!("Ingesting {} file(s) from {}", files.len(), path.display());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let mut total = 0usize;
    for file in &files {
        let passages = if path.is_dir() { processor.process_source(file)? } else { processor.process_file(file)? };
        pb.set_message(format!("{} ({} passages)", file.display(), passages.len()));
        let (texts, metadatas): (Vec<String>, Vec<_>) =
            passages.into_iter().map(|LawPassage { text, metadata }| (text, metadata)).unzip();
        total += texts.len();
        retriever.add_documents(texts, metadatas)?;
        pb.inc(1);
    }
    pb.finish_with_message("done");
    Ok(IngestOutcome::Ingested { passages: total })
}

fn query(retriever: &HybridRetriever, settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let mut text = None;
    let mut top_k = settings.search.top_k;
    let mut top_n = settings.search.top_n;
    let mut json = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" | "--top-n" => {
                let Some(value) = args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) else {
                    bail!("{} requires a number", args[i]);
                };
                if args[i] == "--top-k" { top_k = value } else { top_n = value }
                i += 1;
            }
            "--json" => json = true,
            other if !other.starts_with('-') => text = Some(other.to_string()),
            other => bail!("Unknown flag: {other}"),
        }
        i += 1;
    }
    let Some(text) = text else { bail!("Usage: lawdb query \"<text>\" [--top-k N] [--top-n N] [--json]") };

    let classification = retriever.classify(&text);
    let results = retriever.search(&text, top_k, top_n)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    println!("🔍 {text} ({:?}: exact {}, semantic {})", classification.class, classification.exact_score, classification.semantic_score);
    if results.is_empty() { println!("No results."); }
    for (rank, r) in results.iter().enumerate() {
        let law = r.metadata.law.as_deref().unwrap_or("-");
        let article = r.metadata.article.as_deref().unwrap_or("");
        println!("{}. [{:.4}] {law}{article} ({:?})", rank + 1, r.score, r.source);
        println!("   {}", r.text);
    }
    Ok(())
}
