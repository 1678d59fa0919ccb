use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use deepsearch_core::{
    log_run_completion, ConfigLoader, Depth, EngineConfig, MemorySearchIndex, MemoryStorage,
    PlannerAgent, ResearchContext, ResearchOrchestrator, RunLogInput, Source,
};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "deepsearch-cli", version, about = "DeepSearch research engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a research session against a local corpus.
    Run(RunArgs),
    /// Inspect the research plan for a query without running it.
    Plan(PlanArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Query to research.
    #[arg(long)]
    query: String,

    /// Persona applied during synthesis (unknown names fall back to default).
    #[arg(long, default_value = "default")]
    persona: String,

    /// Research depth: quick, comprehensive, or exhaustive.
    #[arg(long, default_value = "comprehensive")]
    depth: String,

    /// Cap on sources returned by the searcher.
    #[arg(long)]
    max_sources: Option<usize>,

    /// Directory (or single file) of text documents to index before running.
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Recurse into subdirectories when indexing the corpus.
    #[arg(long, default_value_t = true)]
    recursive: bool,

    /// Optional engine config file (falls back to built-in defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full response envelope as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Query to plan for.
    #[arg(long)]
    query: String,

    /// Persona used for planning guidance.
    #[arg(long, default_value = "default")]
    persona: String,

    /// Optional explicit research depth.
    #[arg(long)]
    depth: Option<String>,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,deepsearch_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
            Command::Plan(args) => plan_command(args)?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs) -> Result<()> {
    info!(query = %args.query, "starting DeepSearch run");

    let config = match args.config {
        Some(path) => ConfigLoader::load(Some(path))?,
        None => EngineConfig::default(),
    };

    let index = Arc::new(MemorySearchIndex::new());
    if let Some(corpus) = &args.corpus {
        let indexed = index_corpus(&index, corpus, args.recursive)?;
        if indexed == 0 {
            warn!(path = %corpus.display(), "no documents matched indexing criteria");
        } else {
            info!(indexed, "corpus indexed");
        }
    } else {
        warn!("no corpus supplied; the searcher will find nothing to rank");
    }

    let mut ctx = ResearchContext::new()
        .with_persona(&args.persona)
        .with_depth(Depth::parse_or_default(&args.depth))
        .with_search_provider(index)
        .with_storage(Arc::new(MemoryStorage));
    if let Some(max_sources) = args.max_sources {
        ctx = ctx.with_max_sources(max_sources);
    }

    let orchestrator = ResearchOrchestrator::new(config);
    let response = orchestrator.execute_research(&args.query, ctx).await;

    if let Err(err) = log_run_completion(RunLogInput {
        run_id: Uuid::new_v4().to_string(),
        query: response.query.clone(),
        final_state: response
            .metadata
            .workflow_path
            .last()
            .cloned()
            .unwrap_or_default(),
        confidence: response.confidence_score,
        credits_used: response.credits_used,
        workflow_path: response.metadata.workflow_path.clone(),
        processing_time: response.processing_time,
    }) {
        warn!(error = %err, "failed to persist run log");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.synthesized_answer);
        println!();
        println!(
            "confidence {:.2} • {} source(s) • {:.1} credits • path: {}",
            response.confidence_score,
            response.sources_used.len(),
            response.credits_used,
            response.metadata.workflow_path.join(" -> "),
        );
    }

    Ok(())
}

fn plan_command(args: PlanArgs) -> Result<()> {
    let depth = args.depth.as_deref().map(Depth::parse_or_default);
    let plan = PlannerAgent::build_plan(&args.query, &args.persona, depth);
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn index_corpus(index: &MemorySearchIndex, path: &Path, recursive: bool) -> Result<usize> {
    let entries: Box<dyn Iterator<Item = PathBuf>> = if path.is_file() {
        Box::new(std::iter::once(path.to_path_buf()))
    } else {
        let walker = WalkDir::new(path)
            .min_depth(0)
            .max_depth(if recursive { usize::MAX } else { 1 });
        Box::new(
            walker
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path()),
        )
    };

    let mut indexed = 0;
    for file in entries {
        let text = fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        if text.trim().is_empty() {
            continue;
        }
        let title = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().replace(['-', '_'], " "))
            .unwrap_or_else(|| "untitled".to_string());
        index.insert(Source::new(Uuid::new_v4().to_string(), title, text));
        indexed += 1;
    }

    Ok(indexed)
}
