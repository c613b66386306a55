//! Litreview entrypoint.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use mimalloc::MiMalloc;
use tempfile::NamedTempFile;
use tokio::signal;
use tokio::sync::watch;

use litreview::catalog::{FactCatalog, SampleStrategy};
use litreview::checkpoint::CheckpointStore;
use litreview::config::ReviewConfig;
use litreview::embedding::{OllamaEmbedder, Reranker, RerankerConfig};
use litreview::judge::{GenaiBackend, Judge, JudgeConfig};
use litreview::retrieval::{EvidenceRetriever, RetrievalConfig};
use litreview::retry::RetryPolicy;
use litreview::review::{ReviewOptions, ReviewOrchestrator, RunReport};
use litreview::sink::ResultSink;
use litreview::store::QdrantDocumentStore;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const USAGE: &str = "\
Usage: litreview [--test] [--rerun=ID[,ID...]]

  --test            review a stratified sample of LITREVIEW_TEST_SAMPLE_SIZE facts
  --rerun=IDS       forget the stored assessments of IDS before the run

Configuration is read from LITREVIEW_* environment variables; logging from RUST_LOG.";

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    test: bool,
    rerun: Vec<u32>,
    help: bool,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Self::default();
        for arg in args {
            if arg == "--test" {
                parsed.test = true;
            } else if arg == "--help" || arg == "-h" {
                parsed.help = true;
            } else if let Some(ids) = arg.strip_prefix("--rerun=") {
                for id in ids.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    let id = id
                        .parse::<u32>()
                        .with_context(|| format!("invalid fact id in --rerun: '{id}'"))?;
                    parsed.rerun.push(id);
                }
            } else {
                bail!("unknown argument '{arg}'\n\n{USAGE}");
            }
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ReviewConfig::from_env()?;
    config.validate()?;

    tracing::info!(
        csv_dir = %config.csv_dir.display(),
        data_dir = %config.data_dir.display(),
        model = %config.llm_model,
        test = args.test,
        "Litreview starting"
    );

    let catalog = FactCatalog::load(&config.csv_dir)?;
    let facts = if args.test {
        let sample = catalog.sample(config.test_sample_size, SampleStrategy::StratifiedBySection);
        tracing::info!(facts = sample.len(), "TEST MODE: reviewing a stratified sample");
        sample
    } else {
        catalog.facts().to_vec()
    };

    let mut checkpoint = CheckpointStore::open(config.checkpoint_dir())?
        .with_snapshot_interval(config.snapshot_interval);
    for &fact_id in &args.rerun {
        if !catalog.contains(fact_id) {
            bail!("--rerun: fact {fact_id} is not in the catalog");
        }
        checkpoint.reset(fact_id)?;
    }

    let store =
        QdrantDocumentStore::connect(&config.qdrant_url, &config.collection, config.store_timeout)
            .await?;
    let embedder = OllamaEmbedder::new(
        &config.ollama_url,
        config.embedding_model.clone(),
        config.embedding_dim,
        config.store_timeout,
    )?;

    if config.reranker_path.is_none() && config.use_rerank {
        tracing::warn!("No LITREVIEW_RERANKER_PATH configured, reranking with lexical overlap");
    }
    let reranker = Reranker::load(RerankerConfig::from_path(config.reranker_path.clone()))?;

    let retriever = EvidenceRetriever::new(
        store,
        embedder,
        reranker,
        RetrievalConfig {
            semantic_weight: config.semantic_weight,
            lexical_weight: config.lexical_weight,
            rerank_candidates: config.rerank_candidates,
            call_timeout: config.store_timeout,
            retry: RetryPolicy {
                max_attempts: config.retrieval_attempts,
                ..RetryPolicy::default()
            },
        },
    );

    let backend = GenaiBackend::new(
        &config.ollama_url,
        config.llm_model.clone(),
        config.temperature,
        config.top_p,
        config.model_timeout,
    );
    let judge = Judge::new(
        Arc::new(backend),
        JudgeConfig {
            max_context_chars: config.max_context_chars,
            max_passage_chars: config.max_passage_chars,
            schema_retries: config.schema_retries,
        },
    );

    let sink = ResultSink::standard(config.assessments_dir(), &config.csv_dir);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let mut orchestrator = ReviewOrchestrator::new(
        retriever,
        judge,
        catalog,
        checkpoint,
        sink,
        ReviewOptions::from_config(&config),
    )
    .with_stop_signal(stop_rx);

    let report = orchestrator.run(&facts).await?;
    drop(orchestrator);

    let report_path = config.run_report_path();
    write_report(&report_path, &report)
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    tracing::info!(
        path = %report_path.display(),
        exit_code = report.exit_code(),
        "Run report written"
    );

    std::process::exit(report.exit_code());
}

fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, report)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping after the current step");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping after the current step");
        }
    }
}
