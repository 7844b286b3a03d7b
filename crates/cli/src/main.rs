//! Ops Assist command-line entry point
//!
//! Loads a corpus, builds an index snapshot and answers one query with
//! groundedness gating.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use ops_assist_config::{init_tracing, load_settings, Settings, VectorBackend};
use ops_assist_core::{
    AnswerGenerator, Context, FilterKind, GroundednessJudge, Message, SearchFilters, VectorSearch,
};
use ops_assist_llm::{LlmAnswerGenerator, LlmBackend, LlmConfig, LlmGroundednessJudge, OllamaBackend};
use ops_assist_rag::{
    load_corpus, Embedder, GroundingPipeline, HashingEmbedder, HeuristicJudge, IndexSnapshot,
    QdrantVectorStore, SnapshotHandle,
};

#[derive(Parser, Debug)]
#[command(name = "ops-assist", version, about = "Grounded answers from an operations knowledge base")]
struct Args {
    /// Corpus file or directory (YAML/JSON)
    #[arg(long)]
    corpus: PathBuf,

    #[arg(long)]
    platform: Option<String>,

    #[arg(long)]
    environment: Option<String>,

    #[arg(long = "doc-type")]
    doc_type: Option<String>,

    /// Filter kinds that must also match exactly (platform, environment, doc_type)
    #[arg(long, value_delimiter = ',')]
    require: Vec<String>,

    /// Regeneration retries (defaults to grading.max_retries)
    #[arg(long = "max-retries")]
    max_retries: Option<usize>,

    /// Earlier user turns of the conversation, oldest first
    #[arg(long = "previous")]
    previous: Vec<String>,

    /// Print the ranked passages instead of answering
    #[arg(long = "retrieve-only")]
    retrieve_only: bool,

    /// Passages to return with --retrieve-only (defaults to retrieval.top_k)
    #[arg(long = "top-k")]
    top_k: Option<usize>,

    /// Answer without an LLM: extractive answers, heuristic judge
    #[arg(long)]
    offline: bool,

    /// Configuration environment layered over config/default
    #[arg(long = "config-env", env = "OPS_ASSIST_ENV")]
    config_env: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// The question
    #[arg(required = true)]
    query: Vec<String>,
}

/// Quotes the top-ranked context passage
struct ExtractiveGenerator;

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn generate(
        &self,
        _query: &str,
        context: &Context,
        _history: &[Message],
    ) -> ops_assist_core::Result<String> {
        Ok(context
            .passages()
            .first()
            .map(|p| p.passage.content.trim().to_string())
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = match load_settings(args.config_env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };
    init_tracing(&settings.observability);

    let passages = load_corpus(&args.corpus)
        .with_context(|| format!("loading corpus from {}", args.corpus.display()))?;
    tracing::info!(passages = passages.len(), "Corpus loaded");

    let embedder = Arc::new(HashingEmbedder::new(settings.retrieval.embedding_dim));
    let snapshot = build_snapshot(passages, embedder.as_ref(), &settings).await?;
    let snapshots = Arc::new(SnapshotHandle::with_snapshot(snapshot));

    let (generator, judge) = collaborators(&settings, args.offline).await?;
    let pipeline = GroundingPipeline::new(&settings, snapshots, embedder, generator, judge);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let query = args.query.join(" ");
    let filters = filters_from_args(&args)?;

    if args.retrieve_only {
        let outcome = pipeline
            .retrieve(&query, &filters, args.top_k)
            .await
            .context("retrieving passages")?;
        if args.json {
            let ranked: Vec<serde_json::Value> = outcome
                .passages
                .iter()
                .map(|scored| serde_json::json!({ "id": scored.id(), "scores": scored.scores }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        } else {
            for scored in &outcome.passages {
                println!("{:.4}  {}", scored.scores.final_score, scored.id());
            }
        }
        return Ok(());
    }

    let answer = if args.previous.is_empty() {
        pipeline
            .answer_with_grounding(&query, &filters, args.max_retries, &cancel)
            .await
    } else {
        let history: Vec<Message> = args.previous.iter().map(Message::user).collect();
        pipeline
            .answer_with_history(&query, &filters, &history, args.max_retries, &cancel)
            .await
    }
    .context("answering query")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}", answer.answer);
        println!();
        println!(
            "grade: {} (confidence {:.2}{}) | attempts: {} | query type: {}",
            answer.grade.grade,
            answer.grade.confidence,
            if answer.grade.fail_open { ", failed open" } else { "" },
            answer.attempts,
            answer.query_type,
        );
        if answer.exhausted || answer.degraded {
            println!("note: this answer may be ungrounded or based on relaxed filters");
        }
        println!("sources: {}", answer.context_ids.join(", "));
    }

    Ok(())
}

async fn build_snapshot(
    passages: Vec<ops_assist_core::Passage>,
    embedder: &HashingEmbedder,
    settings: &Settings,
) -> anyhow::Result<IndexSnapshot> {
    match settings.vector_store.backend {
        VectorBackend::Memory => Ok(IndexSnapshot::build(passages, embedder, settings)?),
        VectorBackend::Qdrant => {
            let store = QdrantVectorStore::new(&settings.vector_store)?;
            store.ensure_collection(embedder.dim()).await?;

            let texts: Vec<&str> = passages.iter().map(|p| p.content.as_str()).collect();
            let embeddings = embedder.embed_batch(&texts)?;
            let entries: Vec<(String, Vec<f32>)> = passages
                .iter()
                .map(|p| p.id.clone())
                .zip(embeddings)
                .collect();
            store.upsert(&entries).await?;
            tracing::info!(
                collection = %settings.vector_store.collection,
                points = entries.len(),
                "Qdrant collection populated"
            );

            let vector: Arc<dyn VectorSearch> = Arc::new(store);
            Ok(IndexSnapshot::with_vector_search(passages, vector, settings)?)
        },
    }
}

async fn collaborators(
    settings: &Settings,
    offline: bool,
) -> anyhow::Result<(Arc<dyn AnswerGenerator>, Arc<dyn GroundednessJudge>)> {
    if offline {
        return Ok((
            Arc::new(ExtractiveGenerator),
            Arc::new(HeuristicJudge::new(&settings.grading)),
        ));
    }

    let config = LlmConfig::from(&settings.llm);
    let judge_config = match &settings.llm.judge_model {
        Some(model) => config.clone().with_model(model.clone()),
        None => config.clone(),
    };

    let generator_backend: Arc<dyn LlmBackend> = Arc::new(OllamaBackend::new(config)?);
    let judge_backend: Arc<dyn LlmBackend> = Arc::new(OllamaBackend::new(judge_config)?);
    tracing::info!(
        model = generator_backend.model_name(),
        judge = judge_backend.model_name(),
        "Using Ollama collaborators"
    );
    if !generator_backend.is_available().await {
        tracing::warn!(
            endpoint = %settings.llm.endpoint,
            "LLM endpoint not reachable, answers will fall back"
        );
    }

    Ok((
        Arc::new(LlmAnswerGenerator::new(generator_backend)),
        Arc::new(LlmGroundednessJudge::new(judge_backend)),
    ))
}

fn filters_from_args(args: &Args) -> anyhow::Result<SearchFilters> {
    let mut required = Vec::new();
    for name in &args.require {
        let kind = FilterKind::parse(name)
            .with_context(|| format!("unknown filter kind in --require: {}", name))?;
        required.push(kind);
    }

    let mut filters = SearchFilters::new();
    let given = [
        (FilterKind::Platform, &args.platform),
        (FilterKind::Environment, &args.environment),
        (FilterKind::DocType, &args.doc_type),
    ];
    for (kind, value) in given {
        if let Some(value) = value {
            filters = filters.with(kind, value.clone(), required.contains(&kind));
        }
    }
    Ok(filters)
}
