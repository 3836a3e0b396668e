//! TariffBot binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the tariff catalog (SQLite)
//! 4. Either import a catalog export, or build the retriever and
//!    orchestrator and answer one question / serve the HTTP API

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tariffbot_api::auth::load_or_generate_token;
use tariffbot_api::state::AppState;
use tariffbot_chat::{read_api_key, Mode, QueryOrchestrator};
use tariffbot_core::config::{expand_home, TariffConfig};
use tariffbot_core::error::TariffError;
use tariffbot_storage::{import_file, Database, ImportSummary, TariffCatalog};
use tariffbot_vector::{
    DocumentRetriever, DynEmbeddingService, HashingEmbedding, OpenAiEmbedding, TextChunker,
};

mod cli;

use cli::{CliArgs, Command};

/// Output width of the remote embedding model.
const REMOTE_EMBEDDING_DIM: usize = 1536;

/// Filter priority: RUST_LOG > --log-level > config `general.log_level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn catalog_path(config: &TariffConfig) -> PathBuf {
    config.general.data_path().join(&config.database.file_name)
}

/// Open the on-disk catalog for answering queries, falling back to an empty
/// in-memory one so the informational path keeps working.
fn open_catalog(config: &TariffConfig) -> Result<Arc<TariffCatalog>, TariffError> {
    let db_path = catalog_path(config);
    let db = match Database::new(&db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(
                path = %db_path.display(),
                error = %e,
                "Failed to open catalog database; continuing with an empty in-memory catalog"
            );
            Database::in_memory()?
        }
    };
    Ok(Arc::new(TariffCatalog::new(Arc::new(db))))
}

/// Load an export into the on-disk catalog. Returns the summary and the
/// resulting record count. An unopenable catalog is an error.
fn import_catalog(config: &TariffConfig, file: &Path) -> Result<(ImportSummary, u64), TariffError> {
    let catalog = TariffCatalog::new(Arc::new(Database::new(&catalog_path(config))?));
    let summary = import_file(&catalog, file)?;
    Ok((summary, catalog.count()?))
}

fn document_path(config: &TariffConfig) -> PathBuf {
    let configured = expand_home(&config.retrieval.document_path);
    if configured.is_absolute() {
        configured
    } else {
        config.general.data_path().join(configured)
    }
}

/// Index the reference document.
///
/// The remote embedder is only used in LLM-backed mode, with a local hashing
/// index alongside for queries it cannot embed. If remote indexing fails the
/// document is indexed locally only, and a missing or unreadable document
/// yields an empty retriever.
async fn build_retriever(
    config: &TariffConfig,
    mode: &Mode,
    api_key: Option<&str>,
) -> Result<DocumentRetriever, TariffError> {
    let retrieval = &config.retrieval;
    let path = document_path(config);
    let hashing: Arc<dyn DynEmbeddingService> =
        Arc::new(HashingEmbedding::new(retrieval.embedding_dim));
    let chunker = || TextChunker::new(retrieval.chunk_size, retrieval.chunk_overlap);

    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "Reference document not found; informational questions will have no passages"
        );
        return Ok(DocumentRetriever::empty(hashing));
    }

    if let (Mode::LlmBacked(_), Some(key)) = (mode, api_key) {
        let remote = OpenAiEmbedding::new(
            &config.generator.base_url,
            key.to_string(),
            &retrieval.embedding_model,
            REMOTE_EMBEDDING_DIM,
            Duration::from_secs(config.generator.timeout_secs),
        )?;
        match DocumentRetriever::from_file(&path, chunker()?, Arc::new(remote)).await {
            Ok(retriever) => return retriever.with_local_fallback(hashing).await,
            Err(e) => tracing::warn!(
                error = %e,
                "Remote embedding failed; indexing with the local embedder"
            ),
        }
    }

    match DocumentRetriever::from_file(&path, chunker()?, Arc::clone(&hashing)).await {
        Ok(retriever) => Ok(retriever),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to index reference document");
            Ok(DocumentRetriever::empty(hashing))
        }
    }
}

async fn build_orchestrator(
    config: &TariffConfig,
    catalog: Arc<TariffCatalog>,
) -> Result<QueryOrchestrator, TariffError> {
    let api_key = read_api_key(&config.generator.api_key_env);
    let mode = Mode::from_config(&config.generator, api_key.clone());
    let retriever = build_retriever(config, &mode, api_key.as_deref()).await?;
    tracing::info!(
        mode = mode.name(),
        passages = retriever.passage_count(),
        "Query orchestrator ready"
    );
    Ok(QueryOrchestrator::new(
        catalog,
        Arc::new(retriever),
        mode,
        config,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = TariffConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(ref level) = args.log_level {
        config.general.log_level = level.clone();
    }

    init_tracing(&config.general.log_level);
    tracing::info!("Starting TariffBot v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    match args.command {
        Command::Import { file } => {
            let (summary, total) = import_catalog(&config, &file)?;
            println!(
                "Imported {} records ({} captions skipped, {} invalid codes). Catalog now holds {} records.",
                summary.imported, summary.skipped, summary.invalid, total
            );
        }
        Command::Ask { question } => {
            let orchestrator = build_orchestrator(&config, open_catalog(&config)?).await?;
            let answer = orchestrator.answer(&question.join(" ")).await;
            println!("{}\n\n[source: {}]", answer.text, answer.provenance);
        }
        Command::Serve { port } => {
            config.general.port = cli::resolve_port(port, config.general.port);
            let catalog = open_catalog(&config)?;
            if catalog.count()? == 0 {
                tracing::warn!("Catalog is empty; load it with `tariffbot import <file>`");
            }

            let orchestrator = build_orchestrator(&config, Arc::clone(&catalog)).await?;
            let token_path = config.general.data_path().join(&config.api.token_file);
            let api_token = load_or_generate_token(&token_path)?;

            let state = AppState::new(config.clone(), Arc::new(orchestrator), catalog, api_token);
            tariffbot_api::start_server(&config, state).await?;
        }
    }

    Ok(())
}
