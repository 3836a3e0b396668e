//! Query orchestrator: routes each question and always produces one answer.
//!
//! Collaborator failures never escape. Catalog and retriever errors are
//! logged and treated as "nothing found"; generator errors degrade to a
//! local excerpt of the best passage.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tariffbot_core::config::{GeneratorConfig, TariffConfig};
use tariffbot_core::duty::{self, TariffInput};
use tariffbot_core::error::TariffError;
use tariffbot_core::types::{Answer, CandidateRecord};

use crate::generator::OpenAiGenerator;
use crate::guard::GuardedGenerator;
use crate::response::{ResponseComposer, NO_INFORMATION};
use crate::router::{self, Route};
use crate::sources::{PassageRetriever, TariffLookup};

/// How informational questions are answered. Fixed at construction.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Passages go to the language model; failures fall back to an excerpt.
    LlmBacked(GuardedGenerator),
    /// No credential or generation disabled: always answer from excerpts.
    FallbackOnly,
}

impl Mode {
    /// Choose the mode from configuration and the credential read at startup.
    pub fn from_config(config: &GeneratorConfig, api_key: Option<String>) -> Self {
        if !config.enabled {
            info!("Generator disabled in configuration; running fallback-only");
            return Mode::FallbackOnly;
        }
        let Some(key) = api_key else {
            info!(env = %config.api_key_env, "No API credential found; running fallback-only");
            return Mode::FallbackOnly;
        };
        match OpenAiGenerator::new(config, key) {
            Ok(generator) => {
                info!(model = %config.model, "Generator enabled");
                Mode::LlmBacked(GuardedGenerator::new(Arc::new(generator), config))
            }
            Err(e) => {
                warn!(error = %e, "Failed to initialise generator; running fallback-only");
                Mode::FallbackOnly
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::LlmBacked(_) => "llm_backed",
            Mode::FallbackOnly => "fallback_only",
        }
    }
}

/// Read the API credential from the environment. Blank counts as absent.
pub fn read_api_key(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Central coordinator for one question at a time. Shared via `Arc`.
pub struct QueryOrchestrator {
    catalog: Arc<dyn TariffLookup>,
    retriever: Arc<dyn PassageRetriever>,
    mode: Mode,
    composer: ResponseComposer,
    search_limit: usize,
    top_k: usize,
    min_answer_chars: usize,
}

impl QueryOrchestrator {
    pub fn new(
        catalog: Arc<dyn TariffLookup>,
        retriever: Arc<dyn PassageRetriever>,
        mode: Mode,
        config: &TariffConfig,
    ) -> Self {
        Self {
            catalog,
            retriever,
            mode,
            composer: ResponseComposer::default(),
            search_limit: config.database.search_limit,
            top_k: config.retrieval.top_k,
            min_answer_chars: config.generator.min_answer_chars,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn passage_count(&self) -> usize {
        self.retriever.passage_count()
    }

    /// Answer a free-text question.
    pub async fn answer(&self, query: &str) -> Answer {
        self.answer_with(query, None).await
    }

    /// Answer a question, with optional structured calculation input.
    pub async fn answer_with(&self, query: &str, calculation: Option<TariffInput>) -> Answer {
        let route = router::classify(query, calculation);
        info!(route = route.name(), mode = self.mode.name(), "Query routed");

        let structured = match &route {
            Route::Calculation(input) => self.calculate(input),
            Route::CodeLookup(codes) => self.lookup(self.catalog.find_by_codes(codes, self.search_limit)),
            Route::KeywordLookup(keywords) => {
                self.lookup(self.catalog.find_by_keywords(keywords, self.search_limit))
            }
            Route::Informational => None,
        };
        if let Some(answer) = structured {
            return answer;
        }

        self.informational(query).await
    }

    fn lookup(&self, found: Result<Vec<CandidateRecord>, TariffError>) -> Option<Answer> {
        match found {
            Ok(records) if !records.is_empty() => {
                debug!(records = records.len(), "Catalog lookup matched");
                Some(Answer::database(self.composer.compose_records(&records)))
            }
            Ok(_) => {
                debug!("Catalog lookup found nothing; trying reference document");
                None
            }
            Err(e) => {
                warn!(error = %e, "Catalog lookup failed; trying reference document");
                None
            }
        }
    }

    fn calculate(&self, input: &TariffInput) -> Option<Answer> {
        let record = match self.catalog.find_by_code(&input.hts_code) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(code = %input.hts_code, "Code not in catalog; trying reference document");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Catalog lookup failed; trying reference document");
                return None;
            }
        };

        let text = match duty::calculate(&record, input) {
            Ok(breakdown) => self.composer.compose_breakdown(&breakdown),
            Err(TariffError::Calculation(reason)) => {
                self.composer.compose_uncomputable(&record, &reason)
            }
            Err(e) => self.composer.compose_uncomputable(&record, &e.to_string()),
        };
        Some(Answer::database(text))
    }

    async fn informational(&self, query: &str) -> Answer {
        let passages = match self.retriever.retrieve(query, self.top_k).await {
            Ok(passages) => passages,
            Err(e) => {
                warn!(error = %e, "Passage retrieval failed");
                Vec::new()
            }
        };

        let Some(top) = passages.first() else {
            return Answer::fallback(NO_INFORMATION);
        };

        match &self.mode {
            Mode::LlmBacked(generator) => match generator.generate(query, &passages).await {
                Ok(text) if text.trim().chars().count() >= self.min_answer_chars.max(1) => {
                    return Answer::generated(text.trim());
                }
                Ok(text) => {
                    warn!(chars = text.trim().chars().count(), "Generated answer too short; using excerpt");
                }
                Err(e) => {
                    warn!(error = %e, "Generator unavailable; using excerpt");
                }
            },
            Mode::FallbackOnly => {
                debug!("Fallback-only mode; using excerpt");
            }
        }

        Answer::fallback(self.composer.compose_excerpt(top, query))
    }
}

impl std::fmt::Debug for QueryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOrchestrator")
            .field("mode", &self.mode.name())
            .field("search_limit", &self.search_limit)
            .field("top_k", &self.top_k)
            .finish()
    }
}
