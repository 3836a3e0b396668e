//! Collaborator seams used by the orchestrator.
//!
//! Production wires `TariffCatalog` and `DocumentRetriever` in; tests
//! substitute scripted implementations.

use async_trait::async_trait;

use tariffbot_core::error::TariffError;
use tariffbot_core::types::{CandidateRecord, HtsCode, RetrievedPassage};
use tariffbot_storage::keywords::Keyword;
use tariffbot_storage::TariffCatalog;
use tariffbot_vector::DocumentRetriever;

/// Structured access to the tariff catalog.
pub trait TariffLookup: Send + Sync {
    /// Records for the given code tokens, exact hits first. No match is `Ok(vec![])`.
    fn find_by_codes(&self, codes: &[HtsCode], limit: usize) -> Result<Vec<CandidateRecord>, TariffError>;

    /// Records whose descriptions match the keywords, most specific first.
    fn find_by_keywords(&self, keywords: &[Keyword], limit: usize) -> Result<Vec<CandidateRecord>, TariffError>;

    fn find_by_code(&self, code: &HtsCode) -> Result<Option<CandidateRecord>, TariffError>;
}

impl TariffLookup for TariffCatalog {
    fn find_by_codes(&self, codes: &[HtsCode], limit: usize) -> Result<Vec<CandidateRecord>, TariffError> {
        TariffCatalog::find_by_codes(self, codes, limit)
    }

    fn find_by_keywords(&self, keywords: &[Keyword], limit: usize) -> Result<Vec<CandidateRecord>, TariffError> {
        TariffCatalog::find_by_keywords(self, keywords, limit)
    }

    fn find_by_code(&self, code: &HtsCode) -> Result<Option<CandidateRecord>, TariffError> {
        TariffCatalog::find_by_code(self, code)
    }
}

/// Ranked passages from the reference document.
#[async_trait]
pub trait PassageRetriever: Send + Sync {
    async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>, TariffError>;

    fn passage_count(&self) -> usize;
}

#[async_trait]
impl PassageRetriever for DocumentRetriever {
    async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>, TariffError> {
        DocumentRetriever::retrieve(self, text, k).await
    }

    fn passage_count(&self) -> usize {
        DocumentRetriever::passage_count(self)
    }
}
