use async_trait::async_trait;
use paperwatch_core::Paper;
use tracing::warn;

use crate::error::Result;

pub mod arxiv;
pub mod openalex;
pub mod semantic_scholar;

pub use arxiv::ArxivSource;
pub use openalex::{CitationInfo, OpenAlexSource};
pub use semantic_scholar::SemanticScholarSource;

/// One keyword query against a provider.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub term: String,
    pub limit: u32,
    pub min_citations: u32,
    pub year_from: Option<i32>,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>, limit: u32) -> Self {
        Self {
            term: term.into(),
            limit,
            ..Default::default()
        }
    }

    pub fn min_citations(mut self, n: u32) -> Self {
        self.min_citations = n;
        self
    }

    pub fn year_from(mut self, year: Option<i32>) -> Self {
        self.year_from = year;
        self
    }
}

/// A provider that turns a keyword query into normalized [`Paper`] records.
#[async_trait]
pub trait PaperSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>>;
}

/// Collapses a failed provider call into an empty result, logging why.
pub fn or_empty(source: &str, result: Result<Vec<Paper>>) -> Vec<Paper> {
    match result {
        Ok(papers) => papers,
        Err(e) => {
            warn!(source, kind = %e.kind(), "source failed, continuing without it: {e}");
            Vec::new()
        }
    }
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(base_url)
        .map_err(|e| crate::error::ScienceError::Parse(format!("invalid URL {base_url}: {e}")))
}
