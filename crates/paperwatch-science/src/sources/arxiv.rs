use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paperwatch_core::{Paper, SourcesConfig, TopicConfig};
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;
use crate::identifiers::ArxivId;
use crate::sources::{PaperSource, SearchQuery, parse_base_url};

const BASE_URL: &str = "http://export.arxiv.org/api/query";

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    #[serde(default)]
    name: String,
}

/// Parses an Atom feed. Entries without a usable `/abs/` id are skipped.
pub fn parse_atom_response(xml: &str) -> Result<Vec<Paper>> {
    let feed: AtomFeed =
        from_str(xml).map_err(|e| ScienceError::Parse(format!("invalid atom xml: {e}")))?;

    Ok(feed.entries.into_iter().filter_map(parse_entry).collect())
}

fn parse_entry(entry: AtomEntry) -> Option<Paper> {
    let raw_id = entry.id.trim();
    let arxiv_id = match raw_id.split_once("/abs/").map(|(_, id)| ArxivId::parse(id)) {
        Some(Ok(id)) => id,
        _ => {
            debug!(id = raw_id, "skipping arXiv entry with unusable id");
            return None;
        }
    };

    let published = entry.published.as_deref().and_then(|value| {
        DateTime::parse_from_rfc3339(value.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    });

    Some(Paper {
        arxiv_id: Some(arxiv_id.id),
        title: clean_text(&entry.title),
        authors: entry
            .authors
            .into_iter()
            .map(|author| clean_text(&author.name))
            .filter(|name| !name.is_empty())
            .collect(),
        abstract_text: clean_text(&entry.summary),
        citation_count: 0,
        venue: None,
        published,
        category: None,
    })
}

fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `((ti:"a" OR abs:"a") OR (ti:"b" OR abs:"b")) AND (cat:x OR cat:y)`
pub fn build_search_query(terms: &[&str], categories: &[String]) -> String {
    let terms = terms
        .iter()
        .map(|term| {
            let term = term.replace('"', "");
            format!("(ti:\"{term}\" OR abs:\"{term}\")")
        })
        .collect::<Vec<_>>()
        .join(" OR ");

    if categories.is_empty() {
        return format!("({terms})");
    }
    let cats = categories
        .iter()
        .map(|cat| format!("cat:{cat}"))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({terms}) AND ({cats})")
}

pub struct ArxivSource {
    client: RateLimitedClient,
    base_url: String,
    categories: Vec<String>,
    days_back: Option<u32>,
}

impl ArxivSource {
    pub fn new(topic: &TopicConfig, sources: &SourcesConfig) -> Result<Self> {
        Self::with_base_url(BASE_URL, topic, sources)
    }

    pub fn with_base_url(
        base_url: &str,
        topic: &TopicConfig,
        sources: &SourcesConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(
                "arxiv",
                Duration::from_secs(3),
                sources.request_timeout(),
                &sources.user_agent,
            )?,
            base_url: base_url.to_string(),
            categories: topic.arxiv_categories.clone(),
            days_back: sources.arxiv_days_back,
        })
    }

    /// One query OR-ing every term, newest submissions first.
    pub async fn search_terms(&self, terms: &[&str], max_results: u32) -> Result<Vec<Paper>> {
        let mut url = parse_base_url(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("search_query", &build_search_query(terms, &self.categories))
            .append_pair("start", "0")
            .append_pair("max_results", &max_results.to_string())
            .append_pair("sortBy", "submittedDate")
            .append_pair("sortOrder", "descending");

        let xml = self.client.get(url.as_str()).await?;
        let papers = parse_atom_response(&xml)?;

        Ok(match self.days_back {
            Some(days) => retain_recent(papers, days, Utc::now()),
            None => papers,
        })
    }
}

/// Drops papers published before `now - days`. Undated papers are kept.
fn retain_recent(papers: Vec<Paper>, days: u32, now: DateTime<Utc>) -> Vec<Paper> {
    let cutoff = now - chrono::Duration::days(i64::from(days));
    papers
        .into_iter()
        .filter(|p| p.published.is_none_or(|date| date >= cutoff))
        .collect()
}

#[async_trait]
impl PaperSource for ArxivSource {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>> {
        self.search_terms(&[query.term.as_str()], query.limit).await
    }
}
