use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use paperwatch_core::{Paper, SourcesConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ScienceError};
use crate::http::{BackoffPolicy, RateLimitedClient};
use crate::identifiers::strip_version;
use crate::sources::{PaperSource, SearchQuery, parse_base_url};

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const SEARCH_FIELDS: &str =
    "paperId,title,authors,abstract,year,citationCount,venue,externalIds,url,publicationDate";
const MAX_LIMIT: u32 = 100;
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S2Paper {
    pub paper_id: String,
    pub external_ids: HashMap<String, String>,
    pub title: String,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub publication_date: Option<NaiveDate>,
    pub authors: Vec<String>,
    pub citation_count: u32,
    pub venue: Option<String>,
}

impl S2Paper {
    pub fn from_json(v: &Value) -> Self {
        let text = |key: &str| {
            v.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
        };

        let external_ids = v
            .get("externalIds")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| match v {
                        Value::String(s) => Some((k.clone(), s.clone())),
                        Value::Number(n) => Some((k.clone(), n.to_string())),
                        _ => None,
                    })
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        let authors = v
            .get("authors")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a.get("name").and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(ToOwned::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Self {
            paper_id: text("paperId").unwrap_or_default(),
            external_ids,
            title: text("title").unwrap_or_default(),
            abstract_text: text("abstract"),
            year: v
                .get("year")
                .and_then(Value::as_i64)
                .and_then(|y| i32::try_from(y).ok()),
            publication_date: text("publicationDate")
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            authors,
            citation_count: v
                .get("citationCount")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0),
            venue: text("venue"),
        }
    }

    pub fn arxiv_id(&self) -> Option<String> {
        self.external_ids
            .get("ArXiv")
            .map(|id| strip_version(id))
            .filter(|id| !id.is_empty())
    }

    pub fn into_paper(self) -> Paper {
        let arxiv_id = self.arxiv_id();
        let published = self
            .publication_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt));
        Paper {
            arxiv_id,
            title: self.title,
            authors: self.authors,
            abstract_text: self.abstract_text.unwrap_or_default(),
            citation_count: self.citation_count,
            venue: self.venue,
            published,
            category: None,
        }
    }
}

pub struct SemanticScholarSource {
    client: RateLimitedClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        Self::with_base_url(BASE_URL, config)
    }

    pub fn with_base_url(base_url: &str, config: &SourcesConfig) -> Result<Self> {
        let backoff = BackoffPolicy::exponential(
            config.rate_limit_max_retries,
            config.rate_limit_base_backoff(),
        );
        Ok(Self {
            client: RateLimitedClient::new(
                "semantic_scholar",
                Duration::from_secs(1),
                config.request_timeout(),
                &config.user_agent,
            )?
            .with_backoff(backoff),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.semantic_scholar_api_key(),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self
            .api_key
            .as_deref()
            .and_then(|key| HeaderValue::from_str(key).ok())
        {
            headers.insert(API_KEY_HEADER, value);
        }
        headers
    }

    pub async fn search_papers(&self, query: &SearchQuery) -> Result<Vec<S2Paper>> {
        let mut url = parse_base_url(&format!("{}/paper/search", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("query", &query.term)
            .append_pair("limit", &query.limit.clamp(1, MAX_LIMIT).to_string())
            .append_pair("fields", SEARCH_FIELDS);
        if let Some(year) = query.year_from {
            url.query_pairs_mut().append_pair("year", &format!("{year}-"));
        }

        let body = self.client.get_with_headers(url.as_str(), self.headers()).await?;
        let json: Value =
            serde_json::from_str(&body).map_err(|e| ScienceError::Parse(e.to_string()))?;

        let papers = json
            .get("data")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(S2Paper::from_json).collect::<Vec<_>>())
            .unwrap_or_default();

        let total = papers.len();
        let kept = papers
            .into_iter()
            .filter(|p| p.citation_count >= query.min_citations)
            .collect::<Vec<_>>();
        debug!(
            term = %query.term,
            total,
            kept = kept.len(),
            "semantic scholar results after citation threshold"
        );
        Ok(kept)
    }
}

#[async_trait]
impl PaperSource for SemanticScholarSource {
    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>> {
        let papers = self.search_papers(query).await?;
        Ok(papers.into_iter().map(S2Paper::into_paper).collect())
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    fn test_config() -> SourcesConfig {
        SourcesConfig {
            rate_limit_base_backoff_secs: 0,
            rate_limit_max_retries: 2,
            ..SourcesConfig::default()
        }
    }

    fn search_body() -> String {
        json!({
            "total": 2,
            "data": [
                {
                    "paperId": "abc",
                    "title": "Rectified Flow",
                    "abstract": "Straight paths.",
                    "year": 2022,
                    "citationCount": 800,
                    "venue": "ICLR",
                    "publicationDate": "2022-09-07",
                    "externalIds": {"ArXiv": "2209.03003v1", "CorpusId": 252111177},
                    "authors": [{"authorId": "1", "name": "Xingchao Liu"}]
                },
                {
                    "paperId": "def",
                    "title": "Barely Cited",
                    "citationCount": 3,
                    "externalIds": {}
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn normalizes_paper() {
        let value: Value = serde_json::from_str(&search_body()).unwrap();
        let paper = S2Paper::from_json(&value["data"][0]).into_paper();
        assert_eq!(paper.arxiv_id.as_deref(), Some("2209.03003"));
        assert_eq!(paper.venue.as_deref(), Some("ICLR"));
        assert_eq!(paper.authors, vec!["Xingchao Liu"]);
        assert_eq!(
            paper.published.map(|d| d.format("%Y-%m-%d").to_string()).as_deref(),
            Some("2022-09-07")
        );
    }

    #[tokio::test]
    async fn search_filters_below_threshold() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "rectified flow".into()),
                Matcher::UrlEncoded("limit".into(), "100".into()),
                Matcher::UrlEncoded("year".into(), "2020-".into()),
                Matcher::UrlEncoded("fields".into(), SEARCH_FIELDS.into()),
            ]))
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_body(search_body())
            .create_async()
            .await;

        let source = SemanticScholarSource::with_base_url(&server.url(), &test_config())
            .unwrap()
            .with_api_key(Some("secret".to_string()));
        let query = SearchQuery::new("rectified flow", 250)
            .min_citations(10)
            .year_from(Some(2020));
        let papers = PaperSource::search(&source, &query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Rectified Flow");
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let source = SemanticScholarSource::with_base_url(&server.url(), &test_config())
            .unwrap()
            .with_api_key(None);
        let err = source
            .search_papers(&SearchQuery::new("flow", 10))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ScienceError::RateLimit(_, 2)));
    }
}
