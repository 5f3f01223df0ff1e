use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use paperwatch_core::{Paper, SourcesConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;
use crate::identifiers::{find_arxiv_token, strip_version};
use crate::sources::{PaperSource, SearchQuery, parse_base_url};

const BASE_URL: &str = "https://api.openalex.org";
const MAX_PER_PAGE: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenAlexLocation {
    pub source_type: Option<String>,
    pub pdf_url: Option<String>,
    pub landing_page_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenAlexWork {
    pub id: String,
    pub title: String,
    pub publication_year: Option<i32>,
    pub authors: Vec<String>,
    pub cited_by_count: u32,
    pub venue: Option<String>,
    pub locations: Vec<OpenAlexLocation>,
    pub abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
}

/// Citation count and venue for a single work.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CitationInfo {
    pub citation_count: u32,
    pub venue: Option<String>,
}

impl OpenAlexWork {
    pub fn from_json(v: &Value) -> Self {
        let id = v
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let title = v
            .get("title")
            .or_else(|| v.get("display_name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        let publication_year = v
            .get("publication_year")
            .and_then(Value::as_i64)
            .and_then(|n| i32::try_from(n).ok());

        let authors = v
            .get("authorships")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a.pointer("/author/display_name").and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(ToOwned::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let cited_by_count = v
            .get("cited_by_count")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);

        let locations = v
            .get("locations")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(parse_location).collect::<Vec<_>>())
            .unwrap_or_default();

        let abstract_inverted_index = v
            .get("abstract_inverted_index")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(token, positions)| {
                        let values = positions
                            .as_array()?
                            .iter()
                            .filter_map(Value::as_u64)
                            .filter_map(|n| u32::try_from(n).ok())
                            .collect::<Vec<_>>();
                        if values.is_empty() {
                            None
                        } else {
                            Some((token.clone(), values))
                        }
                    })
                    .collect::<HashMap<_, _>>()
            });

        Self {
            id,
            title,
            publication_year,
            authors,
            cited_by_count,
            venue: primary_venue(v),
            locations,
            abstract_inverted_index,
        }
    }

    /// Orders words by their positions. Gaps in the index are skipped, so
    /// memory stays proportional to the number of positions listed.
    pub fn reconstruct_abstract(&self) -> Option<String> {
        let index = self.abstract_inverted_index.as_ref()?;
        let slots: BTreeMap<u32, &str> = index
            .iter()
            .flat_map(|(word, positions)| positions.iter().map(move |&pos| (pos, word.as_str())))
            .collect();

        let abstract_text = slots
            .into_values()
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if abstract_text.is_empty() {
            None
        } else {
            Some(abstract_text)
        }
    }

    /// arXiv id of the first repository location hosted on arxiv.org.
    pub fn arxiv_id(&self) -> Option<String> {
        self.locations
            .iter()
            .filter(|loc| loc.source_type.as_deref() == Some("repository"))
            .flat_map(|loc| [loc.pdf_url.as_deref(), loc.landing_page_url.as_deref()])
            .flatten()
            .filter(|url| url.contains("arxiv.org"))
            .find_map(find_arxiv_token)
            .map(strip_version)
    }

    pub fn into_paper(self) -> Paper {
        let arxiv_id = self.arxiv_id();
        let abstract_text = self.reconstruct_abstract().unwrap_or_default();
        Paper {
            arxiv_id,
            title: self.title,
            authors: self.authors,
            abstract_text,
            citation_count: self.cited_by_count,
            venue: self.venue,
            published: None,
            category: None,
        }
    }
}

pub struct OpenAlexSource {
    client: RateLimitedClient,
    base_url: String,
    mailto: Option<String>,
    lookup_timeout: Duration,
}

impl OpenAlexSource {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        Self::with_base_url(BASE_URL, config)
    }

    pub fn with_base_url(base_url: &str, config: &SourcesConfig) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(
                "openalex",
                Duration::from_millis(100),
                config.request_timeout(),
                &config.user_agent,
            )?,
            base_url: base_url.trim_end_matches('/').to_string(),
            mailto: config.contact_email.clone(),
            lookup_timeout: config.lookup_timeout(),
        })
    }

    fn search_url(&self, query: &SearchQuery) -> Result<reqwest::Url> {
        let mut filters = vec![format!(
            "title_and_abstract.search:\"{}\"",
            query.term.replace('"', "")
        )];
        if query.min_citations > 0 {
            filters.push(format!("cited_by_count:>{}", query.min_citations - 1));
        }
        if let Some(year) = query.year_from {
            filters.push(format!("publication_year:>{}", year - 1));
        }

        let mut url = parse_base_url(&format!("{}/works", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("filter", &filters.join(","))
            .append_pair("per_page", &query.limit.clamp(1, MAX_PER_PAGE).to_string())
            .append_pair("sort", "cited_by_count:desc");
        if let Some(mailto) = &self.mailto {
            url.query_pairs_mut().append_pair("mailto", mailto);
        }
        Ok(url)
    }

    pub async fn search_works(&self, query: &SearchQuery) -> Result<Vec<OpenAlexWork>> {
        let url = self.search_url(query)?;
        let json: Value = self.client.get_json(url.as_str()).await?;
        let works = json
            .get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().map(OpenAlexWork::from_json).collect())
            .unwrap_or_default();
        Ok(works)
    }

    /// Looks a preprint up through its arXiv DOI. `None` when OpenAlex has no record.
    pub async fn citation_info(&self, arxiv_id: &str) -> Result<Option<CitationInfo>> {
        let doi = format!("https://doi.org/10.48550/arXiv.{}", strip_version(arxiv_id));
        let mut url = format!("{}/works/{}", self.base_url, urlencoding::encode(&doi));
        if let Some(mailto) = &self.mailto {
            url.push_str(&format!("?mailto={}", urlencoding::encode(mailto)));
        }

        let Some(body) = self.client.get_optional(&url, self.lookup_timeout).await? else {
            return Ok(None);
        };
        let json: Value =
            serde_json::from_str(&body).map_err(|e| ScienceError::Parse(e.to_string()))?;
        let work = OpenAlexWork::from_json(&json);
        Ok(Some(CitationInfo {
            citation_count: work.cited_by_count,
            venue: work.venue,
        }))
    }
}

#[async_trait]
impl PaperSource for OpenAlexSource {
    fn name(&self) -> &'static str {
        "openalex"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Paper>> {
        let works = self.search_works(query).await?;
        Ok(works.into_iter().map(OpenAlexWork::into_paper).collect())
    }
}

fn parse_location(value: &Value) -> OpenAlexLocation {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    };
    OpenAlexLocation {
        source_type: value
            .pointer("/source/type")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        pdf_url: text("pdf_url"),
        landing_page_url: text("landing_page_url"),
    }
}

fn primary_venue(v: &Value) -> Option<String> {
    v.pointer("/primary_location/source/display_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}
