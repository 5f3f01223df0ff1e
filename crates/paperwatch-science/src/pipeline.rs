//! End-to-end update run: identities, fetch, dedup, classify, render.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use paperwatch_core::{Category, CategoryBuckets, Paper, PipelineConfig};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::aggregate::PaperAggregator;
use crate::classify::{Classifier, DefaultClassifier, OpenAiClassifier, classify_or_default};
use crate::dedup::{IdentitySet, load_canonical_identities, read_local_document};
use crate::error::{Result, ScienceError};
use crate::formats::{collect_sections, render_listing};
use crate::http::RateLimitedClient;
use crate::sources::{
    ArxivSource, OpenAlexSource, PaperSource, SearchQuery, SemanticScholarSource, or_empty,
};
use crate::sync::extract_entries_by_section;

/// Base URLs for the upstream services. `None` means the public endpoint.
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub openalex: Option<String>,
    pub arxiv: Option<String>,
    pub semantic_scholar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchStats {
    pub openalex: usize,
    pub arxiv_checked: usize,
    pub arxiv_admitted: usize,
    pub semantic_scholar: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub known_ids: usize,
    pub known_titles: usize,
    pub fetched: FetchStats,
    pub duplicates: usize,
    pub new_papers: usize,
    pub retained_entries: usize,
    pub categories: Vec<CategoryCount>,
    pub output: PathBuf,
    pub written: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub known_ids: usize,
    pub known_titles: usize,
    pub fetched: FetchStats,
    pub duplicates: usize,
    /// New candidates, most cited first.
    pub candidates: Vec<Paper>,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Overrides `listing.output_path`.
    pub output: Option<PathBuf>,
}

pub struct Pipeline {
    config: PipelineConfig,
    fetcher: RateLimitedClient,
    openalex: OpenAlexSource,
    arxiv: ArxivSource,
    semantic_scholar: SemanticScholarSource,
    classifier: Box<dyn Classifier>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_endpoints(config, &Endpoints::default())
    }

    pub fn with_endpoints(config: PipelineConfig, endpoints: &Endpoints) -> Result<Self> {
        let sources = &config.sources;
        let openalex = match &endpoints.openalex {
            Some(url) => OpenAlexSource::with_base_url(url, sources)?,
            None => OpenAlexSource::new(sources)?,
        };
        let arxiv = match &endpoints.arxiv {
            Some(url) => ArxivSource::with_base_url(url, &config.topic, sources)?,
            None => ArxivSource::new(&config.topic, sources)?,
        };
        let semantic_scholar = match &endpoints.semantic_scholar {
            Some(url) => SemanticScholarSource::with_base_url(url, sources)?,
            None => SemanticScholarSource::new(sources)?,
        };

        let classifier: Box<dyn Classifier> =
            match OpenAiClassifier::from_config(&config.classifier, &sources.user_agent)? {
                Some(c) => Box::new(c),
                None => {
                    warn!(
                        env = %config.classifier.api_key_env,
                        "no classifier API key, every paper goes to {}",
                        Category::default()
                    );
                    Box::new(DefaultClassifier)
                }
            };

        let fetcher = RateLimitedClient::new(
            "canonical",
            Duration::ZERO,
            sources.request_timeout(),
            &sources.user_agent,
        )?;

        Ok(Self {
            config,
            fetcher,
            openalex,
            arxiv,
            semantic_scholar,
            classifier,
        })
    }

    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn output_path(&self, options: &RunOptions) -> PathBuf {
        options
            .output
            .clone()
            .unwrap_or_else(|| self.config.listing.output_path.clone())
    }

    /// Curated list ∪ local listing at `local_doc`.
    pub async fn load_identities(&self, local_doc: &str) -> IdentitySet {
        let canonical =
            load_canonical_identities(&self.fetcher, &self.config.listing.canonical_url).await;
        let local = IdentitySet::from_listing(local_doc);
        info!(
            ids = local.ids.len(),
            titles = local.titles.len(),
            "loaded local listing identities"
        );
        canonical.merged(local)
    }

    fn query(&self, term: &str, limit: u32) -> SearchQuery {
        SearchQuery::new(term, limit)
            .min_citations(self.config.topic.min_citations)
            .year_from(self.config.topic.year_from)
    }

    /// Queries every provider in order: OpenAlex, arXiv (with citation
    /// lookups), then Semantic Scholar. Earlier providers win on conflicts.
    pub async fn fetch_all(&self) -> (Vec<Paper>, FetchStats) {
        let sources = &self.config.sources;
        let terms = self.config.search_terms();
        let min = self.config.topic.min_citations;
        let mut agg = PaperAggregator::new();
        let mut stats = FetchStats::default();

        info!(terms = terms.len(), min_citations = min, "fetching from OpenAlex");
        for &term in &terms {
            let query = self.query(term, sources.openalex_limit);
            let papers = or_empty(self.openalex.name(), self.openalex.search(&query).await);
            debug!(term, found = papers.len(), "openalex results");
            stats.openalex += agg.extend(papers);
            sleep(sources.openalex_delay()).await;
        }

        info!("fetching recent papers from arXiv");
        let recent = or_empty(
            self.arxiv.name(),
            self.arxiv.search_terms(&terms, sources.arxiv_max_results).await,
        );
        let unchecked: Vec<Paper> = recent
            .into_iter()
            .filter(|p| !agg.contains(p.id_str()))
            .collect();
        stats.arxiv_checked = unchecked.len();
        info!(papers = unchecked.len(), "checking citations for arXiv papers");
        for mut paper in unchecked {
            let lookup = self.openalex.citation_info(paper.id_str()).await;
            match lookup {
                Ok(Some(info)) if info.citation_count >= min => {
                    debug!(id = paper.id_str(), citations = info.citation_count, "admitted");
                    paper.citation_count = info.citation_count;
                    paper.venue = info.venue.or(paper.venue);
                    if agg.insert(paper) {
                        stats.arxiv_admitted += 1;
                    }
                }
                Ok(_) => debug!(id = paper.id_str(), "below citation threshold"),
                Err(e) => {
                    warn!(id = paper.id_str(), kind = %e.kind(), "citation lookup failed: {e}")
                }
            }
            sleep(sources.citation_lookup_delay()).await;
        }

        info!("fetching from Semantic Scholar");
        for &term in &terms {
            let query = self.query(term, sources.semantic_scholar_limit);
            let papers = or_empty(
                self.semantic_scholar.name(),
                self.semantic_scholar.search(&query).await,
            );
            debug!(term, found = papers.len(), "semantic scholar results");
            stats.semantic_scholar += agg.extend(papers);
            sleep(sources.semantic_scholar_delay()).await;
        }

        stats.total = agg.len();
        info!(total = stats.total, "candidates after merging providers");
        (agg.into_papers(), stats)
    }

    /// Drops every paper already known; returns the survivors and the skip count.
    pub fn filter_new(&self, papers: Vec<Paper>, known: &IdentitySet) -> (Vec<Paper>, usize) {
        let before = papers.len();
        let fresh: Vec<Paper> = papers
            .into_iter()
            .filter(|p| {
                let dup = known.is_duplicate(p.id_str(), &p.title);
                if dup {
                    debug!(id = p.id_str(), title = %p.title, "skipping duplicate");
                }
                !dup
            })
            .collect();
        let skipped = before - fresh.len();
        info!(new = fresh.len(), skipped, "deduplicated against known papers");
        (fresh, skipped)
    }

    pub async fn classify(&self, papers: Vec<Paper>) -> CategoryBuckets {
        info!(papers = papers.len(), classifier = self.classifier.name(), "classifying");
        let mut buckets = CategoryBuckets::new();
        for paper in papers {
            let category =
                classify_or_default(self.classifier.as_ref(), &paper.title, &paper.abstract_text)
                    .await;
            debug!(%category, title = %paper.title, "classified");
            buckets.push(category, paper);
        }
        buckets
    }

    /// Fetch and dedup only; nothing is classified or written.
    pub async fn scan(&self) -> ScanReport {
        let local_doc = read_local_document(&self.config.listing.output_path);
        let known = self.load_identities(&local_doc).await;
        let (papers, fetched) = self.fetch_all().await;
        let (mut candidates, duplicates) = self.filter_new(papers, &known);
        candidates.sort_by(|a, b| b.citation_count.cmp(&a.citation_count));

        ScanReport {
            known_ids: known.ids.len(),
            known_titles: known.titles.len(),
            fetched,
            duplicates,
            candidates,
        }
    }

    pub async fn run(&self, options: &RunOptions, now: DateTime<Utc>) -> Result<RunReport> {
        let output = self.output_path(options);
        let local_doc = read_local_document(&output);
        let known = self.load_identities(&local_doc).await;

        let (papers, fetched) = self.fetch_all().await;
        let (fresh, duplicates) = self.filter_new(papers, &known);
        let new_papers = fresh.len();

        let mut report = RunReport {
            known_ids: known.ids.len(),
            known_titles: known.titles.len(),
            fetched,
            duplicates,
            new_papers,
            retained_entries: 0,
            categories: Vec::new(),
            output: output.clone(),
            written: false,
            dry_run: options.dry_run,
        };

        if fresh.is_empty() {
            info!("no new papers, listing left as is");
            return Ok(report);
        }

        let buckets = self.classify(fresh).await;
        report.categories = buckets
            .counts()
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category,
                label: category.label(),
                count,
            })
            .collect();

        let existing = extract_entries_by_section(&local_doc);
        report.retained_entries = existing.iter().map(|(_, entries)| entries.len()).sum();
        let sections = collect_sections(existing, &buckets);
        let document = render_listing(&sections, &self.config, now);

        if options.dry_run {
            info!(path = %output.display(), "dry run, not writing listing");
            return Ok(report);
        }

        write_listing(&output, &document)?;
        report.written = true;
        info!(
            path = %output.display(),
            new = new_papers,
            retained = report.retained_entries,
            "listing written"
        );
        Ok(report)
    }
}

fn write_listing(path: &Path, document: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, document).map_err(ScienceError::Io)
}
