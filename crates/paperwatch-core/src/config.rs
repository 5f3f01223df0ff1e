use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Root pipeline configuration, loaded from `~/.config/paperwatch/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub topic: TopicConfig,
    pub listing: ListingConfig,
    pub sources: SourcesConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub name: String,
    pub search_terms: Vec<String>,
    pub min_citations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_from: Option<i32>,
    pub arxiv_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Raw URL of the externally curated list.
    pub canonical_url: String,
    /// Human-facing URL of the curated list's repository.
    pub canonical_repo_url: String,
    pub output_path: PathBuf,
    /// `owner/repo` of this listing, used for the workflow badge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_repo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    pub openalex_limit: u32,
    pub arxiv_max_results: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_days_back: Option<u32>,
    pub semantic_scholar_limit: u32,
    pub semantic_scholar_api_key_env: String,
    pub openalex_delay_ms: u64,
    pub citation_lookup_delay_ms: u64,
    pub semantic_scholar_delay_ms: u64,
    pub rate_limit_base_backoff_secs: u64,
    pub rate_limit_max_retries: u32,
    pub request_timeout_secs: u64,
    pub lookup_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model: String,
    pub api_key_env: String,
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            name: "Flow Matching".to_string(),
            search_terms: vec![
                "flow matching".to_string(),
                "rectified flow".to_string(),
                "stochastic interpolant".to_string(),
                "continuous normalizing flow".to_string(),
            ],
            min_citations: 10,
            year_from: Some(2020),
            arxiv_categories: ["cs.LG", "cs.CV", "cs.AI", "stat.ML", "cs.CL"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            canonical_url:
                "https://raw.githubusercontent.com/dongzhuoyao/awesome-flow-matching/main/README.md"
                    .to_string(),
            canonical_repo_url: "https://github.com/dongzhuoyao/awesome-flow-matching".to_string(),
            output_path: PathBuf::from("README.md"),
            badge_repo: None,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("paperwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            contact_email: None,
            openalex_limit: 200,
            arxiv_max_results: 200,
            arxiv_days_back: None,
            semantic_scholar_limit: 50,
            semantic_scholar_api_key_env: "SEMANTIC_SCHOLAR_API_KEY".to_string(),
            openalex_delay_ms: 500,
            citation_lookup_delay_ms: 200,
            semantic_scholar_delay_ms: 2000,
            rate_limit_base_backoff_secs: 30,
            rate_limit_max_retries: 3,
            request_timeout_secs: 30,
            lookup_timeout_secs: 15,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            request_timeout_secs: 30,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl PipelineConfig {
    /// Standard config file path: `~/.config/paperwatch/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PAPERWATCH_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("paperwatch")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self
            .topic
            .search_terms
            .iter()
            .all(|term| term.trim().is_empty())
        {
            return Err(CoreError::ConfigError(
                "topic.search_terms must contain at least one term".to_string(),
            ));
        }
        if self.listing.canonical_url.trim().is_empty() {
            return Err(CoreError::ConfigError(
                "listing.canonical_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Search terms with blanks removed.
    pub fn search_terms(&self) -> Vec<&str> {
        self.topic
            .search_terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

impl SourcesConfig {
    pub fn openalex_delay(&self) -> Duration {
        Duration::from_millis(self.openalex_delay_ms)
    }

    pub fn citation_lookup_delay(&self) -> Duration {
        Duration::from_millis(self.citation_lookup_delay_ms)
    }

    pub fn semantic_scholar_delay(&self) -> Duration {
        Duration::from_millis(self.semantic_scholar_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn rate_limit_base_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_base_backoff_secs)
    }

    pub fn semantic_scholar_api_key(&self) -> Option<String> {
        read_env_key(&self.semantic_scholar_api_key_env)
    }
}

impl ClassifierConfig {
    pub fn api_key(&self) -> Option<String> {
        read_env_key(&self.api_key_env)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn read_env_key(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
