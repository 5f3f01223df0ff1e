use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::category::Category;

/// One candidate publication, as normalized from a single upstream record.
///
/// The identifier is the version-free arXiv id (`2210.02747`). Everything
/// except `category` is fixed once a source adapter has built the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,

    pub title: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    #[serde(default)]
    pub citation_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl Paper {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// The identifier, or `""` when the record carried none.
    pub fn id_str(&self) -> &str {
        self.arxiv_id.as_deref().unwrap_or_default()
    }

    pub fn abs_url(&self) -> Option<String> {
        self.arxiv_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("https://arxiv.org/abs/{id}"))
    }

    /// Venue text with empty strings treated as absent.
    pub fn venue_str(&self) -> Option<&str> {
        self.venue
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }
}
