use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScienceError};

// YYMM.NNNN or YYMM.NNNNN, optional version
static NEW_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}\.\d{4,5})(v(\d+))?$").unwrap());

// Old format: category/YYMMNNN
static OLD_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z\-]+(?:\.[A-Z]{2})?/\d{7})(v(\d+))?$").unwrap()
});

static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"v\d+$").unwrap());

static RAW_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}\.\d{4,5}").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArxivId {
    pub raw: String,
    /// Version-free identifier.
    pub id: String,
    pub version: Option<u32>,
    pub category: Option<String>,
}

impl ArxivId {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let stripped = [
            "https://arxiv.org/abs/",
            "http://arxiv.org/abs/",
            "https://arxiv.org/pdf/",
            "http://arxiv.org/pdf/",
            "arXiv:",
            "arxiv:",
        ]
        .iter()
        .find_map(|prefix| input.strip_prefix(*prefix))
        .unwrap_or(input)
        .trim_end_matches(".pdf");

        if let Some(caps) = NEW_FORMAT.captures(stripped) {
            return Ok(Self {
                raw: input.to_string(),
                id: caps[1].to_string(),
                version: caps.get(3).and_then(|v| v.as_str().parse().ok()),
                category: None,
            });
        }

        if let Some(caps) = OLD_FORMAT.captures(stripped) {
            let full_id = caps[1].to_string();
            let category = full_id.split('/').next().map(ToOwned::to_owned);
            return Ok(Self {
                raw: input.to_string(),
                id: full_id,
                version: caps.get(3).and_then(|v| v.as_str().parse().ok()),
                category,
            });
        }

        Err(ScienceError::InvalidArxivId(input.to_string()))
    }
}

/// Drops a trailing `v<digits>` marker: `2210.02747v2` → `2210.02747`.
pub fn strip_version(id: &str) -> String {
    VERSION_SUFFIX.replace(id.trim(), "").into_owned()
}

/// First `NNNN.NNNNN` token inside arbitrary text such as a URL.
pub fn find_arxiv_token(text: &str) -> Option<&str> {
    RAW_TOKEN.find(text).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_format_bare() {
        let id = ArxivId::parse("2301.04567").unwrap();
        assert_eq!(id.id, "2301.04567");
        assert_eq!(id.version, None);
    }

    #[test]
    fn new_format_with_version() {
        let id = ArxivId::parse("2301.04567v2").unwrap();
        assert_eq!(id.id, "2301.04567");
        assert_eq!(id.version, Some(2));
    }

    #[test]
    fn abs_url_with_version() {
        let id = ArxivId::parse("http://arxiv.org/abs/2210.02747v3").unwrap();
        assert_eq!(id.id, "2210.02747");
        assert_eq!(id.version, Some(3));
    }

    #[test]
    fn pdf_url_with_suffix() {
        let id = ArxivId::parse("https://arxiv.org/pdf/2301.04567.pdf").unwrap();
        assert_eq!(id.id, "2301.04567");
    }

    #[test]
    fn old_format_with_category() {
        let id = ArxivId::parse("cs.AI/0601001").unwrap();
        assert_eq!(id.id, "cs.AI/0601001");
        assert_eq!(id.category.as_deref(), Some("cs.AI"));
    }

    #[test]
    fn reject_not_arxiv() {
        assert!(ArxivId::parse("12345").is_err());
        assert!(ArxivId::parse("123.456").is_err());
    }

    #[test]
    fn strip_version_only_touches_suffix() {
        assert_eq!(strip_version("2210.02747v2"), "2210.02747");
        assert_eq!(strip_version("2210.02747"), "2210.02747");
        assert_eq!(strip_version(""), "");
        assert_eq!(strip_version("solv-int/9901001v1"), "solv-int/9901001");
    }

    #[test]
    fn finds_token_in_url() {
        assert_eq!(
            find_arxiv_token("https://arxiv.org/pdf/2305.00001v1"),
            Some("2305.00001")
        );
        assert_eq!(find_arxiv_token("https://example.org/paper"), None);
    }
}
