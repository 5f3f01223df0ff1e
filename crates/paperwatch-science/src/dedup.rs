//! Identity extraction from markdown listings and the duplicate decision.
//!
//! An [`IdentitySet`] is rebuilt on every run from two documents: the
//! externally curated list and this tool's own previous output. Membership is
//! all that matters, so combining the two is a plain set union.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::http::RateLimitedClient;
use crate::identifiers::strip_version;
use crate::sync::extract_entries_by_section;

static LINK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"arxiv\.org/(?:abs|pdf)/(\d{4}\.\d{4,5})").unwrap());

static LABEL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)arxiv[:\s]+(\d{4}\.\d{4,5})").unwrap());

static BOLD_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());

/// Lower-cases and collapses whitespace runs. Idempotent.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Identifiers referenced by link (`arxiv.org/abs/…`) or label (`arXiv:…`).
pub fn extract_arxiv_ids(markdown: &str) -> HashSet<String> {
    LINK_ID
        .captures_iter(markdown)
        .chain(LABEL_ID.captures_iter(markdown))
        .map(|caps| strip_version(&caps[1]))
        .collect()
}

/// Normalized text of every `**bold**` span.
pub fn extract_titles(markdown: &str) -> HashSet<String> {
    BOLD_TITLE
        .captures_iter(markdown)
        .map(|caps| normalize_title(&caps[1]))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Identifier match wins; otherwise exact normalized-title match.
pub fn is_duplicate(
    identifier: &str,
    title: &str,
    known_ids: &HashSet<String>,
    known_titles: &HashSet<String>,
) -> bool {
    let clean_id = strip_version(identifier);
    if !clean_id.is_empty() && known_ids.contains(&clean_id) {
        return true;
    }
    known_titles.contains(&normalize_title(title))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySet {
    pub ids: HashSet<String>,
    pub titles: HashSet<String>,
}

impl IdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_markdown(markdown: &str) -> Self {
        Self {
            ids: extract_arxiv_ids(markdown),
            titles: extract_titles(markdown),
        }
    }

    /// Identities of a listing this tool rendered. Titles are read from the
    /// category sections only, so the header and footer labels stay out.
    pub fn from_listing(markdown: &str) -> Self {
        let titles = extract_entries_by_section(markdown)
            .iter()
            .flat_map(|(_, entries)| entries.iter())
            .flat_map(|entry| extract_titles(entry))
            .collect();
        Self {
            ids: extract_arxiv_ids(markdown),
            titles,
        }
    }

    /// Union of both sets; consumes `other`.
    pub fn merge(&mut self, other: IdentitySet) {
        self.ids.extend(other.ids);
        self.titles.extend(other.titles);
    }

    pub fn merged(mut self, other: IdentitySet) -> Self {
        self.merge(other);
        self
    }

    pub fn is_duplicate(&self, identifier: &str, title: &str) -> bool {
        is_duplicate(identifier, title, &self.ids, &self.titles)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.titles.is_empty()
    }
}

/// Fetches the curated list. Any failure yields `""` so the run can go on.
pub async fn fetch_canonical_document(client: &RateLimitedClient, url: &str) -> String {
    match client.get(url).await {
        Ok(body) => body,
        Err(e) => {
            warn!(url, kind = %e.kind(), "could not fetch canonical list: {e}");
            String::new()
        }
    }
}

/// Reads the previously generated listing, or `""` when there is none yet.
pub fn read_local_document(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "local listing not found, starting fresh");
            String::new()
        }
        Err(e) => {
            warn!(path = %path.display(), "could not read local listing: {e}");
            String::new()
        }
    }
}

pub async fn load_canonical_identities(client: &RateLimitedClient, url: &str) -> IdentitySet {
    let set = IdentitySet::from_markdown(&fetch_canonical_document(client, url).await);
    info!(
        ids = set.ids.len(),
        titles = set.titles.len(),
        "loaded canonical list identities"
    );
    set
}

pub fn load_local_identities(path: &Path) -> IdentitySet {
    let set = IdentitySet::from_listing(&read_local_document(path));
    info!(
        ids = set.ids.len(),
        titles = set.titles.len(),
        "loaded local listing identities"
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = r#"
## Foundational

**Flow Matching for Generative Modeling**\
*Yaron Lipman, Ricky T. Q. Chen*\
ICLR 2023. [[Paper](https://arxiv.org/abs/2210.02747v2)]

**Rectified  Flow**\
arXiv: 2209.03003 and again https://arxiv.org/pdf/2209.03003

**Some Journal Paper Without Preprint**\
Nature 2024.
"#;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_link_and_label_ids_without_versions() {
        let ids = extract_arxiv_ids(CANONICAL);
        assert_eq!(ids, set(&["2210.02747", "2209.03003"]));
        assert!(ids.iter().all(|id| !id.contains('v')));
    }

    #[test]
    fn label_form_is_case_insensitive() {
        let ids = extract_arxiv_ids("see ARXIV:2401.12345 or arxiv 2402.00001");
        assert_eq!(ids, set(&["2401.12345", "2402.00001"]));
    }

    #[test]
    fn extracts_normalized_titles() {
        let titles = extract_titles(CANONICAL);
        assert!(titles.contains("flow matching for generative modeling"));
        assert!(titles.contains("rectified flow"));
        assert!(titles.contains("some journal paper without preprint"));
    }

    #[test]
    fn malformed_input_yields_nothing() {
        let set = IdentitySet::from_markdown("** unterminated [link](arxiv.org/abs/12.3)");
        assert!(set.is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        for t in ["  Flow   Matching\tFor\nGenerative ", "ALREADY clean", ""] {
            let once = normalize_title(t);
            assert_eq!(normalize_title(&once), once);
        }
    }

    #[test]
    fn version_suffix_is_stripped_before_lookup() {
        assert!(is_duplicate(
            "2210.02747v2",
            "Unrelated Title",
            &set(&["2210.02747"]),
            &HashSet::new()
        ));
    }

    #[test]
    fn title_fallback_ignores_case_and_spacing() {
        assert!(is_duplicate(
            "",
            "Flow Matching For Generative Modeling",
            &HashSet::new(),
            &set(&["flow matching for generative modeling"])
        ));
    }

    #[test]
    fn near_duplicate_titles_are_not_caught() {
        assert!(!is_duplicate(
            "",
            "Flow Matching for Generative Modeling!",
            &HashSet::new(),
            &set(&["flow matching for generative modeling"])
        ));
    }

    #[test]
    fn merge_is_union() {
        let a = IdentitySet::from_markdown("[x](https://arxiv.org/abs/2301.00001) **A**");
        let b = IdentitySet::from_markdown("[y](https://arxiv.org/abs/2301.00002) **A**");
        let merged = a.merged(b);
        assert_eq!(merged.ids.len(), 2);
        assert_eq!(merged.titles.len(), 1);
    }

    #[test]
    fn listing_titles_come_from_category_sections_only() {
        let listing = "\
# Awesome Flow Matching - Auto Updated

Automatically curated list of flow matching papers with **10+ citations**.

## Theory

**Stochastic Interpolants**\\
arXiv 2023. [[Paper](https://arxiv.org/abs/2303.08797)]\\
Mar 2023

---

## About

**Inclusion criteria:**
**Sources:** OpenAlex, arXiv, Semantic Scholar
";
        let identities = IdentitySet::from_listing(listing);
        assert_eq!(identities.titles, set(&["stochastic interpolants"]));
        assert_eq!(identities.ids, set(&["2303.08797"]));
        assert!(IdentitySet::from_markdown(listing).titles.contains("sources:"));
    }

    #[test]
    fn missing_local_document_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let set = load_local_identities(&dir.path().join("README.md"));
        assert!(set.is_empty());
    }
}
