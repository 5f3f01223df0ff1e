use std::collections::HashMap;

use paperwatch_core::Paper;
use tracing::debug;

use crate::identifiers::strip_version;

/// Merges provider results by identifier. The first record seen for an
/// identifier wins and later ones are dropped, so provider order matters.
#[derive(Debug, Default)]
pub struct PaperAggregator {
    index: HashMap<String, usize>,
    papers: Vec<Paper>,
}

impl PaperAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the paper was admitted.
    pub fn insert(&mut self, mut paper: Paper) -> bool {
        let Some(id) = paper.arxiv_id.as_deref().map(strip_version) else {
            debug!(title = %paper.title, "dropping candidate without identifier");
            return false;
        };
        if id.is_empty() || self.index.contains_key(&id) {
            return false;
        }
        paper.arxiv_id = Some(id.clone());
        self.index.insert(id, self.papers.len());
        self.papers.push(paper);
        true
    }

    /// Inserts every paper and returns how many were admitted.
    pub fn extend(&mut self, papers: impl IntoIterator<Item = Paper>) -> usize {
        papers
            .into_iter()
            .fold(0, |admitted, paper| admitted + usize::from(self.insert(paper)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(&strip_version(id))
    }

    pub fn get(&self, id: &str) -> Option<&Paper> {
        self.index
            .get(&strip_version(id))
            .map(|&idx| &self.papers[idx])
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    /// Papers in first-insertion order.
    pub fn into_papers(self) -> Vec<Paper> {
        self.papers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: Option<&str>, title: &str, citations: u32) -> Paper {
        let mut p = Paper::new(title);
        p.arxiv_id = id.map(ToOwned::to_owned);
        p.citation_count = citations;
        p
    }

    #[test]
    fn first_record_wins() {
        let mut agg = PaperAggregator::new();
        assert!(agg.insert(paper(Some("2210.02747"), "from openalex", 1500)));
        assert!(!agg.insert(paper(Some("2210.02747v2"), "from s2", 1600)));

        let papers = agg.into_papers();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "from openalex");
        assert_eq!(papers[0].citation_count, 1500);
    }

    #[test]
    fn records_without_identifier_are_dropped() {
        let mut agg = PaperAggregator::new();
        assert!(!agg.insert(paper(None, "journal only", 50)));
        assert!(!agg.insert(paper(Some("  "), "blank id", 50)));
        assert!(agg.is_empty());
    }

    #[test]
    fn preserves_insertion_order() {
        let mut agg = PaperAggregator::new();
        let admitted = agg.extend([
            paper(Some("2301.00003"), "c", 1),
            paper(Some("2301.00001"), "a", 1),
            paper(Some("2301.00003"), "dup", 1),
            paper(Some("2301.00002"), "b", 1),
        ]);
        assert_eq!(admitted, 3);
        let titles: Vec<_> = agg.into_papers().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[test]
    fn lookup_ignores_version_suffix() {
        let mut agg = PaperAggregator::new();
        agg.insert(paper(Some("2209.03003v3"), "rectified flow", 800));
        assert!(agg.contains("2209.03003"));
        assert!(agg.contains("2209.03003v1"));
        assert_eq!(
            agg.get("2209.03003").map(|p| p.arxiv_id.as_deref()),
            Some(Some("2209.03003"))
        );
    }
}
