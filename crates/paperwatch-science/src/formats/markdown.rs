use chrono::{DateTime, Datelike, Utc};
use paperwatch_core::{Category, CategoryBuckets, Paper, PipelineConfig};

const MAX_LISTED_AUTHORS: usize = 5;
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Rendered entries grouped under their category heading.
pub type Sections = Vec<(Category, Vec<String>)>;

/// Renders one listing entry:
///
/// ```text
/// **Title**\
/// *A, B, C*\
/// ICLR 2023. (cited: 1500) [[Paper](https://arxiv.org/abs/2210.02747)]\
/// 06 Oct 2022
/// ```
///
/// The author line is left out when no authors are known.
pub fn format_entry(paper: &Paper) -> String {
    let id = paper.id_str();
    let mut lines = vec![format!("**{}**\\", paper.title)];
    if !paper.authors.is_empty() {
        lines.push(format!("*{}*\\", format_authors(&paper.authors)));
    }

    let year = match (paper.published, id_year(id)) {
        (Some(date), _) => format!(" {}", date.year()),
        (None, Some(yy)) => format!(" 20{yy}"),
        (None, None) => String::new(),
    };
    let cited = match paper.citation_count {
        0 => String::new(),
        n => format!(" (cited: {n})"),
    };
    lines.push(format!(
        "{}{year}.{cited} [[Paper]({})]\\",
        paper.venue_str().unwrap_or("arXiv"),
        paper.abs_url().unwrap_or_default()
    ));

    if let Some(date_line) = date_line(paper.published, id) {
        lines.push(date_line);
    }
    lines.join("\n")
}

fn format_authors(authors: &[String]) -> String {
    if authors.len() > MAX_LISTED_AUTHORS {
        format!("{}, et al.", authors[..MAX_LISTED_AUTHORS].join(", "))
    } else {
        authors.join(", ")
    }
}

/// `YY` of a `YYMM.NNNNN` identifier.
fn id_year(id: &str) -> Option<&str> {
    let prefix = id.get(..4)?;
    prefix
        .bytes()
        .all(|b| b.is_ascii_digit())
        .then(|| &prefix[..2])
}

fn date_line(published: Option<DateTime<Utc>>, id: &str) -> Option<String> {
    if let Some(date) = published {
        return Some(date.format("%d %b %Y").to_string());
    }
    let yy = id_year(id)?;
    let mm = &id[2..4];
    let month = mm
        .parse::<usize>()
        .ok()
        .and_then(|m| m.checked_sub(1))
        .and_then(|m| MONTHS.get(m).copied())
        .unwrap_or(mm);
    Some(format!("{month} 20{yy}"))
}

/// `## Label`, a blank line, then entries separated by blank lines.
pub fn format_section(category: Category, entries: &[String]) -> String {
    let mut out = format!("## {}\n\n", category.label());
    for entry in entries {
        out.push_str(entry.trim_end());
        out.push_str("\n\n");
    }
    out
}

/// Previously published entries first, then the new papers of each
/// category. Empty categories are dropped; order follows [`Category::ALL`].
pub fn collect_sections(existing: Sections, buckets: &CategoryBuckets) -> Sections {
    let mut merged: [Vec<String>; Category::COUNT] = Default::default();
    for (category, entries) in existing {
        merged[category.index()].extend(entries);
    }
    for (category, papers) in buckets.iter() {
        merged[category.index()].extend(papers.iter().map(format_entry));
    }

    Category::ALL
        .into_iter()
        .zip(merged)
        .filter(|(_, entries)| !entries.is_empty())
        .collect()
}

pub fn render_listing(sections: &Sections, config: &PipelineConfig, updated: DateTime<Utc>) -> String {
    let topic = &config.topic;
    let listing = &config.listing;
    let topic_lower = topic.name.to_lowercase();
    let min = topic.min_citations;

    let mut out = format!("# Awesome {} - Auto Updated\n\n", topic.name);

    if let Some(repo) = &listing.badge_repo {
        let workflow = format!("https://github.com/{repo}/actions/workflows/update-papers.yml");
        out.push_str(&format!("[![Auto Update]({workflow}/badge.svg)]({workflow})\n\n"));
    }

    out.push_str(&format!(
        "Automatically curated list of {topic_lower} papers with **{min}+ citations**.\n\n"
    ));
    out.push_str(&format!(
        "Last updated: {}\n\n",
        updated.format("%Y-%m-%d %H:%M UTC")
    ));
    out.push_str(&format!(
        "This repository automatically tracks new {topic_lower} papers from OpenAlex, arXiv and Semantic Scholar,\n\
         filtering for quality (minimum {min} citations) and categorizing them using AI.\n\n"
    ));

    let repo_name = listing
        .canonical_repo_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("curated list");
    out.push_str(&format!(
        "Original curated list: [{repo_name}]({})\n\n",
        listing.canonical_repo_url
    ));

    out.push_str("---\n\n## Table of Contents\n\n");
    for (category, entries) in sections {
        out.push_str(&format!(
            "- [{}](#{}) ({} papers)\n",
            category.label(),
            category.anchor(),
            entries.len()
        ));
    }
    out.push_str("\n---\n\n");

    for (category, entries) in sections {
        out.push_str(&format_section(*category, entries));
    }

    let terms = quoted_list(&config.search_terms());
    out.push_str(&format!(
        "---\n\n\
         ## About\n\n\
         This list is automatically generated and updated daily.\n\n\
         **Inclusion criteria:**\n\
         - Paper must mention {terms}\n\
         - Minimum {min} citations required\n\n\
         **Sources:** OpenAlex, arXiv, Semantic Scholar\n\n\
         **Classification:** OpenAI {}\n",
        config.classifier.model
    ));
    out
}

/// `'a'`, `'a' or 'b'`, `'a', 'b', or 'c'`.
fn quoted_list(items: &[&str]) -> String {
    let quoted: Vec<String> = items.iter().map(|t| format!("'{t}'")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} or {b}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn lipman() -> Paper {
        Paper {
            arxiv_id: Some("2210.02747".into()),
            title: "Flow Matching for Generative Modeling".into(),
            authors: vec!["Yaron Lipman".into(), "Ricky T. Q. Chen".into()],
            citation_count: 1500,
            venue: Some("ICLR".into()),
            published: Some(Utc.with_ymd_and_hms(2022, 10, 6, 0, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn entry_with_all_fields() {
        assert_eq!(
            format_entry(&lipman()),
            "**Flow Matching for Generative Modeling**\\\n\
             *Yaron Lipman, Ricky T. Q. Chen*\\\n\
             ICLR 2022. (cited: 1500) [[Paper](https://arxiv.org/abs/2210.02747)]\\\n\
             06 Oct 2022"
        );
    }

    #[test]
    fn entry_falls_back_to_identifier_dates_and_arxiv_venue() {
        let paper = Paper {
            arxiv_id: Some("2403.01234".into()),
            title: "T".into(),
            authors: (1..=7).map(|i| format!("A{i}")).collect(),
            venue: Some("  ".into()),
            ..Default::default()
        };
        let entry = format_entry(&paper);
        let lines: Vec<_> = entry.lines().collect();
        assert_eq!(lines[1], "*A1, A2, A3, A4, A5, et al.*\\");
        assert_eq!(
            lines[2],
            "arXiv 2024. [[Paper](https://arxiv.org/abs/2403.01234)]\\"
        );
        assert_eq!(lines[3], "Mar 2024");
    }

    #[test]
    fn entry_without_authors_has_no_author_line() {
        let paper = Paper {
            authors: Vec::new(),
            ..lipman()
        };
        let entry = format_entry(&paper);
        assert_eq!(entry.lines().count(), 3);
        assert!(!entry.contains("**\\\n*"));
        assert!(entry.lines().nth(1).unwrap().starts_with("ICLR 2022."));
    }

    #[test]
    fn section_layout() {
        let section = format_section(Category::Theory, &["**A**\\".into(), "**B**\\\n".into()]);
        assert_eq!(section, "## Theory\n\n**A**\\\n\n**B**\\\n\n");
    }

    #[test]
    fn existing_entries_precede_new_ones() {
        let mut buckets = CategoryBuckets::new();
        buckets.push(Category::Foundational, lipman());
        let existing = vec![
            (Category::Applications, vec!["**Old app**\\".to_string()]),
            (Category::Foundational, vec!["**Old found**\\".to_string()]),
        ];

        let sections = collect_sections(existing, &buckets);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, Category::Foundational);
        assert_eq!(sections[0].1[0], "**Old found**\\");
        assert!(sections[0].1[1].starts_with("**Flow Matching"));
        assert_eq!(sections[1].0, Category::Applications);
    }

    #[test]
    fn listing_has_toc_sections_and_footer() {
        let mut buckets = CategoryBuckets::new();
        buckets.push(Category::SchrodingerBridge, lipman());
        let sections = collect_sections(Vec::new(), &buckets);

        let mut config = PipelineConfig::default();
        config.listing.badge_repo = Some("me/awesome-fm".into());
        let updated = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let doc = render_listing(&sections, &config, updated);

        assert!(doc.starts_with("# Awesome Flow Matching - Auto Updated\n"));
        assert!(doc.contains("https://github.com/me/awesome-fm/actions/workflows/update-papers.yml/badge.svg"));
        assert!(doc.contains("Last updated: 2024-05-01 08:30 UTC"));
        assert!(doc.contains("- [Schrödinger Bridge](#schrodinger-bridge) (1 papers)"));
        assert!(doc.contains("\n## Schrödinger Bridge\n\n**Flow Matching"));
        assert!(!doc.contains("## Theory"));
        assert!(doc.contains("[awesome-flow-matching](https://github.com/dongzhuoyao/awesome-flow-matching)"));
        assert!(doc.contains(
            "'flow matching', 'rectified flow', 'stochastic interpolant', or 'continuous normalizing flow'"
        ));
        assert!(doc.contains("**Classification:** OpenAI gpt-4o-mini"));
    }

    #[test]
    fn empty_listing_omits_badge_without_repo() {
        let doc = render_listing(&Vec::new(), &PipelineConfig::default(), Utc::now());
        assert!(!doc.contains("badge.svg"));
        assert!(doc.contains("## Table of Contents\n\n\n---"));
    }
}
