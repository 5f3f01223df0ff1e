//! Pushing entries from the generated listing back into a checkout of the
//! curated list, under its `# More Papers` heading.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use paperwatch_core::Category;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::formats::Sections;

static ABS_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"arxiv\.org/abs/(\d{4}\.\d{4,5})").unwrap());

static TITLE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*\*[^*]+\*\*").unwrap());

const MORE_PAPERS: &str = "# More Papers";

/// Entries of a rendered listing, grouped by their `## Label` heading.
///
/// Only headings naming a known category open a section. Any other heading
/// or a `---` rule closes it, so the table of contents and footer are never
/// mistaken for entries. A repeated heading continues the earlier section.
/// An entry starts at a `**Title**` line; anything else continues it.
pub fn extract_entries_by_section(doc: &str) -> Sections {
    let mut sections: Sections = Vec::new();
    let mut current: Option<usize> = None;

    for line in doc.lines() {
        if let Some(category) = line.strip_prefix("## ").and_then(Category::from_label) {
            let idx = match sections.iter().position(|(c, _)| *c == category) {
                Some(idx) => idx,
                None => {
                    sections.push((category, Vec::new()));
                    sections.len() - 1
                }
            };
            current = Some(idx);
            continue;
        }
        if line.starts_with('#') || line.trim() == "---" {
            current = None;
            continue;
        }

        let Some(idx) = current else { continue };
        let entries = &mut sections[idx].1;
        if TITLE_LINE.is_match(line) {
            entries.push(line.to_string());
        } else if !line.trim().is_empty() {
            if let Some(entry) = entries.last_mut() {
                entry.push('\n');
                entry.push_str(line);
            }
        }
    }

    sections.retain(|(_, entries)| !entries.is_empty());
    sections
}

/// Identifiers of every `arxiv.org/abs/…` link.
pub fn linked_ids(doc: &str) -> HashSet<String> {
    ABS_LINK
        .captures_iter(doc)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn linked_id(entry: &str) -> Option<&str> {
    ABS_LINK
        .captures(entry)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, Serialize)]
pub struct SpliceOutcome {
    #[serde(skip)]
    pub document: String,
    pub added: usize,
    pub per_category: Vec<(Category, usize)>,
}

/// Inserts the entries whose linked identifier is absent from `canonical`.
///
/// Entries without an `arxiv.org/abs/` link are never carried over. When
/// nothing is new the document comes back unchanged with `added == 0`.
pub fn splice_into_canonical(canonical: &str, sections: &Sections) -> SpliceOutcome {
    let existing = linked_ids(canonical);
    let fresh: Sections = sections
        .iter()
        .map(|(category, entries)| {
            let kept = entries
                .iter()
                .filter(|entry| linked_id(entry).is_some_and(|id| !existing.contains(id)))
                .cloned()
                .collect::<Vec<_>>();
            (*category, kept)
        })
        .filter(|(_, entries)| !entries.is_empty())
        .collect();

    let per_category: Vec<(Category, usize)> =
        fresh.iter().map(|(c, entries)| (*c, entries.len())).collect();
    let added = per_category.iter().map(|(_, n)| n).sum();
    if added == 0 {
        return SpliceOutcome {
            document: canonical.to_string(),
            added,
            per_category,
        };
    }

    let mut blocks = String::new();
    for (category, entries) in &fresh {
        blocks.push_str(&format!("\n## {}\n\n", category.label()));
        for entry in entries {
            blocks.push_str(entry);
            blocks.push_str("\n\n");
        }
    }

    let document = match more_papers_insert_point(canonical) {
        Some(at) => format!("{}\n{blocks}{}", &canonical[..at], &canonical[at..]),
        None => format!(
            "{}\n\n---\n\n{MORE_PAPERS}\n\n{blocks}",
            canonical.trim_end()
        ),
    };

    SpliceOutcome {
        document,
        added,
        per_category,
    }
}

/// Byte offset just past the `# More Papers` heading line.
fn more_papers_insert_point(doc: &str) -> Option<usize> {
    let mut offset = 0;
    for line in doc.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end() == MORE_PAPERS {
            return Some(offset);
        }
    }
    None
}

/// Splices `listing` into the curated list at `canonical`, rewriting the file
/// only when something was added.
pub fn sync_files(canonical: &Path, listing: &Path) -> Result<SpliceOutcome> {
    let canonical_doc = std::fs::read_to_string(canonical)?;
    let listing_doc = std::fs::read_to_string(listing)?;

    let sections = extract_entries_by_section(&listing_doc);
    let outcome = splice_into_canonical(&canonical_doc, &sections);
    if outcome.added > 0 {
        std::fs::write(canonical, &outcome.document)?;
        info!(
            added = outcome.added,
            path = %canonical.display(),
            "spliced new entries into curated list"
        );
    } else {
        info!("curated list already has every listed paper");
    }
    Ok(outcome)
}
