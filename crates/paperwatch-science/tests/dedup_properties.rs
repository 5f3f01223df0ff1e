use std::collections::HashSet;

use paperwatch_core::Paper;
use paperwatch_science::identifiers::strip_version;
use paperwatch_science::{IdentitySet, PaperAggregator, is_duplicate, normalize_title};

fn ids(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn paper(id: &str, title: &str) -> Paper {
    let mut p = Paper::new(title);
    p.arxiv_id = Some(id.to_string());
    p
}

#[test]
fn every_extracted_identifier_is_version_free() {
    let doc = "\
[a](https://arxiv.org/abs/2210.02747v3) [b](http://arxiv.org/pdf/2301.00001v1)
arXiv:2402.12345v2 and ARXIV 2403.54321
";
    let set = IdentitySet::from_markdown(doc);
    assert_eq!(
        set.ids,
        ids(&["2210.02747", "2301.00001", "2402.12345", "2403.54321"])
    );
    for id in &set.ids {
        assert_eq!(&strip_version(id), id);
    }
}

#[test]
fn duplicate_decision_is_version_insensitive() {
    let known = ids(&["2210.02747"]);
    let none = HashSet::new();
    for variant in ["2210.02747", "2210.02747v1", "2210.02747v12"] {
        assert!(is_duplicate(variant, "Unrelated", &known, &none));
    }
}

#[test]
fn title_normalization_is_idempotent_and_spacing_blind() {
    let samples = [
        "Flow Matching for Generative Modeling",
        "  flow\tmatching  FOR\ngenerative   modeling ",
        "Schrödinger Bridge Matching",
    ];
    for s in samples {
        let once = normalize_title(s);
        assert_eq!(normalize_title(&once), once);
    }
    assert_eq!(normalize_title(samples[0]), normalize_title(samples[1]));
}

#[test]
fn identifier_match_takes_precedence_over_title() {
    let known_ids = ids(&["2301.00001"]);
    let known_titles = ids(&["something else entirely"]);
    assert!(is_duplicate("2301.00001", "A Brand New Title", &known_ids, &known_titles));
    assert!(!is_duplicate("2301.00002", "A Brand New Title", &known_ids, &known_titles));
    assert!(is_duplicate("", "Something Else  Entirely", &known_ids, &known_titles));
}

#[test]
fn growing_known_sets_never_undo_a_duplicate() {
    let candidates = [
        ("2210.02747", "Flow Matching for Generative Modeling"),
        ("2210.02747v3", "Some Other Title"),
        ("2209.03003", "Rectified Flow"),
        ("", "Stochastic  Interpolants"),
        ("", "Never Seen Before"),
        ("2405.99999", ""),
    ];
    let growth = [
        ("2210.02747", "flow matching for generative modeling"),
        ("2301.00001", "rectified flow"),
        ("2209.03003", "stochastic interpolants"),
        ("2405.99999", "unrelated"),
    ];

    let mut known_ids = HashSet::new();
    let mut known_titles = HashSet::new();
    let mut previous = vec![false; candidates.len()];
    for (id, title) in growth {
        known_ids.insert(id.to_string());
        known_titles.insert(title.to_string());
        for (i, (cid, ctitle)) in candidates.iter().enumerate() {
            let now = is_duplicate(cid, ctitle, &known_ids, &known_titles);
            assert!(now || !previous[i], "{cid:?} / {ctitle:?} stopped being a duplicate");
            previous[i] = now;
        }
    }
    assert_eq!(previous, vec![true, true, true, true, false, true]);
}

#[test]
fn merged_set_is_union_of_canonical_and_local() {
    let canonical = IdentitySet::from_markdown(
        "**Flow Matching for Generative Modeling** [[Paper](https://arxiv.org/abs/2210.02747)]",
    );
    let local = IdentitySet::from_markdown(
        "**Added By A Previous Run** [[Paper](https://arxiv.org/abs/2405.00001)]",
    );
    let merged = canonical.clone().merged(local.clone());

    assert_eq!(merged.ids, &canonical.ids | &local.ids);
    assert_eq!(merged.titles, &canonical.titles | &local.titles);
    assert!(merged.is_duplicate("2405.00001v2", "anything"));
    assert!(!canonical.is_duplicate("2405.00001", "Added by a previous run!"));
}

#[test]
fn aggregation_is_first_wins_in_insertion_order() {
    let mut agg = PaperAggregator::new();
    agg.extend([
        paper("2301.00002", "openalex b"),
        paper("2301.00001", "openalex a"),
    ]);
    agg.extend([
        paper("2301.00001v2", "arxiv a"),
        paper("2301.00003", "arxiv c"),
    ]);
    agg.extend([paper("2301.00003", "s2 c"), paper("2301.00004", "s2 d")]);

    let titles: Vec<_> = agg.into_papers().into_iter().map(|p| p.title).collect();
    assert_eq!(titles, vec!["openalex b", "openalex a", "arxiv c", "s2 d"]);
}
