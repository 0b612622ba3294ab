//! Citation scanning for model replies.
//!
//! Front-ends highlight the files a reply relies on. Models are asked to cite
//! `[Source N]`, but in practice they also write `[Sources 1, 2]`,
//! `[Source 1, Source 3]`, `[source 2 & 4]` or echo the header as
//! `[Source 1: notes.md]`, so all of those are accepted.

use crate::context::SourceRef;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

static CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\[\s*sources?\s+(\d+(?:\s*(?:,\s*(?:and|&)|,|&|and)\s*(?:sources?\s+)?\d+)*)\s*(?::[^\]]*)?\]",
    )
    .unwrap()
});

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// One cited source and where it was cited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    /// File name, or `None` when the index does not match any provided source.
    pub name: Option<String>,
    /// Byte ranges of the citation markers in the reply.
    pub spans: Vec<Range<usize>>,
}

impl Citation {
    pub fn is_known(&self) -> bool {
        self.name.is_some()
    }
}

/// Finds every cited source in `reply`, sorted by index.
///
/// Indices outside the provided sources are kept with `name: None` so
/// callers can flag citations of files that were never given.
pub fn extract_citations(reply: &str, sources: &[SourceRef]) -> Vec<Citation> {
    let mut found: BTreeMap<usize, Vec<Range<usize>>> = BTreeMap::new();

    for caps in CITATION.captures_iter(reply) {
        let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        for number in NUMBER.find_iter(list.as_str()) {
            let Ok(index) = number.as_str().parse::<usize>() else {
                continue;
            };
            if index == 0 {
                continue;
            }

            let spans = found.entry(index).or_default();
            if spans.last() != Some(&whole.range()) {
                spans.push(whole.range());
            }
        }
    }

    found
        .into_iter()
        .map(|(index, spans)| Citation {
            index,
            name: sources
                .iter()
                .find(|s| s.index == index)
                .map(|s| s.name.clone()),
            spans,
        })
        .collect()
}

/// Returns the distinct cited indices in ascending order.
pub fn cited_indices(reply: &str) -> Vec<usize> {
    extract_citations(reply, &[])
        .into_iter()
        .map(|c| c.index)
        .collect()
}
