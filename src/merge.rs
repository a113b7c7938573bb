//! Blank-span merging.
//!
//! Repairs "title on its own page" layouts: a section whose resolved content
//! is nearly empty absorbs the untargeted spine documents that follow it.

use std::collections::{HashMap, HashSet};

use crate::document::{DocumentCache, DocumentSource};
use crate::extract::ExtractOptions;
use crate::resolve::Section;
use crate::span::Origin;

/// Extend blank sections with the spine documents that follow them.
///
/// Lookahead stops at the first candidate that is the target of any TOC
/// entry (in particular the next entry's document) or was already absorbed.
/// A section followed by an entry in its own document never looks ahead.
pub fn merge_blank_spans<S: DocumentSource + ?Sized>(
    mut sections: Vec<Section>,
    spine: &[String],
    cache: &mut DocumentCache,
    source: &mut S,
    options: &ExtractOptions,
) -> Vec<Section> {
    let targets: HashSet<String> = sections
        .iter()
        .map(|section| section.origin.document.clone())
        .collect();
    let spine_index: HashMap<&str, usize> = spine
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut absorbed_documents: HashSet<&str> = HashSet::new();

    for i in 0..sections.len() {
        if !sections[i].is_blank(options.blank_threshold) {
            continue;
        }

        let next_document = sections.get(i + 1).map(|next| next.origin.document.clone());
        let section = &mut sections[i];
        let last = section
            .span
            .last_document()
            .unwrap_or(section.origin.document.as_str());
        // The next entry continues in the same document: nothing trails this one
        if next_document.as_deref() == Some(last) {
            continue;
        }
        let Some(&position) = spine_index.get(last) else {
            continue;
        };

        for candidate in spine.iter().skip(position + 1).take(options.blank_lookahead) {
            if targets.contains(candidate)
                || next_document.as_ref() == Some(candidate)
                || absorbed_documents.contains(candidate.as_str())
            {
                break;
            }

            let doc = cache.load(source, candidate);
            tracing::debug!(
                title = %section.title,
                document = %candidate,
                chars = section.text_len(),
                "absorbing untargeted document into blank section"
            );
            section.span.push(doc.body_segment());
            section.absorbed.push(Origin::new(candidate, None));
            absorbed_documents.insert(candidate.as_str());
        }
    }

    sections
}
