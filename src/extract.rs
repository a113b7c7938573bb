//! End-to-end structure extraction.
//!
//! ```text
//! TOC tree -> linearize -> resolve -> merge blank spans -> coalesce -> classify
//! ```

use crate::coalesce::coalesce;
use crate::document::{DocumentCache, DocumentSource};
use crate::hierarchy::{Hierarchy, classify};
use crate::merge::merge_blank_spans;
use crate::patterns::TitleClassifier;
use crate::resolve::{Section, resolve};
use crate::toc::{TocEntry, TocNode, linearize};

/// Tuning knobs for the heuristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Plain-text length under which a section counts as blank.
    pub blank_threshold: usize,
    /// How many spine documents a blank section may absorb.
    pub blank_lookahead: usize,
    /// How many following entries the coalescer inspects.
    pub coalesce_lookahead: usize,
    /// Minimum length of the next entry for an empty entry to adopt its title.
    pub substantial_len: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            blank_threshold: 100,
            blank_lookahead: 2,
            coalesce_lookahead: 2,
            substantial_len: 50,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blank_threshold(mut self, threshold: usize) -> Self {
        self.blank_threshold = threshold;
        self
    }

    pub fn with_blank_lookahead(mut self, documents: usize) -> Self {
        self.blank_lookahead = documents;
        self
    }

    pub fn with_coalesce_lookahead(mut self, entries: usize) -> Self {
        self.coalesce_lookahead = entries;
        self
    }

    pub fn with_substantial_len(mut self, chars: usize) -> Self {
        self.substantial_len = chars;
        self
    }
}

/// Result of one extraction run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Extraction {
    /// Linearized entries, in TOC pre-order (before any merge).
    pub entries: Vec<TocEntry>,
    /// Sections after blank-span merging and fragment coalescing.
    pub sections: Vec<Section>,
    pub hierarchy: Hierarchy,
    /// The TOC was empty and the spine was used instead.
    pub spine_fallback: bool,
}

/// Recover the Part/Chapter structure of a book.
///
/// `toc` is the nested table of contents, `spine` the reading order of
/// document ids and `source` fetches document markup. Documents are parsed at
/// most once, in a cache that lives only for this call.
pub fn extract<S, C>(
    toc: &[TocNode],
    spine: &[String],
    source: &mut S,
    classifier: &C,
    options: &ExtractOptions,
) -> Extraction
where
    S: DocumentSource + ?Sized,
    C: TitleClassifier + ?Sized,
{
    let mut cache = DocumentCache::new();
    let entries = linearize(toc, classifier);

    if entries.is_empty() {
        tracing::warn!(
            documents = spine.len(),
            "table of contents is empty, falling back to spine order"
        );
        return spine_fallback(spine, source, &mut cache, options);
    }

    let sections: Vec<Section> = resolve(&entries, &mut cache, source)
        .into_iter()
        .map(Section::from)
        .collect();
    let sections = merge_blank_spans(sections, spine, &mut cache, source, options);
    let sections = coalesce(sections, options);
    let hierarchy = classify(sections.clone(), options.blank_threshold);

    tracing::debug!(
        entries = entries.len(),
        sections = sections.len(),
        parts = hierarchy.part_count(),
        chapters = hierarchy.chapter_count(),
        documents = cache.len(),
        "extracted structure"
    );

    Extraction {
        entries,
        sections,
        hierarchy,
        spine_fallback: false,
    }
}

/// One entry per spine document, titled and leveled by its first heading.
fn spine_fallback<S: DocumentSource + ?Sized>(
    spine: &[String],
    source: &mut S,
    cache: &mut DocumentCache,
    options: &ExtractOptions,
) -> Extraction {
    let entries: Vec<TocEntry> = spine
        .iter()
        .map(|id| {
            let doc = cache.load(source, id);
            match doc.first_heading() {
                Some(heading) if !heading.text.is_empty() => {
                    TocEntry::new(heading.text.clone(), id.clone(), usize::from(heading.level))
                }
                _ => TocEntry::new(id.clone(), id.clone(), 1),
            }
        })
        .collect();

    let sections: Vec<Section> = resolve(&entries, cache, source)
        .into_iter()
        .map(Section::from)
        .collect();
    let sections = coalesce(sections, options);
    let hierarchy = Hierarchy::flat(sections.clone(), options.blank_threshold);

    Extraction {
        entries,
        sections,
        hierarchy,
        spine_fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::hierarchy::{HierarchyNode, Role};
    use crate::patterns::FrontMatter;

    fn source(docs: &[(&str, &str)]) -> HashMap<String, String> {
        docs.iter()
            .map(|(id, markup)| (id.to_string(), markup.to_string()))
            .collect()
    }

    fn spine(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_part_and_chapter_in_one_document() {
        let intro = "word ".repeat(30);
        let body = "word ".repeat(300);
        let f1 = format!(
            "<html><body><h1>Part: The Fundamentals</h1><p>{intro}</p>\
             <h2 id=\"c1\">Chapter 1</h2><p>{body}</p></body></html>"
        );
        let mut docs = source(&[("f1.xhtml", &f1)]);
        let toc = vec![TocNode::container(
            "Part: The Fundamentals",
            Some("f1.xhtml".into()),
            vec![TocNode::leaf("Chapter: 1: The Surprising Power", "f1.xhtml#c1")],
        )];

        let result = extract(
            &toc,
            &spine(&["f1.xhtml"]),
            &mut docs,
            &FrontMatter,
            &ExtractOptions::default(),
        );

        assert!(!result.spine_fallback);
        let nodes = result.hierarchy.nodes();
        assert_eq!(nodes.len(), 1);
        let HierarchyNode::Part(part) = &nodes[0] else {
            panic!("expected a part, got {:?}", nodes[0]);
        };
        assert_eq!(part.title, "Part: The Fundamentals");
        assert!(!part.span().markup().contains("id=\"c1\""));
        assert_eq!(part.chapters.len(), 1);
        assert!(part.chapters[0].span.markup().starts_with("<h2 id=\"c1\">"));
    }

    #[test]
    fn test_empty_toc_falls_back_to_spine() {
        let mut docs = source(&[
            ("a.xhtml", "<html><body><h1>Opening</h1><p>Text.</p></body></html>"),
            ("b.xhtml", "<html><body><h2>Second</h2><p>More.</p></body></html>"),
            ("c.xhtml", "<html><body><p>No heading.</p></body></html>"),
        ]);
        let result = extract(
            &[],
            &spine(&["a.xhtml", "b.xhtml", "c.xhtml"]),
            &mut docs,
            &FrontMatter,
            &ExtractOptions::default().with_coalesce_lookahead(0),
        );

        assert!(result.spine_fallback);
        let entries: Vec<_> = result
            .entries
            .iter()
            .map(|e| (e.title.as_str(), e.depth))
            .collect();
        assert_eq!(entries, vec![("Opening", 1), ("Second", 2), ("c.xhtml", 1)]);
        assert!(
            result
                .hierarchy
                .nodes()
                .iter()
                .all(|n| n.role() == Role::StandaloneChapter)
        );
        assert_eq!(result.hierarchy.len(), 3);
    }

    #[test]
    fn test_unparseable_document_is_an_empty_leaf() {
        let mut docs = source(&[(
            "c1.xhtml",
            "<html><body><p>Readable content for chapter one.</p></body></html>",
        )]);
        let toc = vec![
            TocNode::leaf("Chapter 1", "c1.xhtml"),
            TocNode::leaf("Chapter 2", "missing.xhtml"),
        ];
        let result = extract(
            &toc,
            &spine(&["c1.xhtml", "missing.xhtml"]),
            &mut docs,
            &FrontMatter,
            &ExtractOptions::default(),
        );
        let flat = result.hierarchy.flatten();
        assert_eq!(flat.len(), 2);
        assert!(flat[1].span.is_empty());
        assert!(flat[1].empty);
    }

    #[test]
    fn test_options_builder() {
        let options = ExtractOptions::new()
            .with_blank_threshold(10)
            .with_blank_lookahead(3)
            .with_coalesce_lookahead(1)
            .with_substantial_len(5);
        assert_eq!(options.blank_threshold, 10);
        assert_eq!(options.blank_lookahead, 3);
        assert_eq!(options.coalesce_lookahead, 1);
        assert_eq!(options.substantial_len, 5);
    }
}
