//! Boundary resolution: bind each TOC entry to an exact span of its document.
//!
//! Boundaries follow the physical order of anchors inside a document, never
//! the order in which the TOC declares them. An entry without an anchor owns
//! the top of the body up to the first registered anchor; an anchored entry
//! owns everything from its element up to the next registered anchor.

use std::collections::{HashMap, HashSet};

use crate::document::{ContentDocument, DocumentCache, DocumentSource};
use crate::span::{Origin, Span};
use crate::toc::TocEntry;

/// How an entry's span was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "snake_case"))]
pub enum Resolution {
    /// No anchor: top of the body up to the first registered anchor.
    DocumentStart,
    /// Anchor up to the next registered anchor in document order.
    Anchored,
    /// Anchor on a block container with no other registered anchor inside:
    /// the whole container.
    Container,
    /// Anchor not found and no other entry claims the document: whole body.
    MissingAnchor,
    /// Anchor not found while other entries claim parts of the document:
    /// empty span.
    Suppressed,
    /// An earlier entry already starts at the same position: empty span.
    Duplicate,
    /// The document could not be fetched or parsed: empty span.
    Unparseable,
}

impl Resolution {
    /// Resolutions that are structural-accuracy risks worth reviewing.
    pub fn needs_review(self) -> bool {
        matches!(
            self,
            Resolution::MissingAnchor
                | Resolution::Suppressed
                | Resolution::Duplicate
                | Resolution::Unparseable
        )
    }
}

/// A TOC entry bound to its content span.
#[derive(Debug, Clone)]
pub struct ResolvedSection {
    pub entry: TocEntry,
    pub span: Span,
    pub resolution: Resolution,
    /// The target is annotated as a part/volume/division in the markup.
    pub division: bool,
}

impl ResolvedSection {
    pub fn text_len(&self) -> usize {
        self.span.text_len()
    }
}

/// A section after normalization; spans may cross documents and titles may
/// have been replaced by a better fragment title.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Section {
    pub title: String,
    pub depth: usize,
    pub container_hint: bool,
    /// The target is annotated as a part/volume/division in the markup.
    pub division: bool,
    /// Where the section was declared; kept through merges for diagnostics.
    pub origin: Origin,
    pub resolution: Resolution,
    pub span: Span,
    /// Origins of entries merged into this one.
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub absorbed: Vec<Origin>,
}

impl Section {
    pub fn text_len(&self) -> usize {
        self.span.text_len()
    }

    /// Is the readable content shorter than `threshold` characters?
    pub fn is_blank(&self, threshold: usize) -> bool {
        self.text_len() < threshold
    }
}

impl From<ResolvedSection> for Section {
    fn from(resolved: ResolvedSection) -> Self {
        let origin = resolved.entry.origin();
        Self {
            title: resolved.entry.title,
            depth: resolved.entry.depth,
            container_hint: resolved.entry.container_hint,
            division: resolved.division,
            origin,
            resolution: resolved.resolution,
            span: resolved.span,
            absorbed: Vec::new(),
        }
    }
}

/// Resolve every entry, in list order.
///
/// All target documents are parsed (once, through `cache`) before any
/// boundary is computed.
pub fn resolve<S: DocumentSource + ?Sized>(
    entries: &[TocEntry],
    cache: &mut DocumentCache,
    source: &mut S,
) -> Vec<ResolvedSection> {
    let mut registered: HashMap<&str, HashSet<&str>> = HashMap::new();
    for entry in entries {
        cache.load(source, &entry.document);
        let anchors = registered.entry(entry.document.as_str()).or_default();
        if let Some(anchor) = &entry.anchor {
            anchors.insert(anchor.as_str());
        }
    }

    // Entries whose target exists, per document
    let mut resolvable: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        let Some(doc) = cache.get(&entry.document) else {
            continue;
        };
        let found = entry
            .anchor
            .as_deref()
            .is_none_or(|anchor| doc.anchors().contains(anchor));
        if doc.is_parsed() && found {
            *resolvable.entry(entry.document.as_str()).or_default() += 1;
        }
    }

    let mut claimed: HashMap<&str, HashSet<usize>> = HashMap::new();
    let mut resolved = Vec::with_capacity(entries.len());

    for entry in entries {
        let mut division = false;
        let (span, resolution) = match cache.get(&entry.document) {
            Some(doc) if doc.is_parsed() => {
                division = doc.is_division(entry.anchor.as_deref());
                let anchors = &registered[entry.document.as_str()];
                let others = resolvable.get(entry.document.as_str()).copied().unwrap_or(0);
                let (range, resolution) = boundaries(doc, entry, anchors, others);

                let starts = claimed.entry(entry.document.as_str()).or_default();
                if !range.is_empty() && !starts.insert(range.start) {
                    tracing::warn!(
                        title = %entry.title,
                        origin = %entry.origin(),
                        "entry starts where an earlier entry starts, leaving it empty"
                    );
                    (Span::empty(), Resolution::Duplicate)
                } else {
                    (Span::from_segment(doc.segment(range)), resolution)
                }
            }
            _ => {
                tracing::warn!(
                    title = %entry.title,
                    document = %entry.document,
                    "target document unavailable, entry left empty"
                );
                (Span::empty(), Resolution::Unparseable)
            }
        };

        resolved.push(ResolvedSection {
            entry: entry.clone(),
            span,
            resolution,
            division,
        });
    }

    resolved
}

/// Byte range of `entry` inside `doc`.
///
/// `resolvable` counts the entries on this document whose targets exist.
fn boundaries(
    doc: &ContentDocument,
    entry: &TocEntry,
    anchors: &HashSet<&str>,
    resolvable: usize,
) -> (std::ops::Range<usize>, Resolution) {
    let body = doc.body();
    let is_registered = |id: &str| anchors.contains(id);

    let Some(anchor_id) = entry.anchor.as_deref() else {
        let end = doc
            .anchors()
            .next_registered(0, None, is_registered)
            .map(|next| doc.anchor_offset(next))
            .unwrap_or(body.end);
        return (body.start..end.max(body.start), Resolution::DocumentStart);
    };

    let Some(point) = doc.anchors().get(anchor_id) else {
        if resolvable > 0 {
            tracing::warn!(
                title = %entry.title,
                origin = %entry.origin(),
                "anchor not found; other entries claim this document, leaving it empty"
            );
            return (body.start..body.start, Resolution::Suppressed);
        }
        tracing::warn!(
            title = %entry.title,
            origin = %entry.origin(),
            "anchor not found, falling back to the whole document"
        );
        return (body, Resolution::MissingAnchor);
    };

    let start = doc.anchor_offset(point);

    if point.block
        && let Some(end) = point.end
        && !doc
            .anchors()
            .any_registered_within(point.start..end, Some(anchor_id), is_registered)
    {
        let end = end.clamp(start, body.end);
        return (start..end, Resolution::Container);
    }

    let end = doc
        .anchors()
        .next_registered(point.start, Some(anchor_id), is_registered)
        .map(|next| doc.anchor_offset(next))
        .unwrap_or(body.end);
    (start..end.max(start), Resolution::Anchored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(docs: &[(&str, &str)]) -> HashMap<String, String> {
        docs.iter()
            .map(|(id, markup)| (id.to_string(), markup.to_string()))
            .collect()
    }

    fn run(entries: &[TocEntry], docs: &HashMap<String, String>) -> Vec<ResolvedSection> {
        let mut docs = docs.clone();
        let mut cache = DocumentCache::new();
        resolve(entries, &mut cache, &mut docs)
    }

    const F1: &str = r#"<html><body><h1>Part: The Fundamentals</h1><p>Why fundamentals matter.</p><h2 id="c1">Chapter 1</h2><p>The surprising power of small habits.</p></body></html>"#;

    #[test]
    fn test_part_then_anchored_chapter() {
        let docs = source(&[("f1.xhtml", F1)]);
        let entries = vec![
            TocEntry::new("Part: The Fundamentals", "f1.xhtml", 1).with_container_hint(true),
            TocEntry::new("Chapter: 1: The Surprising Power", "f1.xhtml", 2).with_anchor("c1"),
        ];
        let resolved = run(&entries, &docs);

        assert_eq!(resolved[0].resolution, Resolution::DocumentStart);
        let part = resolved[0].span.markup();
        assert!(part.contains("Why fundamentals matter."));
        assert!(!part.contains("Chapter 1"));

        assert_eq!(resolved[1].resolution, Resolution::Anchored);
        let chapter = resolved[1].span.markup();
        assert!(chapter.starts_with(r#"<h2 id="c1">"#));
        assert!(chapter.contains("small habits"));
        assert!(!resolved[0].span.overlaps(&resolved[1].span));
    }

    #[test]
    fn test_boundaries_follow_document_order() {
        // Physically: a then b. Declared: b then a.
        let doc = r#"<html><body><p id="a">Alpha text</p><p>more alpha</p><p id="b">Beta text</p></body></html>"#;
        let docs = source(&[("d.xhtml", doc)]);
        let entries = vec![
            TocEntry::new("B", "d.xhtml", 1).with_anchor("b"),
            TocEntry::new("A", "d.xhtml", 1).with_anchor("a"),
        ];
        let resolved = run(&entries, &docs);

        let b = resolved[0].span.markup();
        let a = resolved[1].span.markup();
        assert!(b.contains("Beta text"));
        assert!(!b.contains("Alpha"));
        assert!(a.contains("Alpha text"));
        assert!(a.contains("more alpha"));
        assert!(!a.contains("Beta"));
    }

    #[test]
    fn test_block_container_taken_whole() {
        let doc = r#"<html><body><section id="s1"><h1>One</h1><p>First.</p></section><p>Loose trailing note.</p><section id="s2"><h1>Two</h1></section></body></html>"#;
        let docs = source(&[("d.xhtml", doc)]);
        let entries = vec![
            TocEntry::new("One", "d.xhtml", 1).with_anchor("s1"),
            TocEntry::new("Two", "d.xhtml", 1).with_anchor("s2"),
        ];
        let resolved = run(&entries, &docs);
        assert_eq!(resolved[0].resolution, Resolution::Container);
        let one = resolved[0].span.markup();
        assert!(one.ends_with("</section>"));
        assert!(!one.contains("Loose trailing note"));
        assert_eq!(resolved[1].resolution, Resolution::Container);
    }

    #[test]
    fn test_container_with_registered_anchor_inside_is_sliced() {
        let doc = r#"<html><body><div id="outer"><h1>Outer</h1><p>Intro.</p><h2 id="inner">Inner</h2><p>Nested.</p></div></body></html>"#;
        let docs = source(&[("d.xhtml", doc)]);
        let entries = vec![
            TocEntry::new("Outer", "d.xhtml", 1).with_anchor("outer"),
            TocEntry::new("Inner", "d.xhtml", 2).with_anchor("inner"),
        ];
        let resolved = run(&entries, &docs);
        assert_eq!(resolved[0].resolution, Resolution::Anchored);
        assert!(!resolved[0].span.markup().contains("Nested."));
        assert!(resolved[1].span.markup().contains("Nested."));
    }

    #[test]
    fn test_missing_anchor_falls_back_to_whole_document() {
        let docs = source(&[("d.xhtml", "<html><body><p>All of it.</p></body></html>")]);
        let entries = vec![TocEntry::new("Lost", "d.xhtml", 1).with_anchor("nowhere")];
        let resolved = run(&entries, &docs);
        assert_eq!(resolved[0].resolution, Resolution::MissingAnchor);
        assert!(resolved[0].resolution.needs_review());
        assert_eq!(resolved[0].span.markup(), "<p>All of it.</p>");
    }

    #[test]
    fn test_missing_anchor_suppressed_when_document_is_claimed() {
        let doc = r#"<html><body><h1 id="a">A</h1><p>Text.</p></body></html>"#;
        let docs = source(&[("d.xhtml", doc)]);
        let entries = vec![
            TocEntry::new("A", "d.xhtml", 1).with_anchor("a"),
            TocEntry::new("Ghost", "d.xhtml", 1).with_anchor("ghost"),
        ];
        let resolved = run(&entries, &docs);
        assert_eq!(resolved[1].resolution, Resolution::Suppressed);
        assert!(resolved[1].span.is_empty());
    }

    #[test]
    fn test_malformed_text_does_not_hide_later_anchor() {
        let doc = format!(
            "<html><body><h2>One</h2><p>Tom & Jerry {}</p><h2 id=c2>Two</h2><p>{}</p></body></html>",
            "chase ".repeat(20),
            "run ".repeat(20)
        );
        let docs = source(&[("d.xhtml", doc.as_str())]);
        let entries = vec![
            TocEntry::new("One", "d.xhtml", 1),
            TocEntry::new("Two", "d.xhtml", 1).with_anchor("c2"),
        ];
        let resolved = run(&entries, &docs);

        assert_eq!(resolved[0].resolution, Resolution::DocumentStart);
        assert!(resolved[0].span.markup().contains("Tom & Jerry"));
        assert!(!resolved[0].span.markup().contains("Two"));
        assert_eq!(resolved[1].resolution, Resolution::Anchored);
        assert!(resolved[1].span.markup().starts_with("<h2 id=c2>"));
        assert!(resolved[1].span.markup().contains("run run"));
    }

    #[test]
    fn test_duplicate_start_left_empty() {
        let docs = source(&[("d.xhtml", "<html><body><p>Shared.</p></body></html>")]);
        let entries = vec![
            TocEntry::new("First", "d.xhtml", 1),
            TocEntry::new("Second", "d.xhtml", 2),
        ];
        let resolved = run(&entries, &docs);
        assert_eq!(resolved[0].resolution, Resolution::DocumentStart);
        assert_eq!(resolved[1].resolution, Resolution::Duplicate);
        assert!(resolved[1].span.is_empty());
    }

    #[test]
    fn test_unavailable_document() {
        let docs = source(&[]);
        let entries = vec![TocEntry::new("Gone", "missing.xhtml", 1)];
        let resolved = run(&entries, &docs);
        assert_eq!(resolved[0].resolution, Resolution::Unparseable);
        assert_eq!(resolved[0].text_len(), 0);
    }

    #[test]
    fn test_anchor_at_body_top_leaves_document_start_empty() {
        let doc = r#"<html><body><h1 id="t">Title</h1><p>Text.</p></body></html>"#;
        let docs = source(&[("d.xhtml", doc)]);
        let entries = vec![
            TocEntry::new("Whole", "d.xhtml", 1),
            TocEntry::new("Titled", "d.xhtml", 2).with_anchor("t"),
        ];
        let resolved = run(&entries, &docs);
        assert!(resolved[0].span.is_empty());
        assert!(resolved[1].span.markup().contains("Text."));
    }
}
