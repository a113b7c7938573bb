//! Table of contents tree and its linearization.

use crate::patterns::{TitleClassifier, is_part_title};
use crate::span::Origin;
use crate::util::split_href;

/// A node of the nested table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocNode {
    /// A section heading with nested entries. `href` is absent for headings
    /// that only group their children.
    Container {
        title: String,
        href: Option<String>,
        children: Vec<TocNode>,
    },
    /// A plain link to a document or a location inside one.
    Leaf { title: String, href: String },
}

impl TocNode {
    pub fn leaf(title: impl Into<String>, href: impl Into<String>) -> Self {
        TocNode::Leaf {
            title: title.into(),
            href: href.into(),
        }
    }

    pub fn container(title: impl Into<String>, href: Option<String>, children: Vec<TocNode>) -> Self {
        TocNode::Container {
            title: title.into(),
            href,
            children,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            TocNode::Container { title, .. } | TocNode::Leaf { title, .. } => title,
        }
    }

    pub fn href(&self) -> Option<&str> {
        match self {
            TocNode::Container { href, .. } => href.as_deref(),
            TocNode::Leaf { href, .. } => Some(href),
        }
    }

    pub fn children(&self) -> &[TocNode] {
        match self {
            TocNode::Container { children, .. } => children,
            TocNode::Leaf { .. } => &[],
        }
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children().iter().map(TocNode::count).sum::<usize>()
    }
}

/// One linearized TOC entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct TocEntry {
    pub title: String,
    /// Target document identifier (archive path).
    pub document: String,
    /// In-document anchor, if the href carried a fragment.
    pub anchor: Option<String>,
    /// Nesting depth, starting at 1.
    pub depth: usize,
    /// The entry has narrative children or a "Part <label>" title.
    pub container_hint: bool,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, document: impl Into<String>, depth: usize) -> Self {
        Self {
            title: title.into(),
            document: document.into(),
            anchor: None,
            depth,
            container_hint: false,
        }
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn with_container_hint(mut self, hint: bool) -> Self {
        self.container_hint = hint;
        self
    }

    pub fn origin(&self) -> Origin {
        Origin::new(&self.document, self.anchor.clone())
    }
}

/// Flatten the TOC tree in pre-order.
///
/// Non-narrative children (per `classifier`) still appear in the output but
/// do not make their parent a container.
pub fn linearize<C: TitleClassifier + ?Sized>(toc: &[TocNode], classifier: &C) -> Vec<TocEntry> {
    let mut entries = Vec::with_capacity(toc.iter().map(TocNode::count).sum());
    linearize_into(toc, 1, classifier, &mut entries);
    entries
}

fn linearize_into<C: TitleClassifier + ?Sized>(
    nodes: &[TocNode],
    depth: usize,
    classifier: &C,
    entries: &mut Vec<TocEntry>,
) {
    for node in nodes {
        let title = node.title().trim();
        let children = node.children();

        let Some((document, anchor)) = node.href().and_then(parse_target) else {
            // Grouping heading without a target: children take its place
            tracing::debug!(title, "TOC node without target, promoting children");
            linearize_into(children, depth, classifier, entries);
            continue;
        };

        let narrative_children = children
            .iter()
            .filter(|child| !classifier.is_non_narrative(child.title()))
            .count();

        entries.push(TocEntry {
            title: title.to_string(),
            document,
            anchor,
            depth,
            container_hint: narrative_children > 0 || is_part_title(title),
        });

        linearize_into(children, depth + 1, classifier, entries);
    }
}

/// Split an href into (document, anchor); `None` for empty or external targets.
fn parse_target(href: &str) -> Option<(String, Option<String>)> {
    let href = href.trim();
    if href.contains("://") || href.starts_with("mailto:") {
        return None;
    }
    let (path, fragment) = split_href(href);
    if path.is_empty() {
        return None;
    }
    Some((path.to_string(), fragment.map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::FrontMatter;

    fn sample_toc() -> Vec<TocNode> {
        vec![
            TocNode::leaf("Copyright", "front.xhtml#copy"),
            TocNode::container(
                "Part One",
                Some("p1.xhtml".into()),
                vec![
                    TocNode::leaf("Chapter 1", "p1.xhtml#c1"),
                    TocNode::container(
                        "Chapter 2",
                        Some("c2.xhtml".into()),
                        vec![TocNode::leaf("Scene", "c2.xhtml#s1")],
                    ),
                ],
            ),
            TocNode::leaf("Part Two", "p2.xhtml"),
        ]
    }

    #[test]
    fn test_preorder_with_depths() {
        let entries = linearize(&sample_toc(), &FrontMatter);
        let flat: Vec<_> = entries
            .iter()
            .map(|e| (e.title.as_str(), e.depth))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("Copyright", 1),
                ("Part One", 1),
                ("Chapter 1", 2),
                ("Chapter 2", 2),
                ("Scene", 3),
                ("Part Two", 1),
            ]
        );
    }

    #[test]
    fn test_targets_split_into_document_and_anchor() {
        let entries = linearize(&sample_toc(), &FrontMatter);
        assert_eq!(entries[0].document, "front.xhtml");
        assert_eq!(entries[0].anchor.as_deref(), Some("copy"));
        assert_eq!(entries[1].document, "p1.xhtml");
        assert_eq!(entries[1].anchor, None);
        assert_eq!(entries[2].origin().to_string(), "p1.xhtml#c1");
    }

    #[test]
    fn test_container_hint() {
        let entries = linearize(&sample_toc(), &FrontMatter);
        assert!(!entries[0].container_hint);
        assert!(entries[1].container_hint); // has children
        assert!(!entries[2].container_hint);
        assert!(entries[3].container_hint); // nested scene
        assert!(entries[5].container_hint); // "Part Two" title, no children
    }

    #[test]
    fn test_non_narrative_children_do_not_count() {
        let toc = vec![TocNode::container(
            "Front Matter",
            Some("front.xhtml".into()),
            vec![
                TocNode::leaf("Copyright", "front.xhtml#copy"),
                TocNode::leaf("Acknowledgments", "front.xhtml#ack"),
            ],
        )];
        let entries = linearize(&toc, &FrontMatter);
        assert_eq!(entries.len(), 3);
        assert!(!entries[0].container_hint);
        assert_eq!(entries[1].depth, 2);
    }

    #[test]
    fn test_untargeted_container_promotes_children() {
        let toc = vec![
            TocNode::container(
                "Book One",
                None,
                vec![
                    TocNode::leaf("Chapter 1", "c1.xhtml"),
                    TocNode::leaf("Chapter 2", "c2.xhtml"),
                ],
            ),
            TocNode::leaf("External", "https://example.com/"),
        ];
        let entries = linearize(&toc, &FrontMatter);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.depth == 1));
    }

    #[test]
    fn test_empty_toc() {
        assert!(linearize(&[], &FrontMatter).is_empty());
    }
}
