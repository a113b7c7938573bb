//! Hierarchy classification: Parts containing Chapters, or standalone Chapters.
//!
//! A single forward pass decides Part-hood per entry, then attaches every
//! following deeper entry to the current Part. Parts that end up without
//! chapters are demoted.

use crate::patterns::is_part_title;
use crate::resolve::{Resolution, Section};
use crate::span::{Origin, Span};

/// Role of a node in the final tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "snake_case"))]
pub enum Role {
    Part,
    /// A chapter nested under a Part.
    Chapter,
    StandaloneChapter,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Part => "part",
            Role::Chapter => "chapter",
            Role::StandaloneChapter => "standalone chapter",
        }
    }
}

/// Why an entry was classified as a Part, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "snake_case"))]
pub enum PartSignal {
    /// The markup annotates the target as a part, volume or division.
    Semantic,
    /// The title reads "Part <label>".
    Lexical,
    /// Followed by a flat run of leaf entries one level deeper.
    Structural,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ChapterNode {
    pub title: String,
    pub depth: usize,
    pub origin: Origin,
    pub resolution: Resolution,
    pub span: Span,
    /// Plain text below the emptiness threshold.
    pub empty: bool,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub absorbed: Vec<Origin>,
}

impl ChapterNode {
    fn from_section(section: Section, threshold: usize) -> Self {
        Self {
            empty: section.is_blank(threshold),
            title: section.title,
            depth: section.depth,
            origin: section.origin,
            resolution: section.resolution,
            span: section.span,
            absorbed: section.absorbed,
        }
    }

    pub fn text_len(&self) -> usize {
        self.span.text_len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct PartNode {
    pub title: String,
    pub depth: usize,
    pub origin: Origin,
    pub resolution: Resolution,
    pub signal: PartSignal,
    /// The Part's own content, kept only when it is more than a bare heading.
    pub description: Option<Span>,
    pub chapters: Vec<ChapterNode>,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub absorbed: Vec<Origin>,
    #[cfg_attr(feature = "cli", serde(skip))]
    span: Span,
    #[cfg_attr(feature = "cli", serde(skip))]
    empty: bool,
}

impl PartNode {
    fn from_section(section: Section, signal: PartSignal, threshold: usize) -> Self {
        // Strictly more than the threshold, so a bare heading page never qualifies
        let description = (section.text_len() > threshold).then(|| section.span.clone());
        Self {
            empty: section.is_blank(threshold),
            title: section.title,
            depth: section.depth,
            origin: section.origin,
            resolution: section.resolution,
            signal,
            description,
            chapters: Vec::new(),
            absorbed: section.absorbed,
            span: section.span,
        }
    }

    /// The Part's own span, whether or not it qualified as a description.
    pub fn span(&self) -> &Span {
        &self.span
    }

    fn into_chapter(self) -> ChapterNode {
        ChapterNode {
            empty: self.empty,
            title: self.title,
            depth: self.depth,
            origin: self.origin,
            resolution: self.resolution,
            span: self.span,
            absorbed: self.absorbed,
        }
    }
}

/// A top-level node of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(tag = "role", rename_all = "snake_case"))]
pub enum HierarchyNode {
    Part(PartNode),
    #[cfg_attr(feature = "cli", serde(rename = "standalone_chapter"))]
    Chapter(ChapterNode),
}

impl HierarchyNode {
    pub fn title(&self) -> &str {
        match self {
            HierarchyNode::Part(part) => &part.title,
            HierarchyNode::Chapter(chapter) => &chapter.title,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            HierarchyNode::Part(_) => Role::Part,
            HierarchyNode::Chapter(_) => Role::StandaloneChapter,
        }
    }
}

/// One node of a flattened hierarchy walk.
#[derive(Debug, Clone, Copy)]
pub struct FlatNode<'a> {
    pub role: Role,
    pub title: &'a str,
    pub span: &'a Span,
    pub empty: bool,
    /// Title of the enclosing Part, for nested chapters.
    pub part: Option<&'a str>,
}

/// Ordered top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Hierarchy {
    nodes: Vec<HierarchyNode>,
}

impl Hierarchy {
    /// Every section as a standalone chapter, in order.
    pub fn flat(sections: Vec<Section>, threshold: usize) -> Self {
        let nodes = sections
            .into_iter()
            .map(|section| HierarchyNode::Chapter(ChapterNode::from_section(section, threshold)))
            .collect();
        Self { nodes }
    }

    pub fn nodes(&self) -> &[HierarchyNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn part_count(&self) -> usize {
        self.parts().count()
    }

    /// Chapters at any level.
    pub fn chapter_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match node {
                HierarchyNode::Part(part) => part.chapters.len(),
                HierarchyNode::Chapter(_) => 1,
            })
            .sum()
    }

    pub fn parts(&self) -> impl Iterator<Item = &PartNode> {
        self.nodes.iter().filter_map(|node| match node {
            HierarchyNode::Part(part) => Some(part),
            HierarchyNode::Chapter(_) => None,
        })
    }

    /// Walk the tree in reading order: each Part followed by its chapters.
    pub fn flatten(&self) -> Vec<FlatNode<'_>> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            match node {
                HierarchyNode::Part(part) => {
                    out.push(FlatNode {
                        role: Role::Part,
                        title: &part.title,
                        span: &part.span,
                        empty: part.empty,
                        part: None,
                    });
                    out.extend(part.chapters.iter().map(|chapter| FlatNode {
                        role: Role::Chapter,
                        title: &chapter.title,
                        span: &chapter.span,
                        empty: chapter.empty,
                        part: Some(part.title.as_str()),
                    }));
                }
                HierarchyNode::Chapter(chapter) => out.push(FlatNode {
                    role: Role::StandaloneChapter,
                    title: &chapter.title,
                    span: &chapter.span,
                    empty: chapter.empty,
                    part: None,
                }),
            }
        }
        out
    }

    /// Keep only the chapters matching `keep`, then demote Parts left
    /// without chapters.
    pub fn retain_chapters<F>(&mut self, mut keep: F)
    where
        F: FnMut(&ChapterNode) -> bool,
    {
        self.nodes.retain_mut(|node| match node {
            HierarchyNode::Part(part) => {
                part.chapters.retain(&mut keep);
                true
            }
            HierarchyNode::Chapter(chapter) => keep(chapter),
        });
        self.demote_childless();
    }

    /// Turn every Part without chapters into a standalone chapter.
    pub fn demote_childless(&mut self) {
        let nodes = std::mem::take(&mut self.nodes);
        self.nodes = nodes
            .into_iter()
            .map(|node| match node {
                HierarchyNode::Part(part) if part.chapters.is_empty() => {
                    tracing::debug!(title = %part.title, "demoting part without chapters");
                    HierarchyNode::Chapter(part.into_chapter())
                }
                node => node,
            })
            .collect();
    }
}

/// Classify sections into a two-level hierarchy.
pub fn classify(sections: Vec<Section>, threshold: usize) -> Hierarchy {
    let signals = part_signals(&sections);
    let mut nodes: Vec<HierarchyNode> = Vec::with_capacity(sections.len());
    // Depth of the Part collecting chapters, if any
    let mut current_part: Option<usize> = None;

    for (section, signal) in sections.into_iter().zip(signals) {
        if let Some(part_depth) = current_part
            && section.depth > part_depth
            && let Some(HierarchyNode::Part(part)) = nodes.last_mut()
        {
            part.chapters.push(ChapterNode::from_section(section, threshold));
            continue;
        }
        current_part = None;

        match signal {
            Some(signal) => {
                tracing::debug!(title = %section.title, ?signal, "classified as part");
                current_part = Some(section.depth);
                nodes.push(HierarchyNode::Part(PartNode::from_section(
                    section, signal, threshold,
                )));
            }
            None => nodes.push(HierarchyNode::Chapter(ChapterNode::from_section(
                section, threshold,
            ))),
        }
    }

    let mut hierarchy = Hierarchy { nodes };
    hierarchy.demote_childless();
    hierarchy
}

/// The Part signal of each section, if any.
///
/// Below an entry whose subtree nests deeper than one level, the structural
/// rule is not applied: such books are read as plain chapter sequences.
fn part_signals(sections: &[Section]) -> Vec<Option<PartSignal>> {
    let mut signals = Vec::with_capacity(sections.len());
    let mut nested_root: Option<usize> = None;

    for (i, section) in sections.iter().enumerate() {
        if nested_root.is_some_and(|depth| section.depth <= depth) {
            nested_root = None;
        }

        let signal = if section.division {
            Some(PartSignal::Semantic)
        } else if is_part_title(&section.title) {
            Some(PartSignal::Lexical)
        } else if nested_root.is_none() && section.container_hint {
            match children_shape(sections, i) {
                Shape::Flat => Some(PartSignal::Structural),
                Shape::Nested => {
                    nested_root = Some(section.depth);
                    None
                }
                Shape::Leaf => None,
            }
        } else {
            None
        };
        signals.push(signal);
    }

    signals
}

enum Shape {
    Leaf,
    /// At least one successor, all exactly one level deeper.
    Flat,
    Nested,
}

fn children_shape(sections: &[Section], index: usize) -> Shape {
    let depth = sections[index].depth;
    let mut successors = sections[index + 1..]
        .iter()
        .take_while(|next| next.depth > depth)
        .peekable();

    if successors.peek().is_none() {
        return Shape::Leaf;
    }
    if successors.all(|next| next.depth == depth + 1) {
        Shape::Flat
    } else {
        Shape::Nested
    }
}
