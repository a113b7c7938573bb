//! Content spans: where a section's markup comes from.

use std::ops::Range;

use crate::text::text_len;

/// The `(document, anchor)` a section was declared against in the TOC.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Origin {
    pub document: String,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub anchor: Option<String>,
}

impl Origin {
    pub fn new(document: impl Into<String>, anchor: Option<String>) -> Self {
        Self {
            document: document.into(),
            anchor,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.anchor {
            Some(anchor) => write!(f, "{}#{}", self.document, anchor),
            None => f.write_str(&self.document),
        }
    }
}

/// A contiguous byte range of one document's markup.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Segment {
    pub document: String,
    pub range: Range<usize>,
    #[cfg_attr(feature = "cli", serde(skip))]
    markup: String,
}

impl Segment {
    pub fn new(document: impl Into<String>, range: Range<usize>, markup: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            range,
            markup: markup.into(),
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Do the two segments share any byte of the same document?
    pub fn overlaps(&self, other: &Segment) -> bool {
        self.document == other.document
            && self.range.start < other.range.end
            && other.range.start < self.range.end
    }
}

/// Ordered segments attributed to one section, possibly crossing documents
/// after merges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Span {
    segments: Vec<Segment>,
    text_len: usize,
}

impl Span {
    /// A span with no content (unparseable or suppressed targets).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_segment(segment: Segment) -> Self {
        let mut span = Self::empty();
        span.push(segment);
        span
    }

    /// Append a segment, ignoring empty ranges and exact duplicates.
    pub fn push(&mut self, segment: Segment) {
        if segment.is_empty() || self.segments.contains(&segment) {
            return;
        }
        self.text_len += text_len(segment.markup());
        self.segments.push(segment);
    }

    /// Append every segment of `other`, in order.
    pub fn extend(&mut self, other: Span) {
        for segment in other.segments {
            self.push(segment);
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Plain-text length of the whole span, in characters.
    pub fn text_len(&self) -> usize {
        self.text_len
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Raw markup of all segments, concatenated in order.
    pub fn markup(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(segment.markup());
        }
        out
    }

    /// Document of the last segment, where trailing content would continue.
    pub fn last_document(&self) -> Option<&str> {
        self.segments.last().map(|s| s.document.as_str())
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.segments
            .iter()
            .any(|a| other.segments.iter().any(|b| a.overlaps(b)))
    }
}
