//! Content documents: one parse per document per extraction run.
//!
//! A [`ContentDocument`] is scanned once with quick-xml to build an
//! [`AnchorIndex`] (every `id` in physical order, with byte offsets), the body
//! range, the leading semantic hint and the first heading. Boundary
//! resolution then works on byte ranges of the original markup, so the spans
//! handed downstream are exact slices of the source.

use std::collections::HashMap;
use std::io;
use std::ops::Range;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::span::Segment;
use crate::text::plain_text;
use crate::util::{decode_text, xml_declared_encoding};

/// Fetches raw markup for a document identifier.
///
/// Fetching belongs to the accessor; parsing and caching belong to
/// [`DocumentCache`].
pub trait DocumentSource {
    fn load(&mut self, id: &str) -> io::Result<Vec<u8>>;
}

impl DocumentSource for HashMap<String, String> {
    fn load(&mut self, id: &str) -> io::Result<Vec<u8>> {
        self.get(id)
            .map(|markup| markup.as_bytes().to_vec())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("Document not found: {}", id))
            })
    }
}

impl<S: DocumentSource + ?Sized> DocumentSource for &mut S {
    fn load(&mut self, id: &str) -> io::Result<Vec<u8>> {
        (**self).load(id)
    }
}

/// Elements treated as block-level section wrappers.
const BLOCK_CONTAINERS: &[&[u8]] = &[b"section", b"div", b"article", b"aside", b"main"];

/// HTML void elements: never closed, never pushed on the open-element stack.
const VOID_ELEMENTS: &[&[u8]] = &[
    b"area", b"base", b"br", b"col", b"embed", b"hr", b"img", b"input", b"link", b"meta",
    b"param", b"source", b"track", b"wbr",
];

/// Semantic values that mark a grouping division.
const DIVISION_SEMANTICS: &[&str] = &["part", "volume", "division", "doc-part"];

/// An element carrying an `id` (or an `<a name>`), in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorPoint {
    pub id: String,
    /// Local tag name, lowercased.
    pub tag: String,
    /// Offset of the element's `<`.
    pub start: usize,
    /// Offset one past the element's end tag, when it was closed.
    pub end: Option<usize>,
    /// Is the element a block-level section wrapper?
    pub block: bool,
    /// `epub:type` / `role` value, if any.
    pub semantics: Option<String>,
}

/// Anchor positions of one document, ordered by physical position.
#[derive(Debug, Clone, Default)]
pub struct AnchorIndex {
    points: Vec<AnchorPoint>,
    by_id: HashMap<String, usize>,
}

impl AnchorIndex {
    fn insert(&mut self, point: AnchorPoint) -> usize {
        let idx = self.points.len();
        // First occurrence wins for duplicated ids
        self.by_id.entry(point.id.clone()).or_insert(idx);
        self.points.push(point);
        idx
    }

    pub fn get(&self, id: &str) -> Option<&AnchorPoint> {
        self.by_id.get(id).map(|&idx| &self.points[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnchorPoint> {
        self.points.iter()
    }

    /// First anchor starting at or after `pos` accepted by `registered`,
    /// skipping `exclude`.
    pub fn next_registered<'a>(
        &'a self,
        pos: usize,
        exclude: Option<&str>,
        registered: impl Fn(&str) -> bool,
    ) -> Option<&'a AnchorPoint> {
        let first = self.points.partition_point(|p| p.start < pos);
        self.points[first..]
            .iter()
            .filter(|p| Some(p.id.as_str()) != exclude)
            .find(|p| registered(&p.id))
    }

    /// Is any anchor accepted by `registered` (other than `exclude`) located
    /// inside `range`?
    pub fn any_registered_within(
        &self,
        range: Range<usize>,
        exclude: Option<&str>,
        registered: impl Fn(&str) -> bool,
    ) -> bool {
        let first = self.points.partition_point(|p| p.start < range.start);
        self.points[first..]
            .iter()
            .take_while(|p| p.start < range.end)
            .filter(|p| Some(p.id.as_str()) != exclude)
            .any(|p| registered(&p.id))
    }
}

/// The first `h1`–`h3` heading of a document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// A parsed content document.
#[derive(Debug, Clone)]
pub struct ContentDocument {
    id: String,
    markup: String,
    body: Range<usize>,
    anchors: AnchorIndex,
    lead_semantics: Option<String>,
    first_heading: Option<Heading>,
    parsed: bool,
}

impl ContentDocument {
    /// Decode and scan raw markup bytes.
    pub fn parse(id: impl Into<String>, bytes: &[u8]) -> Self {
        let id = id.into();
        let mut markup = decode_text(bytes, xml_declared_encoding(bytes)).into_owned();
        if markup.starts_with('\u{feff}') {
            markup.remove(0);
        }

        match scan(&markup) {
            Ok(scanned) => Self {
                id,
                body: scanned.body.unwrap_or(0..markup.len()),
                markup,
                anchors: scanned.anchors,
                lead_semantics: scanned.lead_semantics,
                first_heading: scanned.first_heading,
                parsed: true,
            },
            Err(e) => {
                tracing::warn!(document = %id, error = %e, "unparseable document");
                Self::unparseable(id)
            }
        }
    }

    /// A document that could not be fetched or parsed; every span into it is empty.
    pub fn unparseable(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            markup: String::new(),
            body: 0..0,
            anchors: AnchorIndex::default(),
            lead_semantics: None,
            first_heading: None,
            parsed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Byte range of the body's inner markup.
    pub fn body(&self) -> Range<usize> {
        self.body.clone()
    }

    pub fn anchors(&self) -> &AnchorIndex {
        &self.anchors
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    pub fn first_heading(&self) -> Option<&Heading> {
        self.first_heading.as_ref()
    }

    /// Slice `range` of the markup as a segment of this document.
    pub fn segment(&self, range: Range<usize>) -> Segment {
        let start = range.start.min(self.markup.len());
        let end = range.end.clamp(start, self.markup.len());
        Segment::new(&self.id, start..end, &self.markup[start..end])
    }

    /// The whole body as one segment.
    pub fn body_segment(&self) -> Segment {
        self.segment(self.body())
    }

    /// Offset where content attributed to `anchor` begins, clamped into the body.
    pub fn anchor_offset(&self, anchor: &AnchorPoint) -> usize {
        anchor.start.clamp(self.body.start, self.body.end)
    }

    /// Does the markup mark this target as a division (part/volume/group)?
    ///
    /// Anchored targets use the anchored element's semantics; document-level
    /// targets use the body or the first annotated element inside it.
    pub fn is_division(&self, anchor: Option<&str>) -> bool {
        let semantics = match anchor {
            Some(id) => self.anchors.get(id).and_then(|a| a.semantics.as_deref()),
            None => self.lead_semantics.as_deref(),
        };
        semantics.is_some_and(names_division)
    }
}

/// Does an `epub:type`/`role` value carry a division token?
fn names_division(value: &str) -> bool {
    value
        .split_ascii_whitespace()
        .any(|token| DIVISION_SEMANTICS.contains(&token.to_ascii_lowercase().as_str()))
}

/// Per-run document cache.
///
/// Each document is fetched and parsed at most once; fetch failures are
/// cached as unparseable documents too. The cache is owned by one extraction
/// call and dropped with it.
#[derive(Debug, Default)]
pub struct DocumentCache {
    documents: HashMap<String, ContentDocument>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a parsed document, fetching it from `source` on first access.
    pub fn load<S: DocumentSource + ?Sized>(&mut self, source: &mut S, id: &str) -> &ContentDocument {
        self.documents.entry(id.to_string()).or_insert_with(|| {
            match source.load(id) {
                Ok(bytes) => ContentDocument::parse(id, &bytes),
                Err(e) => {
                    tracing::warn!(document = %id, error = %e, "failed to load document");
                    ContentDocument::unparseable(id)
                }
            }
        })
    }

    /// A document already loaded in this run.
    pub fn get(&self, id: &str) -> Option<&ContentDocument> {
        self.documents.get(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Scanning
// ----------------------------------------------------------------------------

#[derive(Default)]
struct Scanned {
    body: Option<Range<usize>>,
    anchors: AnchorIndex,
    lead_semantics: Option<String>,
    first_heading: Option<Heading>,
}

struct OpenElement {
    name: Vec<u8>,
    anchor: Option<usize>,
}

/// Heading level for `h1`..`h3`.
fn heading_level(name: &[u8]) -> Option<u8> {
    match name {
        b"h1" => Some(1),
        b"h2" => Some(2),
        b"h3" => Some(3),
        _ => None,
    }
}

/// Single linear pass over the document.
fn scan(markup: &str) -> io::Result<Scanned> {
    let mut reader = Reader::from_str(markup);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;
    }

    let mut scanned = Scanned::default();
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut body_start: Option<usize> = None;
    let mut body_end: Option<usize> = None;
    // Still before any body text and any annotated section, so annotations
    // count as document-level
    let mut in_lead = false;
    // (level, inner start) of the heading being collected
    let mut open_heading: Option<(u8, usize)> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) if reader.buffer_position() as usize > before => {
                tracing::debug!(offset = before, error = %e, "skipping malformed markup");
                continue;
            }
            Err(e) if body_start.is_none() => return Err(io::Error::other(e)),
            Err(e) => {
                tracing::warn!(offset = before, error = %e, "markup scan stopped early");
                break;
            }
        };
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                let name = local_lower(&e);
                let attrs = element_attributes(&e, &name);

                if name == b"body" {
                    body_start = Some(after);
                    in_lead = true;
                }
                if in_lead {
                    in_lead = note_lead(&mut scanned.lead_semantics, &name, &attrs);
                }

                if body_start.is_some()
                    && scanned.first_heading.is_none()
                    && open_heading.is_none()
                    && let Some(level) = heading_level(&name)
                {
                    open_heading = Some((level, after));
                }

                let anchor = attrs.id.map(|id| {
                    scanned.anchors.insert(AnchorPoint {
                        id,
                        tag: String::from_utf8_lossy(&name).into_owned(),
                        start: before,
                        end: None,
                        block: BLOCK_CONTAINERS.contains(&name.as_slice()),
                        semantics: attrs.semantics,
                    })
                });

                if VOID_ELEMENTS.contains(&name.as_slice()) {
                    if let Some(idx) = anchor {
                        scanned.anchors.points[idx].end = Some(after);
                    }
                } else {
                    stack.push(OpenElement { name, anchor });
                }
            }
            Event::Empty(e) => {
                let name = local_lower(&e);
                let attrs = element_attributes(&e, &name);
                if in_lead {
                    in_lead = note_lead(&mut scanned.lead_semantics, &name, &attrs);
                }
                if name == b"body" {
                    body_start = Some(after);
                    body_end = Some(after);
                }
                if let Some(id) = attrs.id {
                    scanned.anchors.insert(AnchorPoint {
                        id,
                        tag: String::from_utf8_lossy(&name).into_owned(),
                        start: before,
                        end: Some(after),
                        block: BLOCK_CONTAINERS.contains(&name.as_slice()),
                        semantics: attrs.semantics,
                    });
                }
            }
            Event::End(e) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();

                if name == b"body" && body_end.is_none() {
                    body_end = Some(before);
                }

                if let Some((level, inner_start)) = open_heading
                    && heading_level(&name) == Some(level)
                {
                    let text = plain_text(&markup[inner_start..before]);
                    if !text.is_empty() {
                        scanned.first_heading = Some(Heading { level, text });
                    }
                    open_heading = None;
                }

                // Pop to the matching element; anything skipped was left unclosed
                if let Some(depth) = stack.iter().rposition(|open| open.name == name) {
                    for open in stack.drain(depth..).rev() {
                        if let Some(idx) = open.anchor {
                            let end = if open.name == name { after } else { before };
                            scanned.anchors.points[idx].end = Some(end);
                        }
                    }
                }
            }
            Event::Text(e) => {
                if in_lead && e.iter().any(|b| !b.is_ascii_whitespace()) {
                    in_lead = false;
                }
            }
            Event::GeneralRef(_) | Event::CData(_) => {
                in_lead = false;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(start) = body_start {
        let end = body_end.unwrap_or(markup.len()).max(start);
        scanned.body = Some(start..end);
    }

    Ok(scanned)
}

/// Record the semantics of an element opened before any body text. Returns
/// whether the lead continues.
///
/// A division token settles it. Otherwise the outermost annotation is kept
/// while the scan goes on to the first annotated sectioning element, so
/// `<body epub:type="bodymatter"><section epub:type="part">` reads as a part.
fn note_lead(lead: &mut Option<String>, name: &[u8], attrs: &ElementAttributes) -> bool {
    let Some(semantics) = &attrs.semantics else {
        return true;
    };
    if names_division(semantics) {
        *lead = Some(semantics.clone());
        return false;
    }
    let sectioning = BLOCK_CONTAINERS.contains(&name);
    if lead.is_none() || sectioning {
        *lead = Some(semantics.clone());
    }
    !sectioning
}

struct ElementAttributes {
    id: Option<String>,
    semantics: Option<String>,
}

fn element_attributes(e: &BytesStart<'_>, name: &[u8]) -> ElementAttributes {
    let mut id = None;
    let mut anchor_name = None;
    let mut epub_type = None;
    let mut role = None;

    // HTML rules: unquoted and valueless attributes are common in content files
    for attr in e.html_attributes().with_checks(false).flatten() {
        let value = || String::from_utf8_lossy(attr.value.as_ref()).trim().to_string();
        match attr.key.as_ref() {
            b"id" | b"xml:id" => id = Some(value()),
            b"name" if name == b"a" => anchor_name = Some(value()),
            b"epub:type" => epub_type = Some(value()),
            b"role" => role = Some(value()),
            _ => {}
        }
    }

    ElementAttributes {
        id: id.or(anchor_name).filter(|v| !v.is_empty()),
        semantics: epub_type.or(role).filter(|v| !v.is_empty()),
    }
}

fn local_lower(e: &BytesStart<'_>) -> Vec<u8> {
    e.local_name().as_ref().to_ascii_lowercase()
}
