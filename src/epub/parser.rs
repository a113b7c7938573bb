//! EPUB package parsing (container.xml, OPF, NCX, EPUB 3 navigation document)
//!
//! Every href is resolved against the file that contains it, so manifest
//! entries and TOC targets come out as archive paths.

use std::io;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::toc::TocNode;
use crate::util::{percent_decode, reference_text, resolve_relative, split_href};

/// Dublin Core metadata of the package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    pub language: String,
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Archive path of the resource.
    pub path: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == property))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    /// `false` for `linear="no"` items (notes, pop-ups).
    pub linear: bool,
}

/// Parsed OPF package document.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub metadata: Metadata,
    /// Manifest items in declaration order.
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    /// Archive path of the NCX named by the spine's `toc` attribute.
    pub ncx_path: Option<String>,
    /// Archive path of the manifest item with the `nav` property.
    pub nav_path: Option<String>,
}

impl Package {
    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// Archive paths of the spine documents, in reading order.
    pub fn spine_paths(&self, linear_only: bool) -> Vec<String> {
        self.spine
            .iter()
            .filter(|itemref| itemref.linear || !linear_only)
            .filter_map(|itemref| self.item(&itemref.idref))
            .map(|item| item.path.clone())
            .collect()
    }
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(content: &str) -> io::Result<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path")? {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(io::Error::other(e)),
            _ => {}
        }
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "No rootfile found in container.xml",
    ))
}

/// Parse the OPF package document located at `opf_path`.
pub fn parse_opf(content: &str, opf_path: &str) -> io::Result<Package> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut package = Package::default();
    let mut toc_id: Option<String> = None;

    let mut in_metadata = false;
    let mut current_element: Option<&'static str> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"metadata" => in_metadata = true,
                    b"title" if in_metadata => current_element = Some("title"),
                    b"creator" if in_metadata => current_element = Some("creator"),
                    b"language" if in_metadata => current_element = Some("language"),
                    b"identifier" if in_metadata => current_element = Some("identifier"),
                    _ => package_element(&e, opf_path, &mut package, &mut toc_id)?,
                }
                buf_text.clear();
            }
            Ok(Event::Empty(e)) => package_element(&e, opf_path, &mut package, &mut toc_id)?,
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some()
                    && let Some(text) = reference_text(&e)
                {
                    buf_text.push_str(&text);
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"metadata" {
                    in_metadata = false;
                }

                if let Some(elem) = current_element.take() {
                    let value = buf_text.trim().to_string();
                    let metadata = &mut package.metadata;
                    match elem {
                        "title" if metadata.title.is_empty() => metadata.title = value,
                        "creator" => metadata.authors.push(value),
                        "language" if metadata.language.is_empty() => metadata.language = value,
                        "identifier" if metadata.identifier.is_empty() => {
                            metadata.identifier = value
                        }
                        _ => {}
                    }
                    buf_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(io::Error::other(e)),
            _ => {}
        }
    }

    package.ncx_path = toc_id
        .and_then(|id| package.item(&id))
        .map(|item| item.path.clone());
    package.nav_path = package
        .manifest
        .iter()
        .find(|item| item.has_property("nav"))
        .map(|item| item.path.clone());

    Ok(package)
}

/// Handle a manifest `item`, a spine `itemref` or the `spine` element itself.
fn package_element(
    e: &BytesStart<'_>,
    opf_path: &str,
    package: &mut Package,
    toc_id: &mut Option<String>,
) -> io::Result<()> {
    match e.local_name().as_ref() {
        b"item" => {
            let id = attribute(e, b"id")?.unwrap_or_default();
            let href = attribute(e, b"href")?.unwrap_or_default();
            if !id.is_empty() && !href.is_empty() {
                package.manifest.push(ManifestItem {
                    id,
                    path: resolve_relative(opf_path, &percent_decode(&href)),
                    media_type: attribute(e, b"media-type")?.unwrap_or_default(),
                    properties: attribute(e, b"properties")?,
                });
            }
        }
        b"itemref" => {
            if let Some(idref) = attribute(e, b"idref")? {
                let linear = attribute(e, b"linear")?.is_none_or(|value| value.trim() != "no");
                package.spine.push(SpineItem { idref, linear });
            }
        }
        b"spine" => *toc_id = attribute(e, b"toc")?,
        _ => {}
    }
    Ok(())
}

/// Parse an NCX table of contents located at `ncx_path`.
pub fn parse_ncx(content: &str, ncx_path: &str) -> io::Result<Vec<TocNode>> {
    let mut reader = Reader::from_str(content);
    // Untrimmed, so "A &amp; B" keeps its spaces; labels are collapsed later
    reader.config_mut().trim_text(false);

    #[derive(Default)]
    struct NavPointState {
        children: Vec<TocNode>,
        text: String,
        src: Option<String>,
    }

    let mut stack: Vec<NavPointState> = vec![NavPointState::default()];
    let mut in_text = false;
    let mut in_nav_map = false;

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"content" => {
                if in_nav_map
                    && let Some(state) = stack.last_mut()
                    && state.src.is_none()
                {
                    state.src = attribute(&e, b"src")?.map(|src| resolve_href(ncx_path, &src));
                }
            }
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"navMap" => in_nav_map = true,
                b"navPoint" if in_nav_map => stack.push(NavPointState::default()),
                // Only the first label counts; nested navPoints start their own
                b"text" if in_nav_map => in_text = stack.last().is_some_and(|s| s.text.is_empty()),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    state.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text
                    && let Some(state) = stack.last_mut()
                    && let Some(text) = reference_text(&e)
                {
                    state.text.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"text" => in_text = false,
                b"navMap" => in_nav_map = false,
                b"navPoint" if stack.len() > 1 => {
                    if let Some(state) = stack.pop()
                        && let Some(node) = toc_node(&state.text, state.src, state.children)
                        && let Some(parent) = stack.last_mut()
                    {
                        parent.children.push(node);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(io::Error::other(e)),
            _ => {}
        }
    }

    Ok(stack.into_iter().next().map(|s| s.children).unwrap_or_default())
}

/// Parse the `toc` navigation of an EPUB 3 navigation document at `nav_path`.
pub fn parse_nav(content: &str, nav_path: &str) -> io::Result<Vec<TocNode>> {
    let mut reader = Reader::from_str(content);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }

    #[derive(Default)]
    struct ItemState {
        children: Vec<TocNode>,
        label: String,
        href: Option<String>,
        /// Open elements inside the label, while it is being read.
        label_depth: Option<usize>,
        labeled: bool,
    }

    let mut roots: Vec<TocNode> = Vec::new();
    let mut stack: Vec<ItemState> = Vec::new();
    let mut in_toc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                if !in_toc {
                    in_toc = local.as_ref() == b"nav" && is_toc_nav(&e);
                    continue;
                }
                match local.as_ref() {
                    b"li" => stack.push(ItemState::default()),
                    b"a" | b"span" => {
                        if let Some(item) = stack.last_mut() {
                            if let Some(depth) = item.label_depth.as_mut() {
                                *depth += 1;
                            } else if !item.labeled {
                                item.label_depth = Some(0);
                                item.href = attribute(&e, b"href")?
                                    .map(|href| resolve_href(nav_path, &href));
                            }
                        }
                    }
                    _ => {
                        if let Some(depth) = stack.last_mut().and_then(|i| i.label_depth.as_mut()) {
                            *depth += 1;
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(item) = stack.last_mut()
                    && item.label_depth.is_some()
                {
                    item.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(item) = stack.last_mut()
                    && item.label_depth.is_some()
                    && let Some(text) = reference_text(&e)
                {
                    item.label.push_str(&text);
                }
            }
            Ok(Event::End(e)) => {
                if !in_toc {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"nav" => break,
                    b"li" => {
                        if let Some(item) = stack.pop()
                            && let Some(node) = toc_node(&item.label, item.href, item.children)
                        {
                            match stack.last_mut() {
                                Some(parent) => parent.children.push(node),
                                None => roots.push(node),
                            }
                        }
                    }
                    _ => {
                        if let Some(item) = stack.last_mut()
                            && let Some(depth) = item.label_depth
                        {
                            if depth == 0 {
                                item.label_depth = None;
                                item.labeled = true;
                            } else {
                                item.label_depth = Some(depth - 1);
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(io::Error::other(e)),
            _ => {}
        }
    }

    Ok(roots)
}

fn is_toc_nav(e: &BytesStart<'_>) -> bool {
    e.attributes().with_checks(false).flatten().any(|attr| {
        let key = attr.key.as_ref();
        let value = String::from_utf8_lossy(attr.value.as_ref());
        (key == b"epub:type" && value.split_ascii_whitespace().any(|t| t == "toc"))
            || (key == b"role" && value.trim() == "doc-toc")
    })
}

/// Build a TOC node from a label, an optional target and nested entries.
///
/// Labels without target or children carry nothing and are dropped.
fn toc_node(label: &str, href: Option<String>, children: Vec<TocNode>) -> Option<TocNode> {
    let title = label.split_whitespace().collect::<Vec<_>>().join(" ");
    let href = href.filter(|h| !h.is_empty());
    match (href, children.is_empty()) {
        (Some(href), true) => Some(TocNode::leaf(title, href)),
        (None, true) => None,
        (href, false) => Some(TocNode::container(title, href, children)),
    }
}

/// Resolve a TOC href against the file containing it, keeping the fragment.
fn resolve_href(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.contains("://") || href.starts_with("mailto:") {
        return href.to_string();
    }
    let (path, fragment) = split_href(href);
    let path = if path.is_empty() {
        base.to_string()
    } else {
        resolve_relative(base, &percent_decode(path))
    };
    match fragment {
        Some(fragment) => format!("{}#{}", path, percent_decode(fragment)),
        None => path,
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> io::Result<Option<String>> {
    for attr in e.attributes().with_checks(false).flatten() {
        if attr.key.as_ref() == key {
            return String::from_utf8(attr.value.to_vec())
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
        }
    }
    Ok(None)
}
