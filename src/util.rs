//! Small shared helpers: text decoding, href handling, entity resolution.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::BytesRef;

/// Decode document bytes to text.
///
/// A byte order mark decides outright. Otherwise strict UTF-8 is tried, then
/// the encoding named by the XML declaration, then Windows-1252, which is what
/// unlabeled legacy ebooks almost always turn out to be.
pub fn decode_text<'a>(bytes: &'a [u8], declared: Option<&str>) -> Cow<'a, str> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return encoding.decode_without_bom_handling(&bytes[bom_len..]).0;
    }
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return text;
    }

    let fallback = declared
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .filter(|&encoding| encoding != UTF_8)
        .unwrap_or(WINDOWS_1252);
    fallback.decode_without_bom_handling(bytes).0
}

/// Pull the `encoding="..."` value out of an XML declaration, if present.
pub fn xml_declared_encoding(bytes: &[u8]) -> Option<&str> {
    let head = &bytes[..bytes.len().min(200)];
    if !head.starts_with(b"<?xml") && !strip_bom(head).starts_with(b"<?xml") {
        return None;
    }
    let end = memchr::memmem::find(head, b"?>")?;
    let decl = std::str::from_utf8(&head[..end]).ok()?;
    let start = decl.find("encoding=")? + "encoding=".len();
    let rest = &decl[start..];
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let value = &rest[1..];
    value.find(quote).map(|close| &value[..close])
}

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Split an href into its path and optional fragment.
///
/// Empty fragments (`"ch1.xhtml#"`) are treated as absent.
pub fn split_href(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) if !fragment.is_empty() => (path, Some(fragment)),
        Some((path, _)) => (path, None),
        None => (href, None),
    }
}

/// Percent-decode an archive path, keeping the input when it is not valid UTF-8.
pub fn percent_decode(path: &str) -> String {
    percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Resolve a relative path against the file that references it.
///
/// For example, if base is "OEBPS/text/nav.xhtml" and relative is "../ch01.xhtml",
/// the result is "OEBPS/ch01.xhtml". Absolute archive paths have their leading
/// slash removed.
pub fn resolve_relative(base: &str, relative: &str) -> String {
    if let Some(absolute) = relative.strip_prefix('/') {
        return normalize_path(absolute);
    }

    let base_dir = match base.rfind('/') {
        Some(pos) => &base[..pos],
        None => "",
    };

    if base_dir.is_empty() {
        normalize_path(relative)
    } else {
        normalize_path(&format!("{}/{}", base_dir, relative))
    }
}

/// Collapse `.` and `..` components of a `/`-separated path.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    parts.join("/")
}

/// Text of a general reference: a character reference or any HTML5 named
/// entity. Unknown names resolve to nothing.
pub fn reference_text(reference: &BytesRef<'_>) -> Option<Cow<'static, str>> {
    match reference.resolve_char_ref() {
        Ok(Some(c)) => Some(Cow::Owned(c.to_string())),
        Ok(None) => {
            let name: &[u8] = reference;
            let name = std::str::from_utf8(name).ok()?;
            resolve_html5_entity(name).map(Cow::Borrowed)
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_utf8() {
        let text = "Hello, café!";
        assert_eq!(decode_text(text.as_bytes(), None), text);
    }

    #[test]
    fn test_decode_text_windows_1252_fallback() {
        // 0x93/0x94 are curly quotes in CP1252 and invalid as UTF-8
        let bytes = b"\x93Quoted\x94";
        assert_eq!(decode_text(bytes, None), "\u{201c}Quoted\u{201d}");
    }

    #[test]
    fn test_decode_text_with_hint() {
        // 0xE9 is 'é' in ISO-8859-1
        let bytes = b"caf\xe9";
        assert_eq!(decode_text(bytes, Some("iso-8859-1")), "café");
    }

    #[test]
    fn test_xml_declared_encoding() {
        assert_eq!(
            xml_declared_encoding(b"<?xml version=\"1.0\" encoding=\"iso-8859-1\"?><html/>"),
            Some("iso-8859-1")
        );
        assert_eq!(
            xml_declared_encoding(b"<?xml version='1.0' encoding='utf-8'?>"),
            Some("utf-8")
        );
        assert_eq!(xml_declared_encoding(b"<?xml version=\"1.0\"?>"), None);
        assert_eq!(xml_declared_encoding(b"<html></html>"), None);
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(&[0xEF, 0xBB, 0xBF, b'h', b'i']), b"hi");
        assert_eq!(strip_bom(b"hello"), b"hello");
        assert_eq!(strip_bom(&[]), &[]);
        let partial = &[0xEF, 0xBB, b'x'];
        assert_eq!(strip_bom(partial), partial);
    }

    #[test]
    fn test_split_href() {
        assert_eq!(split_href("ch1.xhtml"), ("ch1.xhtml", None));
        assert_eq!(split_href("ch1.xhtml#sec"), ("ch1.xhtml", Some("sec")));
        assert_eq!(split_href("ch1.xhtml#"), ("ch1.xhtml", None));
        assert_eq!(split_href("#top"), ("", Some("top")));
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative("OEBPS/toc.ncx", "text/ch1.xhtml"), "OEBPS/text/ch1.xhtml");
        assert_eq!(resolve_relative("OEBPS/nav/nav.xhtml", "../ch1.xhtml"), "OEBPS/ch1.xhtml");
        assert_eq!(resolve_relative("toc.ncx", "./ch1.xhtml"), "ch1.xhtml");
        assert_eq!(resolve_relative("OEBPS/toc.ncx", "/ch1.xhtml"), "ch1.xhtml");
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("Text/Chapter%201.xhtml"), "Text/Chapter 1.xhtml");
        assert_eq!(percent_decode("plain.xhtml"), "plain.xhtml");
    }

    fn first_reference(xml: &str) -> Option<Cow<'static, str>> {
        let mut reader = quick_xml::Reader::from_str(xml);
        loop {
            match reader.read_event().unwrap() {
                quick_xml::events::Event::GeneralRef(e) => return reference_text(&e),
                quick_xml::events::Event::Eof => panic!("no reference in {xml}"),
                _ => {}
            }
        }
    }

    #[test]
    fn test_reference_text() {
        assert_eq!(first_reference("<p>&apos;</p>").as_deref(), Some("'"));
        assert_eq!(first_reference("<p>&eacute;</p>").as_deref(), Some("\u{e9}"));
        assert_eq!(first_reference("<p>&copy;</p>").as_deref(), Some("\u{a9}"));
        assert_eq!(first_reference("<p>&#65;</p>").as_deref(), Some("A"));
        assert_eq!(first_reference("<p>&#x2019;</p>").as_deref(), Some("\u{2019}"));
        assert_eq!(first_reference("<p>&bogus;</p>"), None);
    }

    #[test]
    fn test_decode_text_prefers_bom_then_utf8() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFcaf\xC3\xA9", Some("iso-8859-1")), "caf\u{e9}");
        assert_eq!(decode_text("caf\u{e9}".as_bytes(), Some("iso-8859-1")), "caf\u{e9}");
    }

    #[test]
    fn test_decode_text_falls_back_to_declared_then_1252() {
        // 0xE9 alone is invalid UTF-8
        assert_eq!(decode_text(b"caf\xE9", Some("iso-8859-1")), "caf\u{e9}");
        assert_eq!(decode_text(b"\x93hi\x94", None), "\u{201c}hi\u{201d}");
        assert_eq!(decode_text(b"\x93hi\x94", Some("utf-8")), "\u{201c}hi\u{201d}");
    }
}
