//! In-memory EPUB fixtures shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Zip the given `(path, content)` pairs behind a `mimetype` entry.
pub fn build_epub(files: &[(&str, String)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    zip.start_file("mimetype", options).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", options).unwrap();
    zip.write_all(CONTAINER_XML.as_bytes()).unwrap();

    for (path, content) in files {
        zip.start_file(*path, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// An XHTML content document; `body_attrs` lands on the `<body>` tag.
pub fn xhtml(body_attrs: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Test</title></head>
<body{body_attrs}>
{body}
</body>
</html>"#
    )
}

/// `words` words of filler prose in one paragraph.
pub fn prose(words: usize) -> String {
    let text: Vec<&str> = ["the", "bees", "hum", "over", "clover"]
        .iter()
        .copied()
        .cycle()
        .take(words)
        .collect();
    format!("<p>{}</p>", text.join(" "))
}

/// OPF with one manifest item per `(id, href)` and a spine in the same order.
pub fn opf(items: &[(&str, &str)], nav: Option<&str>, ncx: Option<&str>) -> String {
    let mut manifest = String::new();
    let mut spine = String::new();
    for (id, href) in items {
        manifest.push_str(&format!(
            "    <item id=\"{id}\" href=\"{href}\" media-type=\"application/xhtml+xml\"/>\n"
        ));
        spine.push_str(&format!("    <itemref idref=\"{id}\"/>\n"));
    }
    if let Some(nav) = nav {
        manifest.push_str(&format!(
            "    <item id=\"nav\" href=\"{nav}\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n"
        ));
    }
    let toc_attr = match ncx {
        Some(ncx) => {
            manifest.push_str(&format!(
                "    <item id=\"ncx\" href=\"{ncx}\" media-type=\"application/x-dtbncx+xml\"/>\n"
            ));
            " toc=\"ncx\""
        }
        None => "",
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>The Hive</dc:title>
    <dc:creator>A. Beekeeper</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="id">urn:uuid:hive</dc:identifier>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine{toc_attr}>
{spine}  </spine>
</package>"#
    )
}

/// EPUB 3 navigation document wrapping the given `<ol>` markup.
pub fn nav(list: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
<nav epub:type="toc" id="toc"><h1>Contents</h1>
{list}
</nav>
</body>
</html>"#
    )
}

/// The sample book used across tests: front matter, a lexical Part whose
/// heading page is followed by an untargeted intro page, a semantically
/// marked Part, and an epilogue.
pub fn hive_epub() -> Vec<u8> {
    let items = [
        ("copyright", "text/copyright.xhtml"),
        ("part1", "text/part1.xhtml"),
        ("part1-intro", "text/part1-intro.xhtml"),
        ("ch1", "text/ch1.xhtml"),
        ("ch2", "text/ch2.xhtml"),
        ("part2", "text/part2.xhtml"),
        ("ch4", "text/ch4.xhtml"),
        ("epilogue", "text/epilogue.xhtml"),
    ];
    let toc = r#"<ol>
  <li><a href="text/copyright.xhtml">Copyright</a></li>
  <li><a href="text/part1.xhtml">Part One</a>
    <ol>
      <li><a href="text/ch1.xhtml">Chapter 1</a></li>
      <li><a href="text/ch2.xhtml">Chapter 2</a></li>
      <li><a href="text/ch2.xhtml#c3">Chapter 3</a></li>
    </ol>
  </li>
  <li><a href="text/part2.xhtml">The Return</a>
    <ol>
      <li><a href="text/ch4.xhtml">Chapter 4</a></li>
    </ol>
  </li>
  <li><a href="text/epilogue.xhtml">Epilogue</a></li>
</ol>"#;

    build_epub(&[
        ("OEBPS/content.opf", opf(&items, Some("nav.xhtml"), None)),
        ("OEBPS/nav.xhtml", nav(toc)),
        ("OEBPS/text/copyright.xhtml", xhtml("", "<p>Copyright 2024.</p>")),
        ("OEBPS/text/part1.xhtml", xhtml("", "<h1>Part One</h1>")),
        ("OEBPS/text/part1-intro.xhtml", xhtml("", &prose(60))),
        (
            "OEBPS/text/ch1.xhtml",
            xhtml("", &format!("<h2>Chapter 1</h2>{}", prose(80))),
        ),
        (
            "OEBPS/text/ch2.xhtml",
            xhtml(
                "",
                &format!(
                    "<h2>Chapter 2</h2>{}<h2 id=\"c3\">Chapter 3</h2>{}",
                    prose(80),
                    prose(90)
                ),
            ),
        ),
        (
            "OEBPS/text/part2.xhtml",
            xhtml(" epub:type=\"bodymatter part\"", "<h1>The Return</h1>"),
        ),
        (
            "OEBPS/text/ch4.xhtml",
            xhtml("", &format!("<h2>Chapter 4</h2>{}", prose(70))),
        ),
        (
            "OEBPS/text/epilogue.xhtml",
            xhtml("", &format!("<h2>Epilogue</h2>{}", prose(50))),
        ),
    ])
}
