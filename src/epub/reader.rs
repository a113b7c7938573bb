use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use super::parser::{Metadata, Package, parse_container_xml, parse_nav, parse_ncx, parse_opf};
use crate::document::DocumentSource;
use crate::extract::{ExtractOptions, Extraction, extract};
use crate::patterns::TitleClassifier;
use crate::toc::TocNode;
use crate::util::{decode_text, percent_decode, xml_declared_encoding};

/// Which navigation structure the table of contents was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "snake_case"))]
pub enum TocFormat {
    /// EPUB 3 navigation document.
    Nav,
    /// EPUB 2 NCX.
    Ncx,
    /// Neither was present or usable.
    Missing,
}

/// Archive entries addressed by path; content documents are read on demand.
pub struct ZipSource<R> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> io::Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }

    /// Read an entry, retrying with the percent-decoded path.
    pub fn read(&mut self, path: &str) -> io::Result<Vec<u8>> {
        match self.archive.by_name(path) {
            Ok(mut file) => {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)?;
                return Ok(contents);
            }
            Err(zip::result::ZipError::FileNotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let decoded = percent_decode(path);
        let mut file = self.archive.by_name(&decoded).map_err(|_| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found in archive: {}", path),
            )
        })?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(contents)
    }

    /// Read an XML entry as text, honoring its declared encoding.
    pub fn read_text(&mut self, path: &str) -> io::Result<String> {
        let bytes = self.read(path)?;
        Ok(decode_text(&bytes, xml_declared_encoding(&bytes)).into_owned())
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }
}

impl<R: Read + Seek> DocumentSource for ZipSource<R> {
    fn load(&mut self, id: &str) -> io::Result<Vec<u8>> {
        self.read(id)
    }
}

/// An opened EPUB: package data, table of contents and the archive to read
/// content documents from.
pub struct EpubBook<R> {
    source: ZipSource<R>,
    package: Package,
    opf_path: String,
    toc: Vec<TocNode>,
    toc_format: TocFormat,
}

impl EpubBook<File> {
    /// Open an EPUB file from disk.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use booksplit::epub::EpubBook;
    ///
    /// let book = EpubBook::open("path/to/book.epub")?;
    /// println!("Title: {}", book.metadata().title);
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::from_reader(File::open(path)?)
    }
}

impl<R: Read + Seek> EpubBook<R> {
    /// Read an EPUB from any [`Read`] + [`Seek`] source.
    ///
    /// Fails only when the container itself is unusable: not a ZIP archive,
    /// no `container.xml`, or no readable package document. A broken table
    /// of contents is logged and treated as missing.
    pub fn from_reader(reader: R) -> io::Result<Self> {
        let mut source = ZipSource::new(reader)?;

        // 1. Find the OPF file path from container.xml
        let container = source.read_text("META-INF/container.xml")?;
        let opf_path = parse_container_xml(&container)?;

        // 2. Parse the OPF file
        let opf = source.read_text(&opf_path)?;
        let package = parse_opf(&opf, &opf_path)?;

        // 3. Table of contents: navigation document first, NCX second
        let (toc, toc_format) = read_toc(&mut source, &package);

        tracing::debug!(
            opf = %opf_path,
            spine = package.spine.len(),
            toc_nodes = toc.iter().map(TocNode::count).sum::<usize>(),
            ?toc_format,
            "opened epub"
        );

        Ok(Self {
            source,
            package,
            opf_path,
            toc,
            toc_format,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.package.metadata
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn opf_path(&self) -> &str {
        &self.opf_path
    }

    pub fn toc(&self) -> &[TocNode] {
        &self.toc
    }

    pub fn toc_format(&self) -> TocFormat {
        self.toc_format
    }

    /// Linear spine documents (archive paths), in reading order.
    pub fn spine(&self) -> Vec<String> {
        self.package.spine_paths(true)
    }

    pub fn source(&mut self) -> &mut ZipSource<R> {
        &mut self.source
    }

    /// Recover the Part/Chapter structure of this book.
    pub fn extract<C: TitleClassifier + ?Sized>(
        &mut self,
        classifier: &C,
        options: &ExtractOptions,
    ) -> Extraction {
        let spine = self.spine();
        extract(&self.toc, &spine, &mut self.source, classifier, options)
    }
}

fn read_toc<R: Read + Seek>(source: &mut ZipSource<R>, package: &Package) -> (Vec<TocNode>, TocFormat) {
    if let Some(nav_path) = &package.nav_path {
        match source.read_text(nav_path).and_then(|nav| parse_nav(&nav, nav_path)) {
            Ok(toc) if !toc.is_empty() => return (toc, TocFormat::Nav),
            Ok(_) => tracing::debug!(path = %nav_path, "navigation document has no toc entries"),
            Err(e) => tracing::warn!(path = %nav_path, error = %e, "unreadable navigation document"),
        }
    }

    if let Some(ncx_path) = &package.ncx_path {
        match source.read_text(ncx_path).and_then(|ncx| parse_ncx(&ncx, ncx_path)) {
            Ok(toc) if !toc.is_empty() => return (toc, TocFormat::Ncx),
            Ok(_) => tracing::debug!(path = %ncx_path, "NCX has no navigation points"),
            Err(e) => tracing::warn!(path = %ncx_path, error = %e, "unreadable NCX"),
        }
    }

    (Vec::new(), TocFormat::Missing)
}
