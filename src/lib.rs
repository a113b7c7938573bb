//! # booksplit
//!
//! Recover the narrative structure of an ebook: Parts containing Chapters, or
//! standalone Chapters, each bound to an exact span of the source markup.
//!
//! ## Features
//!
//! - Flattens nested EPUB 2 (NCX) and EPUB 3 (nav) tables of contents
//! - Resolves TOC anchors to content spans in document order
//! - Repairs "title on its own page" layouts and split TOC fragments
//! - Classifies Parts and Chapters from markup, lexical and structural signals
//!
//! ## Quick Start
//!
//! ```no_run
//! use booksplit::epub::EpubBook;
//! use booksplit::{ExtractOptions, FrontMatter};
//!
//! let mut book = EpubBook::open("input.epub")?;
//! let extraction = book.extract(&FrontMatter, &ExtractOptions::default());
//! for node in extraction.hierarchy.flatten() {
//!     println!("{:?} {} ({} chars)", node.role, node.title, node.span.text_len());
//! }
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! ## Without an EPUB
//!
//! The pipeline only needs a TOC tree, a spine and something that returns
//! document markup by id:
//!
//! ```
//! use std::collections::HashMap;
//! use booksplit::{ExtractOptions, FrontMatter, TocNode, extract};
//!
//! let mut documents = HashMap::new();
//! documents.insert(
//!     "ch1.xhtml".to_string(),
//!     "<html><body><h1>Chapter 1</h1><p>It begins.</p></body></html>".to_string(),
//! );
//!
//! let toc = vec![TocNode::leaf("Chapter 1", "ch1.xhtml")];
//! let spine = vec!["ch1.xhtml".to_string()];
//! let extraction = extract(&toc, &spine, &mut documents, &FrontMatter, &ExtractOptions::default());
//! assert_eq!(extraction.hierarchy.len(), 1);
//! ```

pub mod coalesce;
pub mod document;
pub mod epub;
pub mod extract;
pub mod hierarchy;
pub mod merge;
pub mod patterns;
pub mod resolve;
pub mod span;
pub mod text;
pub mod toc;
pub(crate) mod util;

pub use document::{ContentDocument, DocumentCache, DocumentSource};
pub use extract::{ExtractOptions, Extraction, extract};
pub use hierarchy::{ChapterNode, FlatNode, Hierarchy, HierarchyNode, PartNode, PartSignal, Role};
pub use patterns::{FrontMatter, TitleClassifier, TitleRule};
pub use resolve::{Resolution, ResolvedSection, Section};
pub use span::{Origin, Segment, Span};
pub use toc::{TocEntry, TocNode, linearize};
