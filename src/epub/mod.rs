mod parser;
mod reader;

pub use parser::{
    ManifestItem, Metadata, Package, SpineItem, parse_container_xml, parse_nav, parse_ncx,
    parse_opf,
};
pub use reader::{EpubBook, TocFormat, ZipSource};
