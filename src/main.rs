//! booksplit - Recover Part/Chapter structure from EPUB files

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use booksplit::epub::EpubBook;
use booksplit::text::plain_text;
use booksplit::{ExtractOptions, Extraction, FrontMatter, HierarchyNode, Role};

#[derive(Parser)]
#[command(name = "booksplit")]
#[command(version, about = "Recover Part/Chapter structure from EPUB files", long_about = None)]
#[command(after_help = "EXAMPLES:
    booksplit book.epub              Print the Part/Chapter tree
    booksplit --json book.epub       Emit the hierarchy as JSON
    booksplit --entries book.epub    Show the linearized table of contents")]
struct Cli {
    /// Input EPUB file
    #[arg(value_name = "BOOK")]
    input: String,

    /// Emit the extraction as JSON
    #[arg(long, conflicts_with = "entries")]
    json: bool,

    /// Print the linearized TOC entries instead of the hierarchy
    #[arg(long)]
    entries: bool,

    /// Print the plain text of every node
    #[arg(long, conflicts_with = "json")]
    text: bool,

    /// Plain-text length under which a section counts as blank
    #[arg(long, value_name = "CHARS", default_value_t = 100)]
    threshold: usize,

    /// Spine documents a blank section may absorb
    #[arg(long, value_name = "DOCS", default_value_t = 2)]
    lookahead: usize,

    /// Log merge and classification decisions
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let mut book = EpubBook::open(&cli.input).map_err(|e| format!("{}: {e}", cli.input))?;
    let options = ExtractOptions::default()
        .with_blank_threshold(cli.threshold)
        .with_blank_lookahead(cli.lookahead);
    let extraction = book.extract(&FrontMatter, &options);

    if cli.json {
        let json = serde_json::to_string_pretty(&extraction).map_err(|e| e.to_string())?;
        println!("{json}");
        return Ok(());
    }

    let meta = book.metadata();
    println!("File: {}", cli.input);
    println!("Title: {}", meta.title);
    if !meta.authors.is_empty() {
        println!("Authors: {}", meta.authors.join(", "));
    }
    if !meta.language.is_empty() {
        println!("Language: {}", meta.language);
    }
    println!("TOC: {:?}", book.toc_format());
    println!();

    if cli.entries {
        print_entries(&extraction);
    } else {
        print_hierarchy(&extraction, cli.text);
    }
    Ok(())
}

fn print_entries(extraction: &Extraction) {
    for entry in &extraction.entries {
        let indent = "  ".repeat(entry.depth.saturating_sub(1));
        let hint = if entry.container_hint { " [container]" } else { "" };
        println!("{indent}{}{hint}  -> {}", entry.title, entry.origin());
    }
}

fn print_hierarchy(extraction: &Extraction, with_text: bool) {
    if extraction.spine_fallback {
        println!("(no table of contents, using spine order)");
    }

    for node in extraction.hierarchy.flatten() {
        let indent = if node.role == Role::Chapter { "    " } else { "" };
        let marker = match node.role {
            Role::Part => "Part",
            Role::Chapter | Role::StandaloneChapter => "Chapter",
        };
        let empty = if node.empty { ", empty" } else { "" };
        println!(
            "{indent}{marker}: {} ({} chars{empty})",
            node.title,
            node.span.text_len()
        );
        if with_text {
            let text = plain_text(&node.span.markup());
            if !text.is_empty() {
                println!("{indent}    {text}");
            }
        }
    }

    let review: Vec<_> = extraction
        .hierarchy
        .nodes()
        .iter()
        .flat_map(|node| match node {
            HierarchyNode::Part(part) => {
                let mut flagged = vec![(part.title.as_str(), part.resolution)];
                flagged.extend(part.chapters.iter().map(|c| (c.title.as_str(), c.resolution)));
                flagged
            }
            HierarchyNode::Chapter(chapter) => vec![(chapter.title.as_str(), chapter.resolution)],
        })
        .filter(|(_, resolution)| resolution.needs_review())
        .collect();

    if !review.is_empty() {
        println!();
        println!("Needs review:");
        for (title, resolution) in review {
            println!("  {title}: {resolution:?}");
        }
    }
}
