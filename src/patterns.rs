//! Lexical title rules.
//!
//! Every title heuristic used by the pipeline lives in one table so the
//! rules can be audited and tested in isolation. Rules are evaluated in the
//! fixed order of [`TitleRule::ALL`].

use std::sync::LazyLock;

use regex::Regex;

/// A named lexical rule over section titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "snake_case"))]
pub enum TitleRule {
    /// "Part" followed by a roman numeral, digit, or spelled-out number
    /// ("Part II", "PART 3:", "Part One -", "P A R T  Four").
    PartLabel,
    /// A structural keyword at the start ("Chapter 4", "Epilogue", "Appendix: ...").
    HeadingKeyword,
    /// A roman numeral prefix followed by a separator ("IV: The Storm", "ii. Home").
    RomanPrefix,
    /// A numeric prefix followed by a separator or space ("1. Start", "12 Rules").
    NumericPrefix,
}

impl TitleRule {
    /// Evaluation order.
    pub const ALL: [TitleRule; 4] = [
        TitleRule::PartLabel,
        TitleRule::HeadingKeyword,
        TitleRule::RomanPrefix,
        TitleRule::NumericPrefix,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TitleRule::PartLabel => "part-label",
            TitleRule::HeadingKeyword => "heading-keyword",
            TitleRule::RomanPrefix => "roman-prefix",
            TitleRule::NumericPrefix => "numeric-prefix",
        }
    }

    /// Does `title` satisfy this rule?
    pub fn matches(self, title: &str) -> bool {
        self.regex().is_match(title.trim())
    }

    fn regex(self) -> &'static Regex {
        match self {
            TitleRule::PartLabel => &PART_LABEL,
            TitleRule::HeadingKeyword => &HEADING_KEYWORD,
            TitleRule::RomanPrefix => &ROMAN_PREFIX,
            TitleRule::NumericPrefix => &NUMERIC_PREFIX,
        }
    }
}

const NUMBER_WORDS: &str = "one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|\
thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty|\
first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|last|final";

static PART_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^(?:part|p\s+a\s+r\s+t)\s+(?:[ivxlcdm]+|\d+|{NUMBER_WORDS})(?:\s*[:.\-–—]|\s|$)"
    ))
    .expect("part label pattern compiles")
});

static HEADING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:chapter|part|section|book|volume|preface|foreword|introduction|prologue|epilogue|afterword|conclusion|appendix)\b",
    )
    .expect("heading keyword pattern compiles")
});

static ROMAN_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[ivxlcdm]+\s*[:.\-–—]").expect("roman prefix pattern compiles")
});

static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:\s*[:.\-–—]|\s+)").expect("numeric prefix pattern compiles")
});

/// First rule in evaluation order that `title` satisfies.
pub fn classify(title: &str) -> Option<TitleRule> {
    TitleRule::ALL.into_iter().find(|rule| rule.matches(title))
}

/// "Part <label>" titles force Part classification.
pub fn is_part_title(title: &str) -> bool {
    TitleRule::PartLabel.matches(title)
}

/// Titles that announce a new chapter or part, and therefore must never be
/// absorbed as continuation content.
pub fn is_heading_like(title: &str) -> bool {
    classify(title).is_some()
}

/// Case-insensitive, whitespace-normalized title used for duplicate detection.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Decides whether a title denotes front/back matter rather than narrative.
pub trait TitleClassifier {
    fn is_non_narrative(&self, title: &str) -> bool;
}

impl<F> TitleClassifier for F
where
    F: Fn(&str) -> bool,
{
    fn is_non_narrative(&self, title: &str) -> bool {
        self(title)
    }
}

/// Default classifier recognising common front and back matter titles.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontMatter;

static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:the\s+)?(?:copyright|acknowledge?ments?|praise\b|dedication|(?:table\s+of\s+)?contents\b|title\s*page|half\s*title|cover\b|also\s+by|other\s+books\s+by|about\s+the\s+(?:author|publisher)|index\b|bibliography|colophon)",
    )
    .expect("front matter pattern compiles")
});

impl TitleClassifier for FrontMatter {
    fn is_non_narrative(&self, title: &str) -> bool {
        FRONT_MATTER.is_match(title.trim())
    }
}
