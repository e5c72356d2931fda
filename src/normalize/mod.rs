//! Text normalization for identity matching and result grouping.
//!
//! `normalize` produces the canonical comparison form of a free-text title or
//! artist string. `normalize_album_title` additionally strips edition
//! qualifiers ("Deluxe", "Remastered", ...) so that variant releases of the
//! same album group together. Both functions are deterministic and
//! idempotent; callers rely on `normalize(normalize(x)) == normalize(x)`.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Edition qualifiers stripped during album-title normalization. The word
/// list is also used by the deduplicator to penalize variant-release titles.
pub const EDITION_QUALIFIERS: &[&str] = &[
    "deluxe",
    "clean",
    "explicit",
    "remastered",
    "remaster",
    "expanded",
    "edition",
    "version",
    "single",
    "ep",
    "anniversary",
    "special",
    "limited",
    "bonus",
    "digital",
    "vinyl",
    "cd",
    "extended",
    "complete",
    "ultimate",
    "platinum",
    "gold",
    "collector's",
    "collectors",
];

lazy_static! {
    /// Parenthesized or bracketed segment containing an edition qualifier,
    /// e.g. "(Deluxe Edition)", "[2014 Remaster]".
    static ref PAREN_QUALIFIER: Regex = Regex::new(&format!(
        r"\s*[(\[][^)\]]*\b(?:{})\b[^)\]]*[)\]]",
        qualifier_alternation()
    ))
    .unwrap();

    /// Trailing dash-suffix containing an edition qualifier,
    /// e.g. "Album - Deluxe", "Album – 2014 remaster".
    static ref DASH_QUALIFIER: Regex = Regex::new(&format!(
        r"\s*[-–—][^-–—]*\b(?:{})\b[^-–—]*$",
        qualifier_alternation()
    ))
    .unwrap();

    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

fn qualifier_alternation() -> String {
    EDITION_QUALIFIERS
        .iter()
        .map(|q| regex::escape(q))
        .collect::<Vec<_>>()
        .join("|")
}

/// Typographic apostrophe variants folded to the ASCII apostrophe.
const APOSTROPHE_VARIANTS: [char; 5] = ['\u{2018}', '\u{2019}', '\u{02BC}', '\u{00B4}', '\u{0060}'];

/// Unicode combining marks (diacritics) dropped after NFKD decomposition.
fn is_combining_mark(c: char) -> bool {
    matches!(
        c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F
    )
}

/// Canonicalize a title or artist string for comparison.
///
/// Lowercases, strips diacritics, folds typographic apostrophes, trims and
/// collapses whitespace. The result carries no semantic changes: "Café" and
/// "cafe" normalize identically, but distinct songs stay distinct.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| {
            if APOSTROPHE_VARIANTS.contains(&c) {
                '\''
            } else {
                c
            }
        })
        .collect();
    WHITESPACE_RUN
        .replace_all(stripped.trim(), " ")
        .to_string()
}

/// Album-title normalization: `normalize` plus edition-qualifier stripping.
///
/// Only used for album-level grouping; song identity matching keeps the raw
/// normalized title, since a qualifier can be part of a song's actual name.
pub fn normalize_album_title(text: &str) -> String {
    let base = normalize(text);
    let without_parens = PAREN_QUALIFIER.replace_all(&base, "");
    let without_dash = DASH_QUALIFIER.replace_all(&without_parens, "");
    let trimmed = WHITESPACE_RUN
        .replace_all(without_dash.trim(), " ")
        .to_string();
    // A title that was nothing but qualifiers keeps its normalized form
    // rather than collapsing to the empty string.
    if trimmed.is_empty() {
        base
    } else {
        trimmed
    }
}
