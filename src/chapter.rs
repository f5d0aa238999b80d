//! Chapter number extraction
//!
//! Turns free text pulled out of a listing page ("Capítulo 49-1", "Chapter 166",
//! "Ep. 12", "#30") into a [`ChapterCandidate`], rejecting digit noise that is
//! not a chapter number:
//! - calendar years (1900..=2100)
//! - oversized identifiers (above a per-strategy ceiling)
//! - non-positive and non-finite values
//!
//! # Examples
//!
//! ```
//! use manga_update_notifier::chapter::{extract_chapter, STRUCTURED_CEILING};
//!
//! let ch = extract_chapter("Capítulo 49-1", STRUCTURED_CEILING).unwrap();
//! assert_eq!(ch.value(), 49.1);
//!
//! assert!(extract_chapter("Published 2024", STRUCTURED_CEILING).is_none());
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Ceiling for values found inside chapter-listing markup
pub const STRUCTURED_CEILING: f64 = 10_000.0;

/// Ceiling for values found by scanning the whole page text
pub const TEXT_SCAN_CEILING: f64 = 3_000.0;

/// Inclusive band of values treated as calendar years
pub const YEAR_BAND: (f64, f64) = (1900.0, 2100.0);

/// A number token: digits, optionally followed by one `.`/`,`/`_`/`-` and more digits.
const NUMBER: &str = r"(\d+(?:[.,_\-]\d+)?)";

/// Marker words for "chapter"/"episode" plus the `#` marker, immediately followed by a number.
static MARKED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:\b(?:cap[ií]tulo|chapter|episod(?:e|io)|chap|cap|ch|ep)\.?|#)\s*{}",
        NUMBER
    ))
    .expect("marked chapter pattern")
});

static BARE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(NUMBER).expect("bare number pattern"));

/// Chapter slug inside a link target, e.g. `/manga/x/capitulo-49-1/` or `/chapter/12`.
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:cap[ií]tulo|chapter|episod(?:e|io)|chap|cap|ch|ep)[-_/]?(\d+(?:[-_.]\d+)?)(?:[/?#.]|$)")
        .expect("link chapter pattern")
});

/// A chapter number that survived noise filtering.
///
/// Always finite, strictly positive and outside the year band.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ChapterCandidate(f64);

impl ChapterCandidate {
    /// Wrap `value` if it is a plausible chapter number under `ceiling`.
    pub fn new(value: f64, ceiling: f64) -> Option<Self> {
        if is_plausible(value, ceiling) {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for ChapterCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_chapter(self.0))
    }
}

/// Noise filter shared by extraction and the library sanitizer.
pub fn is_plausible(value: f64, ceiling: f64) -> bool {
    value.is_finite()
        && value > 0.0
        && !(YEAR_BAND.0..=YEAR_BAND.1).contains(&value)
        && value <= ceiling
}

/// Parse a number token, reading `,` `_` `-` between two integers as the decimal point.
///
/// `"49-1"` -> 49.1, `"166_5"` -> 166.5, `"7,5"` -> 7.5
pub fn normalize_number(token: &str) -> Option<f64> {
    let normalized: String = token
        .trim()
        .chars()
        .map(|c| match c {
            ',' | '_' | '-' => '.',
            other => other,
        })
        .collect();
    normalized.parse::<f64>().ok()
}

/// Best candidate in a single text fragment.
///
/// A number right after a marker wins over any unmarked number. The first bare
/// number is only consulted when the fragment has no marker at all; a marked
/// number that fails filtering (`Chapter 2024`) makes the whole fragment noise.
pub fn extract_chapter(text: &str, ceiling: f64) -> Option<ChapterCandidate> {
    if text.trim().is_empty() {
        return None;
    }

    if MARKED_RE.is_match(text) {
        return MARKED_RE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| normalize_number(m.as_str()))
            .find_map(|v| ChapterCandidate::new(v, ceiling));
    }

    BARE_RE
        .find(text)
        .and_then(|m| normalize_number(m.as_str()))
        .and_then(|v| ChapterCandidate::new(v, ceiling))
}

/// Every marked chapter number in `text` that survives filtering.
///
/// Used when scanning a whole page, where a single fragment holds many chapters.
pub fn extract_all_marked(text: &str, ceiling: f64) -> Vec<ChapterCandidate> {
    MARKED_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| normalize_number(m.as_str()))
        .filter_map(|v| ChapterCandidate::new(v, ceiling))
        .collect()
}

/// Chapter number encoded in a link target, if the URL names one.
pub fn extract_from_link(href: &str, ceiling: f64) -> Option<ChapterCandidate> {
    LINK_RE
        .captures_iter(href)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| normalize_number(m.as_str()))
        .find_map(|v| ChapterCandidate::new(v, ceiling))
}

/// True if the link target names a chapter.
pub fn is_chapter_link(href: &str) -> bool {
    LINK_RE.is_match(href)
}

/// True if `text` carries a chapter marker followed by a number.
pub fn has_chapter_marker(text: &str) -> bool {
    MARKED_RE.is_match(text)
}

/// Largest candidate, if any.
pub fn max_candidate<I>(candidates: I) -> Option<ChapterCandidate>
where
    I: IntoIterator<Item = ChapterCandidate>,
{
    candidates
        .into_iter()
        .fold(None, |best: Option<ChapterCandidate>, c| match best {
            Some(b) if b.0 >= c.0 => Some(b),
            _ => Some(c),
        })
}

/// Human form of a chapter number: `166.0` -> `"166"`, `54.1` -> `"54.1"`.
pub fn format_chapter(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.3}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
