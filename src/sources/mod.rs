//! Per-site chapter parsers
//!
//! Every supported site family gets a module exposing a [`ParserFn`]. The
//! [`ParserRegistry`] maps a site hint or URL host to one of them, falling back
//! to [`generic`] for hosts nobody registered. Supporting a new site is one
//! [`ParserEntry`] in [`ParserRegistry::builtin`] (or a [`ParserRegistry::register`]
//! call); dispatch, reconciliation and reporting stay untouched.
//!
//! All parsers share [`staged_extract`]: precise listing selectors first, then
//! any chapter-looking link, then the visible page text.

pub mod animebbg;
pub mod generic;
pub mod mangastream;
pub mod wp_manga;
pub mod zonatmo;

use crate::chapter::{
    extract_all_marked, extract_chapter, extract_from_link, has_chapter_marker, is_chapter_link,
    max_candidate, ChapterCandidate, STRUCTURED_CEILING, TEXT_SCAN_CEILING,
};
use crate::error::ExtractionError;
use scraper::{ElementRef, Html, Selector};

/// Extracts the highest plausible chapter number from a page's HTML.
pub type ParserFn = fn(&str) -> Result<ChapterCandidate, ExtractionError>;

/// Markup families the parsers target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserFamily {
    /// Themed chapter-listing blocks (Madara, MangaThemesia, TMO)
    TemplatedListing,
    /// Forum threads where each chapter is a title card (XenForo)
    ForumThread,
    /// Regex scanning for hosts without a dedicated parser
    GenericFallback,
}

/// A `(match key, parser)` pair.
#[derive(Clone)]
pub struct ParserEntry {
    pub name: &'static str,
    /// Domains this parser serves; a host matches on equality or subdomain
    pub domains: &'static [&'static str],
    /// Whole tokens matched against the source's site hint
    pub hints: &'static [&'static str],
    pub family: ParserFamily,
    pub parse: ParserFn,
}

impl std::fmt::Debug for ParserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserEntry")
            .field("name", &self.name)
            .field("domains", &self.domains)
            .field("family", &self.family)
            .finish()
    }
}

impl ParserEntry {
    /// `hint` is lowercase; it matches when one of its tokens (split on
    /// anything but letters, digits and `-`) equals a registered hint, so
    /// `bokugents.com` matches `bokugents` but `madarascans` never matches `madara`.
    fn matches_hint(&self, hint: &str) -> bool {
        hint.split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .filter(|token| !token.is_empty())
            .any(|token| self.hints.iter().any(|h| *h == token))
    }

    fn matches_host(&self, host: &str) -> bool {
        self.domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }
}

/// Ordered table of site parsers plus the fallback.
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    entries: Vec<ParserEntry>,
    fallback: ParserEntry,
}

impl ParserRegistry {
    /// Registry with every site this crate knows about
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                ParserEntry {
                    name: "wp-manga",
                    domains: &["bokugents.com", "mangasnosekai.com", "m440.in"],
                    hints: &["bokugents", "mangasnosekai", "m440", "madara", "wp-manga"],
                    family: ParserFamily::TemplatedListing,
                    parse: wp_manga::parse_latest,
                },
                ParserEntry {
                    name: "zonatmo",
                    domains: &["zonatmo.com", "lectortmo.com", "visortmo.com"],
                    hints: &["zonatmo", "lectortmo", "visortmo"],
                    family: ParserFamily::TemplatedListing,
                    parse: zonatmo::parse_latest,
                },
                ParserEntry {
                    name: "animebbg",
                    domains: &["animebbg.net"],
                    hints: &["animebbg", "xenforo"],
                    family: ParserFamily::ForumThread,
                    parse: animebbg::parse_latest,
                },
                ParserEntry {
                    name: "mangastream",
                    domains: &["rizzfables.com", "drakecomic.org", "madarascans.com"],
                    hints: &["mangastream", "themesia", "rizzfables", "drakecomic", "madarascans"],
                    family: ParserFamily::TemplatedListing,
                    parse: mangastream::parse_latest,
                },
            ],
            fallback: ParserEntry {
                name: "generic",
                domains: &[],
                hints: &["generic"],
                family: ParserFamily::GenericFallback,
                parse: generic::parse_latest,
            },
        }
    }

    /// Add a site; later registrations take precedence over earlier ones.
    pub fn register(&mut self, entry: ParserEntry) {
        self.entries.insert(0, entry);
    }

    /// Pick the parser for a source: a matching hint wins, then the URL host,
    /// then the generic fallback.
    pub fn select(&self, host: &str, hint: Option<&str>) -> &ParserEntry {
        let hint = hint.map(|h| h.trim().to_lowercase()).unwrap_or_default();
        if !hint.is_empty() {
            if let Some(entry) = self.entries.iter().find(|e| e.matches_hint(&hint)) {
                return entry;
            }
        }

        let host = host.trim().to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        self.entries
            .iter()
            .find(|e| e.matches_host(host))
            .unwrap_or(&self.fallback)
    }

    pub fn entries(&self) -> &[ParserEntry] {
        &self.entries
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Collapse whitespace runs to single spaces
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the page minus script/style contents
pub(crate) fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
                .map(|name| matches!(name.as_str(), "script" | "style" | "noscript" | "template"))
                .unwrap_or(false);
            if !hidden {
                out.push_str(text);
                out.push(' ');
            }
        }
    }
    out
}

/// Stage 1: listing selectors, most specific first. Stops at the first selector
/// whose elements yield a candidate.
fn narrow_stage(document: &Html, selectors: &[&str]) -> Option<ChapterCandidate> {
    for sel in selectors {
        let selector = match Selector::parse(sel) {
            Ok(s) => s,
            Err(_) => {
                log::warn!("Skipping invalid selector {}", sel);
                continue;
            }
        };
        let found = max_candidate(document.select(&selector).filter_map(|el| {
            let text = element_text(&el);
            extract_chapter(&text, STRUCTURED_CEILING).or_else(|| {
                el.value()
                    .attr("href")
                    .and_then(|href| extract_from_link(href, STRUCTURED_CEILING))
            })
        }));
        if found.is_some() {
            log::debug!("Chapter found with selector {}", sel);
            return found;
        }
    }
    None
}

/// Stage 2: any link whose text or target looks like a chapter.
fn anchor_stage(document: &Html) -> Option<ChapterCandidate> {
    let selector = Selector::parse("a").ok()?;
    max_candidate(document.select(&selector).filter_map(|a| {
        let text = element_text(&a);
        let href = a.value().attr("href").unwrap_or("");
        if has_chapter_marker(&text) {
            extract_chapter(&text, STRUCTURED_CEILING)
        } else if is_chapter_link(href) {
            extract_from_link(href, STRUCTURED_CEILING)
        } else {
            None
        }
    }))
}

/// Stage 3: every marked number in the visible text, under the tighter ceiling.
fn text_stage(document: &Html) -> Option<ChapterCandidate> {
    max_candidate(extract_all_marked(&visible_text(document), TEXT_SCAN_CEILING))
}

/// Run the three stages, widening only when the narrower one finds nothing.
pub fn staged_extract(
    html: &str,
    parser: &'static str,
    narrow_selectors: &[&str],
) -> Result<ChapterCandidate, ExtractionError> {
    if html.trim().is_empty() {
        return Err(ExtractionError::EmptyPage);
    }
    let document = Html::parse_document(html);

    if let Some(c) = narrow_stage(&document, narrow_selectors) {
        return Ok(c);
    }
    if let Some(c) = anchor_stage(&document) {
        log::debug!("{}: listing selectors empty, took chapter {} from links", parser, c);
        return Ok(c);
    }
    if let Some(c) = text_stage(&document) {
        log::debug!("{}: no chapter links, took chapter {} from page text", parser, c);
        return Ok(c);
    }
    Err(ExtractionError::NoCandidate { parser })
}
