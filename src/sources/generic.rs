//! Fallback for hosts without a dedicated parser.
//!
//! Tries the listing markup of the common WordPress reader themes first, since
//! most unknown hosts are clones of one of them, then relies on the shared link
//! and text stages.

use super::staged_extract;
use crate::chapter::ChapterCandidate;
use crate::error::ExtractionError;

const LISTING_SELECTORS: &[&str] = &[
    "li.wp-manga-chapter a",
    "div#chapterlist li .chapternum",
    "div.eplister a",
    "ul.chapter-list a",
    "div.chapter-list a",
    "li.chapter a",
    "div.chapters-list a",
    "ul.list-chapters a",
    "div.chapter-item a",
    "a.chapter",
];

pub fn parse_latest(html: &str) -> Result<ChapterCandidate, ExtractionError> {
    staged_extract(html, "generic", LISTING_SELECTORS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_madara_clone() {
        let html = r#"<html><body><ul>
            <li class="wp-manga-chapter"><a href="/m/capitulo-9/">Capítulo 9</a></li>
            <li class="wp-manga-chapter"><a href="/m/capitulo-10/">Capítulo 10</a></li>
        </ul></body></html>"#;
        assert_eq!(parse_latest(html).unwrap().value(), 10.0);
    }

    #[test]
    fn test_text_scan_last_resort() {
        let html = r#"<html><head><script>window.__ID = 2087654;</script></head>
            <body><div class="latest">Último: Capítulo 45 (2024)</div>
            <p>Serie iniciada en 2019. Chapter 44 ya disponible.</p></body></html>"#;
        assert_eq!(parse_latest(html).unwrap().value(), 45.0);
    }

    #[test]
    fn test_text_scan_uses_tight_ceiling() {
        let html = "<html><body><p>Chapter 4200 of the archive</p></body></html>";
        assert!(parse_latest(html).is_err());
    }

    #[test]
    fn test_noise_only_page() {
        let html = "<html><body><p>Published 2024, issue #2087654</p></body></html>";
        assert!(matches!(
            parse_latest(html),
            Err(ExtractionError::NoCandidate { parser: "generic" })
        ));
    }
}
