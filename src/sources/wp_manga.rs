//! WP-Manga / Madara theme (bokugents, mangasnosekai, m440 and their clones).
//!
//! Chapters sit in `<li class="wp-manga-chapter"><a>Capítulo N</a></li>`. The list
//! order flips between ascending and descending across themes, so the maximum
//! is taken rather than the first row.

use super::staged_extract;
use crate::chapter::ChapterCandidate;
use crate::error::ExtractionError;

const LISTING_SELECTORS: &[&str] = &[
    "li.wp-manga-chapter a",
    "ul.main.version-chap li a",
    "ul.version-chap a",
    "div.listing-chapters_wrap a",
    "div.page-content-listing a[href*='capitulo']",
    "div.page-content-listing a[href*='chapter']",
    // "Read first / Read last" buttons when the list is loaded over AJAX
    "a#btn-read-last",
    "a#btn-read-first",
];

pub fn parse_latest(html: &str) -> Result<ChapterCandidate, ExtractionError> {
    staged_extract(html, "wp-manga", LISTING_SELECTORS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_takes_max_of_unordered_list() {
        let html = r#"<html><body><ul class="main version-chap">
            <li class="wp-manga-chapter"><a href="https://m440.in/manga/x/capitulo-52/">Capítulo 52</a>
                <span class="chapter-release-date">12/03/2024</span></li>
            <li class="wp-manga-chapter"><a href="https://m440.in/manga/x/capitulo-54-1/">Capítulo 54.1</a></li>
            <li class="wp-manga-chapter"><a href="https://m440.in/manga/x/capitulo-53/">Capítulo 53</a></li>
        </ul></body></html>"#;
        assert_eq!(parse_latest(html).unwrap().value(), 54.1);
    }

    #[test]
    fn test_label_from_link_when_text_is_blank() {
        let html = r#"<html><body><ul>
            <li class="wp-manga-chapter"><a href="https://bokugents.com/series/y/capitulo-49-1/"> </a></li>
        </ul></body></html>"#;
        assert_eq!(parse_latest(html).unwrap().value(), 49.1);
    }

    #[test]
    fn test_read_last_button() {
        let html = r#"<html><body><div id="manga-chapters-holder" data-id="77"></div>
            <a id="btn-read-last" href="https://mangasnosekai.com/manga/z/capitulo-120/">Leer último</a>
            <a id="btn-read-first" href="https://mangasnosekai.com/manga/z/capitulo-1/">Leer primero</a>
        </body></html>"#;
        assert_eq!(parse_latest(html).unwrap().value(), 120.0);
    }

    #[test]
    fn test_no_listing_fails() {
        let html = "<html><body><p>Publicado 2024</p></body></html>";
        assert!(matches!(
            parse_latest(html),
            Err(ExtractionError::NoCandidate { parser: "wp-manga" })
        ));
    }
}
