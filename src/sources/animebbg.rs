//! AnimeBBG (XenForo). Chapters are resource-album cards whose title reads
//! "Capítulo N"; the thread page mixes in post bodies full of stray numbers.

use super::staged_extract;
use crate::chapter::ChapterCandidate;
use crate::error::ExtractionError;

const LISTING_SELECTORS: &[&str] = &[
    ".structItem--resourceAlbum .structItem-title",
    ".structItem--resource .structItem-title",
    ".structItem-title",
];

pub fn parse_latest(html: &str) -> Result<ChapterCandidate, ExtractionError> {
    staged_extract(html, "animebbg", LISTING_SELECTORS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_album_titles() {
        let html = r#"<html><body><div class="structItemContainer">
            <div class="structItem structItem--resourceAlbum">
              <div class="structItem-title"><a href="/resources/a.1/">Capítulo 23</a>
                <span class="label">Nuevo</span></div>
              <div class="structItem-minor">Publicado 2024</div>
            </div>
            <div class="structItem structItem--resourceAlbum">
              <div class="structItem-title"><a href="/resources/b.2/">Capítulo 24</a></div>
            </div>
        </div></body></html>"#;
        assert_eq!(parse_latest(html).unwrap().value(), 24.0);
    }

    #[test]
    fn test_year_only_thread_fails() {
        let html = r#"<html><body><div class="structItem-title">Temporada 2023</div>
            <article>Published 2024, issue #2087654</article></body></html>"#;
        assert!(parse_latest(html).is_err());
    }
}
