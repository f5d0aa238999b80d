//! MangaThemesia / MangaStream theme (rizzfables, drakecomic, madarascans).
//! `#chapterlist` rows carry a `data-num` attribute next to a `.chapternum` label.

use super::staged_extract;
use crate::chapter::ChapterCandidate;
use crate::error::ExtractionError;

const LISTING_SELECTORS: &[&str] = &[
    "div#chapterlist li .chapternum",
    "div.eplister li .epl-num",
    "div#chapterlist a",
    "div.eplister a",
    "div.bxcl a",
    "ul.clstyle a",
    "div.chbox a",
];

pub fn parse_latest(html: &str) -> Result<ChapterCandidate, ExtractionError> {
    staged_extract(html, "mangastream", LISTING_SELECTORS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapternum_labels() {
        let html = r#"<html><body><div class="eplister" id="chapterlist"><ul class="clstyle">
            <li data-num="88"><div class="chbox"><div class="eph-num">
              <a href="https://rizzfables.com/chapter/x-chapter-88/">
                <span class="chapternum">Chapter 88</span>
                <span class="chapterdate">January 5, 2025</span></a></div></div></li>
            <li data-num="87"><div class="chbox"><div class="eph-num">
              <a href="https://rizzfables.com/chapter/x-chapter-87/">
                <span class="chapternum">Chapter 87</span></a></div></div></li>
        </ul></div></body></html>"#;
        assert_eq!(parse_latest(html).unwrap().value(), 88.0);
    }
}
