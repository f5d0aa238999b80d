//! TMO family (zonatmo, lectortmo). Each chapter is a collapsible list-group item
//! whose `<h4>` header carries "Capítulo N.NN"; uploads by several scan groups
//! repeat the same header.

use super::staged_extract;
use crate::chapter::ChapterCandidate;
use crate::error::ExtractionError;

const LISTING_SELECTORS: &[&str] = &[
    "#chapters li.list-group-item h4 a.btn-collapse",
    "#chapters li.list-group-item h4",
    "li.upload-link h4",
    "#chapters a[href*='/view_uploads/']",
];

pub fn parse_latest(html: &str) -> Result<ChapterCandidate, ExtractionError> {
    staged_extract(html, "zonatmo", LISTING_SELECTORS)
}
