use crate::chapter::{format_chapter, ChapterCandidate};
use crate::models::{ReconciliationOutcome, TrackedSource};
use std::fmt;

/// Why no candidate was observed for a source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFailure {
    Fetch(String),
    Extraction(String),
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFailure::Fetch(reason) => write!(f, "fetch failed: {}", reason),
            SourceFailure::Extraction(reason) => write!(f, "extraction failed: {}", reason),
        }
    }
}

/// What one fetch-and-parse pass produced for a source
pub type Observation = Result<ChapterCandidate, SourceFailure>;

/// Compare an observation with the stored baseline, advancing it only on a strict increase.
///
/// Failures never touch `last_chapter`. A lower value than stored (site renumbering,
/// a stale mirror) is reported as unchanged at the stored value.
pub fn reconcile(source: &mut TrackedSource, observation: &Observation) -> ReconciliationOutcome {
    let observed = match observation {
        Ok(candidate) => candidate.value(),
        Err(SourceFailure::Fetch(reason)) => {
            return ReconciliationOutcome::FetchFailed { reason: reason.clone() }
        }
        Err(SourceFailure::Extraction(reason)) => {
            return ReconciliationOutcome::ExtractionFailed { reason: reason.clone() }
        }
    };

    match source.last_chapter {
        None => {
            source.last_chapter = Some(observed);
            ReconciliationOutcome::Updated { old: None, new: observed }
        }
        Some(stored) if observed > stored => {
            source.last_chapter = Some(observed);
            ReconciliationOutcome::Updated { old: Some(stored), new: observed }
        }
        Some(stored) => {
            if observed < stored {
                log::debug!(
                    "{}: page shows {} below stored {}, keeping stored value",
                    source.display_name(),
                    format_chapter(observed),
                    format_chapter(stored)
                );
            }
            ReconciliationOutcome::Unchanged { current: stored }
        }
    }
}
