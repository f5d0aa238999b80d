use crate::chapter::{format_chapter, is_plausible, TEXT_SCAN_CEILING};
use crate::models::Library;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// Stored value could not be a chapter number and was cleared
    Invalid,
    /// Stored value was rewritten to its canonical precision
    Normalized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanupChange {
    pub name: String,
    pub old: f64,
    pub new: Option<f64>,
    pub reason: CleanupReason,
}

impl fmt::Display for CleanupChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.reason, self.new) {
            (CleanupReason::Normalized, Some(new)) => write!(
                f,
                "{}: {} -> {} (normalized)",
                self.name,
                self.old,
                format_chapter(new)
            ),
            _ => write!(f, "{}: {} -> null (invalid)", self.name, self.old),
        }
    }
}

/// Integral values stay integral, fractional ones keep one decimal
fn canonical(value: f64) -> f64 {
    if value.fract() == 0.0 {
        value
    } else {
        (value * 10.0).round() / 10.0
    }
}

/// Clear implausible `last_chapter` values and normalize the rest in place.
///
/// Uses the strict text-scan ceiling: anything above it in a stored baseline
/// came from an earlier mis-extraction.
pub fn sanitize(library: &mut Library) -> Vec<CleanupChange> {
    let mut changes = Vec::new();
    for source in &mut library.series {
        let Some(old) = source.last_chapter else {
            continue;
        };
        if !is_plausible(old, TEXT_SCAN_CEILING) {
            source.last_chapter = None;
            changes.push(CleanupChange {
                name: source.display_name().to_string(),
                old,
                new: None,
                reason: CleanupReason::Invalid,
            });
            continue;
        }
        let new = canonical(old);
        if new != old {
            source.last_chapter = Some(new);
            changes.push(CleanupChange {
                name: source.display_name().to_string(),
                old,
                new: Some(new),
                reason: CleanupReason::Normalized,
            });
        }
    }
    changes
}
