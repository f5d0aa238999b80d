use crate::chapter::format_chapter;
use crate::error::PersistenceError;
use crate::models::{ReconciliationOutcome, SourceOutcome};

/// Human-readable lines for one run, split by kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeReport {
    pub updates: Vec<String>,
    pub warnings: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ChangeReport {
    /// One line per outcome, in the order the outcomes are given
    pub fn from_outcomes(outcomes: &[SourceOutcome]) -> Self {
        let mut report = Self::default();
        for o in outcomes {
            match &o.outcome {
                ReconciliationOutcome::Updated { old, new } => {
                    let from = old.map(format_chapter).unwrap_or_else(|| "0".to_string());
                    let first = if old.is_none() { " (first check)" } else { "" };
                    report.updates.push(format!(
                        "[NEW] {}: {} -> {}{} | {}",
                        o.name,
                        from,
                        format_chapter(*new),
                        first,
                        o.url
                    ));
                }
                ReconciliationOutcome::Unchanged { current } => {
                    report
                        .unchanged
                        .push(format!("[OK] {}: {} | {}", o.name, format_chapter(*current), o.url));
                }
                ReconciliationOutcome::FetchFailed { reason } => {
                    report
                        .warnings
                        .push(format!("[WARN] {}: fetch failed: {} | {}", o.name, reason, o.url));
                }
                ReconciliationOutcome::ExtractionFailed { reason } => {
                    report
                        .warnings
                        .push(format!("[WARN] {}: {} | {}", o.name, reason, o.url));
                }
            }
        }
        report
    }

    /// Record sources left unchecked by an interrupt
    pub fn note_interrupted(&mut self, unchecked: usize) {
        if unchecked > 0 {
            self.warnings
                .push(format!("[WARN] run interrupted: {} sources not checked", unchecked));
        }
    }

    /// The library could not be written, so this run's updates will be detected again
    pub fn note_save_failure(&mut self, error: &PersistenceError) {
        self.warnings.push(format!(
            "[WARN] library not saved: {} ({} will be reported again next run)",
            error,
            if self.updates.is_empty() { "nothing" } else { "new chapters above" }
        ));
    }

    pub fn has_updates(&self) -> bool {
        !self.updates.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.warnings.is_empty() && self.unchanged.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, outcome: ReconciliationOutcome) -> SourceOutcome {
        SourceOutcome {
            name: name.to_string(),
            url: format!("https://site/{}", name),
            outcome,
        }
    }

    #[test]
    fn test_lines_by_kind() {
        let report = ChangeReport::from_outcomes(&[
            outcome("A", ReconciliationOutcome::Updated { old: Some(165.0), new: 166.0 }),
            outcome("B", ReconciliationOutcome::Updated { old: None, new: 12.5 }),
            outcome("C", ReconciliationOutcome::Unchanged { current: 54.0 }),
            outcome("D", ReconciliationOutcome::FetchFailed { reason: "timeout after 30s".into() }),
            outcome(
                "E",
                ReconciliationOutcome::ExtractionFailed { reason: "no chapter number found by madara parser".into() },
            ),
        ]);

        assert_eq!(
            report.updates,
            vec![
                "[NEW] A: 165 -> 166 | https://site/A",
                "[NEW] B: 0 -> 12.5 (first check) | https://site/B",
            ]
        );
        assert_eq!(report.unchanged, vec!["[OK] C: 54 | https://site/C"]);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.warnings[0], "[WARN] D: fetch failed: timeout after 30s | https://site/D");
        assert!(report.warnings[1].starts_with("[WARN] E: no chapter number"));
    }

    #[test]
    fn test_save_failure_goes_to_warnings() {
        let mut report = ChangeReport {
            updates: vec!["[NEW] A: 1 -> 2 | u".into()],
            ..ChangeReport::default()
        };
        let err = PersistenceError::Write {
            path: "/ro/lib.yml.tmp".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        };
        report.note_save_failure(&err);
        assert_eq!(report.updates.len(), 1);
        assert_eq!(
            report.warnings,
            vec!["[WARN] library not saved: Cannot write /ro/lib.yml.tmp: read-only (new chapters above will be reported again next run)"]
        );
    }

    #[test]
    fn test_interrupted_note() {
        let mut report = ChangeReport::default();
        report.note_interrupted(0);
        assert!(report.is_empty());
        report.note_interrupted(3);
        assert_eq!(report.warnings, vec!["[WARN] run interrupted: 3 sources not checked"]);
        assert!(!report.has_updates());
    }
}
