//! Delivery of a finished run's report.
//!
//! A sink receives the whole [`ChangeReport`] and decides how to present it.
//! Updates and warnings always travel as separate messages so a failure list
//! is never mistaken for a change summary.

pub mod discord;

use crate::error::NotifyError;
use crate::report::ChangeReport;
use async_trait::async_trait;

pub use discord::DiscordSink;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, report: &ChangeReport) -> Result<(), NotifyError>;
}

/// Titled blocks of text, in delivery order
pub fn render_sections(report: &ChangeReport, include_unchanged: bool) -> Vec<String> {
    let mut sections = Vec::new();

    if report.updates.is_empty() {
        sections.push(format!(
            "No new chapters. {} series checked without changes.",
            report.unchanged.len()
        ));
    } else {
        sections.push(format!("**New chapters**\n{}", report.updates.join("\n")));
    }

    if !report.warnings.is_empty() {
        sections.push(format!("**Warnings**\n{}", report.warnings.join("\n")));
    }

    if include_unchanged && !report.unchanged.is_empty() {
        sections.push(format!("**Unchanged**\n{}", report.unchanged.join("\n")));
    }

    sections
}

/// Writes the report through the logger; used when no webhook is configured.
pub struct LogSink {
    pub include_unchanged: bool,
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, report: &ChangeReport) -> Result<(), NotifyError> {
        for section in render_sections(report, self.include_unchanged) {
            for line in section.lines() {
                log::info!("{}", line);
            }
        }
        Ok(())
    }
}
