use crate::models::{Library, ReconciliationOutcome, SourceOutcome, TrackedSource};
use crate::politeness::{HostPacer, PolitenessConfig};
use crate::reconcile::{reconcile, Observation, SourceFailure};
use crate::report::ChangeReport;
use crate::source_utils::PageFetcher;
use crate::sources::ParserRegistry;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// Run-wide interrupt, checked before each source is started
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancel on Ctrl-C; sources already in flight finish normally.
    pub fn cancel_on_ctrl_c(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, finishing sources in flight");
                flag.cancel();
            }
        });
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Sources processed at the same time
    pub concurrency: usize,
    pub politeness: PolitenessConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 2,
            politeness: PolitenessConfig::default(),
        }
    }
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct CrawlProgress {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total: usize,
    pub checked: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Not started because the run was interrupted
    pub skipped: usize,
}

impl CrawlProgress {
    pub fn log_summary(&self) {
        let elapsed = match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_seconds(),
            _ => 0,
        };
        log::info!(
            "Checked {}/{} series in {}s: {} updated, {} unchanged, {} failed, {} skipped",
            self.checked,
            self.total,
            elapsed,
            self.updated,
            self.unchanged,
            self.failed,
            self.skipped
        );
    }
}

/// Everything one check run produced
#[derive(Debug, Clone)]
pub struct CheckRun {
    /// In library order; skipped sources have no entry
    pub outcomes: Vec<SourceOutcome>,
    pub progress: CrawlProgress,
}

impl CheckRun {
    pub fn report(&self) -> ChangeReport {
        let mut report = ChangeReport::from_outcomes(&self.outcomes);
        report.note_interrupted(self.progress.skipped);
        report
    }

    pub fn has_updates(&self) -> bool {
        self.progress.updated > 0
    }
}

/// Fetch and parse one source. `None` means it was never started.
async fn observe(
    source: &TrackedSource,
    fetcher: &dyn PageFetcher,
    registry: &ParserRegistry,
    pacer: &HostPacer,
    cancel: &CancelFlag,
) -> Option<Observation> {
    if cancel.is_cancelled() {
        return None;
    }

    let raw_url = source.url.trim();
    if raw_url.is_empty() {
        return Some(Err(SourceFailure::Fetch("missing url".to_string())));
    }
    let url = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(e) => return Some(Err(SourceFailure::Fetch(format!("invalid url: {}", e)))),
    };
    let host = url.host_str().unwrap_or_default().to_string();

    pacer.wait(&host).await;
    if cancel.is_cancelled() {
        return None;
    }

    log::debug!("Checking {} ({})", source.display_name(), raw_url);
    let html = match fetcher.fetch_page(url.as_str(), source.force_render).await {
        Ok(html) => html,
        Err(e) => return Some(Err(SourceFailure::Fetch(e.to_string()))),
    };

    let parser = registry.select(&host, source.site_hint.as_deref());
    log::debug!("{}: parsing with {}", source.display_name(), parser.name);
    Some((parser.parse)(&html).map_err(|e| SourceFailure::Extraction(e.to_string())))
}

fn log_outcome(source: &TrackedSource, outcome: &ReconciliationOutcome) {
    let name = source.display_name();
    match outcome {
        ReconciliationOutcome::Updated { old: None, new } => {
            log::info!("{}: first observation, chapter {}", name, new)
        }
        ReconciliationOutcome::Updated { old: Some(old), new } => {
            log::info!("{}: new chapter {} (was {})", name, new, old)
        }
        ReconciliationOutcome::Unchanged { current } => {
            log::debug!("{}: unchanged at {}", name, current)
        }
        ReconciliationOutcome::FetchFailed { reason } => {
            log::warn!("{}: fetch failed: {}", name, reason)
        }
        ReconciliationOutcome::ExtractionFailed { reason } => {
            log::warn!("{}: {}", name, reason)
        }
    }
}

/// Check every source in `library`, updating `last_chapter` values in memory.
///
/// Fetching runs with bounded concurrency. Reconciliation happens afterwards in
/// library order, so each source record is only touched by its own outcome.
/// Persisting the library is left to the caller.
pub async fn run_check(
    library: &mut Library,
    fetcher: &dyn PageFetcher,
    registry: &ParserRegistry,
    options: &RunOptions,
    cancel: &CancelFlag,
) -> CheckRun {
    let mut progress = CrawlProgress {
        started_at: Some(Utc::now()),
        total: library.series.len(),
        ..CrawlProgress::default()
    };
    log::info!("Checking {} series", progress.total);

    let pacer = HostPacer::new(options.politeness.clone());
    let mut observations: Vec<(usize, Option<Observation>)> = {
        let pacer = &pacer;
        stream::iter(library.series.iter().enumerate())
            .map(|(index, source)| async move {
                (index, observe(source, fetcher, registry, pacer, cancel).await)
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await
    };
    observations.sort_by_key(|(index, _)| *index);

    let mut outcomes = Vec::with_capacity(observations.len());
    for (index, observation) in observations {
        let source = &mut library.series[index];
        let Some(observation) = observation else {
            progress.skipped += 1;
            continue;
        };
        let outcome = reconcile(source, &observation);
        log_outcome(source, &outcome);

        progress.checked += 1;
        match &outcome {
            o if o.is_update() => progress.updated += 1,
            o if o.is_failure() => progress.failed += 1,
            _ => progress.unchanged += 1,
        }
        outcomes.push(SourceOutcome {
            name: source.display_name().to_string(),
            url: source.url.clone(),
            outcome,
        });
    }

    if progress.skipped > 0 {
        log::warn!("Run interrupted: {} series not checked", progress.skipped);
    }
    progress.finished_at = Some(Utc::now());
    progress.log_summary();
    CheckRun { outcomes, progress }
}
