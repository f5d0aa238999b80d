/// Whole-run behaviour with a scripted page source
use async_trait::async_trait;
use manga_update_notifier::crawler::{run_check, CancelFlag, RunOptions};
use manga_update_notifier::error::FetchError;
use manga_update_notifier::models::{Library, ReconciliationOutcome, TrackedSource};
use manga_update_notifier::politeness::PolitenessConfig;
use manga_update_notifier::source_utils::PageFetcher;
use manga_update_notifier::sources::ParserRegistry;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves fixed pages by URL and remembers what was asked for
struct ScriptedPages {
    pages: HashMap<String, Result<String, FetchError>>,
    requested: Mutex<Vec<(String, bool)>>,
    cancel_after_first: Option<CancelFlag>,
}

impl ScriptedPages {
    fn new(pages: Vec<(&str, Result<String, FetchError>)>) -> Self {
        Self {
            pages: pages.into_iter().map(|(u, p)| (u.to_string(), p)).collect(),
            requested: Mutex::new(Vec::new()),
            cancel_after_first: None,
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedPages {
    async fn fetch_page(&self, url: &str, force_render: bool) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push((url.to_string(), force_render));
        if let Some(flag) = &self.cancel_after_first {
            flag.cancel();
        }
        self.pages
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}

fn madara(chapters: &[u32]) -> String {
    let items: String = chapters
        .iter()
        .map(|c| format!("<li class=\"wp-manga-chapter\"><a href=\"#\">Capítulo {}</a></li>", c))
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", items)
}

fn sequential() -> RunOptions {
    RunOptions {
        concurrency: 1,
        politeness: PolitenessConfig::none(),
    }
}

#[tokio::test]
async fn test_mixed_run_produces_one_outcome_per_source() {
    let pages = ScriptedPages::new(vec![
        ("https://m440.in/manga/a", Ok(madara(&[10, 11, 12]))),
        ("https://m440.in/manga/b", Ok(madara(&[5]))),
        ("https://zonatmo.com/library/manga/1/c", Err(FetchError::Timeout(std::time::Duration::from_secs(30)))),
        ("https://m440.in/manga/d", Ok("<html><body><p>Sin capítulos 2024</p></body></html>".to_string())),
        ("https://m440.in/manga/e", Ok(madara(&[1]))),
    ]);
    let mut library = Library {
        series: vec![
            TrackedSource::new("A", "https://m440.in/manga/a").with_last_chapter(11.0),
            TrackedSource::new("B", "https://m440.in/manga/b").with_last_chapter(5.0),
            TrackedSource::new("C", "https://zonatmo.com/library/manga/1/c").with_last_chapter(40.0),
            TrackedSource::new("D", "https://m440.in/manga/d"),
            TrackedSource::new("E", "https://m440.in/manga/e"),
        ],
        ..Library::default()
    };

    let run = run_check(
        &mut library,
        &pages,
        &ParserRegistry::builtin(),
        &RunOptions {
            concurrency: 3,
            politeness: PolitenessConfig::none(),
        },
        &CancelFlag::new(),
    )
    .await;

    let names: Vec<&str> = run.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
    assert_eq!(run.outcomes[0].outcome, ReconciliationOutcome::Updated { old: Some(11.0), new: 12.0 });
    assert_eq!(run.outcomes[1].outcome, ReconciliationOutcome::Unchanged { current: 5.0 });
    assert!(matches!(run.outcomes[2].outcome, ReconciliationOutcome::FetchFailed { .. }));
    assert!(matches!(run.outcomes[3].outcome, ReconciliationOutcome::ExtractionFailed { .. }));
    assert_eq!(run.outcomes[4].outcome, ReconciliationOutcome::Updated { old: None, new: 1.0 });

    assert_eq!(library.series[0].last_chapter, Some(12.0));
    assert_eq!(library.series[2].last_chapter, Some(40.0));
    assert_eq!(library.series[3].last_chapter, None);

    assert_eq!(run.progress.checked, 5);
    assert_eq!(run.progress.updated, 2);
    assert_eq!(run.progress.unchanged, 1);
    assert_eq!(run.progress.failed, 2);

    let report = run.report();
    assert_eq!(report.updates.len(), 2);
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.unchanged.len(), 1);
}

#[tokio::test]
async fn test_force_render_flag_reaches_fetcher() {
    let pages = ScriptedPages::new(vec![("https://m440.in/manga/a", Ok(madara(&[3])))]);
    let mut library = Library {
        series: vec![TrackedSource {
            force_render: true,
            ..TrackedSource::new("A", "https://m440.in/manga/a")
        }],
        ..Library::default()
    };

    run_check(&mut library, &pages, &ParserRegistry::builtin(), &sequential(), &CancelFlag::new()).await;
    assert_eq!(
        pages.requested.lock().unwrap().clone(),
        vec![("https://m440.in/manga/a".to_string(), true)]
    );
}

#[tokio::test]
async fn test_interrupt_stops_between_sources() {
    let cancel = CancelFlag::new();
    let mut pages = ScriptedPages::new(vec![
        ("https://a.com/1", Ok(madara(&[8]))),
        ("https://b.com/2", Ok(madara(&[9]))),
        ("https://c.com/3", Ok(madara(&[10]))),
    ]);
    pages.cancel_after_first = Some(cancel.clone());
    let mut library = Library {
        series: vec![
            TrackedSource::new("One", "https://a.com/1"),
            TrackedSource::new("Two", "https://b.com/2"),
            TrackedSource::new("Three", "https://c.com/3"),
        ],
        ..Library::default()
    };

    let run = run_check(&mut library, &pages, &ParserRegistry::builtin(), &sequential(), &cancel).await;

    assert_eq!(run.outcomes.len(), 1);
    assert_eq!(run.outcomes[0].name, "One");
    assert_eq!(library.series[0].last_chapter, Some(8.0));
    assert_eq!(library.series[1].last_chapter, None);
    assert_eq!(run.progress.skipped, 2);
    assert!(run
        .report()
        .warnings
        .contains(&"[WARN] run interrupted: 2 sources not checked".to_string()));
}

#[tokio::test]
async fn test_site_hint_selects_parser() {
    let tmo = r#"<html><body><div id="chapters"><ul>
        <li class="list-group-item upload-link"><h4><a class="btn-collapse">Capítulo 33.00</a></h4></li>
        </ul></div></body></html>"#;
    let pages = ScriptedPages::new(vec![("https://mirror.example/manga/x", Ok(tmo.to_string()))]);
    let mut library = Library {
        series: vec![TrackedSource::new("X", "https://mirror.example/manga/x").with_site_hint("zonatmo")],
        ..Library::default()
    };

    let run = run_check(&mut library, &pages, &ParserRegistry::builtin(), &sequential(), &CancelFlag::new()).await;
    assert_eq!(run.outcomes[0].outcome, ReconciliationOutcome::Updated { old: None, new: 33.0 });
}

#[tokio::test]
async fn test_empty_library() {
    let pages = ScriptedPages::new(vec![]);
    let mut library = Library::default();
    let run = run_check(&mut library, &pages, &ParserRegistry::builtin(), &sequential(), &CancelFlag::new()).await;
    assert!(run.outcomes.is_empty());
    assert!(!run.has_updates());
    assert!(run.report().is_empty());
}
