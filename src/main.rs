use clap::{Parser, Subcommand};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use manga_update_notifier::chapter::format_chapter;
use manga_update_notifier::cleanup::sanitize;
use manga_update_notifier::config::Config;
use manga_update_notifier::crawler::{run_check, CancelFlag, RunOptions};
use manga_update_notifier::library::{backup_library, load_library, save_library};
use manga_update_notifier::notify::{render_sections, DiscordSink, LogSink, NotificationSink};
use manga_update_notifier::politeness::PolitenessConfig;
use manga_update_notifier::source_utils::SourceFetcher;
use manga_update_notifier::sources::ParserRegistry;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "manga-update-notifier")]
#[command(about = "Check tracked manga pages for new chapters")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Library file (overrides config and MANGA_LIBRARY)
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Check without saving or notifying, print the report instead
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every tracked series for new chapters (default)
    Check,

    /// Clear implausible stored chapter numbers
    FixLibrary {
        /// Report changes without writing
        #[arg(long)]
        dry: bool,
    },

    /// Print tracked series with their last known chapter
    List,
}

fn init_logging(verbose: bool) {
    if !verbose && Path::new("log4rs.yml").exists() {
        match log4rs::init_file("log4rs.yml", Default::default()) {
            Ok(()) => return,
            Err(e) => eprintln!("Ignoring log4rs.yml: {}", e),
        }
    }

    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {t} - {m}{n}",
        )))
        .build();
    let config = log4rs::config::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .logger(log4rs::config::Logger::builder().build("html5ever", LevelFilter::Warn))
        .logger(log4rs::config::Logger::builder().build("selectors", LevelFilter::Warn))
        .build(Root::builder().appender("stdout").build(level));

    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("Logger setup failed: {}", e);
            }
        }
        Err(e) => eprintln!("Logger config invalid: {}", e),
    }
}

async fn check(cfg: &Config, dry_run: bool) -> Result<(), Box<dyn Error>> {
    let path = &cfg.run.library_path;
    let mut library = load_library(path)?;

    let fetcher = SourceFetcher::new(cfg.fetch_policy())?;
    let registry = ParserRegistry::builtin();
    let options = RunOptions {
        concurrency: cfg.run.concurrency,
        politeness: PolitenessConfig {
            min_delay: Duration::from_millis(cfg.run.min_host_delay_ms),
            max_delay: Duration::from_millis(cfg.run.max_host_delay_ms),
        },
    };
    log::info!(
        "Fetch policy: {} attempts, {}s timeout, browser {}",
        cfg.fetch.max_attempts,
        cfg.fetch.timeout_secs,
        if cfg.fetch.enable_browser { "enabled" } else { "disabled" }
    );

    let cancel = CancelFlag::new();
    cancel.cancel_on_ctrl_c();

    let run = run_check(&mut library, &fetcher, &registry, &options, &cancel).await;
    fetcher.metrics().log_summary();
    let mut report = run.report();

    if dry_run {
        for section in render_sections(&report, true) {
            println!("{}\n", section);
        }
        log::info!("Dry run, library not saved");
        return Ok(());
    }

    // Always rewritten, updates or not
    if let Err(e) = save_library(path, &library) {
        log::error!(
            "Could not save {}: {}. Detected updates will be reported again next run",
            path.display(),
            e
        );
        report.note_save_failure(&e);
    }

    let sink: Box<dyn NotificationSink> = match &cfg.notify.webhook_url {
        Some(url) => Box::new(DiscordSink::from_config(url.clone(), &cfg.notify)),
        None => {
            log::info!("No webhook configured, writing report to the log");
            Box::new(LogSink {
                include_unchanged: cfg.notify.notify_unchanged,
            })
        }
    };
    if let Err(e) = sink.deliver(&report).await {
        log::error!("Notification failed: {}", e);
    }
    Ok(())
}

fn fix_library(path: &Path, dry: bool) -> Result<(), Box<dyn Error>> {
    let mut library = load_library(path)?;
    let changes = sanitize(&mut library);
    if changes.is_empty() {
        println!("Nothing to clean in {}", path.display());
        return Ok(());
    }
    for change in &changes {
        println!("{}", change);
    }
    if dry {
        println!("{} change(s), dry run: nothing written", changes.len());
        return Ok(());
    }
    let backup = backup_library(path)?;
    save_library(path, &library)?;
    println!(
        "{} change(s) written, backup at {}",
        changes.len(),
        backup.display()
    );
    Ok(())
}

fn list(path: &Path) -> Result<(), Box<dyn Error>> {
    let library = load_library(path)?;
    for source in &library.series {
        let last = source
            .last_chapter
            .map(format_chapter)
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}\t{}", source.display_name(), last, source.url);
    }
    println!("{} series", library.series.len());
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut cfg = Config::load(&cli.config)?;
    if let Some(path) = cli.library {
        cfg.run.library_path = path;
    }

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => check(&cfg, cli.dry_run).await,
        Commands::FixLibrary { dry } => fix_library(&cfg.run.library_path, dry || cli.dry_run),
        Commands::List => list(&cfg.run.library_path),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
