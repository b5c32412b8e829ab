use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rtve_subs::{
    Config, DateRange, FetchFailure, FetchStats, PersistEvent, RtveClient, RtveError, ShowOutcome,
    ShowRegistry, SyncAction, SyncEvent, SyncReport, VideoStore, language_name, persist_latest,
    persist_range, sync_show,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rtve-subs")]
#[command(about = "Download episode metadata and subtitles from RTVE Play", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the system config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Archive root, overrides the configuration file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Log debug output and list non-fatal errors
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download new episodes of a show, backfilling missing subtitles
    Fetch {
        /// Show slug (see `list-shows`)
        #[arg(short = 'p', long, short_alias = 's')]
        show: String,

        /// Listing pages to scan, 0 scans all of them
        #[arg(short, long, default_value_t = 0)]
        max_pages: usize,
    },

    /// Download the latest episodes of one show or of every show
    #[command(alias = "fetch-latest")]
    Latest {
        /// Show slug, all shows when omitted
        #[arg(short, long)]
        show: Option<String>,

        /// Episodes per show, 0 downloads all of them
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Download the episodes published between two dates (inclusive)
    Range {
        /// Show slug
        #[arg(short, long)]
        show: String,

        /// First day, YYYY-MM-DD
        #[arg(long, value_parser = parse_day)]
        from: NaiveDate,

        /// Last day, YYYY-MM-DD
        #[arg(long, value_parser = parse_day)]
        to: NaiveDate,
    },

    /// List the known shows
    ListShows,
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,rtve_subs=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_sync_event(event: SyncEvent) {
    match event {
        SyncEvent::Started { show, max_pages } => {
            if max_pages == 0 {
                println!("Fetching '{}' (all pages)...", show);
            } else {
                println!("Fetching '{}' ({} page(s))...", show, max_pages);
            }
        }
        SyncEvent::PageScraped { page, links } => {
            println!("\n=== Page {} ({} video(s)) ===", page + 1, links);
        }
        SyncEvent::Skipped { video_id } => {
            println!("  [skip] {} already downloaded", video_id);
        }
        SyncEvent::Downloading { video_id, title } => {
            println!("  [new] {} - {}", video_id, title);
        }
        SyncEvent::Backfilling { video_id, title } => {
            println!("  [subs] {} - {}", video_id, title);
        }
        SyncEvent::SubtitleSaved { lang, path, .. } => {
            println!("    {} subtitles: {}", language_name(&lang), path.display());
        }
        SyncEvent::NoSubtitles { .. } => {
            println!("    No subtitles available");
        }
        SyncEvent::VideoFailed { video_id, message } => {
            println!("  [error] {}: {}", video_id, message);
        }
        SyncEvent::Complete { .. } => {}
    }
}

fn print_sync_report(report: &SyncReport, verbose: bool) {
    println!("\n=== Summary ===");
    println!("Pages scraped:  {}", report.pages_scraped);
    println!("Downloaded:     {}", report.downloaded);
    println!("Backfilled:     {}", report.backfilled);
    println!("Skipped:        {}", report.skipped);
    println!("Errors:         {}", report.errors.len());

    if verbose {
        for error in &report.errors {
            println!("  - {}", error);
        }
    }
}

fn print_persist_event(event: PersistEvent<'_>, verbose: bool) {
    match event {
        PersistEvent::ShowStarted { slug } => {
            println!("\n--- Fetching from {} ---", slug);
        }
        PersistEvent::Written { result, persisted } => {
            let metadata = &result.metadata;
            match persisted {
                Ok(persisted) => {
                    match persisted.action {
                        SyncAction::Skipped => {
                            println!("  [skip] {} already downloaded", metadata.id)
                        }
                        SyncAction::Downloaded => println!(
                            "  [new] {} - {} ({} subtitle track(s))",
                            metadata.id, metadata.long_title, persisted.tracks_written
                        ),
                        SyncAction::Backfilled => println!(
                            "  [subs] {} - {} ({} subtitle track(s))",
                            metadata.id, metadata.long_title, persisted.tracks_written
                        ),
                    }
                    for error in &persisted.errors {
                        println!("  [error] {}", error);
                    }
                }
                Err(error) => println!("  [error] {}", error),
            }
        }
        PersistEvent::ShowFinished { outcome } => print_show_outcome(outcome, verbose),
    }
}

fn print_show_outcome(outcome: &ShowOutcome, verbose: bool) {
    let stats = outcome.stats();
    if let Err(failure) = &outcome.fetch {
        println!("Error fetching {}: {}", outcome.slug, failure);
    } else if stats.videos_processed == 0 {
        println!("No videos found for {}", outcome.slug);
    }

    println!(
        "'{}': processed {} video(s) on {} page(s), wrote {}, {} error(s)",
        outcome.slug,
        stats.videos_processed,
        stats.pages_scraped,
        outcome.written,
        outcome.error_count()
    );

    if verbose {
        for error in &stats.errors {
            println!("  - {}", error);
        }
        for error in &outcome.write_errors {
            println!("  - {}", error);
        }
    }
}

fn run(cli: Cli) -> Result<(), RtveError> {
    let registry = ShowRegistry::builtin();

    if let Command::ListShows = cli.command {
        for show in registry.iter() {
            println!("{:<20} {}", show.slug, show.program_id);
        }
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let output_dir = cli.output.unwrap_or_else(|| config.output_dir.clone());
    let store = VideoStore::new(output_dir);
    let client = RtveClient::with_user_agent(&config.http.user_agent, config.client_settings())?;

    match cli.command {
        Command::Fetch { show, max_pages } => {
            let show = registry.get(&show)?;
            match sync_show(&client, &store, show, max_pages, print_sync_event) {
                Ok(report) => print_sync_report(&report, cli.verbose),
                Err(failure) => {
                    print_sync_report(&failure.report, cli.verbose);
                    return Err(failure.into());
                }
            }
        }
        Command::Latest { show, count } => {
            let slugs = match show {
                Some(slug) => vec![registry.get(&slug)?.slug],
                None => registry.slugs(),
            };

            let outcomes = persist_latest(&client, &store, &registry, &slugs, count, |event| {
                print_persist_event(event, cli.verbose)
            });

            let total_videos: usize = outcomes.iter().map(|o| o.stats().videos_processed).sum();
            let total_errors: usize = outcomes.iter().map(ShowOutcome::error_count).sum();
            println!("\n=== Summary ===");
            println!("Total videos downloaded: {}", total_videos);
            println!("Total errors: {}", total_errors);

            // Every show has run; report the first one that failed
            if let Some(failure) = outcomes.into_iter().find_map(|o| o.fetch.err()) {
                return Err(failure.into());
            }
        }
        Command::Range { show, from, to } => {
            let range = DateRange::days(from, to).map_err(|error| FetchFailure {
                stats: FetchStats::default(),
                error,
            })?;

            println!("\n=== '{}' from {} to {} ===", show, from, to);
            let outcome = persist_range(&client, &store, &registry, &show, range, |event| {
                print_persist_event(event, cli.verbose)
            });
            outcome.fetch?;
        }
        Command::ListShows => {}
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\nError: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_short_flags() {
        let cli = Cli::try_parse_from(["rtve-subs", "fetch", "-p", "telediario-1", "-m", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Fetch { ref show, max_pages: 3 } if show == "telediario-1"
        ));

        let cli = Cli::try_parse_from(["rtve-subs", "fetch", "-s", "telediario-2"]).unwrap();
        assert!(matches!(cli.command, Command::Fetch { ref show, max_pages: 0 } if show == "telediario-2"));
    }

    #[test]
    fn test_fetch_latest_alias() {
        let cli =
            Cli::try_parse_from(["rtve-subs", "fetch-latest", "-s", "informe-semanal", "-n", "2", "-o", "out"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Latest { show: Some(ref show), count: 2 } if show == "informe-semanal"
        ));
        assert_eq!(cli.output, Some(PathBuf::from("out")));

        let cli = Cli::try_parse_from(["rtve-subs", "latest"]).unwrap();
        assert!(matches!(cli.command, Command::Latest { show: None, count: 1 }));
    }
}
