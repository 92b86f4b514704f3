//! `league-scraper`: crawl a racing-league site into a local SQLite store.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use league_scraper::{
    config::CrawlConfigs,
    error::Error,
    export,
    id::LeagueID,
    orchestrator::{Depth, Filters, Orchestrator, Progress},
    site::urls,
    store::Store,
};

#[derive(Parser, Debug)]
#[command(name = "league-scraper", version, about = "Polite, resumable racing-league crawler")]
struct Cli {
    /// Configuration file providing defaults (league id, depth, db path, log level).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the store path.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Diagnostic verbosity.
    #[arg(long, global = true, value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the crawler.
    Scrape {
        #[command(subcommand)]
        target: ScrapeTarget,
    },
    /// Driver-profile maintenance passes.
    Drivers {
        #[command(subcommand)]
        action: DriversAction,
    },
    /// Export every store table to CSV with typed headers.
    Export {
        /// Output directory.
        #[arg(long, default_value = "export")]
        out: PathBuf,
    },
}

#[derive(clap::Args, Clone, Default, Debug)]
struct ScrapeOptions {
    /// Traversal depth (default from config, ultimately `race`).
    #[arg(long, value_enum)]
    depth: Option<Depth>,

    /// Bypass the cache at every level.
    #[arg(long)]
    force: bool,

    /// Days before a cached row expires (overrides config).
    #[arg(long)]
    cache_max_age_days: Option<u32>,

    /// Only descend into this series (repeatable).
    #[arg(long = "series-id")]
    series_ids: Vec<u32>,

    /// Only descend into seasons whose name contains this year.
    #[arg(long)]
    season_year: Option<i32>,

    /// Descend into at most the first N seasons per series.
    #[arg(long)]
    season_limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum ScrapeTarget {
    /// Crawl one league by external id.
    League {
        /// The league's external id.
        id: LeagueID,

        #[command(flatten)]
        options: ScrapeOptions,
    },
    /// Crawl the configured (or given) league at full depth.
    All {
        /// The league's external id (falls back to the config file).
        #[arg(long)]
        league: Option<LeagueID>,

        #[command(flatten)]
        options: ScrapeOptions,
    },
}

#[derive(Subcommand, Debug)]
enum DriversAction {
    /// Refresh driver profiles for a league.
    Refresh {
        /// The league's external id (falls back to the config file).
        #[arg(long)]
        league: Option<LeagueID>,

        /// Bypass the cache.
        #[arg(long)]
        force: bool,

        /// Days before a cached profile expires (overrides config).
        #[arg(long)]
        cache_max_age_days: Option<u32>,
    },
}

const DEFAULT_CONFIG_PATH: &str = "league_scraper.toml";

const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let configs = match load_configs(&cli) {
        Ok(configs) => configs,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.log_level.as_deref().unwrap_or(&configs.log_level));

    match run(cli, configs) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Interrupted) => {
            eprintln!("interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn load_configs(cli: &Cli) -> league_scraper::Result<CrawlConfigs> {
    let mut configs = match &cli.config {
        Some(path) => CrawlConfigs::load(path)?,
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => CrawlConfigs::load(DEFAULT_CONFIG_PATH)?,
        None => CrawlConfigs::default(),
    };

    if let Some(db) = &cli.db {
        configs.db_path.clone_from(db);
    }

    Ok(configs)
}

fn init_logging(level: &str) {
    // The config speaks syslog-ish level names; env_logger speaks filter directives.
    let filter = match level {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn run(cli: Cli, configs: CrawlConfigs) -> league_scraper::Result<()> {
    let store = Store::open(&configs.db_path)?;

    match cli.command {
        Some(Command::Export { out }) => {
            let summaries = export::export_all(&store, &out)?;
            for summary in summaries {
                println!("{}: {} row(s)", summary.table, summary.rows);
            }
            Ok(())
        }
        Some(Command::Drivers {
            action: DriversAction::Refresh {
                league,
                force,
                cache_max_age_days,
            },
        }) => {
            let league_id = require_league(league, &configs)?;
            let mut orchestrator = with_interrupt(Orchestrator::new(store, &configs))?;

            let result = orchestrator.refresh_all_drivers(
                league_id,
                cache_max_age_days.or(configs.cache_max_age_days),
                force,
            );
            finish(&orchestrator, result)
        }
        Some(Command::Scrape { target }) => {
            let (league_id, options) = match target {
                ScrapeTarget::League { id, options } => (id, options),
                ScrapeTarget::All { league, options } => (require_league(league, &configs)?, options),
            };
            scrape(store, &configs, league_id, options)
        }
        // No arguments: crawl the configured league with configured defaults.
        None => {
            let league_id = require_league(None, &configs)?;
            scrape(store, &configs, league_id, ScrapeOptions::default())
        }
    }
}

fn scrape(store: Store, configs: &CrawlConfigs, league_id: LeagueID, options: ScrapeOptions) -> league_scraper::Result<()> {
    let filters = Filters {
        series_ids: (!options.series_ids.is_empty()).then_some(options.series_ids.clone()),
        season_year: options.season_year,
        season_limit: options.season_limit,
    };

    let mut orchestrator = with_interrupt(Orchestrator::new(store, configs))?;

    let result = orchestrator.scrape_league(
        &urls::league_url(league_id),
        options.depth.unwrap_or(configs.depth),
        &filters,
        options.cache_max_age_days.or(configs.cache_max_age_days),
        options.force,
    );
    finish(&orchestrator, result)
}

fn require_league(explicit: Option<LeagueID>, configs: &CrawlConfigs) -> league_scraper::Result<LeagueID> {
    explicit.or(configs.league_id).ok_or_else(|| {
        Error::Validation("no league id given; pass one on the command line or set league_id in the config".to_string())
    })
}

fn with_interrupt(orchestrator: Orchestrator) -> league_scraper::Result<Orchestrator> {
    let flag = orchestrator.cancel_flag();
    signal_hook::flag::register(signal_hook::consts::SIGINT, flag)?;
    Ok(orchestrator)
}

/// Print the run summary and close shared resources. On interrupt the orchestrator has already
/// short-circuited its own shutdown; everything persisted before the interrupt is reported.
fn finish(orchestrator: &Orchestrator, result: league_scraper::Result<Progress>) -> league_scraper::Result<()> {
    match result {
        Ok(progress) => {
            orchestrator.finish();
            print_progress(&progress);
            Ok(())
        }
        Err(Error::Interrupted) => {
            print_progress(&orchestrator.get_progress());
            Err(Error::Interrupted)
        }
        Err(error) => {
            orchestrator.finish();
            Err(error)
        }
    }
}

fn print_progress(progress: &Progress) {
    println!(
        "leagues: {}, series: {}, seasons: {}, races: {}, drivers: {}, skipped (cached): {}",
        progress.leagues_scraped,
        progress.series_scraped,
        progress.seasons_scraped,
        progress.races_scraped,
        progress.drivers_scraped,
        progress.skipped_cached,
    );

    for failure in &progress.errors {
        println!("failed {} {}: {}", failure.entity, failure.url, failure.message);
    }
}
