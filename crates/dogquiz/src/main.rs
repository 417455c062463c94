//! dogquiz - Dog breed quiz with a cache-first offline data layer

mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dogquiz_core::{
    AlwaysReady, BreedFetcher, CacheConfig, CacheManager, CacheScheduler, Difficulty,
    DogApiFetcher, OfflineFetcher, Size,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dogquiz",
    version,
    about = "Dog breed quiz with a cache-first offline data layer",
    long_about = "Browse dog breeds and generate quizzes from the dog.ceo API.\n\
                  \n\
                  Breeds and images are cached in a local SQLite database and served\n\
                  from there until they expire. Without network access the cache\n\
                  (even expired) or a small built-in dataset is used instead.\n\
                  \n\
                  Examples:\n\
                    dogquiz breeds                   # List breeds (cache first)\n\
                    dogquiz breeds --refresh         # Re-download the breed list\n\
                    dogquiz quiz --difficulty hard   # Five hard questions\n\
                    dogquiz stats                    # Cache statistics\n\
                    dogquiz run                      # Background maintenance until Ctrl-C\n\
                  \n\
                  Environment Variables:\n\
                    DOGQUIZ_DATA_DIR                 # Override data directory\n\
                    DOGQUIZ_CONFIG                   # Config file (TOML)\n\
                    DOGQUIZ_OFFLINE                  # Never call the network\n\
                    DOGQUIZ_NO_COLOR                 # Disable ANSI colors\n\
                    RUST_LOG                         # Log filter (default: warn)"
)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Data directory holding the cache database (default: platform data dir)
    #[arg(long, env = "DOGQUIZ_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/config.toml when present)
    #[arg(long, env = "DOGQUIZ_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Never call the network; serve cached or built-in data only
    #[arg(long, env = "DOGQUIZ_OFFLINE", global = true)]
    offline: bool,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "DOGQUIZ_NO_COLOR", global = true)]
    no_color: bool,

    /// Debug logging for the cache layer
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// List breeds
    Breeds {
        /// Bypass the cache and re-download the listing
        #[arg(long)]
        refresh: bool,
        /// Only breeds of this difficulty (easy|medium|hard)
        #[arg(long, value_parser = cli::parse_difficulty)]
        difficulty: Option<Difficulty>,
        /// Only breeds of this size (small|medium|large|giant)
        #[arg(long, value_parser = cli::parse_size)]
        size: Option<Size>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one breed with its primary image
    Show {
        /// Breed ID (e.g. "retriever-golden")
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search breeds by name
    Search {
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List favorite breeds
    Favorites {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark or unmark a breed as favorite
    Favorite {
        id: String,
        /// Remove the favorite flag instead
        #[arg(long)]
        unset: bool,
    },
    /// Print the primary image URL of a breed
    Image { id: String },
    /// Print gallery image URLs of a breed
    Gallery {
        id: String,
        #[arg(long, short = 'n', default_value = "4")]
        count: usize,
    },
    /// Generate a quiz
    Quiz {
        /// Preferred difficulty (easy|medium|hard)
        #[arg(long, value_parser = cli::parse_difficulty)]
        difficulty: Option<Difficulty>,
        /// Number of questions
        #[arg(long, short = 'n', default_value = "5")]
        count: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print cache statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Print the cache health report
    Health {
        #[arg(long)]
        json: bool,
    },
    /// Refresh breeds close to expiry
    Refresh {
        #[arg(long)]
        json: bool,
    },
    /// Evict until the image cache fits the budget
    Optimize {
        /// Budget in MiB (default: configured max_cache_bytes)
        #[arg(long)]
        max_mb: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Delete expired records and old statistics
    Cleanup {
        #[arg(long)]
        json: bool,
    },
    /// Delete every cached breed and image
    ClearCache,
    /// Run background maintenance until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data_dir = cli
        .data_dir
        .or_else(|| dirs::data_dir().map(|d| d.join("dogquiz")))
        .context("Could not determine data directory")?;

    let config = match &cli.config {
        Some(path) => CacheConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CacheConfig::load_or_default(&data_dir.join("config.toml"))
            .context("Failed to load config")?,
    };

    let fetcher: Arc<dyn BreedFetcher> = if cli.offline {
        Arc::new(OfflineFetcher)
    } else {
        Arc::new(DogApiFetcher::from_config(&config).context("Failed to build HTTP client")?)
    };

    let manager = Arc::new(
        CacheManager::open(config, &data_dir, fetcher)
            .with_context(|| format!("Failed to open cache in {}", data_dir.display()))?,
    );
    let no_color = cli.no_color;

    match cli.mode {
        Mode::Breeds {
            refresh,
            difficulty,
            size,
            json,
        } => run_breeds(&manager, refresh, difficulty, size, json, no_color).await?,
        Mode::Show { id, json } => run_show(&manager, id, json).await?,
        Mode::Search { query, json } => run_search(&manager, query, json, no_color).await?,
        Mode::Favorites { json } => {
            let favorites = manager.repository().get_favorites()?;
            println!("{}", cli::format_breed_table(&favorites, json, no_color));
        }
        Mode::Favorite { id, unset } => {
            manager
                .repository()
                .set_favorite(&id, !unset)
                .map_err(cli::CliError::from)?;
            println!("{} {}", if unset { "Unmarked" } else { "Marked" }, id);
        }
        Mode::Image { id } => {
            let breed = manager
                .repository()
                .load_image(&id)
                .await
                .ok_or(cli::CliError::UnknownBreed { id })?;
            println!("{}", breed.image_url.as_deref().unwrap_or("(no image available)"));
        }
        Mode::Gallery { id, count } => {
            for url in manager.repository().load_gallery(&id, count).await? {
                println!("{}", url);
            }
        }
        Mode::Quiz {
            difficulty,
            count,
            json,
        } => run_quiz(&manager, difficulty, count, json).await?,
        Mode::Stats { json } => {
            println!("{}", cli::format_stats(&manager.get_statistics()?, json));
        }
        Mode::Health { json } => {
            let report = manager.get_health_report()?;
            println!("{}", cli::format_health(&report, json, no_color));
        }
        Mode::Refresh { json } => {
            let report = with_spinner("Refreshing breeds...", manager.trigger_refresh()).await;
            println!("{}", cli::format_task_report(&report, json));
        }
        Mode::Optimize { max_mb, json } => run_optimize(&manager, max_mb, json).await?,
        Mode::Cleanup { json } => {
            let report = manager.trigger_cleanup().await;
            println!("{}", cli::format_task_report(&report, json));
        }
        Mode::ClearCache => {
            let removed = manager.clear_all()?;
            println!("✅ Cache cleared ({} records removed)", removed);
            println!("   Location: {}", data_dir.display());
        }
        Mode::Run => run_scheduler(manager).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,dogquiz_core=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message);
    spinner
}

async fn with_spinner<F: std::future::Future>(message: &'static str, fut: F) -> F::Output {
    let spinner = spinner(message);
    let output = fut.await;
    spinner.finish_and_clear();
    output
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn run_breeds(
    manager: &CacheManager,
    refresh: bool,
    difficulty: Option<Difficulty>,
    size: Option<Size>,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let load = with_spinner(
        "Loading breeds...",
        manager.repository().get_all_breeds_with_source(refresh),
    )
    .await;

    let breeds: Vec<_> = load
        .breeds
        .into_iter()
        .filter(|b| difficulty.map_or(true, |d| b.record.difficulty == d))
        .filter(|b| size.map_or(true, |s| b.record.size == s))
        .collect();

    println!("{}", cli::format_breed_table(&breeds, json, no_color));
    if !json {
        if let Some(banner) = cli::format_source(load.source) {
            eprintln!("{}", banner);
        }
    }
    Ok(())
}

async fn run_show(manager: &CacheManager, id: String, json: bool) -> Result<()> {
    let breed = manager
        .repository()
        .load_image(&id)
        .await
        .ok_or(cli::CliError::UnknownBreed { id })?;
    println!("{}", cli::format_breed_info(&breed, json));
    Ok(())
}

async fn run_search(manager: &CacheManager, query: String, json: bool, no_color: bool) -> Result<()> {
    let results = manager.repository().search_breeds(&query).await;
    if results.is_empty() {
        return Err(cli::CliError::NoResults { query }.into());
    }
    println!("{}", cli::format_breed_table(&results, json, no_color));
    Ok(())
}

async fn run_quiz(
    manager: &CacheManager,
    difficulty: Option<Difficulty>,
    count: usize,
    json: bool,
) -> Result<()> {
    let questions = with_spinner(
        "Building quiz...",
        manager.repository().generate_quiz_set(difficulty, count),
    )
    .await
    .map_err(cli::CliError::from)?;

    println!("{}", cli::format_quiz(&questions, json));
    Ok(())
}

async fn run_optimize(manager: &CacheManager, max_mb: Option<u64>, json: bool) -> Result<()> {
    let Some(mb) = max_mb else {
        let report = manager.trigger_optimize().await;
        println!("{}", cli::format_task_report(&report, json));
        return Ok(());
    };

    let report = manager.optimize(cli::megabytes(mb))?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to encode report")?
        );
    } else {
        println!(
            "Optimized: {} images, {} breeds removed; {} -> {}",
            report.images_removed(),
            report.breeds_removed(),
            cli::format_size(report.bytes_before),
            cli::format_size(report.bytes_after)
        );
    }
    Ok(())
}

async fn run_scheduler(manager: Arc<CacheManager>) -> Result<()> {
    let scheduler = CacheScheduler::new(Arc::clone(&manager), Arc::new(AlwaysReady));
    for schedule in scheduler.schedules() {
        println!(
            "  {:<9} every {}h",
            schedule.kind.as_str(),
            schedule.interval.as_secs() / 3600
        );
    }

    let handle = scheduler.start();
    println!("Maintenance running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    handle.shutdown().await;
    Ok(())
}
