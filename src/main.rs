//! Contribution Calendar
//!
//! Prints a year-long contribution calendar for an account, optionally
//! writing it out as an SVG.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use contrib_calendar::plotting::{save_calendar_svg, CalendarStyle, CalendarTheme};
use contrib_calendar::types::{ActivitySummary, CalendarGrid, ContributionLevel, EmptyState};
use contrib_calendar::utils::today_local;
use contrib_calendar::{Config, ContributorSelector, Dashboard};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Theme {
    Light,
    Dark,
}

#[derive(Debug, Parser)]
#[command(name = "contrib-calendar", version, about = "Contribution calendar from repository statistics")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account whose repositories are aggregated
    #[arg(short, long)]
    owner: Option<String>,

    /// Contributor login to display; everyone when omitted
    #[arg(long)]
    contributor: Option<ContributorSelector>,

    /// Ignore fresh cache entries and refetch
    #[arg(long)]
    refresh: bool,

    /// Write the calendar as SVG to this path
    #[arg(long)]
    svg: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Theme::Light)]
    theme: Theme,

    /// Remove this namespace's cache entries and exit
    #[arg(long)]
    clear_cache: bool,

    /// Print the summary as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Number of contributors to list
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Verbose logging to stderr
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default_level = if debug || cfg!(feature = "dev") {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(owner) = cli.owner.clone() {
        config.owner = owner;
    }
    config.validate()?;

    let mut dashboard = Dashboard::from_config(&config).context("building HTTP client")?;

    if cli.clear_cache {
        let removed = dashboard.fetcher().with_cache(|cache| cache.clear());
        println!("Removed {} cache entries from {}", removed, config.cache_dir.display());
        return Ok(());
    }

    let report = dashboard.load(cli.refresh).await;
    info!(?report, "loaded");
    if report.rate_limited {
        warn!("rate limit reached, showing cached data only");
    }

    dashboard.select(cli.contributor.clone().unwrap_or_default());
    let today = today_local();
    let summary = dashboard.summary(today);

    if cli.json {
        let ranked: Vec<_> = dashboard
            .ranked_contributors()
            .into_iter()
            .take(cli.top)
            .map(|c| serde_json::json!({ "id": c.id, "total_contributions": c.total_contributions }))
            .collect();
        let grid = dashboard.grid(today).clone();
        let output = serde_json::json!({
            "owner": config.owner,
            "selected": dashboard.selected(),
            "summary": summary,
            "overview": dashboard.overview(),
            "contributors": ranked,
            "grid": grid,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&config.owner, dashboard.selected(), &summary);
        println!();
        print_heatmap(dashboard.grid(today));
        println!();
        println!("Top contributors:");
        for (rank, contributor) in dashboard.ranked_contributors().iter().take(cli.top).enumerate() {
            println!(
                "{:>3}. {:<24} {:>8}",
                rank + 1,
                contributor.id,
                contributor.total_contributions
            );
        }
    }

    if let Some(path) = &cli.svg {
        let theme = match cli.theme {
            Theme::Light => CalendarTheme::light(),
            Theme::Dark => CalendarTheme::dark(),
        };
        save_calendar_svg(path, dashboard.grid(today), &theme, &CalendarStyle::default())
            .map_err(|e| anyhow::anyhow!("writing {}: {}", path.display(), e))?;
        info!(path = %path.display(), "wrote calendar");
    }

    // Let stale-entry refreshes land in the cache before the runtime shuts down.
    let mut events = dashboard.fetcher().take_refresh_events();
    dashboard.fetcher().settle().await;
    if let Some(events) = events.as_mut() {
        while let Ok(event) = events.try_recv() {
            info!(endpoint = %event.endpoint, outcome = ?event.outcome, "background refresh");
        }
    }

    Ok(())
}

fn print_summary(owner: &str, selected: &ContributorSelector, summary: &ActivitySummary) {
    println!("{} ({})", owner, selected);
    println!(
        "  {} repositories, {} contributors, {} commits",
        summary.repo_count, summary.contributor_count, summary.total_commits
    );
    println!(
        "  {} contributions on {} days in the last year",
        summary.window_contributions, summary.active_days
    );
    match summary.empty_state {
        Some(EmptyState::RateLimited) => {
            println!("  Rate limit reached and nothing cached yet. Try again later.")
        }
        Some(EmptyState::NoActivity) => println!("  No activity in the last year."),
        None => {}
    }
}

fn level_glyph(level: ContributionLevel) -> char {
    match level {
        ContributionLevel::None => '·',
        ContributionLevel::Low => '░',
        ContributionLevel::Medium => '▒',
        ContributionLevel::High => '▓',
        ContributionLevel::VeryHigh => '█',
    }
}

fn print_heatmap(grid: &CalendarGrid) {
    let mut header = String::new();
    let mut skip = 0;
    for slot in grid.month_label_row() {
        if skip > 0 {
            skip -= 1;
            continue;
        }
        match slot {
            Some(month) => {
                header.push_str(month);
                skip = month.chars().count().saturating_sub(1);
            }
            None => header.push(' '),
        }
    }
    println!("{}", header.trim_end());

    for day in 0..contrib_calendar::types::DAYS_PER_WEEK {
        let row: String = grid.weeks.iter().map(|week| level_glyph(week[day].level)).collect();
        println!("{}", row);
    }
}
