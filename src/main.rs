use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contract_rents::{
    aggregate::{self, enabled},
    config::PipelineConfig,
    fetch, process,
    view::{self, Dashboard},
};
use serde_json::json;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Contract rents by census tract: collect, normalize, aggregate"
)]
struct Cli {
    /// YAML pipeline config; defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download raw extracts from the Census API.
    Fetch {
        /// Re-fetch years already recorded in the history.
        #[arg(long)]
        force: bool,
    },
    /// Normalize every configured year.
    Normalize,
    /// Consolidate normalized years and build the lookup tables.
    Aggregate,
    /// Normalize then aggregate, optionally fetching first.
    Run {
        #[arg(long)]
        fetch: bool,
        #[arg(long)]
        force: bool,
    },
    /// Print the map and plot data for one selection as JSON.
    View {
        #[arg(long)]
        place: String,
        /// Defaults to the most recent year with data for the place.
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        tract: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) load config ──────────────────────────────────────────────
    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;
    info!(
        start_year = config.start_year,
        end_year = config.end_year,
        output = %config.dirs.output.display(),
        "startup"
    );

    // ─── 3) dispatch ─────────────────────────────────────────────────
    let start = Instant::now();
    match cli.command {
        Command::Fetch { force } => fetch::collect_all(&config, force).await?,
        Command::Normalize => normalize(&config)?,
        Command::Aggregate => {
            aggregate::aggregate_all(&config)?;
        }
        Command::Run { fetch, force } => {
            if fetch {
                fetch::collect_all(&config, force).await?;
            }
            normalize(&config)?;
            aggregate::aggregate_all(&config)?;
        }
        Command::View { place, year, tract } => print_view(&config, &place, year, tract.as_deref())?,
    }
    info!(elapsed = ?start.elapsed(), "done");
    Ok(())
}

fn normalize(config: &PipelineConfig) -> Result<()> {
    let tables = process::normalize_all(config)?;
    let rows: usize = tables.iter().map(Vec::len).sum();
    info!(years = tables.len(), rows, "normalized");
    Ok(())
}

fn print_view(config: &PipelineConfig, place: &str, year: Option<i32>, tract: Option<&str>) -> Result<()> {
    let dashboard = Dashboard::load(config).context("loading dashboard artifacts")?;
    let options = dashboard.year_options(place);
    if options.is_empty() {
        warn!(place, "unknown place");
    }
    let year = match year.or_else(|| view::default_year(options)) {
        Some(y) => y,
        None => anyhow::bail!("no year with data for {:?}", place),
    };
    let years: Vec<i32> = enabled(options).into_iter().collect();

    let out = json!({
        "place": place,
        "year": year,
        "years": years,
        "tracts": dashboard.tract_options(place, year),
        "plot_title": view::plot_title(place, tract),
        "map": dashboard.map_view(place, year, tract),
        "plot": dashboard.plot_view(place, tract),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
