use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod aggregate;
mod canonical;
mod config;
mod loader;
mod models;
mod query;
mod report;
mod risk;
mod store;
mod window;

use aggregate::Granularity;
use models::SourceHealth;
use query::{Level, QueryParams};
use store::Store;

#[derive(Parser)]
#[command(name = "regional-activity-tracker")]
#[command(about = "Regional enrolment and update activity metrics", long_about = None)]
struct Cli {
    /// Directory holding the per-source CSV folders and flat exports
    #[arg(long, global = true, env = "TRACKER_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,
    /// JSON object of region -> annual births replacing the built-in table
    #[arg(long, global = true, env = "TRACKER_BIRTH_PROXY")]
    birth_proxy: Option<PathBuf>,
    /// Emit JSON log lines
    #[arg(long, global = true, env = "TRACKER_LOG_JSON")]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct Filters {
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    subregion: Option<String>,
    /// One of 1m, 3m, 6m, 1y
    #[arg(long)]
    preset: Option<String>,
    /// Window start, YYYY-MM-DD
    #[arg(long)]
    start: Option<String>,
    /// Window end, YYYY-MM-DD
    #[arg(long)]
    end: Option<String>,
}

impl Filters {
    /// Apply `default_preset` only when the caller gave no window at all.
    fn params(self, default_preset: &str) -> QueryParams {
        let preset = match (self.preset, &self.start, &self.end) {
            (Some(preset), _, _) => Some(preset),
            (None, None, None) => Some(default_preset.to_string()),
            (None, _, _) => None,
        };
        QueryParams {
            region: self.region.map(|r| canonical::region_name(&r)),
            subregion: self.subregion,
            preset,
            start: self.start,
            end: self.end,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GranularityArg {
    Monthly,
    Quarterly,
    Yearly,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Monthly => Granularity::Monthly,
            GranularityArg::Quarterly => Granularity::Quarterly,
            GranularityArg::Yearly => Granularity::Yearly,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Region,
    Subregion,
}

impl From<LevelArg> for Level {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Region => Level::Region,
            LevelArg::Subregion => Level::Subregion,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Per-source load status
    Health,
    /// Regions, sub-regions, date bounds and window presets
    Meta,
    /// Headline activity figures for a window
    Summary {
        #[command(flatten)]
        filters: Filters,
    },
    /// Adult share and activity per time bucket
    Timeseries {
        #[command(flatten)]
        filters: Filters,
        #[arg(long, value_enum, default_value_t = GranularityArg::Monthly)]
        granularity: GranularityArg,
    },
    /// Regions or sub-regions ranked by migration proxy
    Map {
        #[command(flatten)]
        filters: Filters,
        #[arg(long, value_enum, default_value_t = LevelArg::Region)]
        level: LevelArg,
    },
    /// Top ranked regions plus the full scatter set
    Comparisons {
        #[command(flatten)]
        filters: Filters,
    },
    /// Short narrative findings
    Insights {
        #[command(flatten)]
        filters: Filters,
    },
    /// Composite risk index per region
    Risk,
    /// All three sources per time bucket over the full dataset
    Trend {
        #[arg(long)]
        region: Option<String>,
        #[arg(long, value_enum, default_value_t = GranularityArg::Monthly)]
        granularity: GranularityArg,
    },
    /// Write a markdown briefing
    Report {
        #[command(flatten)]
        filters: Filters,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Reload the datasets on an interval until interrupted
    Watch {
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
    },
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialise output")?;
    println!("{text}");
    Ok(())
}

fn log_health(snapshot: &store::Snapshot) {
    for (source, health) in &snapshot.health {
        match health {
            SourceHealth::Error { message } => warn!(%source, %message, "source unavailable"),
            other => info!(%source, status = %other, "source status"),
        }
    }
}

async fn watch(store: Arc<Store>, interval_secs: u64) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    // The first tick fires immediately and the store is already loaded.
    ticker.tick().await;
    info!(data_dir = %store.data_dir().display(), interval_secs, "watching for changes");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let store = Arc::clone(&store);
                let snapshot = tokio::task::spawn_blocking(move || store.reload())
                    .await
                    .context("reload task failed")?;
                info!(snapshot = %snapshot.id, regions = snapshot.regions.len(), "reloaded");
                log_health(&snapshot);
            }
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                info!("stopping");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let table = config::birth_proxy_table(cli.birth_proxy.as_deref())
        .context("failed to load birth-proxy table")?;
    let store = Arc::new(Store::load(&cli.data_dir));
    let snapshot = store.snapshot();

    match cli.command {
        Commands::Health => print_json(&query::health(&snapshot))?,
        Commands::Meta => print_json(&query::meta(&snapshot))?,
        Commands::Summary { filters } => {
            print_json(&query::summary(&snapshot, &filters.params("3m")))?
        }
        Commands::Timeseries {
            filters,
            granularity,
        } => print_json(&query::timeseries(
            &snapshot,
            &filters.params("6m"),
            granularity.into(),
        ))?,
        Commands::Map { filters, level } => {
            print_json(&query::ranking(&snapshot, &filters.params("6m"), level.into()))?
        }
        Commands::Comparisons { filters } => {
            print_json(&query::comparisons(&snapshot, &filters.params("6m")))?
        }
        Commands::Insights { filters } => {
            print_json(&query::insights(&snapshot, &filters.params("3m")))?
        }
        Commands::Risk => {
            let scores = risk::score_regions(&snapshot.datasets, &table);
            print_json(&risk::overview(scores))?
        }
        Commands::Trend {
            region,
            granularity,
        } => {
            let region = region.map(|r| canonical::region_name(&r));
            print_json(&query::stream_trend(&snapshot, region.as_deref(), granularity.into()))?
        }
        Commands::Report { filters, out } => {
            let params = filters.params("3m");
            let health = query::health(&snapshot);
            let summary = query::summary(&snapshot, &params);
            let ranking = query::ranking(&snapshot, &params, Level::Region);
            let risk = risk::overview(risk::score_regions(&snapshot.datasets, &table));
            let insights = query::insights(&snapshot, &params);
            let report = report::build_report(&report::ReportInput {
                scope: params.region.as_deref(),
                health: &health,
                summary: &summary,
                ranking: &ranking,
                risk: &risk,
                insights: &insights,
            });
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch { interval_secs } => {
            log_health(&snapshot);
            watch(store, interval_secs).await?;
        }
    }

    Ok(())
}
