mod process;
mod report;
mod zone;

use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use heatmap_client::{HeatmapClient, RetryPolicy};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::process::ProcessCommands;
use crate::report::HeatmapCommands;
use crate::zone::ZoneCommands;

#[derive(Debug, Parser)]
#[command(name = "heatmap-cli")]
#[command(about = "Retail zone heatmap command line interface")]
struct Cli {
    /// Base URL of the heatmap service
    #[arg(
        long,
        global = true,
        env = "HEATMAP_API_URL",
        default_value = "http://localhost:3000"
    )]
    api_url: String,
    /// Delay between status reads while watching a job
    #[arg(long, global = true, env = "HEATMAP_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,
    #[arg(long, global = true, env = "HEATMAP_CLIENT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,
    #[arg(
        long,
        global = true,
        env = "HEATMAP_CLIENT_RETRY_BACKOFF_BASE_MS",
        default_value_t = 500
    )]
    retry_backoff_base_ms: u64,
    #[arg(
        long,
        global = true,
        env = "HEATMAP_CLIENT_REQUEST_TIMEOUT_SECS",
        default_value_t = 30
    )]
    request_timeout_secs: u64,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check zone polygons offline
    Zone {
        #[command(subcommand)]
        command: ZoneCommands,
    },
    /// Start and follow processing jobs
    Process {
        #[command(subcommand)]
        command: ProcessCommands,
    },
    /// Print classified heatmaps
    Heatmaps {
        #[command(subcommand)]
        command: HeatmapCommands,
    },
    /// Print daily insights with recommendations
    Insights {
        #[arg(long)]
        store: Uuid,
        /// Single day (YYYY-MM-DD); all days when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List stores and their cameras
    Stores,
}

impl Cli {
    fn client(&self) -> anyhow::Result<HeatmapClient> {
        Ok(
            HeatmapClient::new(&self.api_url, self.request_timeout_secs)?.with_retry(RetryPolicy {
                max_retries: self.max_retries,
                backoff_base_ms: self.retry_backoff_base_ms,
            }),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(api_url = %cli.api_url, "cli configured");
    let interval = Duration::from_millis(cli.poll_interval_ms);

    match &cli.command {
        Some(Commands::Zone {
            command:
                ZoneCommands::Check {
                    points,
                    canvas,
                    resolution,
                    probe,
                },
        }) => zone::run_zone_check(points, canvas, resolution.as_deref(), probe.as_deref())?,
        Some(Commands::Process { command }) => {
            let client = cli.client()?;
            match command {
                ProcessCommands::Start { store, watch } => {
                    process::run_process_start(&client, *store, *watch, interval).await?;
                }
                ProcessCommands::Watch { store } => {
                    process::run_process_watch(&client, *store, interval).await?;
                }
                ProcessCommands::Status { store } => {
                    process::run_process_status(&client, *store).await?;
                }
            }
        }
        Some(Commands::Heatmaps { command }) => {
            let client = cli.client()?;
            match command {
                HeatmapCommands::Hourly { store, camera } => {
                    report::run_hourly(&client, *store, *camera).await?;
                }
                HeatmapCommands::Daily { store, camera } => {
                    report::run_daily(&client, *store, *camera).await?;
                }
            }
        }
        Some(Commands::Insights { store, date }) => {
            report::run_insights(&cli.client()?, *store, *date).await?;
        }
        Some(Commands::Stores) => report::run_stores(&cli.client()?).await?,
        None => println!("heatmap-cli ready; see --help"),
    }

    Ok(())
}
