//! Processing job commands: start a job, watch it, read its status.

use std::time::Duration;

use clap::Subcommand;
use heatmap_client::{poll_until_terminal, ClientError, HeatmapClient};
use heatmap_core::{JobSnapshot, JobState};
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum ProcessCommands {
    /// Start processing every active camera of a store
    Start {
        #[arg(long)]
        store: Uuid,
        /// Keep polling until the job finishes
        #[arg(long)]
        watch: bool,
    },
    /// Poll a running job until it completes or fails
    Watch {
        #[arg(long)]
        store: Uuid,
    },
    /// Print the current job status once
    Status {
        #[arg(long)]
        store: Uuid,
    },
}

/// One status line: state, overall percentage while processing, message.
pub(crate) fn describe(snapshot: &JobSnapshot) -> String {
    match &snapshot.state {
        JobState::NotStarted => "not_started".to_string(),
        JobState::Processing { progress, message } => {
            let cameras: Vec<String> = progress
                .values()
                .map(|c| format!("{} {:.0}%", c.name, c.progress))
                .collect();
            format!(
                "processing {:.1}% [{}] {message}",
                snapshot.overall_progress().unwrap_or(0.0),
                cameras.join(", ")
            )
        }
        JobState::Completed { result, message } => format!(
            "completed: {} hourly, {} daily, {} insights ({message})",
            result.hourly_heatmaps, result.daily_heatmaps, result.insights_generated
        ),
        JobState::Error { message } => format!("error: {message}"),
    }
}

pub(crate) async fn run_process_start(
    client: &HeatmapClient,
    store_id: Uuid,
    watch: bool,
    interval: Duration,
) -> anyhow::Result<()> {
    let snapshot = client.start_processing(store_id).await?;
    let job = snapshot.job_id.map(|id| id.to_string()).unwrap_or_default();
    println!("started job {job}");
    println!("{}", describe(&snapshot));

    if watch {
        run_process_watch(client, store_id, interval).await?;
    }
    Ok(())
}

pub(crate) async fn run_process_watch(
    client: &HeatmapClient,
    store_id: Uuid,
    interval: Duration,
) -> anyhow::Result<()> {
    let mut last = String::new();
    let outcome = poll_until_terminal(client, store_id, interval, |snapshot| {
        let line = describe(snapshot);
        if line != last {
            println!("{line}");
            last = line;
        }
    })
    .await;

    match outcome {
        Ok(_) => Ok(()),
        Err(ClientError::JobFailed(message)) => {
            anyhow::bail!("processing for store {store_id} failed: {message}")
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn run_process_status(
    client: &HeatmapClient,
    store_id: Uuid,
) -> anyhow::Result<()> {
    let snapshot = client.processing_status(store_id).await?;
    println!("{}", describe(&snapshot));
    Ok(())
}
