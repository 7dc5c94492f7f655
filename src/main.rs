use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use tryon_jobs::{
    app_state::AppState,
    config::TrackerConfig,
    models::{
        job::{JobId, JobKind},
        payload::{AvatarRequest, SubmitPayload, TryOnRequest},
        update::{JobUpdate, Outcome},
    },
};

#[derive(Parser, Debug)]
#[command(name = "tryon-jobs")]
#[command(version)]
#[command(about = "Submit and track avatar creation and virtual try-on jobs")]
struct Cli {
    /// Also listen for pushed changes when a realtime endpoint is configured
    #[arg(long, global = true)]
    realtime: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an avatar from a source photo and track it
    Avatar {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        image_url: String,
        #[arg(long)]
        body_type: Option<String>,
    },
    /// Try a garment on an existing avatar and track it
    Tryon {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        avatar_id: String,
        #[arg(long)]
        garment_url: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Track a job that was already submitted
    Watch {
        #[arg(long)]
        kind: JobKind,
        #[arg(long)]
        job_id: String,
    },
}

enum Target {
    Submit(SubmitPayload),
    Existing(JobKind, JobId),
}

impl Command {
    fn into_target(self) -> Target {
        match self {
            Command::Avatar {
                user_id,
                image_url,
                body_type,
            } => Target::Submit(SubmitPayload::from(AvatarRequest {
                user_id,
                source_image_url: image_url,
                body_type,
            })),
            Command::Tryon {
                user_id,
                avatar_id,
                garment_url,
                category,
            } => Target::Submit(SubmitPayload::from(TryOnRequest {
                user_id,
                avatar_id,
                garment_image_url: garment_url,
                garment_category: category,
            })),
            Command::Watch { kind, job_id } => Target::Existing(kind, JobId::new(job_id)),
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config = TrackerConfig::from_env().expect("Failed to load configuration from environment");

    metrics::describe_counter!("tryon_jobs_submitted_total", "Jobs accepted by a backend");
    metrics::describe_counter!(
        "tryon_jobs_submit_fallbacks_total",
        "Submissions retried on a fallback backend"
    );
    metrics::describe_counter!(
        "tryon_jobs_poll_timeouts_total",
        "Polling sessions that ran out of attempts"
    );

    let mut state = AppState::from_config(&config).expect("Failed to initialize job services");
    if !cli.realtime {
        state = state.without_realtime();
    }

    let (kind, job_id) = match cli.command.into_target() {
        Target::Existing(kind, job_id) => (kind, job_id),
        Target::Submit(payload) => {
            let kind = payload.kind();
            match state.gateway.submit(kind, &payload).await {
                Ok(handle) => (kind, handle.id),
                Err(e) => {
                    tracing::error!(
                        kind = %kind,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Submission failed"
                    );
                    std::process::exit(1);
                }
            }
        }
    };

    tracing::info!(job_id = %job_id, kind = %kind, "Tracking job");

    let (tx, mut rx) = mpsc::unbounded_channel::<JobUpdate>();
    let tracking = state.tracker.track(kind, job_id, move |update| {
        let _ = tx.send(update);
    });

    let mut exit_code = 0;
    while let Some(update) = rx.recv().await {
        tracing::info!(
            job_id = %update.job_id,
            status = %update.status,
            percentage = update.percentage,
            stage = %update.stage,
            "Progress"
        );

        match update.outcome() {
            Some(Outcome::Completed(outputs)) => {
                for output in outputs {
                    println!("{}", output.url);
                }
                break;
            }
            Some(Outcome::Failed(message)) => {
                tracing::error!(job_id = %update.job_id, error = %message, "Job failed");
                exit_code = 2;
                break;
            }
            Some(Outcome::TimedOut) => {
                tracing::warn!(job_id = %update.job_id, "Job still running, check again later");
                exit_code = 3;
                break;
            }
            None => {}
        }
    }

    tracking.stop();
    tracking.finished().await;
    std::process::exit(exit_code);
}
