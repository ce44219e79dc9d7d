//! imgprobe: derives photometric variants of images and runs forensic
//! analyzers over them.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use imgprobe::{resolve_config, Dispatcher, ImgprobeError, TaskError, TaskProgressBroadcaster};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Forensic image analysis orchestrator.
#[derive(Parser, Debug)]
#[command(name = "imgprobe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file. Defaults to the per-user config if present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Log every progress event of every task.
    #[arg(long)]
    progress: bool,

    /// Override the directory derived artifacts are written to.
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Images to analyze.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = imgprobe::logging::init_tracing(args.json_logs) {
        eprintln!("imgprobe: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every task completed successfully.
async fn run(args: Args) -> Result<bool, ImgprobeError> {
    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(dir) = args.artifact_dir {
        config.artifact_directory = dir;
    }

    let mut dispatcher = Dispatcher::from_config(&config)?;
    if args.progress {
        let broadcaster = TaskProgressBroadcaster::default();
        let mut events = broadcaster.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => info!(target: "imgprobe::progress", "{}", line),
                        Err(e) => warn!("Failed to render progress event: {}", e),
                    },
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Progress stream lagged, {} event(s) dropped", missed)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        dispatcher = dispatcher.with_broadcaster(broadcaster);
    }
    let reporter = dispatcher.reporter();
    info!(
        "imgprobe starting: {} image(s), up to {} at a time",
        args.images.len(),
        config.max_concurrent_tasks
    );

    let mut task_ids = Vec::with_capacity(args.images.len());
    for image in args.images {
        let handle = dispatcher.submit(image);
        match serde_json::to_string(&handle.submit_response()) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to render submit response: {}", e),
        }
        task_ids.push(handle.id().to_string());
    }

    // Handles are detached; completion is observed through the status view.
    loop {
        let mut pending = 0;
        for id in &task_ids {
            match reporter.status(id) {
                Ok(task) if !task.is_terminal() => pending += 1,
                Ok(_) | Err(TaskError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        if pending == 0 {
            break;
        }
        debug!("{} task(s) still running", pending);
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let mut all_done = true;
    for id in &task_ids {
        match reporter.status_json(id) {
            Ok(snapshot) => {
                all_done &= snapshot["done"].as_bool().unwrap_or(false);
                match serde_json::to_string_pretty(&snapshot) {
                    Ok(text) => println!("{}", text),
                    Err(e) => warn!("Failed to render task {}: {}", id, e),
                }
            }
            Err(TaskError::NotFound(_)) => {
                warn!("Task {} was evicted before it could be reported", id);
                all_done = false;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let counts = dispatcher.store().counts();
    info!(
        "Finished: {} done, {} failed",
        counts.done, counts.failed
    );
    Ok(all_done)
}
