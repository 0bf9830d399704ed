use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trasa_analyzer::analysis::supported_exercises;
use trasa_analyzer::config::Config;
use trasa_analyzer::job::{self, JobStatus};
use trasa_analyzer::source::JsonlSource;

const CONFIG_PATH: &str = "trasa.toml";

fn usage() -> ! {
    eprintln!("usage: trasa-analyzer <poses.jsonl> [config.toml]");
    eprintln!("       trasa-analyzer --exercises");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trasa_analyzer=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(pose_path) = args.next() else { usage() };

    if pose_path == "--exercises" {
        for (exercise, description) in supported_exercises() {
            println!("{:<8} {}", exercise.name(), description);
        }
        return Ok(());
    }

    let config = match args.next() {
        Some(path) => Config::load(&path)?,
        None => Config::load_or_default(CONFIG_PATH),
    };

    info!("Trasa Analyzer ({})", env!("GIT_VERSION"));
    info!(
        "[config] frame_stride={}, publish_interval={}, history={}",
        config.job.frame_stride, config.job.publish_interval, config.counter.history_capacity
    );

    let source = JsonlSource::open(&pose_path)
        .with_context(|| format!("failed to open {}", pose_path))?;
    let id = Path::new(&pose_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| pose_path.clone());

    let handle = job::spawn_source(id, &config, source);
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling analysis");
            cancel.cancel();
        }
    });

    let record = handle.wait().await;
    println!("{}", serde_json::to_string_pretty(&record)?);
    if record.status != JobStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}
