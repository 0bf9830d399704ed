//! Streams a pose file to the analysis server and prints the final status.
//!
//! usage: pose_replay <server_addr> <poses.jsonl> [poll_every]

use anyhow::{Context, Result};
use std::path::Path;
use tokio::net::TcpStream;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trasa_analyzer::config::Config;
use trasa_analyzer::job::{JobStatus, StatusRecord};
use trasa_analyzer::protocol::{self, ClientMessage, MessageStream, ServerMessage};
use trasa_analyzer::source::{FrameSource, JsonlSource};

const CONFIG_PATH: &str = "trasa.toml";

async fn recv_status(stream: &mut MessageStream) -> Result<StatusRecord> {
    match protocol::recv_message::<ServerMessage>(stream).await? {
        ServerMessage::Status(record) => Ok(record),
        ServerMessage::Rejected { reason } => Err(anyhow::anyhow!("server rejected: {}", reason)),
    }
}

fn progress_line(record: &StatusRecord) -> String {
    match &record.result {
        Some(result) => {
            let counts: Vec<String> = result
                .final_counts
                .iter()
                .map(|(ty, n)| format!("{}={}", ty.name(), n))
                .collect();
            format!("frames={} {}", result.total_frames, counts.join(" "))
        }
        None => "no snapshot yet".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pose_replay=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: {} <server_addr> <poses.jsonl> [poll_every]", args[0]);
        std::process::exit(2);
    }
    let addr = &args[1];
    let pose_path = &args[2];
    let poll_every: u64 = match args.get(3) {
        Some(n) => n.parse().context("poll_every must be a number")?,
        None => 100,
    };
    let config = Config::load_or_default(CONFIG_PATH);

    let mut source = JsonlSource::open(pose_path)
        .with_context(|| format!("failed to open {}", pose_path))?;
    let id = Path::new(pose_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| pose_path.clone());

    let tcp = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    tcp.set_nodelay(true)?;
    let mut stream = protocol::message_stream(tcp, config.server.max_frame_length);
    info!("Connected to {} ({})", addr, env!("GIT_VERSION"));

    protocol::send_message(&mut stream, &ClientMessage::Start { id: id.clone() }).await?;

    let mut sent: u64 = 0;
    while let Some(pose) = source.next_frame()? {
        protocol::send_message(&mut stream, &ClientMessage::Frame { pose }).await?;
        sent += 1;
        if poll_every > 0 && sent % poll_every == 0 {
            protocol::send_message(&mut stream, &ClientMessage::Poll).await?;
            let record = recv_status(&mut stream).await?;
            info!("[{}] sent={} {}", id, sent, progress_line(&record));
        }
    }

    protocol::send_message(&mut stream, &ClientMessage::Finish).await?;
    let record = recv_status(&mut stream).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    if record.status != JobStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}
