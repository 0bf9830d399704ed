//! Per-connection analysis over the framed TCP link.
//!
//! A client opens with `Start`, streams `Frame`s in capture order and ends
//! with `Finish` or `Cancel`; `Poll` returns the latest status record at
//! any point. Losing the connection before `Finish` fails the job.

use anyhow::Result;
use futures::stream::SplitStream;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AnalysisError;
use crate::job::{self, JobInput, JobStatus, StatusRecord};
use crate::protocol::{self, ClientMessage, MessageStream, ServerMessage};

async fn next_message(reader: &mut SplitStream<MessageStream>) -> Result<Option<ClientMessage>> {
    match reader.next().await {
        Some(Ok(bytes)) => Ok(Some(bincode::deserialize(&bytes)?)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

fn rejected(reason: &str) -> ServerMessage {
    ServerMessage::Rejected { reason: reason.to_string() }
}

/// Run one connection's job to its end.
///
/// Returns the terminal record, or `None` when the client left before
/// `Start`. A protocol violation before `Start` is an error.
pub async fn handle_connection(
    stream: TcpStream,
    config: &Config,
    shutdown: CancellationToken,
) -> Result<Option<StatusRecord>> {
    let framed = protocol::message_stream(stream, config.server.max_frame_length);
    let (mut sink, mut reader) = framed.split();

    let id = match next_message(&mut reader).await? {
        Some(ClientMessage::Start { id }) => id,
        Some(other) => {
            protocol::send_to_sink(&mut sink, &rejected("expected Start")).await?;
            return Err(anyhow::anyhow!("expected Start, got {:?}", other));
        }
        None => return Ok(None),
    };

    let (tx, rx) = job::frame_channel(config);
    let handle = job::spawn(id.clone(), config, rx);
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                handle.cancel();
                break;
            }
            msg = next_message(&mut reader) => {
                let msg = match msg {
                    Ok(Some(msg)) => msg,
                    Ok(None) | Err(_) => {
                        // Connection lost before Finish
                        let _ = tx.send(JobInput::Fail(AnalysisError::Disconnected)).await;
                        let record = handle.wait().await;
                        warn!("[{}] client gone after {} frames: {:?}", id, frames, record.status);
                        return Ok(Some(record));
                    }
                };
                match msg {
                    ClientMessage::Frame { pose } => {
                        if tx.send(JobInput::Frame(pose)).await.is_err() {
                            protocol::send_to_sink(&mut sink, &rejected("job is no longer accepting frames")).await?;
                            break;
                        }
                        frames += 1;
                    }
                    ClientMessage::Poll => {
                        protocol::send_to_sink(&mut sink, &ServerMessage::Status(handle.status())).await?;
                    }
                    ClientMessage::Finish => {
                        let _ = tx.send(JobInput::Finish).await;
                        break;
                    }
                    ClientMessage::Cancel => {
                        handle.cancel();
                        break;
                    }
                    ClientMessage::Start { .. } => {
                        protocol::send_to_sink(&mut sink, &rejected("job already started")).await?;
                    }
                }
            }
        }
    }

    let record = handle.wait().await;
    match record.status {
        JobStatus::Completed => info!("[{}] completed after {} frames", id, frames),
        _ => warn!("[{}] ended {:?}: {}", id, record.status, record.error.as_deref().unwrap_or("")),
    }
    protocol::send_to_sink(&mut sink, &ServerMessage::Status(record.clone())).await?;
    Ok(Some(record))
}
