//! TCP protocol between a pose producer and the analysis server.
//!
//! Length-delimited frames carrying bincode payloads. One connection hosts
//! one analysis job.

use bytes::Bytes;
use futures::{Sink, SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::job::StatusRecord;
use crate::pose::Frame;

pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

// --- Message types ---

/// Producer → server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Open the connection's job; must come first
    Start { id: String },
    /// Next frame in capture order; `None` = no pose detected
    Frame { pose: Frame },
    /// End of stream, job completes
    Finish,
    Cancel,
    /// Ask for the latest status record
    Poll,
}

/// Server → producer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Status(StatusRecord),
    /// Protocol misuse, e.g. a frame before `Start`
    Rejected { reason: String },
}

// --- TCP codec helpers ---

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream, max_frame_length: usize) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_length)
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize>(
    stream: &mut MessageStream,
    msg: &T,
) -> anyhow::Result<()> {
    send_to_sink(stream, msg).await
}

/// Same as [`send_message`] for the write half of a split stream.
pub async fn send_to_sink<S, T>(sink: &mut S, msg: &T) -> anyhow::Result<()>
where
    S: Sink<Bytes> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
    T: Serialize,
{
    let data = bincode::serialize(msg)?;
    sink.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(
    stream: &mut MessageStream,
) -> anyhow::Result<T> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(bincode::deserialize(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use crate::pose::{Joint, JointIndex, PoseFrame};
    use tokio::net::TcpListener;

    async fn connected_pair(max_frame_length: usize) -> (MessageStream, MessageStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (
            message_stream(client, max_frame_length),
            message_stream(server, max_frame_length),
        )
    }

    #[tokio::test]
    async fn test_session_exchange() {
        let (mut client, mut server) = connected_pair(DEFAULT_MAX_FRAME_LENGTH).await;
        let pose = PoseFrame::new([Joint::new(0.5, 0.25, 0.1); JointIndex::COUNT]);

        send_message(&mut client, &ClientMessage::Start { id: "clip".into() }).await.unwrap();
        send_message(&mut client, &ClientMessage::Frame { pose: Some(pose.clone()) }).await.unwrap();
        send_message(&mut client, &ClientMessage::Frame { pose: None }).await.unwrap();

        let got: ClientMessage = recv_message(&mut server).await.unwrap();
        assert_eq!(got, ClientMessage::Start { id: "clip".into() });
        let got: ClientMessage = recv_message(&mut server).await.unwrap();
        assert_eq!(got, ClientMessage::Frame { pose: Some(pose) });
        let got: ClientMessage = recv_message(&mut server).await.unwrap();
        assert_eq!(got, ClientMessage::Frame { pose: None });

        let (mut sink, _reader) = server.split();
        let status = ServerMessage::Status(StatusRecord::processing("clip"));
        send_to_sink(&mut sink, &status).await.unwrap();
        match recv_message::<ServerMessage>(&mut client).await.unwrap() {
            ServerMessage::Status(record) => {
                assert_eq!(record.id, "clip");
                assert_eq!(record.status, JobStatus::Processing);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let (client, mut server) = connected_pair(DEFAULT_MAX_FRAME_LENGTH).await;
        drop(client);
        assert!(recv_message::<ClientMessage>(&mut server).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = connected_pair(64).await;
        let pose = PoseFrame::new([Joint::default(); JointIndex::COUNT]);
        // The sending codec enforces the limit too
        assert!(send_message(&mut client, &ClientMessage::Frame { pose: Some(pose) })
            .await
            .is_err());
        drop(client);
        assert!(recv_message::<ClientMessage>(&mut server).await.is_err());
    }
}
