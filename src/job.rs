//! Background whole-video analysis with pollable status records.
//!
//! A job owns one [`AnalysisSession`] on a tokio task. Frames arrive in
//! capture order over a bounded channel; snapshots go out through a
//! `watch` channel so every reader sees a whole record from one instant.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalysisSession, SessionResult};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::pose::Frame;
use crate::source::FrameSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: String,
    pub status: JobStatus,
    pub result: Option<SessionResult>,
    pub error: Option<String>,
}

impl StatusRecord {
    pub fn processing(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: JobStatus::Processing,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != JobStatus::Processing
    }
}

/// What a producer pushes into a job.
///
/// The stream must end with `Finish` or `Fail`. A channel that closes
/// without either means the producer died, and the job fails.
#[derive(Debug)]
pub enum JobInput {
    Frame(Frame),
    Finish,
    Fail(AnalysisError),
}

pub type FrameSender = mpsc::Sender<JobInput>;
pub type FrameReceiver = mpsc::Receiver<JobInput>;

pub fn frame_channel(config: &Config) -> (FrameSender, FrameReceiver) {
    mpsc::channel(config.job.channel_capacity.max(1))
}

pub struct JobHandle {
    id: String,
    status: watch::Receiver<StatusRecord>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latest published snapshot
    pub fn status(&self) -> StatusRecord {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusRecord> {
        self.status.clone()
    }

    /// Takes effect before the next frame is processed
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the terminal record
    pub async fn wait(self) -> StatusRecord {
        if let Err(e) = self.task.await {
            tracing::error!(id = %self.id, "analysis task aborted: {}", e);
            return StatusRecord {
                error: Some(format!("analysis task aborted: {}", e)),
                status: JobStatus::Failed,
                ..StatusRecord::processing(&self.id)
            };
        }
        self.status.borrow().clone()
    }
}

/// Start a job fed by `frames`. Must be called inside a tokio runtime.
pub fn spawn(id: impl Into<String>, config: &Config, frames: FrameReceiver) -> JobHandle {
    let id = id.into();
    let (tx, rx) = watch::channel(StatusRecord::processing(&id));
    let cancel = CancellationToken::new();
    let publisher = StatusPublisher {
        id: id.clone(),
        tx,
    };

    tracing::info!(id = %id, "analysis started");
    let task = tokio::spawn(run(config.clone(), frames, cancel.clone(), publisher));

    JobHandle {
        id,
        status: rx,
        cancel,
        task,
    }
}

/// Start a job that pulls from a blocking [`FrameSource`] on the blocking pool
pub fn spawn_source<S>(id: impl Into<String>, config: &Config, source: S) -> JobHandle
where
    S: FrameSource + 'static,
{
    let (tx, rx) = frame_channel(config);
    let handle = spawn(id, config, rx);
    let cancel = handle.cancellation_token();
    tokio::task::spawn_blocking(move || produce(source, tx, cancel));
    handle
}

fn produce<S: FrameSource>(mut source: S, tx: FrameSender, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        let (input, last) = match source.next_frame() {
            Ok(Some(frame)) => (JobInput::Frame(frame), false),
            Ok(None) => (JobInput::Finish, true),
            Err(e) => (JobInput::Fail(e), true),
        };
        // Receiver gone: the job already finished
        if tx.blocking_send(input).is_err() || last {
            return;
        }
    }
}

async fn run(
    config: Config,
    mut frames: FrameReceiver,
    cancel: CancellationToken,
    publisher: StatusPublisher,
) {
    let mut session = AnalysisSession::new(&config);
    let stride = config.job.frame_stride.max(1);
    let interval = config.job.publish_interval;
    let mut index: u64 = 0;
    let mut processed: u64 = 0;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Err(AnalysisError::Cancelled),
            next = frames.recv() => next,
        };
        let frame = match next {
            Some(JobInput::Frame(frame)) => frame,
            Some(JobInput::Finish) => break Ok(()),
            Some(JobInput::Fail(e)) => break Err(e),
            // Sender dropped without finishing, e.g. a panicking source
            None => break Err(AnalysisError::Disconnected),
        };

        if index % stride == 0 {
            session.process(frame.as_ref(), index);
            processed += 1;
            if interval > 0 && processed % interval == 0 {
                publisher.progress(session.finalize());
            }
        }
        index += 1;
    };

    match outcome {
        Ok(()) => publisher.complete(session.finalize()),
        Err(e) => publisher.fail(&e),
    }
}

/// Write side of a job's status. Terminal transitions consume it, so a job
/// ends exactly once.
struct StatusPublisher {
    id: String,
    tx: watch::Sender<StatusRecord>,
}

impl StatusPublisher {
    fn progress(&self, result: SessionResult) {
        self.tx.send_replace(StatusRecord {
            result: Some(result),
            ..StatusRecord::processing(&self.id)
        });
    }

    fn complete(self, result: SessionResult) {
        tracing::info!(
            id = %self.id,
            frames = result.total_frames,
            dominant = ?result.dominant_exercise,
            "analysis completed"
        );
        self.tx.send_replace(StatusRecord {
            status: JobStatus::Completed,
            result: Some(result),
            ..StatusRecord::processing(&self.id)
        });
    }

    fn fail(self, error: &AnalysisError) {
        tracing::warn!(id = %self.id, "analysis failed: {}", error);
        self.tx.send_replace(StatusRecord {
            status: JobStatus::Failed,
            error: Some(error.to_string()),
            ..StatusRecord::processing(&self.id)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::push_up_cycle;
    use crate::analysis::ExerciseType;
    use crate::source::IterSource;

    struct FailingSource {
        remaining: usize,
    }

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError> {
            if self.remaining == 0 {
                return Err(AnalysisError::Source("camera unplugged".to_string()));
            }
            self.remaining -= 1;
            Ok(Some(None))
        }
    }

    /// Yields push-up frames, then dies mid-stream
    struct PanickingSource {
        remaining: usize,
    }

    impl FrameSource for PanickingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError> {
            if self.remaining == 0 {
                panic!("decoder crashed");
            }
            self.remaining -= 1;
            Ok(Some(Some(push_up_cycle()[self.remaining % 7].clone())))
        }
    }

    fn push_up_frames(reps: usize) -> Vec<Frame> {
        (0..reps).flat_map(|_| push_up_cycle()).map(Some).collect()
    }

    #[tokio::test]
    async fn test_job_completes() {
        let config = Config::default();
        let handle = spawn_source("video-1", &config, IterSource::new(push_up_frames(5)));
        let record = handle.wait().await;

        assert_eq!(record.id, "video-1");
        assert_eq!(record.status, JobStatus::Completed);
        assert!(record.error.is_none());
        let result = record.result.unwrap();
        assert_eq!(result.count(ExerciseType::PushUp), 5);
        assert_eq!(result.total_frames, 35);
    }

    #[tokio::test]
    async fn test_job_starts_processing() {
        let config = Config::default();
        let (_tx, rx) = frame_channel(&config);
        let handle = spawn("video-2", &config, rx);
        let record = handle.status();
        assert_eq!(record.status, JobStatus::Processing);
        assert!(!record.is_terminal());
        handle.cancel();
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_source_error_fails_job() {
        let config = Config::default();
        let handle = spawn_source("video-3", &config, FailingSource { remaining: 3 });
        let record = handle.wait().await;

        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.result.is_none());
        assert!(record.error.unwrap().contains("camera unplugged"));
    }

    #[tokio::test]
    async fn test_cancel_fails_job() {
        let config = Config::default();
        let (tx, rx) = frame_channel(&config);
        let handle = spawn("video-4", &config, rx);
        for frame in push_up_frames(1) {
            tx.send(JobInput::Frame(frame)).await.unwrap();
        }
        handle.cancel();
        let record = handle.wait().await;

        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("analysis cancelled"));
        assert!(record.result.is_none());
        drop(tx);
    }

    #[tokio::test]
    async fn test_intermediate_snapshots() {
        let mut config = Config::default();
        config.job.publish_interval = 7;
        let (tx, rx) = frame_channel(&config);
        let handle = spawn("video-5", &config, rx);
        let mut status = handle.subscribe();

        for frame in push_up_frames(1) {
            tx.send(JobInput::Frame(frame)).await.unwrap();
        }
        status.changed().await.unwrap();
        let snapshot = status.borrow_and_update().clone();
        assert_eq!(snapshot.status, JobStatus::Processing);
        let result = snapshot.result.unwrap();
        assert_eq!(result.total_frames, 7);
        // Counts and trace come from the same instant
        assert_eq!(result.frame_trace.last().unwrap().frame_index, 6);
        assert_eq!(result.frame_trace.last().unwrap().count, result.count(ExerciseType::PushUp));

        tx.send(JobInput::Finish).await.unwrap();
        assert_eq!(handle.wait().await.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_panicking_source_fails_job() {
        let config = Config::default();
        let handle = spawn_source("video-7", &config, PanickingSource { remaining: 7 });
        let record = handle.wait().await;

        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("frame producer disconnected"));
        assert!(record.result.is_none());
    }

    #[tokio::test]
    async fn test_dropped_sender_fails_job() {
        let config = Config::default();
        let (tx, rx) = frame_channel(&config);
        let handle = spawn("video-8", &config, rx);
        for frame in push_up_frames(2) {
            tx.send(JobInput::Frame(frame)).await.unwrap();
        }
        drop(tx);

        let record = handle.wait().await;
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.result.is_none());
    }

    #[tokio::test]
    async fn test_frame_stride_keeps_indices() {
        let mut config = Config::default();
        config.job.frame_stride = 3;
        let frames: Vec<Frame> = vec![None; 10];
        let record = spawn_source("video-6", &config, IterSource::new(frames))
            .wait()
            .await;

        let result = record.result.unwrap();
        assert_eq!(result.total_frames, 4);
        let indices: Vec<u64> = result.frame_trace.iter().map(|r| r.frame_index).collect();
        assert_eq!(indices, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_status_record_json() {
        let record = StatusRecord {
            status: JobStatus::Failed,
            error: Some("analysis cancelled".to_string()),
            ..StatusRecord::processing("abc")
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["id"], "abc");
        assert!(json["result"].is_null());
    }
}
