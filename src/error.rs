use thiserror::Error;

/// Failures that end an analysis job. Per-frame anomalies (no pose, missing
/// joints, degenerate geometry) are never errors; they show up in that
/// frame's feedback instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("frame source failed: {0}")]
    Source(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed pose record at line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("analysis cancelled")]
    Cancelled,

    #[error("frame producer disconnected")]
    Disconnected,
}
