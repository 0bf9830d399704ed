//! Frame producers feeding an analysis job.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::AnalysisError;
use crate::pose::Frame;

/// Pull-based supplier of frames in capture order.
///
/// `Ok(None)` ends the stream. Implementations may block; jobs drive them
/// from a blocking thread.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError>;
}

/// One JSON value per line: `null` for a frame without a detected pose,
/// otherwise an array of `{x, y, z}` joints in joint-id order.
pub struct JsonlSource<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl JsonlSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// 1-based number of the last line read
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead + Send> FrameSource for JsonlSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            let frame: Frame = serde_json::from_str(text).map_err(|source| {
                AnalysisError::Decode {
                    line: self.line,
                    source,
                }
            })?;
            return Ok(Some(frame));
        }
    }
}

/// Adapts an in-memory iterator of frames
pub struct IterSource<I> {
    frames: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Frame>,
{
    pub fn new<T: IntoIterator<IntoIter = I>>(frames: T) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl<I> FrameSource for IterSource<I>
where
    I: Iterator<Item = Frame> + Send,
{
    fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError> {
        Ok(self.frames.next())
    }
}
