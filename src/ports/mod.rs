// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};

use crate::domain::model::*;
use crate::error::ReconResult;

/// Random-access reader over the frames of one video file
pub trait FrameSource {
    /// File this source was opened from
    fn path(&self) -> &Path;

    /// Dimensions, frame rate and reported frame count
    fn geometry(&self) -> VideoGeometry;

    /// Position on physical frame `frame` and decode it.
    ///
    /// Seeking beyond the end of the stream or a decode failure yields
    /// `ReconError::ReadFailure`; any other error is fatal for the caller.
    fn read_at(&mut self, frame: u64) -> ReconResult<RawFrame>;

    /// Decode the frame after the last one returned, `None` at end of stream
    fn read_next(&mut self) -> ReconResult<Option<RawFrame>>;
}

/// Encoder writing one output video
pub trait FrameSink {
    /// Append a frame; its dimensions must match the sink's geometry
    fn write(&mut self, frame: &RawFrame) -> ReconResult<()>;

    /// Frames accepted so far
    fn frames_written(&self) -> u64;

    /// Flush the encoder, finalize the container and move it into place.
    ///
    /// Dropping a sink without finishing it releases its handles and leaves
    /// nothing at the destination path.
    fn finish(self: Box<Self>) -> ReconResult<PathBuf>;
}

/// Opens frame sources by path
pub trait SourceOpener: Send + Sync {
    fn open(&self, path: &Path) -> ReconResult<Box<dyn FrameSource>>;
}

/// Creates sinks for output paths
pub trait SinkFactory: Send + Sync {
    fn create(&self, path: &Path, geometry: &VideoGeometry) -> ReconResult<Box<dyn FrameSink>>;
}

/// Reads stream metadata without decoding
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> ReconResult<VideoGeometry>;
}
