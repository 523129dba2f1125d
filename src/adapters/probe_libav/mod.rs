// Probe LibAV adapter - Video stream metadata using libav

use std::path::Path;

use ffmpeg_next::{codec, format, media};

use crate::domain::model::{FrameRate, VideoGeometry};
use crate::error::{ReconError, ReconResult};
use crate::ports::MediaProbe;

/// LibAV-based probing of the best video stream
#[derive(Debug, Default, Clone, Copy)]
pub struct LibavProbe;

impl LibavProbe {
    fn probe_error(path: &Path, message: impl Into<String>) -> ReconError {
        ReconError::ProbeError {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Average frame rate, falling back to the container's base rate
    pub fn frame_rate(stream: &format::stream::Stream, path: &Path) -> ReconResult<FrameRate> {
        let avg = stream.avg_frame_rate();
        let rate = if avg.numerator() > 0 && avg.denominator() > 0 {
            avg
        } else {
            stream.rate()
        };
        FrameRate::new(rate.numerator(), rate.denominator())
            .map_err(|_| Self::probe_error(path, format!("Unusable frame rate {}", rate)))
    }
}

impl MediaProbe for LibavProbe {
    fn probe(&self, path: &Path) -> ReconResult<VideoGeometry> {
        if !path.is_file() {
            return Err(ReconError::not_found("video file", path));
        }

        let input = format::input(&path)
            .map_err(|e| Self::probe_error(path, format!("Failed to open input: {}", e)))?;
        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| Self::probe_error(path, "No video stream found"))?;

        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|e| Self::probe_error(path, format!("Failed to read codec parameters: {}", e)))?;

        Ok(VideoGeometry {
            width: decoder.width(),
            height: decoder.height(),
            frame_rate: Self::frame_rate(&stream, path)?,
            // Containers without an index report zero or a negative count
            frame_count: stream.frames().max(0) as u64,
        })
    }
}
