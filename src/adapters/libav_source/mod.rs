// LibAV source adapter - Frame-accurate random access decoding

use std::path::{Path, PathBuf};

use ffmpeg_next::format::{context::Input, Pixel};
use ffmpeg_next::software::scaling;
use ffmpeg_next::{codec, ffi, format, frame, media, Packet, Rational};
use tracing::{debug, trace};

use crate::adapters::probe_libav::LibavProbe;
use crate::domain::model::*;
use crate::error::{ReconError, ReconResult};
use crate::ports::{FrameSource, SourceOpener};

/// Forward distance up to which decoding on is cheaper than seeking
const MAX_DECODE_AHEAD: u64 = 48;

/// Consecutive demuxer errors tolerated before the stream counts as ended
const MAX_READ_ERRORS: u32 = 32;

/// Decodes frames of the best video stream of a file
pub struct LibavFrameSource {
    path: PathBuf,
    input: Input,
    decoder: codec::decoder::Video,
    stream_index: usize,
    time_base: Rational,
    /// Stream start timestamp, in `time_base` units
    start_pts: i64,
    geometry: VideoGeometry,
    scaler: Option<(Pixel, u32, u32, scaling::Context)>,
    /// Index of the frame the decoder yields next, when known
    next_frame: Option<u64>,
    eof_sent: bool,
}

impl LibavFrameSource {
    /// Open `path` and set up a decoder for its best video stream
    pub fn open(path: &Path) -> ReconResult<Self> {
        if !path.is_file() {
            return Err(ReconError::not_found("source video", path));
        }

        let input = format::input(&path).map_err(|e| ReconError::ProbeError {
            path: path.to_path_buf(),
            message: format!("Failed to open input: {}", e),
        })?;

        let (stream_index, time_base, start_pts, frame_rate, frame_count, parameters) = {
            let stream = input
                .streams()
                .best(media::Type::Video)
                .ok_or_else(|| ReconError::ProbeError {
                    path: path.to_path_buf(),
                    message: "No video stream found".to_string(),
                })?;
            let start = stream.start_time();
            (
                stream.index(),
                stream.time_base(),
                if start == ffi::AV_NOPTS_VALUE { 0 } else { start },
                LibavProbe::frame_rate(&stream, path)?,
                stream.frames().max(0) as u64,
                stream.parameters(),
            )
        };

        let decoder = codec::context::Context::from_parameters(parameters)
            .and_then(|context| context.decoder().video())
            .map_err(|e| ReconError::ProbeError {
                path: path.to_path_buf(),
                message: format!("Failed to create video decoder: {}", e),
            })?;

        let geometry = VideoGeometry {
            width: decoder.width(),
            height: decoder.height(),
            frame_rate,
            frame_count,
        };
        if geometry.width == 0 || geometry.height == 0 {
            return Err(ReconError::ProbeError {
                path: path.to_path_buf(),
                message: "Video stream has no dimensions".to_string(),
            });
        }

        debug!(
            "Opened {}: {}x{} @ {} fps, {} frames reported",
            path.display(),
            geometry.width,
            geometry.height,
            geometry.frame_rate,
            geometry.frame_count
        );

        Ok(Self {
            path: path.to_path_buf(),
            input,
            decoder,
            stream_index,
            time_base,
            start_pts,
            geometry,
            scaler: None,
            next_frame: Some(0),
            eof_sent: false,
        })
    }

    /// Position the demuxer at or before `target` and reset the decoder
    fn seek_to(&mut self, target: u64) -> ReconResult<()> {
        let seconds = target as f64 / self.geometry.frame_rate.as_f64()
            + self.start_pts as f64 * f64::from(self.time_base);
        let timestamp = (seconds * ffi::AV_TIME_BASE as f64) as i64;
        trace!(frame = target, timestamp, "Seeking");

        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|e| ReconError::ReadFailure {
                frame: target,
                message: format!("Seek failed: {}", e),
            })?;
        self.decoder.flush();
        self.eof_sent = false;
        self.next_frame = None;
        Ok(())
    }

    /// Frame number a decoded picture belongs to
    fn frame_index(&self, decoded: &frame::Video) -> Option<u64> {
        match decoded.timestamp() {
            Some(ts) => {
                let seconds = (ts - self.start_pts) as f64 * f64::from(self.time_base);
                let index = (seconds * self.geometry.frame_rate.as_f64()).round();
                Some(if index < 0.0 { 0 } else { index as u64 })
            }
            None => self.next_frame,
        }
    }

    /// Decode the next picture; `None` once the stream is drained
    fn decode_next(&mut self) -> ReconResult<Option<(u64, frame::Video)>> {
        let mut decoded = frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    let index = self.frame_index(&decoded).ok_or_else(|| ReconError::ReadFailure {
                        frame: 0,
                        message: "Decoded frame carries no timestamp after seek".to_string(),
                    })?;
                    self.next_frame = Some(index + 1);
                    return Ok(Some((index, decoded)));
                }
                Err(ffmpeg_next::Error::Other { errno: ffi::EAGAIN }) => {
                    if self.eof_sent {
                        return Ok(None);
                    }
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(e) => {
                    return Err(ReconError::ReadFailure {
                        frame: self.next_frame.unwrap_or(0),
                        message: format!("Decoder error: {}", e),
                    })
                }
            }

            self.feed_packet()?;
        }
    }

    /// Send the next packet of the video stream, or EOF, to the decoder
    fn feed_packet(&mut self) -> ReconResult<()> {
        let mut packet = Packet::empty();
        let mut errors = 0;
        loop {
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() == self.stream_index => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        // Corrupt packet; the frames it carried will be missing
                        debug!("Dropping undecodable packet: {}", e);
                        continue;
                    }
                    return Ok(());
                }
                Ok(()) => continue,
                Err(ffmpeg_next::Error::Eof) => break,
                Err(e) => {
                    errors += 1;
                    if errors >= MAX_READ_ERRORS {
                        debug!("Giving up on demuxer after {} errors: {}", errors, e);
                        break;
                    }
                }
            }
        }

        self.decoder.send_eof()?;
        self.eof_sent = true;
        Ok(())
    }

    /// Convert a decoded picture to packed BGR24 at the source geometry
    fn to_raw(&mut self, decoded: &frame::Video, index: u64) -> ReconResult<RawFrame> {
        let (width, height) = (self.geometry.width, self.geometry.height);
        let key = (decoded.format(), decoded.width(), decoded.height());

        let stale = match &self.scaler {
            Some((format, w, h, _)) => (*format, *w, *h) != key,
            None => true,
        };
        if stale {
            let context = scaling::Context::get(
                key.0,
                key.1,
                key.2,
                Pixel::BGR24,
                width,
                height,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| ReconError::ReadFailure {
                frame: index,
                message: format!("Failed to create scaler: {}", e),
            })?;
            self.scaler = Some((key.0, key.1, key.2, context));
        }

        let mut bgr = frame::Video::empty();
        if let Some((_, _, _, scaler)) = self.scaler.as_mut() {
            scaler.run(decoded, &mut bgr).map_err(|e| ReconError::ReadFailure {
                frame: index,
                message: format!("Failed to convert frame: {}", e),
            })?;
        }

        let row = width as usize * RawFrame::CHANNELS;
        let stride = bgr.stride(0);
        let plane = bgr.data(0);
        let mut data = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            let line = plane.get(start..start + row).ok_or_else(|| ReconError::ReadFailure {
                frame: index,
                message: "Converted frame is smaller than expected".to_string(),
            })?;
            data.extend_from_slice(line);
        }

        RawFrame::from_source(width, height, data, index)
    }
}

impl FrameSource for LibavFrameSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    fn read_at(&mut self, frame: u64) -> ReconResult<RawFrame> {
        let needs_seek = match self.next_frame {
            Some(next) => frame < next || frame - next > MAX_DECODE_AHEAD,
            None => true,
        };
        if needs_seek {
            self.seek_to(frame)?;
        }

        loop {
            let decoded = self.decode_next().map_err(|e| match e {
                ReconError::ReadFailure { message, .. } => ReconError::ReadFailure { frame, message },
                other => other,
            })?;
            match decoded {
                Some((index, picture)) if index == frame => return self.to_raw(&picture, index),
                Some((index, _)) if index > frame => {
                    return Err(ReconError::ReadFailure {
                        frame,
                        message: format!("Stream has no frame {} (next is {})", frame, index),
                    })
                }
                Some(_) => continue,
                None => {
                    return Err(ReconError::ReadFailure {
                        frame,
                        message: "Past end of stream".to_string(),
                    })
                }
            }
        }
    }

    fn read_next(&mut self) -> ReconResult<Option<RawFrame>> {
        match self.decode_next()? {
            Some((index, picture)) => self.to_raw(&picture, index).map(Some),
            None => Ok(None),
        }
    }
}

/// Opens sources with libav
#[derive(Debug, Default, Clone, Copy)]
pub struct LibavSourceOpener;

impl SourceOpener for LibavSourceOpener {
    fn open(&self, path: &Path) -> ReconResult<Box<dyn FrameSource>> {
        Ok(Box::new(LibavFrameSource::open(path)?))
    }
}
