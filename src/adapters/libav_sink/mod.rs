// LibAV sink adapter - Encodes packed BGR24 frames into a staged output file

use std::path::{Path, PathBuf};

use ffmpeg_next::format::{context::Output, Pixel};
use ffmpeg_next::software::scaling;
use ffmpeg_next::{codec, encoder, format, frame, Dictionary, Packet, Rational};
use tracing::debug;

use crate::config::EncoderSettings;
use crate::domain::model::*;
use crate::error::{ReconError, ReconResult};
use crate::output::writer::StagedOutput;
use crate::ports::{FrameSink, SinkFactory};

/// Video encoder writing one file
pub struct LibavFrameSink {
    // Fields drop in order: the muxer closes its file before `staged` removes it
    octx: Output,
    encoder: encoder::Video,
    scaler: scaling::Context,
    staged: StagedOutput,
    width: u32,
    height: u32,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    next_pts: i64,
    frames_written: u64,
}

impl LibavFrameSink {
    /// Create the staged file, configure the encoder and write the header
    pub fn create(path: &Path, geometry: &VideoGeometry, settings: &EncoderSettings) -> ReconResult<Self> {
        let staged = StagedOutput::new(path)?;
        let output_error = |message: String| ReconError::OutputError {
            path: path.to_path_buf(),
            message,
        };

        let mut octx = format::output(&staged.path())
            .map_err(|e| output_error(format!("Failed to create output context: {}", e)))?;

        let codec = encoder::find_by_name(&settings.codec)
            .ok_or_else(|| output_error(format!("Encoder '{}' not available", settings.codec)))?;
        let pixel_format: Pixel = settings
            .pixel_format
            .parse()
            .map_err(|_| output_error(format!("Unknown pixel format '{}'", settings.pixel_format)))?;

        let frame_rate = Rational::new(geometry.frame_rate.num, geometry.frame_rate.den);
        let encoder_time_base = frame_rate.invert();

        let mut video = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| output_error(format!("Failed to create encoder: {}", e)))?;
        video.set_width(geometry.width);
        video.set_height(geometry.height);
        video.set_format(pixel_format);
        video.set_time_base(encoder_time_base);
        video.set_frame_rate(Some(frame_rate));
        video.set_gop(settings.gop_size);
        if let Some(bit_rate) = settings.bit_rate {
            video.set_bit_rate(bit_rate);
        }
        if octx.format().flags().contains(format::Flags::GLOBAL_HEADER) {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = video
            .open_with(Dictionary::new())
            .map_err(|e| output_error(format!("Failed to open encoder '{}': {}", settings.codec, e)))?;

        let stream_index = {
            let mut ost = octx
                .add_stream(codec)
                .map_err(|e| output_error(format!("Failed to add video stream: {}", e)))?;
            ost.set_parameters(&encoder);
            ost.set_time_base(encoder_time_base);
            ost.index()
        };

        octx.write_header()
            .map_err(|e| output_error(format!("Failed to write header: {}", e)))?;

        // The muxer may adjust the stream time base while writing the header
        let stream_time_base = octx
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| output_error("Output stream disappeared".to_string()))?;

        let scaler = scaling::Context::get(
            Pixel::BGR24,
            geometry.width,
            geometry.height,
            pixel_format,
            geometry.width,
            geometry.height,
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| output_error(format!("Failed to create scaler: {}", e)))?;

        debug!(
            "Encoder ready for {}: {} {}x{}, time_base: encoder={} stream={}",
            path.display(),
            settings.codec,
            geometry.width,
            geometry.height,
            encoder_time_base,
            stream_time_base
        );

        Ok(Self {
            octx,
            encoder,
            scaler,
            staged,
            width: geometry.width,
            height: geometry.height,
            encoder_time_base,
            stream_time_base,
            next_pts: 0,
            frames_written: 0,
        })
    }

    fn output_error(&self, message: String) -> ReconError {
        ReconError::OutputError {
            path: self.staged.destination().to_path_buf(),
            message,
        }
    }

    /// Write every packet the encoder has ready
    fn drain_packets(&mut self) -> ReconResult<()> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.octx)
                .map_err(|e| self.output_error(format!("Failed to write packet: {}", e)))?;
        }
        Ok(())
    }
}

impl FrameSink for LibavFrameSink {
    fn write(&mut self, raw: &RawFrame) -> ReconResult<()> {
        if raw.width != self.width || raw.height != self.height {
            return Err(self.output_error(format!(
                "Frame is {}x{}, encoder expects {}x{}",
                raw.width, raw.height, self.width, self.height
            )));
        }

        let mut bgr = frame::Video::new(Pixel::BGR24, self.width, self.height);
        let row = raw.stride();
        let dst_stride = bgr.stride(0);
        {
            let dst = bgr.data_mut(0);
            for y in 0..self.height as usize {
                dst[y * dst_stride..y * dst_stride + row]
                    .copy_from_slice(&raw.data[y * row..(y + 1) * row]);
            }
        }

        let mut converted = frame::Video::empty();
        self.scaler
            .run(&bgr, &mut converted)
            .map_err(|e| self.output_error(format!("Failed to convert frame: {}", e)))?;
        converted.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&converted)
            .map_err(|e| self.output_error(format!("Failed to encode frame: {}", e)))?;
        self.drain_packets()?;
        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn finish(mut self: Box<Self>) -> ReconResult<PathBuf> {
        self.encoder
            .send_eof()
            .map_err(|e| self.output_error(format!("Failed to flush encoder: {}", e)))?;
        self.drain_packets()?;
        self.octx
            .write_trailer()
            .map_err(|e| self.output_error(format!("Failed to write trailer: {}", e)))?;

        let LibavFrameSink {
            staged,
            octx,
            frames_written,
            ..
        } = *self;
        // Closes the file before it is moved into place
        drop(octx);

        let path = staged.commit()?;
        debug!("Wrote {} frames to {}", frames_written, path.display());
        Ok(path)
    }
}

/// Creates libav sinks with fixed encoder settings
#[derive(Debug, Clone, Default)]
pub struct LibavSinkFactory {
    settings: EncoderSettings,
}

impl LibavSinkFactory {
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }
}

impl SinkFactory for LibavSinkFactory {
    fn create(&self, path: &Path, geometry: &VideoGeometry) -> ReconResult<Box<dyn FrameSink>> {
        Ok(Box::new(LibavFrameSink::create(path, geometry, &self.settings)?))
    }
}
