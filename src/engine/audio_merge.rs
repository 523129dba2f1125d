//! Attach the audio track of one file to the video of another
//!
//! The video stream is copied untouched. The first audio stream of the audio
//! file is either copied or transcoded to AAC. No mixing or synchronization is
//! attempted; packets are interleaved by timestamp.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use ffmpeg_next::format::context::{Input, Output};
use ffmpeg_next::format::sample::{Sample, Type as SampleType};
use ffmpeg_next::software::resampling;
use ffmpeg_next::{codec, decoder, encoder, format, frame, media, ChannelLayout, Packet, Rational};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ReconError, ReconResult};
use crate::output::writer::StagedOutput;

const VIDEO_OUTPUT: usize = 0;
const AUDIO_OUTPUT: usize = 1;

/// Consecutive demuxer errors tolerated before an input counts as unreadable
const MAX_READ_ERRORS: u32 = 32;

/// What happens to the audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodecMode {
    /// Copy the packets as they are
    #[default]
    Copy,
    /// Transcode to AAC
    Aac,
}

impl AudioCodecMode {
    pub fn parse(mode: &str) -> ReconResult<Self> {
        match mode.trim().to_lowercase().as_str() {
            "copy" => Ok(AudioCodecMode::Copy),
            "aac" => Ok(AudioCodecMode::Aac),
            other => Err(ReconError::ConfigError {
                message: format!("Invalid audio codec mode: {}. Valid modes: copy, aac", other),
            }),
        }
    }
}

/// Packets written by a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub path: PathBuf,
    pub video_packets: u64,
    pub audio_packets: u64,
}

pub struct AudioMerger {
    mode: AudioCodecMode,
    aac_bit_rate: usize,
}

impl Default for AudioMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioMerger {
    pub fn new() -> Self {
        Self {
            mode: AudioCodecMode::default(),
            aac_bit_rate: 128_000,
        }
    }

    pub fn with_mode(mut self, mode: AudioCodecMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_aac_bit_rate(mut self, bit_rate: usize) -> Self {
        self.aac_bit_rate = bit_rate;
        self
    }

    pub fn merge(&self, video: &Path, audio: &Path, output: &Path) -> ReconResult<MergeSummary> {
        let mut vctx = open_input(video)?;
        let mut actx = open_input(audio)?;

        let (video_index, video_time_base, video_parameters) = {
            let stream = vctx
                .streams()
                .best(media::Type::Video)
                .ok_or_else(|| ReconError::ProbeError {
                    path: video.to_path_buf(),
                    message: "No video stream found".to_string(),
                })?;
            (stream.index(), stream.time_base(), stream.parameters())
        };
        let (audio_index, audio_time_base, audio_parameters) = {
            let stream = actx
                .streams()
                .best(media::Type::Audio)
                .ok_or_else(|| ReconError::ProbeError {
                    path: audio.to_path_buf(),
                    message: "No audio stream found".to_string(),
                })?;
            (stream.index(), stream.time_base(), stream.parameters())
        };

        let output_error = |message: String| ReconError::OutputError {
            path: output.to_path_buf(),
            message,
        };

        let staged = StagedOutput::new(output)?;
        let mut octx = format::output(&staged.path())
            .map_err(|e| output_error(format!("Failed to create output context: {}", e)))?;

        {
            let mut ost = octx
                .add_stream(encoder::find(codec::Id::None))
                .map_err(|e| output_error(format!("Failed to add video stream: {}", e)))?;
            ost.set_parameters(video_parameters);
            unsafe {
                (*ost.parameters().as_mut_ptr()).codec_tag = 0;
            }
        }

        let mut track = match self.mode {
            AudioCodecMode::Copy => {
                let mut ost = octx
                    .add_stream(encoder::find(codec::Id::None))
                    .map_err(|e| output_error(format!("Failed to add audio stream: {}", e)))?;
                ost.set_parameters(audio_parameters);
                unsafe {
                    (*ost.parameters().as_mut_ptr()).codec_tag = 0;
                }
                AudioTrack::Copy {
                    stream_index: audio_index,
                    input_time_base: audio_time_base,
                    output_time_base: audio_time_base,
                }
            }
            AudioCodecMode::Aac => AudioTrack::Aac(Box::new(
                AacTranscoder::new(&mut octx, audio_parameters, audio_index, self.aac_bit_rate)
                    .map_err(|e| output_error(format!("Failed to set up AAC encoder: {}", e)))?,
            )),
        };

        octx.write_header().map_err(|e| {
            output_error(format!(
                "Failed to write header (the container may not accept this audio codec; try AAC): {}",
                e
            ))
        })?;

        let video_out_tb = stream_time_base(&octx, VIDEO_OUTPUT)
            .ok_or_else(|| output_error("Video stream missing".to_string()))?;
        let audio_out_tb = stream_time_base(&octx, AUDIO_OUTPUT)
            .ok_or_else(|| output_error("Audio stream missing".to_string()))?;
        track.set_output_time_base(audio_out_tb);

        info!(
            "Merging {} + {} -> {} ({:?})",
            video.display(),
            audio.display(),
            output.display(),
            self.mode
        );

        let mut summary = MergeSummary {
            path: output.to_path_buf(),
            video_packets: 0,
            audio_packets: 0,
        };

        let next_video = |vctx: &mut Input| -> ReconResult<Option<Packet>> {
            Ok(read_stream_packet(vctx, video_index, video)?.map(|mut packet| {
                packet.rescale_ts(video_time_base, video_out_tb);
                packet.set_position(-1);
                packet.set_stream(VIDEO_OUTPUT);
                packet
            }))
        };

        let mut pending_video = next_video(&mut vctx)?;
        let mut pending_audio = track.next_packet(&mut actx, audio)?;
        loop {
            let take_video = match (&pending_video, &pending_audio) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(v), Some(a)) => {
                    packet_seconds(v, video_out_tb) <= packet_seconds(a, audio_out_tb)
                }
            };

            if take_video {
                if let Some(packet) = pending_video.take() {
                    packet
                        .write_interleaved(&mut octx)
                        .map_err(|e| output_error(format!("Failed to write video packet: {}", e)))?;
                    summary.video_packets += 1;
                }
                pending_video = next_video(&mut vctx)?;
            } else {
                if let Some(packet) = pending_audio.take() {
                    packet
                        .write_interleaved(&mut octx)
                        .map_err(|e| output_error(format!("Failed to write audio packet: {}", e)))?;
                    summary.audio_packets += 1;
                }
                pending_audio = track.next_packet(&mut actx, audio)?;
            }
        }

        octx.write_trailer()
            .map_err(|e| output_error(format!("Failed to write trailer: {}", e)))?;
        drop(octx);
        staged.commit()?;

        info!(
            "Merged {} video and {} audio packets",
            summary.video_packets, summary.audio_packets
        );
        Ok(summary)
    }
}

fn open_input(path: &Path) -> ReconResult<Input> {
    if !path.is_file() {
        return Err(ReconError::not_found("media file", path));
    }
    format::input(&path).map_err(|e| ReconError::ProbeError {
        path: path.to_path_buf(),
        message: format!("Failed to open input: {}", e),
    })
}

fn stream_time_base(octx: &Output, index: usize) -> Option<Rational> {
    octx.stream(index).map(|stream| stream.time_base())
}

/// Next packet of `stream_index`, `None` at end of file
fn read_stream_packet(ctx: &mut Input, stream_index: usize, path: &Path) -> ReconResult<Option<Packet>> {
    let mut packet = Packet::empty();
    let mut errors = 0;
    loop {
        match packet.read(ctx) {
            Ok(()) if packet.stream() == stream_index => return Ok(Some(packet)),
            Ok(()) => errors = 0,
            Err(ffmpeg_next::Error::Eof) => return Ok(None),
            Err(e) => {
                errors += 1;
                check_read_errors(errors, path, &e)?;
                debug!("Skipping unreadable packet: {}", e);
            }
        }
    }
}

/// Fails once `errors` consecutive reads of `path` have gone wrong
fn check_read_errors(errors: u32, path: &Path, last: &ffmpeg_next::Error) -> ReconResult<()> {
    if errors >= MAX_READ_ERRORS {
        return Err(ReconError::ProbeError {
            path: path.to_path_buf(),
            message: format!("Giving up after {} consecutive read errors: {}", errors, last),
        });
    }
    Ok(())
}

/// Decode timestamp in seconds; packets without one sort first
fn packet_seconds(packet: &Packet, time_base: Rational) -> f64 {
    packet
        .dts()
        .or(packet.pts())
        .map(|ts| ts as f64 * f64::from(time_base))
        .unwrap_or(f64::NEG_INFINITY)
}

enum AudioTrack {
    Copy {
        stream_index: usize,
        input_time_base: Rational,
        output_time_base: Rational,
    },
    Aac(Box<AacTranscoder>),
}

impl AudioTrack {
    fn set_output_time_base(&mut self, time_base: Rational) {
        match self {
            AudioTrack::Copy {
                output_time_base, ..
            } => *output_time_base = time_base,
            AudioTrack::Aac(transcoder) => transcoder.output_time_base = time_base,
        }
    }

    /// Next audio packet ready for the muxer
    fn next_packet(&mut self, actx: &mut Input, path: &Path) -> ReconResult<Option<Packet>> {
        match self {
            AudioTrack::Copy {
                stream_index,
                input_time_base,
                output_time_base,
            } => Ok(read_stream_packet(actx, *stream_index, path)?.map(|mut packet| {
                packet.rescale_ts(*input_time_base, *output_time_base);
                packet.set_position(-1);
                packet.set_stream(AUDIO_OUTPUT);
                packet
            })),
            AudioTrack::Aac(transcoder) => transcoder.next_packet(actx, path),
        }
    }
}

/// Planar f32 sample buffer feeding fixed-size encoder frames
struct SampleFifo {
    channels: Vec<Vec<f32>>,
}

impl SampleFifo {
    fn new(channels: usize) -> Self {
        Self {
            channels: vec![Vec::new(); channels],
        }
    }

    fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    fn push(&mut self, samples: &frame::Audio) {
        let count = samples.samples();
        for (index, buffer) in self.channels.iter_mut().enumerate() {
            let plane = samples.plane::<f32>(index);
            buffer.extend_from_slice(&plane[..count.min(plane.len())]);
        }
    }

    /// Take `size` samples per channel, zero-padding a short tail
    fn pop(&mut self, size: usize, layout: ChannelLayout, rate: u32) -> frame::Audio {
        let available = self.len().min(size);
        let mut out = frame::Audio::new(Sample::F32(SampleType::Planar), size, layout);
        out.set_rate(rate);
        for (index, buffer) in self.channels.iter_mut().enumerate() {
            let plane = out.plane_mut::<f32>(index);
            plane[..available].copy_from_slice(&buffer[..available]);
            plane[available..].fill(0.0);
            buffer.drain(..available);
        }
        out
    }
}

/// Decode, resample to stereo planar f32 and encode to AAC
struct AacTranscoder {
    stream_index: usize,
    decoder: decoder::Audio,
    resampler: resampling::Context,
    encoder: encoder::Audio,
    fifo: SampleFifo,
    frame_size: usize,
    rate: u32,
    next_pts: i64,
    encoder_time_base: Rational,
    output_time_base: Rational,
    ready: VecDeque<Packet>,
    finished: bool,
}

impl AacTranscoder {
    fn new(
        octx: &mut Output,
        parameters: codec::Parameters,
        stream_index: usize,
        bit_rate: usize,
    ) -> ReconResult<Self> {
        let decoder = codec::context::Context::from_parameters(parameters)?
            .decoder()
            .audio()?;
        let rate = decoder.rate();
        let input_layout = if decoder.channel_layout().is_empty() {
            ChannelLayout::default(decoder.channels() as i32)
        } else {
            decoder.channel_layout()
        };

        let aac = encoder::find(codec::Id::AAC).ok_or_else(|| ReconError::ConfigError {
            message: "AAC encoder not available".to_string(),
        })?;
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);
        let encoder_time_base = Rational::new(1, rate as i32);

        let mut audio = codec::context::Context::new_with_codec(aac).encoder().audio()?;
        audio.set_rate(rate as i32);
        audio.set_channel_layout(ChannelLayout::STEREO);
        audio.set_format(Sample::F32(SampleType::Planar));
        audio.set_bit_rate(bit_rate);
        audio.set_time_base(encoder_time_base);
        if global_header {
            audio.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let encoder = audio.open_as(aac)?;

        let mut ost = octx.add_stream(aac)?;
        ost.set_parameters(&encoder);
        ost.set_time_base(encoder_time_base);

        let resampler = resampling::Context::get(
            decoder.format(),
            input_layout,
            rate,
            Sample::F32(SampleType::Planar),
            ChannelLayout::STEREO,
            rate,
        )?;

        let frame_size = match encoder.frame_size() {
            0 => 1024,
            size => size as usize,
        };
        debug!(rate, frame_size, bit_rate, "AAC encoder ready");

        Ok(Self {
            stream_index,
            decoder,
            resampler,
            encoder,
            fifo: SampleFifo::new(ChannelLayout::STEREO.channels() as usize),
            frame_size,
            rate,
            next_pts: 0,
            encoder_time_base,
            output_time_base: encoder_time_base,
            ready: VecDeque::new(),
            finished: false,
        })
    }

    fn next_packet(&mut self, actx: &mut Input, path: &Path) -> ReconResult<Option<Packet>> {
        loop {
            if let Some(packet) = self.ready.pop_front() {
                return Ok(Some(packet));
            }
            if self.finished {
                return Ok(None);
            }

            match read_stream_packet(actx, self.stream_index, path)? {
                Some(packet) => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        debug!("Dropping undecodable audio packet: {}", e);
                        continue;
                    }
                    self.drain_decoder()?;
                }
                None => {
                    self.decoder.send_eof()?;
                    self.drain_decoder()?;
                    let mut tail = frame::Audio::empty();
                    if self.resampler.flush(&mut tail).is_ok() && tail.samples() > 0 {
                        self.fifo.push(&tail);
                    }
                    self.encode_fifo(true)?;
                    self.encoder.send_eof()?;
                    self.drain_encoder();
                    self.finished = true;
                }
            }
        }
    }

    fn drain_decoder(&mut self) -> ReconResult<()> {
        let mut decoded = frame::Audio::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let mut resampled = frame::Audio::empty();
            self.resampler.run(&decoded, &mut resampled)?;
            if resampled.samples() > 0 {
                self.fifo.push(&resampled);
            }
            self.encode_fifo(false)?;
        }
        Ok(())
    }

    /// Encode full frames; with `flush`, also the zero-padded remainder
    fn encode_fifo(&mut self, flush: bool) -> ReconResult<()> {
        while self.fifo.len() >= self.frame_size || (flush && self.fifo.len() > 0) {
            let mut samples = self.fifo.pop(self.frame_size, ChannelLayout::STEREO, self.rate);
            samples.set_pts(Some(self.next_pts));
            self.next_pts += self.frame_size as i64;
            self.encoder.send_frame(&samples)?;
            self.drain_encoder();
        }
        Ok(())
    }

    fn drain_encoder(&mut self) {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(AUDIO_OUTPUT);
            packet.rescale_ts(self.encoder_time_base, self.output_time_base);
            self.ready.push_back(std::mem::replace(&mut packet, Packet::empty()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_mode_parse() {
        assert_eq!(AudioCodecMode::parse("COPY").unwrap(), AudioCodecMode::Copy);
        assert_eq!(AudioCodecMode::parse("aac").unwrap(), AudioCodecMode::Aac);
        assert!(AudioCodecMode::parse("mp3").is_err());
    }

    #[test]
    fn test_missing_inputs_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = AudioMerger::new().merge(
            &dir.path().join("video.mp4"),
            &dir.path().join("audio.wav"),
            &dir.path().join("merged.mp4"),
        );
        assert!(matches!(result, Err(ReconError::NotFound { .. })));
        assert!(!dir.path().join("merged.mp4").exists());
    }

    #[test]
    fn test_corrupt_input_fails_without_output() {
        crate::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video.mp4");
        std::fs::write(&video, vec![0xA5u8; 4096]).unwrap();

        let result = AudioMerger::new().merge(&video, &video, &dir.path().join("merged.mp4"));

        assert!(matches!(result, Err(ReconError::ProbeError { .. })));
        let left: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn test_read_errors_give_up_at_limit() {
        let path = Path::new("capture.mkv");
        let error = ffmpeg_next::Error::InvalidData;

        assert!(check_read_errors(1, path, &error).is_ok());
        assert!(check_read_errors(MAX_READ_ERRORS - 1, path, &error).is_ok());
        match check_read_errors(MAX_READ_ERRORS, path, &error) {
            Err(ReconError::ProbeError { path: failed, message }) => {
                assert_eq!(failed, path);
                assert!(message.contains("consecutive read errors"));
            }
            other => panic!("expected ProbeError, got {:?}", other),
        }
    }
}
