//! Container normalization for captures whose metadata lacks a frame count

use std::path::{Path, PathBuf};
use std::time::Instant;

use ffmpeg_next::{format, media, Rational};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::model::REWRAPPED_INFIX;
use crate::error::{ReconError, ReconResult};
use crate::output::writer::StagedOutput;
use crate::ports::{MediaProbe, SinkFactory, SourceOpener};
use crate::utils::path::PathUtils;

/// How a capture is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewrapMode {
    /// Copy packets into a fresh container
    #[default]
    Remux,
    /// Decode every frame and encode it again
    Reencode,
}

impl RewrapMode {
    pub fn parse(mode: &str) -> ReconResult<Self> {
        match mode.trim().to_lowercase().as_str() {
            "remux" => Ok(RewrapMode::Remux),
            "reencode" => Ok(RewrapMode::Reencode),
            other => Err(ReconError::ConfigError {
                message: format!("Invalid rewrap mode: {}. Valid modes: remux, reencode", other),
            }),
        }
    }
}

/// Result of one rewrap request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RewrapOutcome {
    /// The source already reports a frame count
    AlreadyHasMetadata,
    /// A previous run produced the target
    AlreadyRewrapped { path: PathBuf },
    Rewrapped { path: PathBuf, frames: u64 },
}

pub struct Rewrapper<'a> {
    probe: &'a dyn MediaProbe,
    opener: &'a dyn SourceOpener,
    sinks: &'a dyn SinkFactory,
    mode: RewrapMode,
}

impl<'a> Rewrapper<'a> {
    pub fn new(
        probe: &'a dyn MediaProbe,
        opener: &'a dyn SourceOpener,
        sinks: &'a dyn SinkFactory,
    ) -> Self {
        Self {
            probe,
            opener,
            sinks,
            mode: RewrapMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: RewrapMode) -> Self {
        self.mode = mode;
        self
    }

    /// `output_root/<parent dir name>/<stem>_rewrapped.<ext>`
    pub fn target_path(source: &Path, output_root: &Path) -> PathBuf {
        let dir = match PathUtils::parent_dir_name(source) {
            Some(parent) => output_root.join(parent),
            None => output_root.to_path_buf(),
        };
        let name = PathBuf::from(PathUtils::file_name(source));
        dir.join(PathUtils::insert_before_extension(&name, REWRAPPED_INFIX))
    }

    pub fn rewrap(&self, source: &Path, output_root: &Path) -> ReconResult<RewrapOutcome> {
        let geometry = self.probe.probe(source)?;
        if geometry.frame_count > 0 {
            debug!(
                "{} reports {} frames, nothing to do",
                source.display(),
                geometry.frame_count
            );
            return Ok(RewrapOutcome::AlreadyHasMetadata);
        }

        let target = Self::target_path(source, output_root);
        if target.is_file() {
            info!("Already rewrapped: {}", target.display());
            return Ok(RewrapOutcome::AlreadyRewrapped { path: target });
        }

        let started = Instant::now();
        info!(
            "Rewrapping {} -> {} ({:?})",
            source.display(),
            target.display(),
            self.mode
        );
        let frames = match self.mode {
            RewrapMode::Remux => remux(source, &target)?,
            RewrapMode::Reencode => self.reencode(source, &target)?,
        };
        info!(
            "Rewrapped {} frames in {:.2}s",
            frames,
            started.elapsed().as_secs_f64()
        );

        Ok(RewrapOutcome::Rewrapped {
            path: target,
            frames,
        })
    }

    /// Decode every frame of `source` and write it through a sink
    fn reencode(&self, source: &Path, target: &Path) -> ReconResult<u64> {
        let mut reader = self.opener.open(source)?;
        let geometry = reader.geometry();
        let mut sink = self.sinks.create(target, &geometry)?;

        loop {
            match reader.read_next() {
                Ok(Some(frame)) => sink.write(&frame)?,
                Ok(None) => break,
                Err(ReconError::ReadFailure { frame, message }) => {
                    warn!(frame, "Stopping at unreadable frame: {}", message);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let frames = sink.frames_written();
        sink.finish()?;
        Ok(frames)
    }
}

/// Copy the audio, video and subtitle packets of `source` into a new
/// container at `target`. Returns the number of video packets copied.
pub fn remux(source: &Path, target: &Path) -> ReconResult<u64> {
    let output_error = |message: String| ReconError::OutputError {
        path: target.to_path_buf(),
        message,
    };

    let mut ictx = format::input(&source).map_err(|e| ReconError::ProbeError {
        path: source.to_path_buf(),
        message: format!("Failed to open input: {}", e),
    })?;
    let staged = StagedOutput::new(target)?;
    let mut octx = format::output(&staged.path())
        .map_err(|e| output_error(format!("Failed to create output context: {}", e)))?;

    let mut stream_mapping: Vec<Option<usize>> = vec![None; ictx.nb_streams() as usize];
    let mut input_time_bases = vec![Rational(0, 1); ictx.nb_streams() as usize];
    let mut video_index = None;
    let mut next_output = 0;
    for stream in ictx.streams() {
        let medium = stream.parameters().medium();
        if !matches!(
            medium,
            media::Type::Audio | media::Type::Video | media::Type::Subtitle
        ) {
            continue;
        }
        if medium == media::Type::Video && video_index.is_none() {
            video_index = Some(stream.index());
        }
        stream_mapping[stream.index()] = Some(next_output);
        input_time_bases[stream.index()] = stream.time_base();
        next_output += 1;

        let mut ost = octx
            .add_stream(ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::None))
            .map_err(|e| output_error(format!("Failed to add stream: {}", e)))?;
        ost.set_parameters(stream.parameters());
        // Tags are container specific; let the muxer choose
        unsafe {
            (*ost.parameters().as_mut_ptr()).codec_tag = 0;
        }
    }
    if video_index.is_none() {
        return Err(ReconError::ProbeError {
            path: source.to_path_buf(),
            message: "No video stream found".to_string(),
        });
    }

    octx.set_metadata(ictx.metadata().to_owned());
    octx.write_header()
        .map_err(|e| output_error(format!("Failed to write header: {}", e)))?;

    let mut video_packets = 0u64;
    for (stream, mut packet) in ictx.packets() {
        let input_index = stream.index();
        let Some(output_index) = stream_mapping.get(input_index).copied().flatten() else {
            continue;
        };
        let output_time_base = octx
            .stream(output_index)
            .map(|ost| ost.time_base())
            .ok_or_else(|| output_error(format!("Output stream {} missing", output_index)))?;

        packet.rescale_ts(input_time_bases[input_index], output_time_base);
        packet.set_position(-1);
        packet.set_stream(output_index);
        packet
            .write_interleaved(&mut octx)
            .map_err(|e| output_error(format!("Failed to write packet: {}", e)))?;

        if Some(input_index) == video_index {
            video_packets += 1;
        }
    }

    octx.write_trailer()
        .map_err(|e| output_error(format!("Failed to write trailer: {}", e)))?;
    drop(octx);
    staged.commit()?;
    Ok(video_packets)
}
