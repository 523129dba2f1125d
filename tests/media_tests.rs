//! Round trips through the libav adapters
//!
//! Every test encodes its own input, so no sample files are needed, but all of
//! them need a libav build with the mpeg4 and aac encoders.

use std::path::Path;

use facerebuild_cli::adapters::{LibavFrameSource, LibavProbe, LibavSinkFactory, LibavSourceOpener};
use facerebuild_cli::config::EncoderSettings;
use facerebuild_cli::domain::model::*;
use facerebuild_cli::engine::rewrap::remux;
use facerebuild_cli::engine::{AudioCodecMode, AudioMerger, Reconstructor, RewrapOutcome, Rewrapper};
use facerebuild_cli::error::ReconError;
use facerebuild_cli::output::OutputLayout;
use facerebuild_cli::ports::{FrameSource, MediaProbe, SinkFactory};
use tempfile::TempDir;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const FRAMES: u64 = 30;
const GRAY_STEP: u64 = 8;

fn setup() {
    facerebuild_cli::init().unwrap();
}

fn geometry() -> VideoGeometry {
    VideoGeometry {
        width: WIDTH,
        height: HEIGHT,
        frame_rate: FrameRate { num: 25, den: 1 },
        frame_count: FRAMES,
    }
}

/// Gray level of frame `n` in the test ramp
fn gray(n: u64) -> u8 {
    (16 + n * GRAY_STEP) as u8
}

fn sinks() -> LibavSinkFactory {
    LibavSinkFactory::new(EncoderSettings {
        bit_rate: Some(2_000_000),
        ..Default::default()
    })
}

fn uniform_frame(n: u64) -> RawFrame {
    let data = vec![gray(n); WIDTH as usize * HEIGHT as usize * RawFrame::CHANNELS];
    RawFrame::from_source(WIDTH, HEIGHT, data, n).unwrap()
}

/// Encode `FRAMES` uniform frames, frame `n` at gray level `gray(n)`
fn encode_gray_ramp(path: &Path) {
    let mut sink = sinks().create(path, &geometry()).unwrap();
    for n in 0..FRAMES {
        sink.write(&uniform_frame(n)).unwrap();
    }
    assert_eq!(sink.frames_written(), FRAMES);
    sink.finish().unwrap();
}

fn mean(frame: &RawFrame) -> f64 {
    frame.data.iter().map(|&b| b as f64).sum::<f64>() / frame.data.len() as f64
}

/// Ramp position whose gray level is closest to the frame's mean
fn ramp_position(frame: &RawFrame) -> u64 {
    ((mean(frame) - 16.0) / GRAY_STEP as f64).round().max(0.0) as u64
}

fn count_frames(path: &Path) -> u64 {
    let mut source = LibavFrameSource::open(path).unwrap();
    let mut count = 0;
    while source.read_next().unwrap().is_some() {
        count += 1;
    }
    count
}

fn leftover_partials(dir: &Path) -> Vec<String> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".partial_"))
        .collect()
}

/// Mono 16-bit PCM square wave
fn write_wav(path: &Path, seconds: u32) {
    let rate = 8000u32;
    let samples = rate * seconds;
    let data_len = samples * 2;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&rate.to_le_bytes());
    bytes.extend_from_slice(&(rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..samples {
        let value: i16 = if (i / 20) % 2 == 0 { 3000 } else { -3000 };
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}

// Source and sink

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_probe_reports_encoded_geometry() {
    setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ramp.mp4");
    encode_gray_ramp(&path);

    let probed = LibavProbe.probe(&path).unwrap();

    assert_eq!((probed.width, probed.height), (WIDTH, HEIGHT));
    assert!((probed.frame_rate.as_f64() - 25.0).abs() < 0.01);
    assert_eq!(probed.frame_count, FRAMES);
    assert!(leftover_partials(dir.path()).is_empty());
}

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_read_at_returns_requested_frames_in_any_order() {
    setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ramp.mp4");
    encode_gray_ramp(&path);

    let mut source = LibavFrameSource::open(&path).unwrap();
    // Forward within decode-ahead, backward to the first GOP, then into the last
    for n in [3u64, 4, 20, 7, 29, 26] {
        let frame = source.read_at(n).unwrap();
        assert_eq!(frame.origin, FrameOrigin::Source(n));
        assert_eq!((frame.width, frame.height), (WIDTH, HEIGHT));
        assert_eq!(
            ramp_position(&frame),
            n,
            "frame {} has mean {:.1}, expected about {}",
            n,
            mean(&frame),
            gray(n)
        );
    }
}

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_read_past_end_is_read_failure() {
    setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ramp.mp4");
    encode_gray_ramp(&path);

    let mut source = LibavFrameSource::open(&path).unwrap();
    match source.read_at(1000) {
        Err(ReconError::ReadFailure { frame, .. }) => assert_eq!(frame, 1000),
        other => panic!("expected ReadFailure, got {:?}", other.map(|f| f.origin)),
    }
    // The source stays usable after a failed read
    assert_eq!(ramp_position(&source.read_at(2).unwrap()), 2);
}

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_read_next_walks_every_frame() {
    setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ramp.mkv");
    encode_gray_ramp(&path);

    assert_eq!(count_frames(&path), FRAMES);
}

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_unfinished_sink_leaves_no_files() {
    setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("abandoned.mp4");

    let mut sink = sinks().create(&path, &geometry()).unwrap();
    for n in 0..3 {
        sink.write(&uniform_frame(n)).unwrap();
    }
    assert_eq!(leftover_partials(dir.path()).len(), 1);
    drop(sink);

    assert!(!path.exists());
    assert!(leftover_partials(dir.path()).is_empty());
}

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_sink_rejects_mismatched_frame() {
    setup();
    let dir = TempDir::new().unwrap();
    let mut sink = sinks().create(&dir.path().join("out.mp4"), &geometry()).unwrap();

    let err = sink.write(&RawFrame::filler(WIDTH / 2, HEIGHT)).unwrap_err();

    assert!(matches!(err, ReconError::OutputError { .. }));
}

// Reconstruction

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_reconstruct_writes_both_streams() {
    setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s1_navigator.mp4");
    encode_gray_ramp(&path);
    let layout = OutputLayout::new(dir.path(), "facial_expression", "mp4");
    layout.ensure_dir().unwrap();
    let pair = layout.pair(3, Role::Navigator, "task1");
    let plan = FramePlan::from_sidecar("task1", 5, &[0, 1, 3, 4], SeekMode::Declared).unwrap();

    let factory = sinks();
    let mut source = LibavFrameSource::open(&path).unwrap();
    Reconstructor::new(&factory)
        .run("task1", &mut source, &plan, &pair)
        .unwrap();

    let mut full = LibavFrameSource::open(&pair.reconstructed).unwrap();
    let positions: Vec<u64> = (0..5).map(|n| ramp_position(&full.read_at(n).unwrap())).collect();
    assert_eq!(positions[0], 5);
    assert_eq!(positions[1], 6);
    assert!(mean(&full.read_at(2).unwrap()) < 8.0, "filler should be black");
    assert_eq!(positions[3], 8);
    assert_eq!(positions[4], 9);
    assert_eq!(count_frames(&pair.no_black), 4);
    assert!(leftover_partials(dir.path()).is_empty());
}

// Rewrap

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_remux_restores_frame_count() {
    setup();
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("capture.mkv");
    encode_gray_ramp(&source);
    let target = dir.path().join("capture.mp4");

    let packets = remux(&source, &target).unwrap();

    assert_eq!(packets, FRAMES);
    assert_eq!(LibavProbe.probe(&target).unwrap().frame_count, FRAMES);
    assert_eq!(count_frames(&target), FRAMES);
    assert!(leftover_partials(dir.path()).is_empty());
}

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_rewrapper_remuxes_capture_without_frame_count() {
    setup();
    let captures = TempDir::new().unwrap();
    let source = captures.path().join("s1").join("pp3_navigator.mkv");
    std::fs::create_dir_all(source.parent().unwrap()).unwrap();
    encode_gray_ramp(&source);
    let output_root = TempDir::new().unwrap();

    let factory = sinks();
    let rewrapper = Rewrapper::new(&LibavProbe, &LibavSourceOpener, &factory);
    let outcome = rewrapper.rewrap(&source, output_root.path()).unwrap();

    let expected = output_root.path().join("s1").join("pp3_navigator_rewrapped.mkv");
    assert_eq!(
        outcome,
        RewrapOutcome::Rewrapped {
            path: expected.clone(),
            frames: FRAMES
        }
    );
    assert_eq!(count_frames(&expected), FRAMES);
    assert_eq!(
        rewrapper.rewrap(&source, output_root.path()).unwrap(),
        RewrapOutcome::AlreadyRewrapped { path: expected }
    );
}

// Audio merge

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_merge_copies_pcm_audio() {
    setup();
    let dir = TempDir::new().unwrap();
    let video = dir.path().join("video.mkv");
    let audio = dir.path().join("audio.wav");
    let output = dir.path().join("merged.mkv");
    encode_gray_ramp(&video);
    write_wav(&audio, 1);

    let summary = AudioMerger::new().merge(&video, &audio, &output).unwrap();

    assert_eq!(summary.path, output);
    assert_eq!(summary.video_packets, FRAMES);
    assert!(summary.audio_packets > 0);
    assert_eq!(count_frames(&output), FRAMES);
    assert!(leftover_partials(dir.path()).is_empty());
}

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_merge_transcodes_to_aac() {
    setup();
    let dir = TempDir::new().unwrap();
    let video = dir.path().join("video.mp4");
    let audio = dir.path().join("audio.wav");
    let output = dir.path().join("merged.mp4");
    encode_gray_ramp(&video);
    write_wav(&audio, 1);

    let summary = AudioMerger::new()
        .with_mode(AudioCodecMode::Aac)
        .with_aac_bit_rate(32_000)
        .merge(&video, &audio, &output)
        .unwrap();

    assert_eq!(summary.video_packets, FRAMES);
    assert!(summary.audio_packets > 0);
    assert!(output.is_file());
}

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_merge_without_audio_stream_fails_cleanly() {
    setup();
    let dir = TempDir::new().unwrap();
    let video = dir.path().join("video.mp4");
    let output = dir.path().join("merged.mp4");
    encode_gray_ramp(&video);

    let err = AudioMerger::new().merge(&video, &video, &output).unwrap_err();

    assert!(matches!(err, ReconError::ProbeError { .. }));
    assert!(!output.exists());
    assert!(leftover_partials(dir.path()).is_empty());
}

#[test]
#[ignore] // Ignored by default since it requires libav
fn test_merge_truncated_video_terminates() {
    setup();
    let dir = TempDir::new().unwrap();
    let video = dir.path().join("video.mkv");
    let audio = dir.path().join("audio.wav");
    let output = dir.path().join("merged.mkv");
    encode_gray_ramp(&video);
    write_wav(&audio, 1);

    let bytes = std::fs::read(&video).unwrap();
    std::fs::write(&video, &bytes[..bytes.len() / 2]).unwrap();

    // Either outcome is acceptable as long as the merge returns
    match AudioMerger::new().merge(&video, &audio, &output) {
        Ok(summary) => assert!(summary.video_packets < FRAMES),
        Err(_) => assert!(!output.exists()),
    }
    assert!(leftover_partials(dir.path()).is_empty());
}
