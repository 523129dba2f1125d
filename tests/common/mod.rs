//! In-memory media fakes shared by the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use facerebuild_cli::domain::model::{FrameOrigin, FrameRate, RawFrame, VideoGeometry};
use facerebuild_cli::error::{ReconError, ReconResult};
use facerebuild_cli::ports::{FrameSink, FrameSource, MediaProbe, SinkFactory, SourceOpener};

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;

pub fn geometry(frame_count: u64) -> VideoGeometry {
    VideoGeometry {
        width: WIDTH,
        height: HEIGHT,
        frame_rate: FrameRate { num: 25, den: 1 },
        frame_count,
    }
}

/// Source whose frame `n` is filled with the byte `n % 251`
pub struct FakeSource {
    path: PathBuf,
    total: u64,
    failing: HashSet<u64>,
    cursor: u64,
    released: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(path: impl Into<PathBuf>, total: u64) -> Self {
        Self {
            path: path.into(),
            total,
            failing: HashSet::new(),
            cursor: 0,
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_at(mut self, frames: &[u64]) -> Self {
        self.failing.extend(frames);
        self
    }

    fn frame(&self, n: u64) -> ReconResult<RawFrame> {
        if n >= self.total || self.failing.contains(&n) {
            return Err(ReconError::ReadFailure {
                frame: n,
                message: "fake read failure".to_string(),
            });
        }
        let data = vec![(n % 251) as u8; WIDTH as usize * HEIGHT as usize * RawFrame::CHANNELS];
        RawFrame::from_source(WIDTH, HEIGHT, data, n)
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl FrameSource for FakeSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn geometry(&self) -> VideoGeometry {
        geometry(self.total)
    }

    fn read_at(&mut self, frame: u64) -> ReconResult<RawFrame> {
        let result = self.frame(frame);
        self.cursor = frame + 1;
        result
    }

    fn read_next(&mut self) -> ReconResult<Option<RawFrame>> {
        if self.cursor >= self.total {
            return Ok(None);
        }
        let n = self.cursor;
        self.cursor += 1;
        self.frame(n).map(Some)
    }
}

/// Opens a `FakeSource` for any path and counts opens and releases
pub struct FakeOpener {
    total: u64,
    failing: Vec<u64>,
    pub opened: Mutex<Vec<PathBuf>>,
    pub released: Arc<AtomicUsize>,
}

impl FakeOpener {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            failing: Vec::new(),
            opened: Mutex::new(Vec::new()),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_at(mut self, frames: &[u64]) -> Self {
        self.failing.extend_from_slice(frames);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl SourceOpener for FakeOpener {
    fn open(&self, path: &Path) -> ReconResult<Box<dyn FrameSource>> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        let mut source = FakeSource::new(path, self.total).failing_at(&self.failing);
        source.released = Arc::clone(&self.released);
        Ok(Box::new(source))
    }
}

/// What a finished sink received
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub path: PathBuf,
    pub origins: Vec<FrameOrigin>,
}

/// Sink that writes a text rendering of its frames on finish
pub struct RecordingSink {
    path: PathBuf,
    origins: Vec<FrameOrigin>,
    log: Arc<Mutex<Vec<Recorded>>>,
}

/// `S<n>` for source frames, `F` for fillers
pub fn render(origins: &[FrameOrigin]) -> String {
    origins
        .iter()
        .map(|o| match o {
            FrameOrigin::Source(n) => format!("S{}", n),
            FrameOrigin::Filler => "F".to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl FrameSink for RecordingSink {
    fn write(&mut self, frame: &RawFrame) -> ReconResult<()> {
        if frame.width != WIDTH || frame.height != HEIGHT {
            return Err(ReconError::OutputError {
                path: self.path.clone(),
                message: "dimension mismatch".to_string(),
            });
        }
        if frame.is_filler() {
            assert!(frame.data.iter().all(|&b| b == 0), "filler must be black");
        }
        self.origins.push(frame.origin);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.origins.len() as u64
    }

    fn finish(self: Box<Self>) -> ReconResult<PathBuf> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, render(&self.origins))?;
        self.log.lock().unwrap().push(Recorded {
            path: self.path.clone(),
            origins: self.origins.clone(),
        });
        Ok(self.path)
    }
}

#[derive(Default)]
pub struct RecordingSinkFactory {
    pub created: AtomicUsize,
    pub log: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingSinkFactory {
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Frames finished into `path`
    pub fn origins_for(&self, path: &Path) -> Option<Vec<FrameOrigin>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.path == path)
            .map(|r| r.origins.clone())
    }
}

impl SinkFactory for RecordingSinkFactory {
    fn create(&self, path: &Path, geometry: &VideoGeometry) -> ReconResult<Box<dyn FrameSink>> {
        assert_eq!((geometry.width, geometry.height), (WIDTH, HEIGHT));
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSink {
            path: path.to_path_buf(),
            origins: Vec::new(),
            log: Arc::clone(&self.log),
        }))
    }
}

/// Reports a fixed frame count for every path
pub struct FakeProbe {
    pub frame_count: u64,
}

impl MediaProbe for FakeProbe {
    fn probe(&self, _path: &Path) -> ReconResult<VideoGeometry> {
        Ok(geometry(self.frame_count))
    }
}

pub fn src(n: u64) -> FrameOrigin {
    FrameOrigin::Source(n)
}

pub const FILL: FrameOrigin = FrameOrigin::Filler;
