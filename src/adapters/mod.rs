// Adapters - External system implementations

pub mod file_config;
pub mod libav_sink;
pub mod libav_source;
pub mod probe_libav;

// Re-export adapters
pub use file_config::FileConfigAdapter;
pub use libav_sink::{LibavFrameSink, LibavSinkFactory};
pub use libav_source::{LibavFrameSource, LibavSourceOpener};
pub use probe_libav::LibavProbe;
