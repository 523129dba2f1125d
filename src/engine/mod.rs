//! Media processing engines

pub mod audio_merge;
pub mod reconstruct;
pub mod rewrap;

pub use audio_merge::{AudioCodecMode, AudioMerger, MergeSummary};
pub use reconstruct::Reconstructor;
pub use rewrap::{RewrapMode, RewrapOutcome, Rewrapper};
