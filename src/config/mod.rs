//! Application configuration
//!
//! Every field has a default, so an empty or partial file is valid. Values
//! from the environment and the command line are applied on top by the CLI.

use serde::{Deserialize, Serialize};

use crate::domain::model::{ReadFailurePolicy, SeekMode};
use crate::engine::audio_merge::AudioCodecMode;
use crate::engine::rewrap::RewrapMode;
use crate::error::{ReconError, ReconResult};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "facerebuild.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reconstruct: ReconstructConfig,
    pub encoder: EncoderSettings,
    pub sources: SourcesConfig,
    pub rewrap: RewrapConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructConfig {
    /// Directory created under the analysis root for outputs
    pub output_dir_name: String,
    /// Container extension of reconstructed videos
    pub output_extension: String,
    pub seek_mode: SeekMode,
    pub read_failure_policy: ReadFailurePolicy,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            output_dir_name: "facial_expression".to_string(),
            output_extension: "mp4".to_string(),
            seek_mode: SeekMode::default(),
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }
}

/// Video encoder used for reconstructed and re-encoded outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// libavcodec encoder name
    pub codec: String,
    pub pixel_format: String,
    /// Target bit rate in bits/s; encoder default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<usize>,
    pub gop_size: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            codec: "mpeg4".to_string(),
            pixel_format: "yuv420p".to_string(),
            bit_rate: None,
            gop_size: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// File extensions considered capture files
    pub extensions: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["avi".to_string(), "mp4".to_string(), "mov".to_string(), "mkv".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewrapConfig {
    pub mode: RewrapMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub codec_mode: AudioCodecMode,
    /// Bit rate of transcoded AAC audio
    pub aac_bit_rate: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            codec_mode: AudioCodecMode::default(),
            aac_bit_rate: 128_000,
        }
    }
}

impl AppConfig {
    /// Reject values no run could succeed with
    pub fn validate(&self) -> ReconResult<()> {
        if self.reconstruct.output_dir_name.trim().is_empty() {
            return Err(ReconError::ConfigError {
                message: "reconstruct.output_dir_name cannot be empty".to_string(),
            });
        }
        if self.reconstruct.output_extension.trim_start_matches('.').is_empty() {
            return Err(ReconError::ConfigError {
                message: "reconstruct.output_extension cannot be empty".to_string(),
            });
        }
        if self.encoder.codec.trim().is_empty() {
            return Err(ReconError::ConfigError {
                message: "encoder.codec cannot be empty".to_string(),
            });
        }
        if self.encoder.gop_size == 0 {
            return Err(ReconError::ConfigError {
                message: "encoder.gop_size must be at least 1".to_string(),
            });
        }
        if self.sources.extensions.is_empty() {
            return Err(ReconError::ConfigError {
                message: "sources.extensions cannot be empty".to_string(),
            });
        }
        if self.audio.aac_bit_rate == 0 {
            return Err(ReconError::ConfigError {
                message: "audio.aac_bit_rate must be positive".to_string(),
            });
        }
        Ok(())
    }
}
