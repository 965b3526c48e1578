use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Encoding configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Target sample rate in Hz (default: 48000). Backends record at the
    /// device's native rate when the target is not supported.
    pub sample_rate: u32,

    /// Number of channels (default: 1; voice clips are mono).
    pub channels: u16,

    /// Bit depth for PCM output (default: 16). Valid values: 16, 24, 32.
    pub bits_per_sample: u16,

    /// Directory where finished clips are written. Ignored by backends that
    /// deliver in-memory blob URIs instead of files.
    pub output_directory: PathBuf,
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![16, 24, 32].contains(&self.bits_per_sample) {
            return Err(format!("unsupported bit depth: {}", self.bits_per_sample));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            bits_per_sample: 16,
            output_directory: PathBuf::from("."),
        }
    }
}
