use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::AudioSource;
use super::config::CaptureParameters;

/// Result delivered with the terminal `Finished` event of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub total_duration_millis: u64,
    pub file_path: PathBuf,
    /// Length of the data chunk, i.e. the number of PCM bytes captured.
    pub pcm_bytes: u64,
    /// SHA-256 hex digest of the finished file.
    pub checksum: String,
}

/// Metadata stored alongside a recording.
///
/// Serializable for the JSON sidecar written next to the WAV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub duration_millis: u64,
    pub file_path: String,
    pub checksum: String,
    pub source: AudioSource,
    pub sample_rate_hz: u32,
    pub channels: u16,
    /// Bit depth the device captured at; the file header always declares 16.
    pub declared_bit_depth: u16,
}

impl RecordingMetadata {
    pub fn new(result: &CompletionResult, params: &CaptureParameters) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            duration_millis: result.total_duration_millis,
            file_path: result.file_path.to_string_lossy().into_owned(),
            checksum: result.checksum.clone(),
            source: params.source(),
            sample_rate_hz: params.sample_rate_hz(),
            channels: params.channel_count(),
            declared_bit_depth: params.bit_depth().bits(),
        }
    }
}
