use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Logical input a capture device should record from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    Default,
    #[default]
    Mic,
    Camcorder,
    VoiceRecognition,
    VoiceCommunication,
    Unprocessed,
}

/// Requested microphone channel configuration.
///
/// Only some layouts map to a channel count; see [`ChannelLayout::channel_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    #[default]
    Default,
    Mono,
    Stereo,
    FrontBack,
    Invalid,
}

impl ChannelLayout {
    /// Resolve the layout to a channel count (1 or 2), or `None` if unmapped.
    pub fn channel_count(self) -> Option<u16> {
        match self {
            Self::Default | Self::Mono => Some(1),
            Self::Stereo | Self::FrontBack => Some(2),
            Self::Invalid => None,
        }
    }
}

/// Sample width of the captured PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    Eight,
    #[default]
    Sixteen,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        usize::from(self.bits() / 8)
    }

    /// Largest positive sample value for this width.
    pub fn max_amplitude(self) -> f32 {
        match self {
            Self::Eight => i8::MAX as f32,
            Self::Sixteen => i16::MAX as f32,
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = String;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            other => Err(format!("unsupported bit depth: {}", other)),
        }
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

/// Loudness reported for one read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoudnessSample {
    /// Normalized volume in `[0, 1]`, `None` when no sample passed the noise gate.
    pub volume: Option<f32>,
    /// Milliseconds since the recording started.
    pub elapsed_millis: u64,
}

impl LoudnessSample {
    /// Volume with the ungated case reported as silence.
    pub fn level(&self) -> f32 {
        self.volume.unwrap_or(0.0)
    }
}

/// Copy of the device read buffer handed to raw-data subscribers.
///
/// `data` always has the full buffer length; only the first `valid_len`
/// bytes were filled by the read that produced it. The tail may hold bytes
/// left over from an earlier cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBuffer {
    pub data: Arc<[u8]>,
    pub valid_len: usize,
}

impl RawBuffer {
    pub fn new(data: &[u8], valid_len: usize) -> Self {
        Self {
            data: Arc::from(data),
            valid_len: valid_len.min(data.len()),
        }
    }

    /// The bytes filled by the read that produced this buffer.
    pub fn valid(&self) -> &[u8] {
        &self.data[..self.valid_len]
    }
}
