use serde::{Deserialize, Serialize};

use super::audio_models::{AudioSource, BitDepth, ChannelLayout};
use super::error::CaptureError;

/// Format of a capture: source, rate, layout and sample width.
///
/// Only constructible through [`CaptureParametersBuilder::build`] (or serde,
/// which goes through the builder), so a value always carries a resolved
/// channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ParameterFields", into = "ParameterFields")]
pub struct CaptureParameters {
    source: AudioSource,
    sample_rate_hz: u32,
    channel_layout: ChannelLayout,
    bit_depth: BitDepth,
    channel_count: u16,
}

impl CaptureParameters {
    pub fn builder() -> CaptureParametersBuilder {
        CaptureParametersBuilder::default()
    }

    pub fn source(&self) -> AudioSource {
        self.source
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        self.channel_layout
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Channel count resolved from the layout (1 or 2).
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Bytes of PCM produced per second at the declared format.
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate_hz as usize * usize::from(self.channel_count) * self.bit_depth.bytes_per_sample()
    }
}

impl Default for CaptureParameters {
    /// Mic, 16 kHz, default (mono) layout, 16-bit.
    fn default() -> Self {
        Self {
            source: AudioSource::Mic,
            sample_rate_hz: 16_000,
            channel_layout: ChannelLayout::Default,
            bit_depth: BitDepth::Sixteen,
            channel_count: 1,
        }
    }
}

/// Builder for [`CaptureParameters`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Copy)]
pub struct CaptureParametersBuilder {
    source: AudioSource,
    sample_rate_hz: u32,
    channel_layout: ChannelLayout,
    bit_depth: BitDepth,
}

impl Default for CaptureParametersBuilder {
    fn default() -> Self {
        let defaults = CaptureParameters::default();
        Self {
            source: defaults.source,
            sample_rate_hz: defaults.sample_rate_hz,
            channel_layout: defaults.channel_layout,
            bit_depth: defaults.bit_depth,
        }
    }
}

impl CaptureParametersBuilder {
    pub fn source(mut self, source: AudioSource) -> Self {
        self.source = source;
        self
    }

    pub fn sample_rate_hz(mut self, sample_rate_hz: u32) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self
    }

    pub fn channel_layout(mut self, channel_layout: ChannelLayout) -> Self {
        self.channel_layout = channel_layout;
        self
    }

    pub fn bit_depth(mut self, bit_depth: BitDepth) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn build(self) -> Result<CaptureParameters, CaptureError> {
        let channel_count = self.channel_layout.channel_count().ok_or_else(|| {
            CaptureError::InvalidParameters(format!("bad channel layout: {:?}", self.channel_layout))
        })?;
        if self.sample_rate_hz == 0 {
            return Err(CaptureError::InvalidParameters("sample rate must be positive".into()));
        }
        Ok(CaptureParameters {
            source: self.source,
            sample_rate_hz: self.sample_rate_hz,
            channel_layout: self.channel_layout,
            bit_depth: self.bit_depth,
            channel_count,
        })
    }
}

/// Serialized form of [`CaptureParameters`]; missing fields take the defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
struct ParameterFields {
    source: AudioSource,
    sample_rate_hz: u32,
    channel_layout: ChannelLayout,
    bit_depth: BitDepth,
}

impl Default for ParameterFields {
    fn default() -> Self {
        CaptureParameters::default().into()
    }
}

impl TryFrom<ParameterFields> for CaptureParameters {
    type Error = CaptureError;

    fn try_from(fields: ParameterFields) -> Result<Self, Self::Error> {
        CaptureParameters::builder()
            .source(fields.source)
            .sample_rate_hz(fields.sample_rate_hz)
            .channel_layout(fields.channel_layout)
            .bit_depth(fields.bit_depth)
            .build()
    }
}

impl From<CaptureParameters> for ParameterFields {
    fn from(params: CaptureParameters) -> Self {
        Self {
            source: params.source,
            sample_rate_hz: params.sample_rate_hz,
            channel_layout: params.channel_layout,
            bit_depth: params.bit_depth,
        }
    }
}

/// Tuning for a [`CaptureSession`](crate::CaptureSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderOptions {
    /// Read buffer size as a multiple of the device's minimum buffer size (default: 2).
    pub buffer_multiplier: usize,

    /// Consecutive empty reads tolerated before the device counts as stalled (default: 20).
    pub max_zero_reads: u32,

    /// Write a `.metadata.json` sidecar next to each finished recording (default: false).
    pub write_metadata: bool,
}

impl RecorderOptions {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.buffer_multiplier == 0 {
            return Err(CaptureError::InvalidConfiguration(
                "buffer multiplier must be at least 1".into(),
            ));
        }
        if self.max_zero_reads == 0 {
            return Err(CaptureError::InvalidConfiguration(
                "max zero reads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse options from JSON, rejecting invalid values.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::InvalidConfiguration(format!("failed to parse options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            buffer_multiplier: 2,
            max_zero_reads: 20,
            write_metadata: false,
        }
    }
}
