use thiserror::Error;

/// Errors that can occur while configuring, capturing or writing a recording.
///
/// `InvalidParameters` is only ever returned synchronously, from parameter
/// construction or `record`. Device and storage failures reach consumers as the terminal
/// `CaptureEvent::Failed` of a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid capture parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid recorder configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to open capture device: {0}")]
    DeviceOpen(String),

    #[error("capture device is uninitialized")]
    DeviceUninitialized,

    #[error("capture device stalled after {zero_reads} consecutive empty reads")]
    DeviceStalled { zero_reads: u32 },

    #[error("capture device read failed: {0}")]
    DeviceRead(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid container: {0}")]
    InvalidContainer(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Whether this error was raised by the capture device rather than by
    /// configuration or storage.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::DeviceOpen(_) | Self::DeviceUninitialized | Self::DeviceStalled { .. } | Self::DeviceRead(_)
        )
    }
}
