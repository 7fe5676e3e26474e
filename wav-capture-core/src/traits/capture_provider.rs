use std::sync::Arc;

use crate::models::config::CaptureParameters;
use crate::models::error::CaptureError;

/// An open capture stream, shared between the session and its worker.
///
/// All methods take `&self` and must be safe to call from any thread.
/// `stop` and `release` must unblock a `read` that is waiting for data.
pub trait InputStream: Send + Sync {
    /// Whether the backend finished initializing the stream.
    fn is_initialized(&self) -> bool;

    /// Blocking read of up to `buffer.len()` bytes of PCM.
    ///
    /// Returns the number of bytes written to the front of `buffer`; `0`
    /// means no audio arrived in time.
    fn read(&self, buffer: &mut [u8]) -> Result<usize, CaptureError>;

    /// Stop delivering audio. Idempotent.
    fn stop(&self) -> Result<(), CaptureError>;

    /// Free the underlying device. Reads after release return an error or `0`.
    fn release(&self);
}

/// A capture backend able to open input streams.
///
/// Implemented by:
/// - `CpalDevice` (wav-capture-cpal)
/// - scripted devices in tests
pub trait CaptureDevice: Send + Sync {
    /// Smallest read buffer, in bytes, the device can serve for `params`.
    ///
    /// Defaults to 20 ms of audio rounded down to whole frames.
    fn min_buffer_size(&self, params: &CaptureParameters) -> usize {
        let frame = usize::from(params.channel_count()) * params.bit_depth().bytes_per_sample();
        let bytes = params.bytes_per_second() / 50;
        (bytes / frame).max(1) * frame
    }

    /// Open a stream delivering PCM in the format described by `params`.
    fn open(&self, params: &CaptureParameters, buffer_size: usize) -> Result<Arc<dyn InputStream>, CaptureError>;

    /// Human-readable device name for logs.
    fn name(&self) -> String;
}
