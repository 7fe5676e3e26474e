use std::sync::Arc;

use crate::models::audio_models::{LoudnessSample, RawBuffer};
use crate::models::error::CaptureError;
use crate::models::event::CaptureEvent;
use crate::models::recording_result::CompletionResult;

/// Notification sink for capture session events.
///
/// All methods are called from the session's dispatch thread, one event at a
/// time and in the order the capture worker produced them, so implementations
/// need no synchronization of their own.
pub trait CaptureDelegate: Send + Sync {
    /// Called once the device is open and the first read is about to start.
    fn on_started(&self);

    /// Called after every read cycle, including empty reads.
    fn on_progress(&self, sample: &LoudnessSample);

    /// Called when capture ended cleanly and the file has been written.
    fn on_finished(&self, result: &CompletionResult);

    /// Called when the session failed. No further events follow.
    fn on_error(&self, error: &CaptureError);
}

/// Callback receiving a copy of each non-empty read buffer.
///
/// Invoked on the dispatch thread before the `Progress` event computed from
/// the same read.
pub type RawDataCallback = Arc<dyn Fn(&RawBuffer) + Send + Sync + 'static>;

/// Route an event to the matching delegate method.
pub fn deliver_event(delegate: &dyn CaptureDelegate, event: &CaptureEvent) {
    match event {
        CaptureEvent::Started => delegate.on_started(),
        CaptureEvent::Progress(sample) => delegate.on_progress(sample),
        CaptureEvent::Finished(result) => delegate.on_finished(result),
        CaptureEvent::Failed(error) => delegate.on_error(error),
    }
}
