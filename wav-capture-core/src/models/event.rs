use super::audio_models::LoudnessSample;
use super::error::CaptureError;
use super::recording_result::CompletionResult;

/// Notification produced by a capture session.
///
/// Per session: at most one `Started`, then any number of `Progress`, then
/// exactly one of `Finished` or `Failed`. Nothing follows the terminal event.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Started,
    Progress(LoudnessSample),
    Finished(CompletionResult),
    Failed(CaptureError),
}

impl CaptureEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Failed(_))
    }
}
