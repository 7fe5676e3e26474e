use super::error::CaptureError;
use super::recording_result::CompletionResult;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → recording → finalizing → completed
///            ↓            ↓
///          failed ←───────┘
/// ```
/// A device that fails to open goes straight from idle to failed.
/// `record()` starts over from any state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Recording,
    Finalizing,
    Completed(CompletionResult),
    Failed(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Returns the recording duration once the session has completed.
    pub fn duration_millis(&self) -> Option<u64> {
        match self {
            Self::Completed(result) => Some(result.total_duration_millis),
            _ => None,
        }
    }
}
