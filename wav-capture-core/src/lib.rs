//! # wav-capture-core
//!
//! Platform-agnostic PCM capture core library.
//!
//! Reads raw PCM from a capture device on a worker thread, meters loudness
//! per buffer, streams buffers and progress to consumers through a dispatch
//! thread, and writes the captured audio to a canonical WAV file on stop.
//! Platform backends implement the `CaptureDevice` and `InputStream` traits
//! and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! wav-capture-core (this crate)
//! ├── traits/       ← CaptureDevice, InputStream, CaptureDelegate, RawDataCallback
//! ├── models/       ← CaptureError, CaptureState, CaptureEvent, CaptureParameters, etc.
//! ├── processing/   ← loudness metering, PCM accumulation, WAV header, voice activity
//! ├── session/      ← CaptureSession (controller, worker, dispatcher)
//! └── storage/      ← WAV file writer, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioSource, BitDepth, ChannelLayout, LoudnessSample, RawBuffer};
pub use models::config::{CaptureParameters, CaptureParametersBuilder, RecorderOptions};
pub use models::error::CaptureError;
pub use models::event::CaptureEvent;
pub use models::recording_result::{CompletionResult, RecordingMetadata};
pub use models::state::CaptureState;
pub use processing::loudness::analyze;
pub use processing::voice_activity::VoiceActivity;
pub use session::recorder::CaptureSession;
pub use storage::wav_writer::{write_wav_file, WavWriteOutcome};
pub use traits::capture_delegate::{deliver_event, CaptureDelegate, RawDataCallback};
pub use traits::capture_provider::{CaptureDevice, InputStream};
