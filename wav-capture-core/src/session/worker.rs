use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::models::audio_models::{LoudnessSample, RawBuffer};
use crate::models::config::{CaptureParameters, RecorderOptions};
use crate::models::error::CaptureError;
use crate::models::event::CaptureEvent;
use crate::models::recording_result::{CompletionResult, RecordingMetadata};
use crate::models::state::CaptureState;
use crate::processing::loudness;
use crate::processing::pcm_accumulator::PcmAccumulator;
use crate::storage::{metadata, wav_writer};
use crate::traits::capture_provider::InputStream;

use super::dispatcher::DispatchMessage;

/// Upper bound on the accumulator's initial allocation (one second of
/// audio at most).
const MAX_INITIAL_PCM_CAPACITY: usize = 1 << 20;

const PHASE_PENDING: u8 = 0;
const PHASE_ACTIVE: u8 = 1;
const PHASE_STOPPED: u8 = 2;
const PHASE_DISCARDED: u8 = 3;

/// Lifecycle of one recording, shared by the session, its worker and the
/// dispatch thread.
///
/// ```text
/// pending → active → stopped     (stop(), or the worker hit a terminal error)
///              └───→ discarded   (record() or release() while still active)
/// ```
/// A muted recording's events are no longer delivered.
pub(crate) struct RecordingTicket {
    pub(crate) generation: u64,
    phase: AtomicU8,
    muted: AtomicBool,
}

impl RecordingTicket {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            phase: AtomicU8::new(PHASE_PENDING),
            muted: AtomicBool::new(false),
        }
    }

    pub(crate) fn activate(&self) {
        self.phase.store(PHASE_ACTIVE, Ordering::SeqCst);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == PHASE_ACTIVE
    }

    /// Ask the worker to finish cleanly. Returns whether it was still active.
    pub(crate) fn request_stop(&self) -> bool {
        self.transition(PHASE_STOPPED)
    }

    /// Retire the recording: mute its events and, if it is still capturing,
    /// discard its audio.
    pub(crate) fn abandon(&self) {
        self.muted.store(true, Ordering::SeqCst);
        self.transition(PHASE_DISCARDED);
    }

    pub(crate) fn is_discarded(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == PHASE_DISCARDED
    }

    pub(crate) fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn transition(&self, to: u8) -> bool {
        self.phase
            .compare_exchange(PHASE_ACTIVE, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// State shared between the session (caller side) and its capture workers.
pub(crate) struct SessionShared {
    pub(crate) control: Mutex<ControlState>,
}

/// Caller-side session state, protected by `parking_lot::Mutex`.
pub(crate) struct ControlState {
    /// The recording `record()` most recently started.
    pub(crate) current: Option<Arc<RecordingTicket>>,
    /// Stopped recordings superseded while their worker was still finalizing.
    pub(crate) retired: Vec<Weak<RecordingTicket>>,
    pub(crate) next_generation: u64,
    pub(crate) stream: Option<Arc<dyn InputStream>>,
    pub(crate) state: CaptureState,
    pub(crate) buffer_size: usize,
    pub(crate) target_path: Option<PathBuf>,
    pub(crate) params: Option<CaptureParameters>,
}

impl ControlState {
    pub(crate) fn is_current(&self, ticket: &RecordingTicket) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| current.generation == ticket.generation)
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.current.as_ref().is_some_and(|current| current.is_active())
    }

    /// Stop and free the owned stream, if any.
    pub(crate) fn release_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.stop() {
                log::debug!("Stream stop during release failed: {}", e);
            }
            stream.release();
        }
    }
}

impl SessionShared {
    pub(crate) fn new() -> Self {
        Self {
            control: Mutex::new(ControlState {
                current: None,
                retired: Vec::new(),
                next_generation: 0,
                stream: None,
                state: CaptureState::Idle,
                buffer_size: 0,
                target_path: None,
                params: None,
            }),
        }
    }

    pub(crate) fn set_state(&self, ticket: &RecordingTicket, state: CaptureState) {
        let mut control = self.control.lock();
        if control.is_current(ticket) {
            control.state = state;
        }
    }

    /// End the recording of `ticket`. While it is still the session's current
    /// recording this also releases the stream and records the final state.
    pub(crate) fn finish(&self, ticket: &RecordingTicket, state: CaptureState) {
        let mut control = self.control.lock();
        ticket.request_stop();
        if !control.is_current(ticket) {
            return;
        }
        control.release_stream();
        control.state = state;
    }
}

/// How the read loop ended.
enum LoopExit {
    /// The recording was stopped; the PCM is ready to be written.
    Stopped(PcmAccumulator),
    /// A newer `record()` or a `release()` retired this recording mid-capture.
    Discarded,
}

/// One recording's capture loop, run on its own thread.
///
/// Owns the read buffer and the PCM accumulator; nothing else touches them.
pub(crate) struct CaptureWorker {
    pub(crate) ticket: Arc<RecordingTicket>,
    pub(crate) stream: Arc<dyn InputStream>,
    pub(crate) params: CaptureParameters,
    pub(crate) target_path: PathBuf,
    pub(crate) buffer_size: usize,
    pub(crate) options: RecorderOptions,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) events: Sender<DispatchMessage>,
}

impl CaptureWorker {
    pub(crate) fn run(self) {
        let started = Instant::now();
        self.emit(CaptureEvent::Started);

        match self.read_loop(started) {
            Ok(LoopExit::Stopped(pcm)) => self.complete(pcm, started),
            Ok(LoopExit::Discarded) => {
                log::debug!(
                    "Recording {} abandoned; captured audio discarded",
                    self.ticket.generation
                );
            }
            Err(e) => self.fail(e),
        }
    }

    fn read_loop(&self, started: Instant) -> Result<LoopExit, CaptureError> {
        let bit_depth = self.params.bit_depth();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut pcm = PcmAccumulator::with_capacity(self.params.bytes_per_second().min(MAX_INITIAL_PCM_CAPACITY));
        let mut zero_reads = 0u32;

        while self.ticket.is_active() {
            let read = match self.stream.read(&mut buffer) {
                Ok(read) => read.min(buffer.len()),
                // stop() and release() may interrupt a pending read.
                Err(_) if !self.ticket.is_active() => break,
                Err(e) => return Err(e),
            };

            let volume = if read > 0 {
                zero_reads = 0;
                self.send(DispatchMessage::Raw {
                    ticket: Arc::clone(&self.ticket),
                    buffer: RawBuffer::new(&buffer, read),
                });
                pcm.append(&buffer[..read]);
                loudness::analyze(&buffer, read, bit_depth)
            } else {
                zero_reads += 1;
                None
            };

            self.emit(CaptureEvent::Progress(LoudnessSample {
                volume,
                elapsed_millis: elapsed_millis(started),
            }));

            if zero_reads > self.options.max_zero_reads {
                log::warn!(
                    "Capture device returned no audio for {} consecutive reads",
                    zero_reads
                );
                return Err(CaptureError::DeviceStalled { zero_reads });
            }
        }

        if self.ticket.is_discarded() {
            Ok(LoopExit::Discarded)
        } else {
            Ok(LoopExit::Stopped(pcm))
        }
    }

    fn complete(&self, pcm: PcmAccumulator, started: Instant) {
        let total_duration_millis = elapsed_millis(started);
        self.shared.set_state(&self.ticket, CaptureState::Finalizing);

        let outcome = match wav_writer::write_wav_file(pcm.into_inner(), &self.target_path, &self.params) {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(e),
        };

        let result = CompletionResult {
            total_duration_millis,
            file_path: outcome.file_path,
            pcm_bytes: outcome.pcm_bytes,
            checksum: outcome.checksum,
        };

        if self.options.write_metadata {
            let sidecar = RecordingMetadata::new(&result, &self.params);
            if let Err(e) = metadata::write_metadata(&sidecar, &result.file_path) {
                log::warn!("Failed to write recording metadata: {}", e);
            }
        }

        log::info!(
            "Recording finished: {} ms, {} bytes of PCM at {:?}",
            result.total_duration_millis,
            result.pcm_bytes,
            result.file_path
        );

        self.shared
            .finish(&self.ticket, CaptureState::Completed(result.clone()));
        self.emit(CaptureEvent::Finished(result));
    }

    fn fail(&self, error: CaptureError) {
        log::error!("Recording failed: {}", error);
        self.shared
            .finish(&self.ticket, CaptureState::Failed(error.clone()));
        self.emit(CaptureEvent::Failed(error));
    }

    fn emit(&self, event: CaptureEvent) {
        self.send(DispatchMessage::Event {
            ticket: Arc::clone(&self.ticket),
            event,
        });
    }

    fn send(&self, message: DispatchMessage) {
        // The dispatcher only goes away with the session.
        let _ = self.events.send(message);
    }
}

fn elapsed_millis(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_only_applies_to_an_active_recording() {
        let ticket = RecordingTicket::new(1);
        assert!(!ticket.request_stop());

        ticket.activate();
        assert!(ticket.is_active());
        assert!(ticket.request_stop());
        assert!(!ticket.request_stop());
        assert!(!ticket.is_active());
    }

    #[test]
    fn abandoning_a_stopped_recording_keeps_its_audio() {
        let ticket = RecordingTicket::new(1);
        ticket.activate();
        ticket.request_stop();
        ticket.abandon();

        assert!(ticket.is_muted());
        assert!(!ticket.is_discarded());
    }

    #[test]
    fn abandoning_an_active_recording_discards_it() {
        let ticket = RecordingTicket::new(1);
        ticket.activate();
        ticket.abandon();

        assert!(ticket.is_muted());
        assert!(ticket.is_discarded());
        assert!(!ticket.request_stop());
    }
}
