use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::config::{CaptureParameters, RecorderOptions};
use crate::models::error::CaptureError;
use crate::models::event::CaptureEvent;
use crate::models::state::CaptureState;
use crate::traits::capture_delegate::{CaptureDelegate, RawDataCallback};
use crate::traits::capture_provider::CaptureDevice;

use super::dispatcher::{DispatchMessage, EventDispatcher};
use super::worker::{CaptureWorker, ControlState, RecordingTicket, SessionShared};

/// Capture session controller.
///
/// Owns a capture device, runs at most one recording at a time on a worker
/// thread, and delivers events to the attached sink from a single dispatch
/// thread. All methods take `&self`; share the session with `Arc` to control
/// it from several threads.
///
/// ```text
/// record() → [CaptureDevice::open] → [worker: read → analyze → accumulate] → [WAV file]
///                                              │
///                                              └→ [dispatch thread] → sink / raw callback
/// ```
pub struct CaptureSession<D: CaptureDevice> {
    device: D,
    options: RecorderOptions,
    shared: Arc<SessionShared>,
    dispatcher: EventDispatcher,
    worker_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<D: CaptureDevice> CaptureSession<D> {
    pub fn new(device: D) -> Result<Self, CaptureError> {
        Self::with_options(device, RecorderOptions::default())
    }

    pub fn with_options(device: D, options: RecorderOptions) -> Result<Self, CaptureError> {
        options.validate()?;
        let shared = Arc::new(SessionShared::new());
        let dispatcher = EventDispatcher::spawn()?;
        Ok(Self {
            device,
            options,
            shared,
            dispatcher,
            worker_handle: Mutex::new(None),
        })
    }

    /// Attach (or with `None`, detach) the notification sink.
    pub fn set_notification_sink(&self, sink: Option<Arc<dyn CaptureDelegate>>) {
        let gate = self.dispatcher.subscribers().lock();
        gate.borrow_mut().sink = sink;
    }

    /// Attach (or with `None`, detach) the raw buffer subscriber.
    pub fn set_raw_data_subscriber(&self, subscriber: Option<RawDataCallback>) {
        let gate = self.dispatcher.subscribers().lock();
        gate.borrow_mut().raw = subscriber;
    }

    pub fn state(&self) -> CaptureState {
        self.shared.control.lock().state.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.shared.control.lock().is_recording()
    }

    /// Read buffer size of the current or most recent recording, in bytes.
    pub fn buffer_size(&self) -> usize {
        self.shared.control.lock().buffer_size
    }

    /// Output path of the current or most recent recording.
    pub fn target_path(&self) -> Option<PathBuf> {
        self.shared.control.lock().target_path.clone()
    }

    /// Parameters of the current or most recent recording.
    pub fn parameters(&self) -> Option<CaptureParameters> {
        self.shared.control.lock().params
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    /// Record with the default parameters (mic, 16 kHz, mono, 16-bit).
    pub fn record_default(&self, path: impl Into<PathBuf>) -> Result<(), CaptureError> {
        self.record(path, CaptureParameters::default())
    }

    /// Start recording to `path`.
    ///
    /// Returns once the worker is running; progress, completion and device
    /// failures arrive through the sink. A recording still in progress is
    /// abandoned and its device released before the new one is opened; one
    /// that was already stopped still writes its file and reports `Finished`.
    pub fn record(&self, path: impl Into<PathBuf>, params: CaptureParameters) -> Result<(), CaptureError> {
        let target_path = path.into();
        if target_path.as_os_str().is_empty() {
            return Err(CaptureError::InvalidParameters("output path is empty".into()));
        }

        let mut control = self.shared.control.lock();
        if let Some(previous) = control.current.take() {
            if previous.is_active() {
                log::warn!("record() while recording; abandoning the previous recording");
                previous.abandon();
            } else {
                control.retired.push(Arc::downgrade(&previous));
            }
        }
        control.retired.retain(|retired| retired.strong_count() > 0);
        control.release_stream();

        control.next_generation += 1;
        let ticket = Arc::new(RecordingTicket::new(control.next_generation));
        control.current = Some(Arc::clone(&ticket));
        let buffer_size = self.device.min_buffer_size(&params).max(1) * self.options.buffer_multiplier;
        control.buffer_size = buffer_size;
        control.target_path = Some(target_path.clone());
        control.params = Some(params);

        log::debug!(
            "Opening {} for {:?}: {} Hz, {} ch, {}-bit, {} byte buffer",
            self.device.name(),
            params.source(),
            params.sample_rate_hz(),
            params.channel_count(),
            params.bit_depth().bits(),
            buffer_size
        );

        let stream = match self.device.open(&params, buffer_size) {
            Ok(stream) => stream,
            Err(e) => {
                self.fail_before_start(&mut control, &ticket, e);
                return Ok(());
            }
        };
        if !stream.is_initialized() {
            stream.release();
            self.fail_before_start(&mut control, &ticket, CaptureError::DeviceUninitialized);
            return Ok(());
        }

        control.stream = Some(Arc::clone(&stream));
        control.state = CaptureState::Recording;
        ticket.activate();

        let worker = CaptureWorker {
            ticket: Arc::clone(&ticket),
            stream,
            params,
            target_path,
            buffer_size,
            options: self.options.clone(),
            shared: Arc::clone(&self.shared),
            events: self.dispatcher.sender(),
        };

        match thread::Builder::new()
            .name("wav-capture-worker".into())
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                // A previous worker, if any, is retired and left to exit on its own.
                *self.worker_handle.lock() = Some(handle);
                log::info!("Recording started");
            }
            Err(e) => {
                ticket.request_stop();
                control.release_stream();
                self.fail_before_start(
                    &mut control,
                    &ticket,
                    CaptureError::Unknown(format!("failed to spawn capture worker: {}", e)),
                );
            }
        }
        Ok(())
    }

    /// Request the recording to stop. Idempotent.
    ///
    /// Returns immediately; at most one more read completes before the worker
    /// writes the file and reports `Finished`.
    pub fn stop(&self) {
        let control = self.shared.control.lock();
        let stopping = control
            .current
            .as_ref()
            .is_some_and(|current| current.request_stop());
        if !stopping {
            return;
        }
        if let Some(ref stream) = control.stream {
            if let Err(e) = stream.stop() {
                log::warn!("Failed to stop capture stream: {}", e);
            }
        }
    }

    /// Stop, detach the sink and raw subscriber, and free the device.
    ///
    /// No further events of earlier recordings are delivered. A recording
    /// still in progress is abandoned and its audio discarded; a stopped one
    /// still writes its file.
    pub fn release(&self) {
        let gate = self.dispatcher.subscribers().lock();
        {
            let mut subscribers = gate.borrow_mut();
            subscribers.sink = None;
            subscribers.raw = None;
        }

        let mut control = self.shared.control.lock();
        if let Some(current) = control.current.take() {
            current.abandon();
        }
        for retired in control.retired.drain(..) {
            if let Some(retired) = retired.upgrade() {
                retired.abandon();
            }
        }
        control.release_stream();
        if !control.state.is_terminal() {
            control.state = CaptureState::Idle;
        }
    }

    /// Block until the most recently started worker thread has exited.
    pub fn wait_for_worker(&self) {
        let handle = self.worker_handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Capture worker panicked");
            }
        }
    }

    fn fail_before_start(&self, control: &mut ControlState, ticket: &Arc<RecordingTicket>, error: CaptureError) {
        log::error!("Failed to start recording: {}", error);
        control.state = CaptureState::Failed(error.clone());
        let _ = self.dispatcher.sender().send(DispatchMessage::Event {
            ticket: Arc::clone(ticket),
            event: CaptureEvent::Failed(error),
        });
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.release();
    }
}
