use std::cell::RefCell;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::ReentrantMutex;

use crate::models::audio_models::RawBuffer;
use crate::models::error::CaptureError;
use crate::models::event::CaptureEvent;
use crate::traits::capture_delegate::{deliver_event, CaptureDelegate, RawDataCallback};

use super::worker::RecordingTicket;

/// Message from a capture worker to the dispatch thread.
pub(crate) enum DispatchMessage {
    Raw {
        ticket: Arc<RecordingTicket>,
        buffer: RawBuffer,
    },
    Event {
        ticket: Arc<RecordingTicket>,
        event: CaptureEvent,
    },
}

impl DispatchMessage {
    fn ticket(&self) -> &RecordingTicket {
        match self {
            Self::Raw { ticket, .. } | Self::Event { ticket, .. } => ticket,
        }
    }
}

/// Currently attached consumers.
#[derive(Default)]
pub(crate) struct Subscribers {
    pub(crate) sink: Option<Arc<dyn CaptureDelegate>>,
    pub(crate) raw: Option<RawDataCallback>,
}

/// Consumers behind the delivery gate.
///
/// The dispatch thread holds the gate for the whole of each delivery, so once
/// a caller has swapped or cleared a consumer no delivery to the old one is
/// still running. The gate is reentrant so consumers may call back into the
/// session from inside a callback.
pub(crate) type SubscriberGate = Arc<ReentrantMutex<RefCell<Subscribers>>>;

/// Delivers worker output to the attached consumers on one dedicated thread,
/// in the order it was produced.
///
/// ```text
/// [worker] ──unbounded channel──→ [wav-capture-dispatch] → sink / raw callback
/// ```
/// The channel is unbounded so a slow consumer never blocks the capture loop.
pub(crate) struct EventDispatcher {
    sender: Sender<DispatchMessage>,
    subscribers: SubscriberGate,
    handle: Option<thread::JoinHandle<()>>,
}

impl EventDispatcher {
    pub(crate) fn spawn() -> Result<Self, CaptureError> {
        let (sender, receiver) = unbounded();
        let subscribers: SubscriberGate = Arc::new(ReentrantMutex::new(RefCell::new(Subscribers::default())));

        let gate = Arc::clone(&subscribers);
        let handle = thread::Builder::new()
            .name("wav-capture-dispatch".into())
            .spawn(move || dispatch_loop(receiver, gate))
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn dispatch thread: {}", e)))?;

        Ok(Self {
            sender,
            subscribers,
            handle: Some(handle),
        })
    }

    pub(crate) fn sender(&self) -> Sender<DispatchMessage> {
        self.sender.clone()
    }

    pub(crate) fn subscribers(&self) -> &SubscriberGate {
        &self.subscribers
    }
}

impl Drop for EventDispatcher {
    /// Closes the session's end of the channel and waits for the dispatch
    /// thread to drain. Retired workers hold their own senders, so this also
    /// waits for them to exit.
    fn drop(&mut self) {
        let (closed, _) = bounded(0);
        drop(std::mem::replace(&mut self.sender, closed));
        let Some(handle) = self.handle.take() else {
            return;
        };
        // A consumer may drop the last session handle from inside a callback.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("Dispatch thread panicked");
        }
    }
}

/// Runs until every sender (session and workers) is gone.
/// Output of an abandoned recording is dropped.
fn dispatch_loop(receiver: Receiver<DispatchMessage>, gate: SubscriberGate) {
    for message in receiver.iter() {
        let guard = gate.lock();
        if message.ticket().is_muted() {
            continue;
        }

        match message {
            DispatchMessage::Raw { buffer, .. } => {
                let callback = guard.borrow().raw.clone();
                if let Some(callback) = callback {
                    callback(&buffer);
                }
            }
            DispatchMessage::Event { event, .. } => {
                let sink = guard.borrow().sink.clone();
                if let Some(sink) = sink {
                    deliver_event(sink.as_ref(), &event);
                }
            }
        }
    }
    log::debug!("Dispatch thread exiting");
}
