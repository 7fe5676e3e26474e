#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use wav_capture_core::{
    CaptureDelegate, CaptureDevice, CaptureError, CaptureEvent, CaptureParameters, CompletionResult, InputStream,
    LoudnessSample, RawBuffer, RawDataCallback,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// One scripted result of `InputStream::read`.
#[derive(Debug, Clone)]
pub enum Step {
    Data(Vec<u8>),
    Zero,
    Error(String),
}

/// What a stream does once its script is exhausted.
#[derive(Debug, Clone, Copy)]
pub enum Tail {
    /// Block like a live microphone until stopped or released, then fail the read.
    Block,
    /// Keep returning empty reads.
    Zeros,
}

#[derive(Debug, Default)]
pub struct DeviceCounters {
    pub opens: AtomicUsize,
    pub releases: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl DeviceCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Capture device replaying a fixed script on every open.
pub struct ScriptedDevice {
    pub script: Vec<Step>,
    pub tail: Tail,
    pub min_buffer: usize,
    pub read_delay: Duration,
    pub initialized: bool,
    pub open_error: Option<CaptureError>,
    pub counters: Arc<DeviceCounters>,
}

impl ScriptedDevice {
    pub fn new(script: Vec<Step>, tail: Tail) -> Self {
        Self {
            script,
            tail,
            min_buffer: 160,
            read_delay: Duration::ZERO,
            initialized: true,
            open_error: None,
            counters: Arc::new(DeviceCounters::default()),
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn counters(&self) -> Arc<DeviceCounters> {
        Arc::clone(&self.counters)
    }
}

impl CaptureDevice for ScriptedDevice {
    fn min_buffer_size(&self, _params: &CaptureParameters) -> usize {
        self.min_buffer
    }

    fn open(&self, _params: &CaptureParameters, _buffer_size: usize) -> Result<Arc<dyn InputStream>, CaptureError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(ref err) = self.open_error {
            return Err(err.clone());
        }
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Arc::new(ScriptedStream {
            steps: Mutex::new(self.script.iter().cloned().collect()),
            tail: self.tail,
            read_delay: self.read_delay,
            initialized: self.initialized,
            flags: Mutex::new(StreamFlags::default()),
            wake: Condvar::new(),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn name(&self) -> String {
        "scripted".into()
    }
}

#[derive(Debug, Default)]
struct StreamFlags {
    stopped: bool,
    released: bool,
}

pub struct ScriptedStream {
    steps: Mutex<VecDeque<Step>>,
    tail: Tail,
    read_delay: Duration,
    initialized: bool,
    flags: Mutex<StreamFlags>,
    wake: Condvar,
    counters: Arc<DeviceCounters>,
}

impl InputStream for ScriptedStream {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize, CaptureError> {
        if self.flags.lock().released {
            return Err(CaptureError::DeviceRead("stream released".into()));
        }
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }

        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Data(data)) => {
                let n = data.len().min(buffer.len());
                buffer[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(Step::Zero) => Ok(0),
            Some(Step::Error(message)) => Err(CaptureError::DeviceRead(message)),
            None => match self.tail {
                Tail::Zeros => {
                    std::thread::sleep(Duration::from_millis(1));
                    Ok(0)
                }
                Tail::Block => {
                    let mut flags = self.flags.lock();
                    while !flags.stopped && !flags.released {
                        self.wake.wait(&mut flags);
                    }
                    Err(CaptureError::DeviceRead("read interrupted".into()))
                }
            },
        }
    }

    fn stop(&self) -> Result<(), CaptureError> {
        self.flags.lock().stopped = true;
        self.wake.notify_all();
        Ok(())
    }

    fn release(&self) {
        let mut flags = self.flags.lock();
        if !flags.released {
            flags.released = true;
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
            self.counters.active.fetch_sub(1, Ordering::SeqCst);
        }
        drop(flags);
        self.wake.notify_all();
    }
}

/// Everything the dispatch thread handed to consumers, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Raw(RawBuffer),
    Event(CaptureEvent),
}

/// Sink forwarding every callback into a channel.
pub struct ChannelSink {
    tx: Sender<Observed>,
}

impl CaptureDelegate for ChannelSink {
    fn on_started(&self) {
        let _ = self.tx.send(Observed::Event(CaptureEvent::Started));
    }

    fn on_progress(&self, sample: &LoudnessSample) {
        let _ = self.tx.send(Observed::Event(CaptureEvent::Progress(*sample)));
    }

    fn on_finished(&self, result: &CompletionResult) {
        let _ = self.tx.send(Observed::Event(CaptureEvent::Finished(result.clone())));
    }

    fn on_error(&self, error: &CaptureError) {
        let _ = self.tx.send(Observed::Event(CaptureEvent::Failed(error.clone())));
    }
}

/// A sink and raw subscriber sharing one ordered channel.
pub fn observers() -> (Arc<dyn CaptureDelegate>, RawDataCallback, Receiver<Observed>) {
    let (tx, rx) = unbounded();
    let raw_tx = tx.clone();
    let raw: RawDataCallback = Arc::new(move |buffer: &RawBuffer| {
        let _ = raw_tx.send(Observed::Raw(buffer.clone()));
    });
    (Arc::new(ChannelSink { tx }), raw, rx)
}

/// Receive until `count` events (raw buffers not counted) have arrived.
pub fn collect_events(rx: &Receiver<Observed>, count: usize) -> Vec<Observed> {
    let mut seen = Vec::new();
    let mut events = 0;
    while events < count {
        let item = rx.recv_timeout(TIMEOUT).expect("timed out waiting for capture events");
        if matches!(item, Observed::Event(_)) {
            events += 1;
        }
        seen.push(item);
    }
    seen
}

/// Receive until the terminal event has arrived.
pub fn collect_until_terminal(rx: &Receiver<Observed>) -> Vec<Observed> {
    let mut seen = Vec::new();
    loop {
        let item = rx.recv_timeout(TIMEOUT).expect("timed out waiting for terminal event");
        let terminal = matches!(&item, Observed::Event(event) if event.is_terminal());
        seen.push(item);
        if terminal {
            return seen;
        }
    }
}

/// Receive until `count` terminal events have arrived.
pub fn collect_terminals(rx: &Receiver<Observed>, count: usize) -> Vec<Observed> {
    let mut seen = Vec::new();
    let mut terminals = 0;
    while terminals < count {
        let item = rx.recv_timeout(TIMEOUT).expect("timed out waiting for terminal events");
        if matches!(&item, Observed::Event(event) if event.is_terminal()) {
            terminals += 1;
        }
        seen.push(item);
    }
    seen
}

pub fn events_only(observed: &[Observed]) -> Vec<CaptureEvent> {
    observed
        .iter()
        .filter_map(|item| match item {
            Observed::Event(event) => Some(event.clone()),
            Observed::Raw(_) => None,
        })
        .collect()
}

pub fn temp_wav(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("wav_capture_session_{}_{}.wav", std::process::id(), name))
}

pub fn pcm16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
