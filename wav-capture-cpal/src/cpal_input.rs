//! cpal microphone input.
//!
//! Opens a cpal input stream in the requested format and exposes it as a
//! blocking [`InputStream`]. The cpal stream lives on its own thread; its
//! audio callback converts samples to little-endian PCM and hands them over
//! a channel that `read` drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;

use wav_capture_core::{BitDepth, CaptureDevice, CaptureError, CaptureParameters, InputStream};

/// How long a read waits for audio before reporting an empty read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Audio handed from the cpal callback to the reading side.
enum Chunk {
    Samples(Vec<u8>),
    Error(String),
}

/// Capture device backed by a cpal input device.
pub struct CpalDevice {
    device_name: Option<String>,
    read_timeout: Duration,
}

impl CpalDevice {
    /// The host's default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// An input device by its cpal name (see [`list_input_devices`](crate::list_input_devices)).
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

impl CaptureDevice for CpalDevice {
    fn open(&self, params: &CaptureParameters, buffer_size: usize) -> Result<Arc<dyn InputStream>, CaptureError> {
        let (chunk_tx, chunk_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let device_name = self.device_name.clone();
        let params = *params;

        log::debug!("Opening cpal input with a {} byte read buffer", buffer_size);

        let handle = thread::Builder::new()
            .name("cpal-input-stream".into())
            .spawn(move || run_stream(device_name.as_deref(), &params, chunk_tx, ready_tx, shutdown_rx))
            .map_err(|e| CaptureError::DeviceOpen(format!("failed to spawn input thread: {}", e)))?;

        let initialized = match ready_rx.recv() {
            Ok(Ok(initialized)) => initialized,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::DeviceOpen("input thread exited during open".into()));
            }
        };

        let (interrupt_tx, interrupt_rx) = bounded::<()>(0);
        Ok(Arc::new(CpalStream {
            chunks: chunk_rx,
            pending: Mutex::new(Vec::new()),
            initialized,
            read_timeout: self.read_timeout,
            interrupt: interrupt_rx,
            interrupt_tx: Mutex::new(Some(interrupt_tx)),
            shutdown: Mutex::new(Some(shutdown_tx)),
            thread: Mutex::new(Some(handle)),
            released: AtomicBool::new(false),
        }))
    }

    fn name(&self) -> String {
        self.device_name
            .clone()
            .unwrap_or_else(|| "default input".into())
    }
}

/// Owns the cpal stream until the handle is released.
fn run_stream(
    device_name: Option<&str>,
    params: &CaptureParameters,
    chunks: Sender<Chunk>,
    ready: Sender<Result<bool, CaptureError>>,
    shutdown: Receiver<()>,
) {
    let stream = match build_stream(device_name, params, chunks) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let initialized = match stream.play() {
        Ok(()) => true,
        Err(e) => {
            log::error!("Failed to start input stream: {}", e);
            false
        }
    };
    let _ = ready.send(Ok(initialized));

    // Returns once the shutdown sender is dropped.
    let _ = shutdown.recv();
    drop(stream);
    log::debug!("Input stream closed");
}

fn find_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceOpen("no default input device".into())),
        Some(name) => {
            let mut devices = host
                .input_devices()
                .map_err(|e| CaptureError::DeviceOpen(format!("failed to enumerate input devices: {}", e)))?;
            devices
                .find(|device| device.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceOpen(format!("input device not found: {}", name)))
        }
    }
}

fn build_stream(
    device_name: Option<&str>,
    params: &CaptureParameters,
    chunks: Sender<Chunk>,
) -> Result<cpal::Stream, CaptureError> {
    let device = find_device(device_name)?;
    let sample_format = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceOpen(format!("no supported input config: {}", e)))?
        .sample_format();

    let config = StreamConfig {
        channels: params.channel_count(),
        sample_rate: cpal::SampleRate(params.sample_rate_hz()),
        buffer_size: cpal::BufferSize::Default,
    };

    log::info!(
        "Using input device {:?}: {} Hz, {} channels, {:?} converted to {}-bit",
        device.name().unwrap_or_default(),
        config.sample_rate.0,
        config.channels,
        sample_format,
        params.bit_depth().bits()
    );

    let bit_depth = params.bit_depth();
    match sample_format {
        SampleFormat::I8 => build_typed::<i8>(&device, &config, bit_depth, chunks),
        SampleFormat::I16 => build_typed::<i16>(&device, &config, bit_depth, chunks),
        SampleFormat::I32 => build_typed::<i32>(&device, &config, bit_depth, chunks),
        SampleFormat::U8 => build_typed::<u8>(&device, &config, bit_depth, chunks),
        SampleFormat::U16 => build_typed::<u16>(&device, &config, bit_depth, chunks),
        SampleFormat::F32 => build_typed::<f32>(&device, &config, bit_depth, chunks),
        SampleFormat::F64 => build_typed::<f64>(&device, &config, bit_depth, chunks),
        other => Err(CaptureError::DeviceOpen(format!("unsupported sample format {:?}", other))),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    bit_depth: BitDepth,
    chunks: Sender<Chunk>,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    i8: FromSample<T>,
    i16: FromSample<T>,
{
    let errors = chunks.clone();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let _ = chunks.send(Chunk::Samples(encode_samples(data, bit_depth)));
            },
            move |err| {
                log::error!("Input stream error: {}", err);
                let _ = errors.send(Chunk::Error(err.to_string()));
            },
            None,
        )
        .map_err(|e| CaptureError::DeviceOpen(format!("failed to build input stream: {}", e)))
}

/// Convert interleaved samples to signed PCM bytes of `bit_depth`
/// (little-endian for 16-bit).
pub fn encode_samples<T>(samples: &[T], bit_depth: BitDepth) -> Vec<u8>
where
    T: Copy,
    i8: FromSample<T>,
    i16: FromSample<T>,
{
    match bit_depth {
        BitDepth::Eight => samples
            .iter()
            .map(|&s| i8::from_sample_(s) as u8)
            .collect(),
        BitDepth::Sixteen => samples
            .iter()
            .flat_map(|&s| i16::from_sample_(s).to_le_bytes())
            .collect(),
    }
}

/// An open cpal input stream.
pub struct CpalStream {
    chunks: Receiver<Chunk>,
    /// Bytes received but not yet handed to a reader.
    pending: Mutex<Vec<u8>>,
    initialized: bool,
    read_timeout: Duration,
    interrupt: Receiver<()>,
    interrupt_tx: Mutex<Option<Sender<()>>>,
    shutdown: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    released: AtomicBool,
}

impl InputStream for CpalStream {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize, CaptureError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceRead("stream released".into()));
        }

        let mut pending = self.pending.lock();
        if pending.is_empty() {
            select! {
                recv(self.chunks) -> chunk => match chunk {
                    Ok(Chunk::Samples(bytes)) => *pending = bytes,
                    Ok(Chunk::Error(message)) => return Err(CaptureError::DeviceRead(message)),
                    Err(_) => return Err(CaptureError::DeviceRead("input stream closed".into())),
                },
                recv(self.interrupt) -> _ => {
                    return Err(CaptureError::DeviceRead("read interrupted".into()));
                }
                default(self.read_timeout) => return Ok(0),
            }
        }

        while pending.len() < buffer.len() {
            match self.chunks.try_recv() {
                Ok(Chunk::Samples(bytes)) => pending.extend_from_slice(&bytes),
                Ok(Chunk::Error(message)) => return Err(CaptureError::DeviceRead(message)),
                Err(_) => break,
            }
        }

        let n = pending.len().min(buffer.len());
        buffer[..n].copy_from_slice(&pending[..n]);
        pending.drain(..n);
        Ok(n)
    }

    fn stop(&self) -> Result<(), CaptureError> {
        // Dropping the sender wakes a blocked read.
        self.interrupt_tx.lock().take();
        Ok(())
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.interrupt_tx.lock().take();
        self.shutdown.lock().take();
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::error!("Input stream thread panicked");
            }
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_stream(chunks: Receiver<Chunk>, read_timeout: Duration) -> CpalStream {
        let (interrupt_tx, interrupt_rx) = bounded(0);
        CpalStream {
            chunks,
            pending: Mutex::new(Vec::new()),
            initialized: true,
            read_timeout,
            interrupt: interrupt_rx,
            interrupt_tx: Mutex::new(Some(interrupt_tx)),
            shutdown: Mutex::new(None),
            thread: Mutex::new(None),
            released: AtomicBool::new(false),
        }
    }

    #[test]
    fn sixteen_bit_samples_are_little_endian() {
        let bytes = encode_samples(&[0x1234i16, -2], BitDepth::Sixteen);
        assert_eq!(bytes, vec![0x34, 0x12, 0xFE, 0xFF]);
    }

    #[test]
    fn float_samples_scale_to_full_range() {
        let bytes = encode_samples(&[0.0f32, 0.5], BitDepth::Sixteen);
        assert_eq!(bytes, vec![0, 0, 0x00, 0x40]);
    }

    #[test]
    fn unsigned_midpoint_is_silence() {
        assert_eq!(encode_samples(&[32768u16], BitDepth::Sixteen), vec![0, 0]);
    }

    #[test]
    fn eight_bit_keeps_the_high_byte() {
        assert_eq!(encode_samples(&[0x7F00i16, -256], BitDepth::Eight), vec![0x7F, 0xFF]);
    }

    #[test]
    fn read_splits_chunks_across_buffers() {
        let (tx, rx) = unbounded();
        tx.send(Chunk::Samples(vec![1, 2, 3, 4, 5, 6])).unwrap();
        let stream = detached_stream(rx, DEFAULT_READ_TIMEOUT);

        let mut buffer = [0u8; 4];
        assert_eq!(stream.read(&mut buffer).unwrap(), 4);
        assert_eq!(buffer, [1, 2, 3, 4]);
        assert_eq!(stream.read(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], &[5, 6]);
    }

    #[test]
    fn read_coalesces_queued_chunks() {
        let (tx, rx) = unbounded();
        tx.send(Chunk::Samples(vec![1, 2])).unwrap();
        tx.send(Chunk::Samples(vec![3, 4])).unwrap();
        let stream = detached_stream(rx, DEFAULT_READ_TIMEOUT);

        let mut buffer = [0u8; 8];
        assert_eq!(stream.read(&mut buffer).unwrap(), 4);
        assert_eq!(&buffer[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn read_times_out_with_an_empty_read() {
        let (_tx, rx) = unbounded();
        let stream = detached_stream(rx, Duration::from_millis(10));
        let mut buffer = [0u8; 4];
        assert_eq!(stream.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn stream_errors_fail_the_read() {
        let (tx, rx) = unbounded();
        tx.send(Chunk::Error("device unplugged".into())).unwrap();
        let stream = detached_stream(rx, DEFAULT_READ_TIMEOUT);
        let mut buffer = [0u8; 4];
        assert_eq!(
            stream.read(&mut buffer).unwrap_err(),
            CaptureError::DeviceRead("device unplugged".into())
        );
    }

    #[test]
    fn stop_interrupts_a_blocked_read() {
        let (_tx, rx) = unbounded();
        let stream = Arc::new(detached_stream(rx, Duration::from_secs(30)));

        let reader = Arc::clone(&stream);
        let handle = thread::spawn(move || {
            let mut buffer = [0u8; 4];
            reader.read(&mut buffer)
        });
        thread::sleep(Duration::from_millis(20));
        stream.stop().unwrap();

        assert!(matches!(handle.join().unwrap(), Err(CaptureError::DeviceRead(_))));
    }

    #[test]
    fn released_stream_refuses_reads() {
        let (_tx, rx) = unbounded();
        let stream = detached_stream(rx, DEFAULT_READ_TIMEOUT);
        stream.release();
        stream.release();
        let mut buffer = [0u8; 4];
        assert!(stream.read(&mut buffer).is_err());
    }
}
