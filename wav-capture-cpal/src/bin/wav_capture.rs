//! `wav-capture`: record the microphone to a WAV file.
//!
//! Records until Enter is pressed or `--duration` elapses, drawing a live
//! loudness meter on stderr.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{after, bounded, never, select, Receiver, Sender};
use log::LevelFilter;
use parking_lot::Mutex;

use wav_capture_core::{
    BitDepth, CaptureDelegate, CaptureError, CaptureParameters, CaptureSession, ChannelLayout, CompletionResult,
    LoudnessSample, RawBuffer, RecorderOptions, VoiceActivity,
};
use wav_capture_cpal::{list_input_devices, CpalDevice};

const METER_WIDTH: usize = 30;
const VOICE_BARS: usize = 16;

/// Record the microphone to a canonical 44-byte-header WAV file
#[derive(Parser, Debug)]
#[command(name = "wav-capture")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output WAV file
    #[arg(required_unless_present = "list_devices")]
    output: Option<PathBuf>,

    /// List input devices and exit
    #[arg(long = "list-devices", default_value_t = false)]
    list_devices: bool,

    /// Input device name (default: the host's default input)
    #[arg(long)]
    device: Option<String>,

    /// Sample rate in Hz
    #[arg(long = "sample-rate", default_value_t = 16000)]
    sample_rate: u32,

    /// Channel layout
    #[arg(long, value_enum, default_value_t = Channels::Default)]
    channels: Channels,

    /// Sample width in bits (8 or 16)
    #[arg(long = "bit-depth", default_value_t = 16)]
    bit_depth: u16,

    /// Stop after this many seconds instead of waiting for Enter
    #[arg(long)]
    duration: Option<f64>,

    /// JSON file with recorder options
    #[arg(long)]
    options: Option<PathBuf>,

    /// Write a .metadata.json sidecar next to the recording
    #[arg(long, default_value_t = false)]
    metadata: bool,

    /// Increase logging verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Channels {
    Default,
    Mono,
    Stereo,
    FrontBack,
}

impl From<Channels> for ChannelLayout {
    fn from(channels: Channels) -> Self {
        match channels {
            Channels::Default => ChannelLayout::Default,
            Channels::Mono => ChannelLayout::Mono,
            Channels::Stereo => ChannelLayout::Stereo,
            Channels::FrontBack => ChannelLayout::FrontBack,
        }
    }
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn parameters(&self) -> Result<CaptureParameters, CaptureError> {
        CaptureParameters::builder()
            .sample_rate_hz(self.sample_rate)
            .channel_layout(self.channels.into())
            .bit_depth(BitDepth::try_from(self.bit_depth).map_err(CaptureError::InvalidParameters)?)
            .build()
    }

    fn recorder_options(&self) -> anyhow::Result<RecorderOptions> {
        let mut options = match self.options {
            Some(ref path) => {
                let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
                RecorderOptions::from_json(&json)?
            }
            None => RecorderOptions::default(),
        };
        if self.metadata {
            options.write_metadata = true;
        }
        Ok(options)
    }
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    // Prefix match: covers this binary and both wav_capture_* crates.
    builder.filter_module("wav_capture", args.log_level());
    builder.parse_default_env();
    builder.format_timestamp_millis().init();
}

enum Outcome {
    Finished(CompletionResult),
    Failed(CaptureError),
}

/// Draws the meter and reports the terminal event back to `main`.
struct ConsoleSink {
    voice: Arc<Mutex<VoiceActivity>>,
    done: Sender<Outcome>,
}

impl CaptureDelegate for ConsoleSink {
    fn on_started(&self) {
        eprintln!("Recording... press Enter to stop");
    }

    fn on_progress(&self, sample: &LoudnessSample) {
        let filled = (sample.level() * METER_WIDTH as f32).round() as usize;
        let voice = if self.voice.lock().has_voice() { "voice" } else { "     " };
        eprint!(
            "\r{:>6.1}s [{:<width$}] {}",
            sample.elapsed_millis as f64 / 1000.0,
            "#".repeat(filled.min(METER_WIDTH)),
            voice,
            width = METER_WIDTH
        );
        let _ = io::stderr().flush();
    }

    fn on_finished(&self, result: &CompletionResult) {
        eprintln!();
        let _ = self.done.send(Outcome::Finished(result.clone()));
    }

    fn on_error(&self, error: &CaptureError) {
        eprintln!();
        let _ = self.done.send(Outcome::Failed(error.clone()));
    }
}

fn print_devices() -> anyhow::Result<()> {
    for device in list_input_devices()? {
        let marker = if device.is_default { "*" } else { " " };
        match (device.default_sample_rate_hz, device.default_channels) {
            (Some(rate), Some(channels)) => {
                println!("{} {} ({} Hz, {} ch)", marker, device.name, rate, channels)
            }
            _ => println!("{} {}", marker, device.name),
        }
    }
    Ok(())
}

/// Fires once a line is read from stdin.
fn enter_pressed() -> Receiver<()> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_ok() {
            let _ = tx.send(());
        }
    });
    rx
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    if args.list_devices {
        return print_devices();
    }

    let output = args.output.clone().context("an output path is required")?;
    let params = args.parameters()?;
    let options = args.recorder_options()?;

    let device = match args.device {
        Some(ref name) => CpalDevice::with_name(name.clone()),
        None => CpalDevice::default_device(),
    };
    let session = CaptureSession::with_options(device, options)?;

    let voice = Arc::new(Mutex::new(VoiceActivity::new(VOICE_BARS)));
    let (done_tx, done_rx) = bounded(1);
    session.set_notification_sink(Some(Arc::new(ConsoleSink {
        voice: Arc::clone(&voice),
        done: done_tx,
    })));
    if params.bit_depth() == BitDepth::Sixteen {
        session.set_raw_data_subscriber(Some(Arc::new(move |buffer: &RawBuffer| {
            voice.lock().update(buffer.valid(), Instant::now());
        })));
    }

    let deadline = match args.duration {
        Some(secs) if secs > 0.0 => after(Duration::from_secs_f64(secs)),
        Some(secs) => bail!("duration must be positive, got {}", secs),
        None => never(),
    };

    session.record(&output, params)?;
    let enter = if args.duration.is_none() { enter_pressed() } else { never() };

    let outcome = select! {
        recv(done_rx) -> outcome => outcome.ok(),
        recv(deadline) -> _ => None,
        recv(enter) -> _ => None,
    };
    let outcome = match outcome {
        Some(outcome) => outcome,
        None => {
            session.stop();
            done_rx
                .recv_timeout(Duration::from_secs(10))
                .context("timed out waiting for the recording to finish")?
        }
    };

    match outcome {
        Outcome::Finished(result) => {
            println!(
                "Wrote {} ({:.1}s, {} bytes of audio, sha256 {})",
                result.file_path.display(),
                result.total_duration_millis as f64 / 1000.0,
                result.pcm_bytes,
                result.checksum
            );
            Ok(())
        }
        Outcome::Failed(e) => Err(e).context("recording failed"),
    }
}
