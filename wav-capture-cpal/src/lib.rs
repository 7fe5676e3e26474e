//! # wav-capture-cpal
//!
//! Cross-platform microphone backend for wav-capture, built on cpal.
//!
//! Provides:
//! - `CpalDevice`: `CaptureDevice` for the default or a named input device
//! - `list_input_devices`: input device enumeration
//! - the `wav-capture` command-line recorder
//!
//! ## Usage
//! ```ignore
//! use wav_capture_core::CaptureSession;
//! use wav_capture_cpal::CpalDevice;
//!
//! let session = CaptureSession::new(CpalDevice::default_device())?;
//! session.record_default("take.wav")?;
//! ```

pub mod cpal_input;
pub mod device_enumerator;

pub use cpal_input::{CpalDevice, CpalStream};
pub use device_enumerator::{list_input_devices, InputDeviceInfo};
