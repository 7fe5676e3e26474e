//! Input device enumeration through the default cpal host.

use cpal::traits::{DeviceTrait, HostTrait};

use wav_capture_core::CaptureError;

/// An input endpoint as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    /// Name to pass to [`CpalDevice::with_name`](crate::CpalDevice::with_name).
    pub name: String,
    pub is_default: bool,
    pub default_sample_rate_hz: Option<u32>,
    pub default_channels: Option<u16>,
}

/// List the input devices of the default host.
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, CaptureError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Unknown(format!("failed to enumerate input devices: {}", e)))?;

    let mut found = Vec::new();
    for (i, device) in devices.enumerate() {
        let name = device.name().unwrap_or_else(|_| format!("Device {}", i));
        let config = device.default_input_config().ok();
        found.push(InputDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            default_sample_rate_hz: config.as_ref().map(|c| c.sample_rate().0),
            default_channels: config.as_ref().map(|c| c.channels()),
            name,
        });
    }

    log::debug!("Found {} input devices on {:?}", found.len(), host.id());
    Ok(found)
}
