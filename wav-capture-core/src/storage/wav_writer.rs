use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::config::CaptureParameters;
use crate::models::error::CaptureError;
use crate::processing::wav_format;

/// Suffix of the temporary file a recording is staged in before the rename.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// What [`write_wav_file`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavWriteOutcome {
    pub file_path: PathBuf,
    pub pcm_bytes: u64,
    /// SHA-256 hex digest of the whole file, header included.
    pub checksum: String,
}

/// Write `pcm` as a canonical WAV file at `destination`.
///
/// ## File Format
/// ```text
/// [44-byte WAV header]
/// [raw PCM data, verbatim]
/// ```
///
/// The file is staged at `<destination>.partial`, synced, and renamed over
/// `destination`, so an interrupted write never replaces an earlier complete
/// recording. On failure the staging file is removed and the error returned;
/// the PCM is consumed either way.
pub fn write_wav_file(
    pcm: Vec<u8>,
    destination: &Path,
    params: &CaptureParameters,
) -> Result<WavWriteOutcome, CaptureError> {
    let header = wav_format::header_for(params, pcm.len())?;

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| CaptureError::Storage(format!("failed to create directory: {}", e)))?;
    }

    let staging = partial_path(destination);
    if let Err(e) = write_staged(&staging, &header, &pcm) {
        let _ = fs::remove_file(&staging);
        return Err(CaptureError::Storage(format!("write failed: {}", e)));
    }

    if let Err(e) = fs::rename(&staging, destination) {
        let _ = fs::remove_file(&staging);
        return Err(CaptureError::Storage(format!(
            "failed to move recording into place: {}",
            e
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(header);
    hasher.update(&pcm);

    log::debug!("Wrote {} bytes of PCM to {:?}", pcm.len(), destination);

    Ok(WavWriteOutcome {
        file_path: destination.to_path_buf(),
        pcm_bytes: pcm.len() as u64,
        checksum: hex_encode(&hasher.finalize()),
    })
}

/// Staging path for `destination`: the same name with [`PARTIAL_SUFFIX`] appended.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

fn write_staged(path: &Path, header: &[u8], pcm: &[u8]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(header)?;
    writer.write_all(pcm)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
