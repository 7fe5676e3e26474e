/// Append-only PCM byte store for one recording.
///
/// Owned by the capture worker; handed to the WAV writer by value when the
/// recording ends.
#[derive(Debug, Default)]
pub struct PcmAccumulator {
    data: Vec<u8>,
}

impl PcmAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for roughly `bytes` of audio.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
        }
    }

    pub fn append(&mut self, pcm: &[u8]) {
        self.data.extend_from_slice(pcm);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
