/// Consumer-side voice presence tracking for raw 16-bit PCM buffers.
///
/// Splits each buffer into a fixed number of bars, measures the mean
/// amplitude per bar, and reports whether anyone is talking. Voice is
/// considered gone once every bar stays below the threshold for a full
/// silence window.
use std::time::{Duration, Instant};

/// Bar level below which a bar counts as silent.
pub const DEFAULT_VOICE_THRESHOLD: f32 = 4.0;

/// How long all bars must stay silent before voice is reported absent.
pub const DEFAULT_SILENCE_WINDOW: Duration = Duration::from_secs(3);

/// Mean magnitude of each of `bars` equal groups of little-endian 16-bit
/// words, scaled by the buffer length.
///
/// Trailing bytes that do not fill a whole group are ignored.
pub fn bar_levels(buffer: &[u8], bars: usize) -> Vec<f32> {
    if bars == 0 {
        return Vec::new();
    }
    let interval = buffer.len() / bars / 2 * 2;
    if interval == 0 {
        return vec![0.0; bars];
    }

    buffer
        .chunks_exact(interval)
        .take(bars)
        .map(|group| {
            let sum: f64 = group
                .chunks_exact(2)
                .map(|pair| {
                    let value = i32::from(i16::from_le_bytes([pair[0], pair[1]]));
                    f64::from(if value < 0 { -value - 1 } else { value })
                })
                .sum();
            (sum / buffer.len() as f64 / 2.0) as f32
        })
        .collect()
}

/// Tracks voice presence across successive raw buffers.
#[derive(Debug, Clone)]
pub struct VoiceActivity {
    bars: usize,
    threshold: f32,
    silence_window: Duration,
    silent_since: Option<Instant>,
    has_voice: bool,
}

impl VoiceActivity {
    pub fn new(bars: usize) -> Self {
        Self {
            bars: bars.max(1),
            threshold: DEFAULT_VOICE_THRESHOLD,
            silence_window: DEFAULT_SILENCE_WINDOW,
            silent_since: None,
            has_voice: true,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_silence_window(mut self, window: Duration) -> Self {
        self.silence_window = window;
        self
    }

    pub fn has_voice(&self) -> bool {
        self.has_voice
    }

    /// Feed the next buffer observed at `now`; returns the bar levels.
    pub fn update(&mut self, buffer: &[u8], now: Instant) -> Vec<f32> {
        if buffer.is_empty() {
            self.has_voice = false;
            return vec![0.0; self.bars];
        }

        let levels = bar_levels(buffer, self.bars);
        if levels.iter().any(|&level| level >= self.threshold) {
            self.silent_since = None;
            self.has_voice = true;
        } else {
            let since = *self.silent_since.get_or_insert(now);
            if now.duration_since(since) >= self.silence_window {
                self.has_voice = false;
            }
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm16(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn bar_levels_split_evenly() {
        let buffer = pcm16(&[100, 100, 0, 0]);
        let levels = bar_levels(&buffer, 2);
        // group sum 200 over an 8-byte buffer: 200 / 8 / 2
        assert_eq!(levels, vec![12.5, 0.0]);
    }

    #[test]
    fn negative_samples_fold_to_magnitude() {
        let buffer = pcm16(&[-101, -1]);
        let levels = bar_levels(&buffer, 1);
        assert_eq!(levels, vec![100.0 / 4.0 / 2.0]);
    }

    #[test]
    fn tiny_buffers_yield_zero_bars() {
        assert_eq!(bar_levels(&[1, 2], 4), vec![0.0; 4]);
        assert!(bar_levels(&[1, 2], 0).is_empty());
    }

    #[test]
    fn loud_buffer_reports_voice() {
        let mut vad = VoiceActivity::new(4);
        let levels = vad.update(&pcm16(&[10_000; 64]), Instant::now());
        assert_eq!(levels.len(), 4);
        assert!(vad.has_voice());
    }

    #[test]
    fn voice_drops_after_silence_window() {
        let start = Instant::now();
        let silence = pcm16(&[0; 64]);
        let mut vad = VoiceActivity::new(4).with_silence_window(Duration::from_millis(500));

        vad.update(&silence, start);
        assert!(vad.has_voice());
        vad.update(&silence, start + Duration::from_millis(400));
        assert!(vad.has_voice());
        vad.update(&silence, start + Duration::from_millis(500));
        assert!(!vad.has_voice());

        vad.update(&pcm16(&[10_000; 64]), start + Duration::from_millis(600));
        assert!(vad.has_voice());
    }

    #[test]
    fn empty_buffer_means_no_voice() {
        let mut vad = VoiceActivity::new(3);
        assert_eq!(vad.update(&[], Instant::now()), vec![0.0; 3]);
        assert!(!vad.has_voice());
    }
}
