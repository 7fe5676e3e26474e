pub mod loudness;
pub mod pcm_accumulator;
pub mod voice_activity;
pub mod wav_format;
