//! Audio Module
//!
//! Waveform type plus WAV file I/O. Everything downstream of decoding works
//! on mono 32-bit float samples at the configured target rate.

pub mod io;

pub use io::{generate_silence, generate_test_tone, load_waveform, save_waveform, Waveform};
