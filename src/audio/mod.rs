//! Audio loading pipeline — file decode → downmix → resample.
//!
//! # Pipeline
//!
//! ```text
//! audio file → symphonia decode → stereo_to_mono → resample_to_16k
//!            → 16 kHz mono f32 PCM for the transcription engine
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use piano_to_midi::audio::load_audio;
//!
//! let samples = load_audio(Path::new("results/song.mp3")).unwrap();
//! println!("loaded {} samples ({:.1} s)", samples.len(), samples.len() as f32 / 16_000.0);
//! ```

pub mod decode;
pub mod resample;

pub use decode::{decode_file, AudioError, DecodedAudio};
pub use resample::{resample_to_16k, stereo_to_mono};

use std::path::Path;

/// Load an audio file as 16 kHz mono `f32` PCM, ready for transcription.
///
/// Mirrors the contract of the model's reference loader: whatever the source
/// container and channel layout, the output is mono at the model's fixed
/// sample rate.
pub fn load_audio(path: &Path) -> Result<Vec<f32>, AudioError> {
    let decoded = decode_file(path)?;
    let mono = stereo_to_mono(&decoded.samples, decoded.channels);
    Ok(resample_to_16k(&mono, decoded.sample_rate))
}
