//! Audio file decoding via symphonia.
//!
//! Accepts whatever containers the enabled symphonia features cover
//! (mp3, wav, flac, aac/m4a, vorbis) and produces interleaved `f32` PCM
//! plus the stream's native sample rate and channel count.  Downmixing and
//! resampling happen afterwards in [`crate::audio::resample`].

use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// All errors that can arise while loading an audio file.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The file could not be opened.
    #[error("Cannot open audio file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// symphonia could not recognise the container format.
    #[error("Unsupported or corrupt audio format: {0}")]
    UnsupportedFormat(String),

    /// The container holds no decodable audio track.
    #[error("No audio track found in {0}")]
    NoTrack(String),

    /// A packet failed to decode.
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// The file decoded to zero samples.
    #[error("Audio file {0} contains no samples")]
    Empty(String),
}

// ---------------------------------------------------------------------------
// DecodedAudio
// ---------------------------------------------------------------------------

/// Interleaved PCM output of [`decode_file`], in the stream's native format.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved `f32` samples.
    pub samples: Vec<f32>,
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl DecodedAudio {
    /// Duration of the decoded stream in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.channels as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Decode an audio file to interleaved `f32` PCM.
///
/// The file extension (when present) is passed to the probe as a hint; the
/// probe still sniffs the actual content, so a mislabelled file decodes
/// correctly as long as the real format is supported.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, AudioError> {
    let display = path.display().to_string();

    let src = std::fs::File::open(path).map_err(|source| AudioError::Open {
        path: display.clone(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::UnsupportedFormat(format!("{display}: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AudioError::NoTrack(display.clone()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::UnsupportedFormat(format!("{display}: {e}")))?;

    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
    let mut samples: Vec<f32> = track
        .codec_params
        .n_frames
        .and_then(|n| usize::try_from(n).ok())
        .map(Vec::with_capacity)
        .unwrap_or_default();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream is reported as an IO error with UnexpectedEof.
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = sample_rate.or(Some(spec.rate));
                channels = channels.or(Some(spec.channels.count() as u16));

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // A corrupt packet is skippable; the rest of the file may be fine.
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("skipping corrupt packet in {display}: {e}");
            }
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(AudioError::Empty(display));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate: sample_rate.unwrap_or(44_100),
        channels: channels.unwrap_or(1).max(1),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
