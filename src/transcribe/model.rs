//! Checkpoint registry, metadata and path resolution.
//!
//! The transcription network is an external, pre-trained CRNN (the
//! "onsets & frames" piano model).  Its checkpoint file name encodes the
//! F1 scores reported for the published weights and is preserved verbatim
//! so a provisioned `lib/` directory is recognisable at a glance.
//!
//! [`CheckpointPaths`] resolves the on-disk location of a checkpoint given
//! an [`crate::config::AppPaths`] instance.

use std::path::PathBuf;

use crate::config::AppPaths;

// ---------------------------------------------------------------------------
// Model constants
// ---------------------------------------------------------------------------

/// Fixed input sample rate of the transcription network (Hz, mono).
pub const SAMPLE_RATE: u32 = 16_000;

/// Output frame rate of the network (frames per second of audio).
pub const FRAMES_PER_SECOND: u32 = 100;

/// Length of one inference segment in seconds.
pub const SEGMENT_SECONDS: u32 = 10;

/// Samples per inference segment.
pub const SEGMENT_SAMPLES: usize = (SAMPLE_RATE * SEGMENT_SECONDS) as usize;

/// Number of piano keys the network reports (A0..C8).
pub const PIANO_KEYS: usize = 88;

/// MIDI note number of the lowest piano key (A0).
pub const LOWEST_MIDI_NOTE: u8 = 21;

// ---------------------------------------------------------------------------
// CheckpointInfo
// ---------------------------------------------------------------------------

/// Static metadata for a single checkpoint file.
#[derive(Debug)]
pub struct CheckpointInfo {
    /// Unique identifier used in `TranscriptionConfig::checkpoint`.
    pub id: &'static str,
    /// Human-readable display name.
    pub display_name: &'static str,
    /// File name under `lib/` — preserves the published F1 scores.
    pub file_name: &'static str,
    /// Approximate file size in megabytes.
    pub file_size_mb: u64,
    /// Source URL for downloading the checkpoint.
    pub source_url: &'static str,
    /// Reported note-event F1 score.
    pub note_f1: f32,
    /// Reported sustain-pedal F1 score.
    pub pedal_f1: f32,
}

/// Registered piano-transcription checkpoints.
pub const PIANO_CHECKPOINTS: &[CheckpointInfo] = &[CheckpointInfo {
    id: "crnn-piano-v1",
    display_name: "CRNN piano transcription (note + pedal regression)",
    file_name: "note_F1=0.9677_pedal_F1=0.9186.onnx",
    file_size_mb: 165,
    source_url: "https://zenodo.org/record/4034264/files/CRNN_note_F1%3D0.9677_pedal_F1%3D0.9186.onnx",
    note_f1: 0.9677,
    pedal_f1: 0.9186,
}];

/// Look up a checkpoint by its `id`.
pub fn find_checkpoint_by_id(id: &str) -> Option<&'static CheckpointInfo> {
    PIANO_CHECKPOINTS.iter().find(|c| c.id == id)
}

// ---------------------------------------------------------------------------
// CheckpointPaths
// ---------------------------------------------------------------------------

/// Resolves checkpoint file locations under the application's `lib/`
/// directory.
#[derive(Debug, Clone)]
pub struct CheckpointPaths {
    lib_dir: PathBuf,
}

impl CheckpointPaths {
    /// Build from resolved application paths.
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            lib_dir: paths.lib_dir.clone(),
        }
    }

    /// Full path of `info`'s file under `lib/`.
    pub fn resolve(&self, info: &CheckpointInfo) -> PathBuf {
        self.lib_dir.join(info.file_name)
    }

    /// `true` when `info`'s file has been provisioned.
    pub fn exists(&self, info: &CheckpointInfo) -> bool {
        self.resolve(info).is_file()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_checkpoint_is_registered() {
        let info = find_checkpoint_by_id("crnn-piano-v1").expect("registered");
        assert_eq!(info.file_name, "note_F1=0.9677_pedal_F1=0.9186.onnx");
        assert!((info.note_f1 - 0.9677).abs() < 1e-6);
        assert!((info.pedal_f1 - 0.9186).abs() < 1e-6);
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(find_checkpoint_by_id("no-such-checkpoint").is_none());
    }

    #[test]
    fn resolve_joins_lib_dir_and_file_name() {
        let paths = AppPaths::with_root("/work");
        let ckpt = CheckpointPaths::new(&paths);
        let info = &PIANO_CHECKPOINTS[0];

        assert_eq!(
            ckpt.resolve(info),
            PathBuf::from("/work/lib").join(info.file_name)
        );
    }

    #[test]
    fn segment_constants_are_consistent() {
        assert_eq!(SEGMENT_SAMPLES, 160_000);
        assert_eq!(SAMPLE_RATE % FRAMES_PER_SECOND, 0);
    }
}
