//! Transcription subsystem — opaque model in, MIDI file out.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │              TranscriptionEngine (trait)               │
//! │                                                        │
//! │   ┌────────────────┐     ┌─────────────────┐           │
//! │   │ CheckpointPaths │───▶│ OnnxTranscriber │           │
//! │   │ - resolve       │     │ - session       │           │
//! │   │ - exists?       │     │ - engine kind   │           │
//! │   └────────────────┘     └───────┬─────────┘           │
//! │                                   │                    │
//! │                                   ▼                    │
//! │                       ┌──────────────────────┐         │
//! │                       │ transcribe()         │         │
//! │                       │ samples → NoteEvents │         │
//! │                       │         → .midi file │         │
//! │                       └──────────────────────┘         │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use piano_to_midi::config::EnginePreference;
//! use piano_to_midi::transcribe::{OnnxTranscriber, TranscriptionEngine};
//!
//! let engine = OnnxTranscriber::load(
//!     Path::new("lib/note_F1=0.9677_pedal_F1=0.9186.onnx"),
//!     EnginePreference::Auto,
//!     0.3,
//!     0.1,
//! )
//! .expect("checkpoint not found — run the setup binary first");
//!
//! // samples: 16 kHz mono f32 PCM from the audio module
//! let samples: Vec<f32> = vec![0.0; 16_000];
//! let summary = engine.transcribe(&samples, Path::new("results/song.midi")).unwrap();
//! println!("{} notes", summary.notes);
//! ```

pub mod engine;
pub mod midi;
pub mod model;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{
    EngineKind, OnnxTranscriber, TranscribeError, TranscriptionEngine, TranscriptionSummary,
};
pub use midi::{midi_output_path, write_midi, NoteEvent};
pub use model::{
    find_checkpoint_by_id, CheckpointInfo, CheckpointPaths, PIANO_CHECKPOINTS, SAMPLE_RATE,
};

// test-only re-export so the pipeline test module can import MockTranscriber
// without `use piano_to_midi::transcribe::engine::MockTranscriber`.
#[cfg(test)]
pub use engine::MockTranscriber;
