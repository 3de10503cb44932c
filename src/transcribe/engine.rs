//! Core transcription engine trait and implementations.
//!
//! # Overview
//!
//! [`TranscriptionEngine`] is the public interface used by the pipeline.  It
//! is object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn TranscriptionEngine>`.
//!
//! [`OnnxTranscriber`] is the production implementation that wraps an
//! `ort` session over the exported CRNN checkpoint.  Construct it with
//! [`OnnxTranscriber::load`]; the execution engine (accelerated vs CPU) is
//! resolved once at that point and reused for every job.
//!
//! [`MockTranscriber`] (available under `#[cfg(test)]`) records its calls
//! and writes a stub output file — useful for unit-testing the pipeline
//! without a checkpoint.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::{Array2, Axis};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider,
};
use ort::inputs;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use thiserror::Error;

use crate::config::EnginePreference;
use crate::transcribe::midi::{write_midi, NoteEvent};
use crate::transcribe::model::{
    FRAMES_PER_SECOND, LOWEST_MIDI_NOTE, PIANO_KEYS, SAMPLE_RATE, SEGMENT_SAMPLES,
};

// ---------------------------------------------------------------------------
// TranscribeError
// ---------------------------------------------------------------------------

/// All errors that can arise from the transcription subsystem.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// The checkpoint file was not found at the given path.
    #[error("Checkpoint not found: {0} — run the setup binary first")]
    CheckpointNotFound(String),

    /// The accelerated execution provider was requested but is unavailable.
    #[error("Accelerated engine requested but no accelerator is available")]
    AcceleratorUnavailable,

    /// The supplied audio buffer holds no samples.
    #[error("No audio samples to transcribe")]
    EmptyAudio,

    /// The model produced outputs of an unexpected shape or name.
    #[error("Unexpected model output: {0}")]
    BadOutput(String),

    /// onnxruntime failed during session construction or inference.
    #[error("Inference error: {0}")]
    Inference(#[from] ort::Error),

    /// Writing the MIDI file failed.
    #[error("Failed to write MIDI file: {0}")]
    MidiWrite(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// EngineKind
// ---------------------------------------------------------------------------

/// Execution engine resolved at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// GPU-accelerated execution provider.
    Accelerated,
    /// CPU execution provider.
    Cpu,
}

impl EngineKind {
    /// Short label for the UI / logs.
    pub fn label(&self) -> &'static str {
        match self {
            EngineKind::Accelerated => "accelerated",
            EngineKind::Cpu => "cpu",
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionEngine trait
// ---------------------------------------------------------------------------

/// Summary returned on a successful transcription.
#[derive(Debug, Clone)]
pub struct TranscriptionSummary {
    /// Number of note events written to the MIDI file.
    pub notes: usize,
    /// Duration of the transcribed audio in seconds.
    pub duration_secs: f32,
}

/// Object-safe, thread-safe interface for transcription engines.
///
/// # Contract
///
/// - `samples` must be **16 kHz, mono, f32** PCM.
/// - On success a MIDI file exists at `output`.
/// - On failure no valid file remains at `output` (callers remove any
///   partial file).
pub trait TranscriptionEngine: Send + Sync {
    /// Transcribe `samples` and write the result to `output`.
    fn transcribe(
        &self,
        samples: &[f32],
        output: &Path,
    ) -> Result<TranscriptionSummary, TranscribeError>;

    /// Execution engine this instance resolved to.
    fn kind(&self) -> EngineKind;
}

// Compile-time assertion: Box<dyn TranscriptionEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TranscriptionEngine>) {}
};

// ---------------------------------------------------------------------------
// OnnxTranscriber
// ---------------------------------------------------------------------------

/// Production engine wrapping an `ort` session over the CRNN checkpoint.
///
/// The session is shared behind a `Mutex` because `ort` runs take `&mut`;
/// only one transcription runs at a time anyway (the pipeline's busy guard
/// rejects overlapping jobs).
pub struct OnnxTranscriber {
    session: Mutex<Session>,
    kind: EngineKind,
    onset_threshold: f32,
    frame_threshold: f32,
}

impl std::fmt::Debug for OnnxTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxTranscriber")
            .field("kind", &self.kind)
            .field("onset_threshold", &self.onset_threshold)
            .field("frame_threshold", &self.frame_threshold)
            .finish_non_exhaustive()
    }
}

impl OnnxTranscriber {
    /// Load the checkpoint at `checkpoint_path` and resolve the execution
    /// engine from `preference`.
    ///
    /// # Errors
    ///
    /// - [`TranscribeError::CheckpointNotFound`] — file missing.
    /// - [`TranscribeError::AcceleratorUnavailable`] — `Accelerated` was
    ///   forced but no accelerator is present.
    /// - [`TranscribeError::Inference`] — session construction failed.
    pub fn load(
        checkpoint_path: &Path,
        preference: EnginePreference,
        onset_threshold: f32,
        frame_threshold: f32,
    ) -> Result<Self, TranscribeError> {
        if !checkpoint_path.is_file() {
            return Err(TranscribeError::CheckpointNotFound(
                checkpoint_path.display().to_string(),
            ));
        }

        let kind = resolve_engine(preference)?;
        log::info!(
            "loading checkpoint {} ({} engine)",
            checkpoint_path.display(),
            kind.label()
        );

        let providers = match kind {
            EngineKind::Accelerated => vec![
                CUDAExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ],
            EngineKind::Cpu => vec![CPUExecutionProvider::default().build()],
        };

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers(providers)?
            .commit_from_file(checkpoint_path)?;

        Ok(Self {
            session: Mutex::new(session),
            kind,
            onset_threshold,
            frame_threshold,
        })
    }
}

/// Resolve the execution engine once, at process start.
fn resolve_engine(preference: EnginePreference) -> Result<EngineKind, TranscribeError> {
    let accelerated = CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false);

    match preference {
        EnginePreference::Cpu => Ok(EngineKind::Cpu),
        EnginePreference::Accelerated if accelerated => Ok(EngineKind::Accelerated),
        EnginePreference::Accelerated => Err(TranscribeError::AcceleratorUnavailable),
        EnginePreference::Auto if accelerated => Ok(EngineKind::Accelerated),
        EnginePreference::Auto => Ok(EngineKind::Cpu),
    }
}

impl TranscriptionEngine for OnnxTranscriber {
    fn transcribe(
        &self,
        samples: &[f32],
        output: &Path,
    ) -> Result<TranscriptionSummary, TranscribeError> {
        if samples.is_empty() {
            return Err(TranscribeError::EmptyAudio);
        }

        let duration_secs = samples.len() as f32 / SAMPLE_RATE as f32;
        let mut session = self.session.lock().unwrap();

        // Frame-wise regressions accumulated across all segments.
        let mut onset_flat: Vec<f32> = Vec::new();
        let mut frame_flat: Vec<f32> = Vec::new();
        let mut velocity_flat: Vec<f32> = Vec::new();
        let mut total_frames = 0usize;

        for chunk in samples.chunks(SEGMENT_SAMPLES) {
            // The network takes fixed-length segments; the tail is
            // zero-padded and its silent frames trimmed afterwards.
            let mut segment = chunk.to_vec();
            segment.resize(SEGMENT_SAMPLES, 0.0);

            let input = Array2::from_shape_vec((1, SEGMENT_SAMPLES), segment)
                .map_err(|e| TranscribeError::BadOutput(e.to_string()))?;

            let outputs = session.run(inputs![
                "input" => TensorRef::from_array_view(input.view())?,
            ])?;

            let valid_frames = (chunk.len() * FRAMES_PER_SECOND as usize)
                .div_ceil(SAMPLE_RATE as usize);

            let mut taken = 0usize;
            for (name, dest) in [
                ("reg_onset_output", &mut onset_flat),
                ("frame_output", &mut frame_flat),
                ("velocity_output", &mut velocity_flat),
            ] {
                let value = outputs
                    .get(name)
                    .ok_or_else(|| TranscribeError::BadOutput(format!("missing {name}")))?;
                let array = value.try_extract_array::<f32>()?;

                if array.ndim() != 3 || array.shape()[2] != PIANO_KEYS {
                    return Err(TranscribeError::BadOutput(format!(
                        "{name} has shape {:?}, expected [1, frames, {PIANO_KEYS}]",
                        array.shape()
                    )));
                }

                let per_key = array.index_axis(Axis(0), 0);
                taken = valid_frames.min(per_key.shape()[0]);
                for row in per_key.outer_iter().take(taken) {
                    dest.extend(row.iter().copied());
                }
            }
            total_frames += taken;
        }

        let to_matrix = |flat: Vec<f32>| {
            Array2::from_shape_vec((total_frames, PIANO_KEYS), flat)
                .map_err(|e| TranscribeError::BadOutput(e.to_string()))
        };
        let onset = to_matrix(onset_flat)?;
        let frame = to_matrix(frame_flat)?;
        let velocity = to_matrix(velocity_flat)?;

        let events = output_to_events(
            &onset,
            &frame,
            &velocity,
            self.onset_threshold,
            self.frame_threshold,
        );

        write_midi(&events, output)?;
        log::info!(
            "transcribed {:.1} s of audio into {} notes → {}",
            duration_secs,
            events.len(),
            output.display()
        );

        Ok(TranscriptionSummary {
            notes: events.len(),
            duration_secs,
        })
    }

    fn kind(&self) -> EngineKind {
        self.kind
    }
}

// ---------------------------------------------------------------------------
// Postprocessing — frame-wise regressions to note events
// ---------------------------------------------------------------------------

/// Convert the network's frame-wise onset/frame/velocity regressions into
/// discrete note events.
///
/// Per key: a local maximum of the onset regression above
/// `onset_threshold` starts a note; the note ends at the first following
/// frame whose frame activation drops below `frame_threshold` (or at the
/// end of the audio).  Velocity is taken from the velocity regression at
/// the onset frame, scaled to MIDI range.
pub(crate) fn output_to_events(
    onset: &Array2<f32>,
    frame: &Array2<f32>,
    velocity: &Array2<f32>,
    onset_threshold: f32,
    frame_threshold: f32,
) -> Vec<NoteEvent> {
    let frames = onset.nrows();
    let keys = onset.ncols().min(PIANO_KEYS);
    let fps = FRAMES_PER_SECOND as f32;

    let mut events = Vec::new();

    for key in 0..keys {
        let mut t = 0usize;
        while t < frames {
            let p = onset[[t, key]];
            let is_peak = p >= onset_threshold
                && (t == 0 || p >= onset[[t - 1, key]])
                && (t + 1 >= frames || p >= onset[[t + 1, key]]);

            if !is_peak {
                t += 1;
                continue;
            }

            let mut end = t + 1;
            while end < frames && frame[[end, key]] >= frame_threshold {
                end += 1;
            }

            let vel = (velocity[[t, key]].clamp(0.0, 1.0) * 127.0).round() as u8;
            events.push(NoteEvent {
                pitch: LOWEST_MIDI_NOTE + key as u8,
                onset_secs: t as f32 / fps,
                offset_secs: end as f32 / fps,
                velocity: vel.max(1),
            });

            t = end;
        }
    }

    events.sort_by(|a, b| {
        a.onset_secs
            .partial_cmp(&b.onset_secs)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.pitch.cmp(&b.pitch))
    });
    events
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that records calls and writes a stub output file without
/// loading any checkpoint.
#[cfg(test)]
pub struct MockTranscriber {
    error: Option<String>,
    calls: Mutex<Vec<PathBuf>>,
}

#[cfg(test)]
impl MockTranscriber {
    /// Create a mock that always succeeds and writes a stub file.
    pub fn ok() -> Self {
        Self {
            error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always fails with `message`.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Output paths this mock was invoked with, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TranscriptionEngine for MockTranscriber {
    fn transcribe(
        &self,
        samples: &[f32],
        output: &Path,
    ) -> Result<TranscriptionSummary, TranscribeError> {
        if samples.is_empty() {
            return Err(TranscribeError::EmptyAudio);
        }
        self.calls.lock().unwrap().push(output.to_path_buf());

        if let Some(message) = &self.error {
            return Err(TranscribeError::BadOutput(message.clone()));
        }

        std::fs::write(output, b"MThd")?;
        Ok(TranscriptionSummary {
            notes: 1,
            duration_secs: samples.len() as f32 / SAMPLE_RATE as f32,
        })
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Cpu
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros(frames: usize) -> Array2<f32> {
        Array2::zeros((frames, PIANO_KEYS))
    }

    // ---- output_to_events --------------------------------------------------

    #[test]
    fn silence_yields_no_events() {
        let events = output_to_events(&zeros(200), &zeros(200), &zeros(200), 0.3, 0.1);
        assert!(events.is_empty());
    }

    #[test]
    fn single_onset_becomes_one_note() {
        let mut onset = zeros(200);
        let mut frame = zeros(200);
        let mut velocity = zeros(200);

        // Middle C (key 39 → MIDI 60) struck at frame 50, held to frame 100.
        onset[[50, 39]] = 0.9;
        for t in 50..100 {
            frame[[t, 39]] = 0.8;
        }
        velocity[[50, 39]] = 0.5;

        let events = output_to_events(&onset, &frame, &velocity, 0.3, 0.1);
        assert_eq!(events.len(), 1);

        let ev = &events[0];
        assert_eq!(ev.pitch, 60);
        assert!((ev.onset_secs - 0.5).abs() < 1e-6);
        assert!((ev.offset_secs - 1.0).abs() < 1e-6);
        assert_eq!(ev.velocity, 64); // 0.5 * 127 rounded
    }

    #[test]
    fn onset_below_threshold_is_ignored() {
        let mut onset = zeros(100);
        onset[[10, 0]] = 0.2;

        let events = output_to_events(&onset, &zeros(100), &zeros(100), 0.3, 0.1);
        assert!(events.is_empty());
    }

    #[test]
    fn restruck_key_yields_two_events() {
        let mut onset = zeros(300);
        let mut frame = zeros(300);
        let velocity = zeros(300);

        onset[[10, 20]] = 0.9;
        for t in 10..40 {
            frame[[t, 20]] = 0.8;
        }
        onset[[100, 20]] = 0.9;
        for t in 100..130 {
            frame[[t, 20]] = 0.8;
        }

        let events = output_to_events(&onset, &frame, &velocity, 0.3, 0.1);
        assert_eq!(events.len(), 2);
        assert!(events[0].offset_secs <= events[1].onset_secs);
    }

    #[test]
    fn events_are_sorted_by_onset() {
        let mut onset = zeros(200);
        let frame = zeros(200);
        let velocity = zeros(200);

        onset[[150, 5]] = 0.9; // later, lower key
        onset[[20, 60]] = 0.9; // earlier, higher key

        let events = output_to_events(&onset, &frame, &velocity, 0.3, 0.1);
        assert_eq!(events.len(), 2);
        assert!(events[0].onset_secs < events[1].onset_secs);
    }

    #[test]
    fn zero_velocity_regression_still_yields_audible_note() {
        let mut onset = zeros(100);
        onset[[10, 0]] = 0.9;

        let events = output_to_events(&onset, &zeros(100), &zeros(100), 0.3, 0.1);
        assert_eq!(events.len(), 1);
        assert!(events[0].velocity >= 1);
    }

    // ---- EngineKind / resolve ----------------------------------------------

    #[test]
    fn engine_kind_labels() {
        assert_eq!(EngineKind::Accelerated.label(), "accelerated");
        assert_eq!(EngineKind::Cpu.label(), "cpu");
    }

    #[test]
    fn cpu_preference_always_resolves_to_cpu() {
        assert_eq!(
            resolve_engine(EnginePreference::Cpu).unwrap(),
            EngineKind::Cpu
        );
    }

    #[test]
    fn auto_preference_always_resolves() {
        // Either engine is acceptable depending on the host; it must not error.
        assert!(resolve_engine(EnginePreference::Auto).is_ok());
    }

    // ---- OnnxTranscriber::load ---------------------------------------------

    #[test]
    fn load_missing_checkpoint_returns_not_found() {
        let result = OnnxTranscriber::load(
            Path::new("/nonexistent/checkpoint.onnx"),
            EnginePreference::Cpu,
            0.3,
            0.1,
        );
        assert!(matches!(
            result,
            Err(TranscribeError::CheckpointNotFound(_))
        ));
    }

    // ---- MockTranscriber ---------------------------------------------------

    #[test]
    fn mock_records_output_paths_and_writes_stub() {
        let dir = tempfile::tempdir().expect("temp dir");
        let out = dir.path().join("song.midi");

        let mock = MockTranscriber::ok();
        let summary = mock.transcribe(&[0.0; 16_000], &out).expect("ok");

        assert_eq!(summary.notes, 1);
        assert!((summary.duration_secs - 1.0).abs() < 1e-6);
        assert_eq!(mock.calls(), vec![out.clone()]);
        assert!(out.is_file());
    }

    #[test]
    fn mock_err_returns_configured_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let out = dir.path().join("song.midi");

        let mock = MockTranscriber::err("boom");
        let err = mock.transcribe(&[0.0; 16_000], &out).unwrap_err();
        assert!(matches!(err, TranscribeError::BadOutput(_)));
    }

    #[test]
    fn mock_empty_audio_errors() {
        let mock = MockTranscriber::ok();
        let err = mock
            .transcribe(&[], Path::new("/tmp/unused.midi"))
            .unwrap_err();
        assert!(matches!(err, TranscribeError::EmptyAudio));
    }
}
