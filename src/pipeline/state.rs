//! Pipeline state machine and shared application state.
//!
//! [`PipelineState`] tracks which phase of the convert pipeline is active.
//! The UI reads it via [`SharedState`] to enable/disable controls and drive
//! the busy spinner.
//!
//! [`AppState`] is the single source of truth for everything the UI needs
//! beyond the status line: current pipeline phase, the last written MIDI
//! file, config snapshot, and any error message.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>` — cheap to
//! clone and safe to share across threads.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of the convert pipeline.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──URL accepted───▶ Downloading ──DL OK──▶ Transcribing ──▶ Done
///      ──local file─────────────────────────────▶ Transcribing ──▶ Done
/// any state ──error──▶ Error
/// Done / Error ──next job──▶ Downloading / Transcribing
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    /// Waiting for the user to load a file or URL.
    Idle,

    /// An acquisition strategy is retrieving audio from a URL.
    Downloading,

    /// The transcription model is running on the worker pool.
    Transcribing,

    /// The last conversion finished and its MIDI file was written.
    Done,

    /// A recoverable error occurred.  The pipeline accepts new jobs.
    Error,
}

impl PipelineState {
    /// Returns `true` while a background job is actively running.
    ///
    /// The UI uses this together with the dispatch busy flag to animate the
    /// indeterminate progress indicator.
    ///
    /// ```
    /// use piano_to_midi::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Downloading.is_busy());
    /// assert!(PipelineState::Transcribing.is_busy());
    /// assert!(!PipelineState::Done.is_busy());
    /// assert!(!PipelineState::Error.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Downloading | PipelineState::Transcribing
        )
    }

    /// A short human-readable label suitable for logs.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Downloading => "Downloading",
            PipelineState::Transcribing => "Transcribing",
            PipelineState::Done => "Done",
            PipelineState::Error => "Error",
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Idle
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state — the single source of truth for the UI.
///
/// Held behind [`SharedState`] (`Arc<Mutex<AppState>>`).  The pipeline
/// orchestrator mutates it; the egui update loop reads it each frame.
pub struct AppState {
    /// Current phase of the convert pipeline.
    pub pipeline: PipelineState,

    /// The most recently written MIDI file.
    ///
    /// `None` until at least one conversion has completed.
    pub last_midi: Option<PathBuf>,

    /// Current application configuration.
    pub config: AppConfig,

    /// Error message kept alongside `pipeline == PipelineState::Error`.
    pub error_message: Option<String>,
}

impl AppState {
    /// Create a new `AppState` with sensible defaults.
    pub fn new(config: AppConfig) -> Self {
        Self {
            pipeline: PipelineState::Idle,
            last_midi: None,
            config,
            error_message: None,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Cheap to clone (`Arc` clone).  Lock with `.lock().unwrap()` for a short
/// critical section; do **not** hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] wrapping a default [`AppState`].
pub fn new_shared_state(config: AppConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(config)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
