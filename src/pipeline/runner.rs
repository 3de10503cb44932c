//! Pipeline orchestrator — drives the full acquire → relocate → transcribe
//! loop.
//!
//! [`PipelineOrchestrator`] owns the [`SharedState`] and responds to
//! [`PipelineCommand`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Pipeline flow
//!
//! ```text
//! PipelineCommand::ConvertUrl(input)
//!   └─▶ classify(input)
//!         ├─ Empty   → "Load Youtube URL cancelled", no job scheduled
//!         ├─ Spotify → spawn job with the spotdl strategy
//!         └─ Url     → spawn job with the yt-dlp strategy
//!
//! PipelineCommand::ConvertFile(path)
//!   └─▶ spawn job that goes straight to transcription
//!
//! job: acquire → relocate into results/ → load audio (spawn_blocking)
//!      → engine.transcribe (spawn_blocking) → "Conversion OK"
//! ```
//!
//! One job runs at a time: a busy flag is taken at the dispatch boundary
//! (before the job starts) and released by an RAII guard when the job
//! completes, so the busy indicator starts no later than the job and stops
//! no earlier than its completion.  A command arriving while the flag is
//! held is rejected with a status message instead of being queued.
//!
//! All job errors are caught at the job boundary and converted into a
//! status message; they never reach the UI thread as anything but text.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::acquire::{
    classify, relocate_into_results, AcquireError, AcquisitionStrategy, SourceKind,
};
use crate::audio::{self, AudioError};
use crate::config::AppPaths;
use crate::player;
use crate::status::StatusSink;
use crate::transcribe::{midi_output_path, TranscribeError, TranscriptionEngine};

use super::state::{PipelineState, SharedState};

// ---------------------------------------------------------------------------
// PipelineCommand
// ---------------------------------------------------------------------------

/// Commands sent from the UI thread to the pipeline orchestrator.
#[derive(Debug, Clone)]
pub enum PipelineCommand {
    /// Transcribe a locally chosen audio file (bypasses acquisition).
    ConvertFile(PathBuf),
    /// Classify and acquire a URL, then transcribe the result.
    ConvertUrl(String),
}

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that can surface inside a pipeline job.
///
/// All variants carry a human-readable description so the status line can
/// display them without knowing the internal cause.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An acquisition strategy failed (bad URL, auth failure, transcoding).
    #[error("{0}")]
    Acquire(#[from] AcquireError),

    /// The relocated/loaded audio file could not be decoded.
    #[error("{0}")]
    Audio(#[from] AudioError),

    /// The transcription engine failed.
    #[error("{0}")]
    Transcribe(#[from] TranscribeError),

    /// Filesystem bookkeeping failed (results dir, staging dir).
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal / unexpected error (e.g. tokio join failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Busy flag + job guard
// ---------------------------------------------------------------------------

/// Dispatch-boundary busy flag, also read by the UI spinner.
pub type BusyFlag = Arc<AtomicBool>;

/// RAII guard over the busy flag.
///
/// Acquired at dispatch, before the job task starts; released on drop after
/// the job completes (including on panic/unwind), so the indicator can
/// never be left spinning.
struct JobGuard {
    busy: BusyFlag,
}

impl JobGuard {
    fn try_acquire(busy: &BusyFlag) -> Option<Self> {
        if busy.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self {
                busy: Arc::clone(busy),
            })
        }
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Staging directory guard
// ---------------------------------------------------------------------------

/// Monotonic suffix so concurrent processes and sequential jobs never share
/// a staging directory.
static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// RAII guard that removes the job's staging directory when dropped.
struct StagingGuard(PathBuf);

impl StagingGuard {
    fn create() -> std::io::Result<Self> {
        let dir = std::env::temp_dir().join(format!(
            "piano-to-midi-{}-{}",
            std::process::id(),
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir)?;
        Ok(Self(dir))
    }

    fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.0) {
                log::warn!("failed to clean up staging dir {}: {e}", self.0.display());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Job specification
// ---------------------------------------------------------------------------

/// Fully classified unit of work, owning all of its own state (no shared
/// "current file" field — each job threads its paths explicitly).
enum JobSpec {
    LocalFile(PathBuf),
    Download {
        url: String,
        strategy: Arc<dyn AcquisitionStrategy>,
        start_message: &'static str,
    },
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives the complete convert pipeline.
///
/// Create with [`PipelineOrchestrator::new`], then call [`run`](Self::run)
/// inside a tokio task.
pub struct PipelineOrchestrator {
    state: SharedState,
    sink: StatusSink,
    busy: BusyFlag,
    engine: Arc<dyn TranscriptionEngine>,
    generic: Arc<dyn AcquisitionStrategy>,
    spotify: Arc<dyn AcquisitionStrategy>,
    paths: AppPaths,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`   — shared application state (also read by the UI).
    /// * `sink`    — status channel (also read by the UI).
    /// * `busy`    — dispatch busy flag (drives the UI spinner).
    /// * `engine`  — transcription engine (e.g. `OnnxTranscriber`).
    /// * `generic` — strategy for non-Spotify URLs (e.g. `YtDlpDownloader`).
    /// * `spotify` — strategy for Spotify URLs (e.g. `SpotifyDownloader`).
    /// * `paths`   — resolved lib/results layout.
    pub fn new(
        state: SharedState,
        sink: StatusSink,
        busy: BusyFlag,
        engine: Arc<dyn TranscriptionEngine>,
        generic: Arc<dyn AcquisitionStrategy>,
        spotify: Arc<dyn AcquisitionStrategy>,
        paths: AppPaths,
    ) -> Self {
        Self {
            state,
            sink,
            busy,
            engine,
            generic,
            spotify,
            paths,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the orchestrator until `command_rx` is closed.
    ///
    /// This is an `async fn` and should be spawned as a tokio task from
    /// `main()`.  A still-running job is awaited before returning so tests
    /// and shutdown observe its final state.
    pub async fn run(self, mut command_rx: mpsc::Receiver<PipelineCommand>) {
        let mut current_job: Option<JoinHandle<()>> = None;

        while let Some(command) = command_rx.recv().await {
            // ── Dispatch: classification happens here so empty input never
            //    schedules a job and a held busy flag rejects overlap. ──────
            let job = match command {
                PipelineCommand::ConvertUrl(input) => match classify(&input) {
                    SourceKind::Empty => {
                        self.sink.set("Load Youtube URL cancelled");
                        continue;
                    }
                    SourceKind::Spotify => JobSpec::Download {
                        url: input.trim().to_string(),
                        strategy: Arc::clone(&self.spotify),
                        start_message: "Trying to download spotify song ..",
                    },
                    SourceKind::Url => JobSpec::Download {
                        url: input.trim().to_string(),
                        strategy: Arc::clone(&self.generic),
                        start_message: "Downloading & converting youtube URL ..",
                    },
                },
                PipelineCommand::ConvertFile(path) => JobSpec::LocalFile(path),
            };

            let Some(guard) = JobGuard::try_acquire(&self.busy) else {
                self.sink.set("Busy — another conversion is still running");
                continue;
            };

            let ctx = JobContext {
                state: Arc::clone(&self.state),
                sink: self.sink.clone(),
                engine: Arc::clone(&self.engine),
                paths: self.paths.clone(),
            };
            current_job = Some(tokio::spawn(ctx.run_job(job, guard)));
        }

        if let Some(handle) = current_job {
            let _ = handle.await;
        }
        log::info!("pipeline: command channel closed, orchestrator shutting down");
    }
}

// ---------------------------------------------------------------------------
// JobContext — per-job state, threaded explicitly
// ---------------------------------------------------------------------------

struct JobContext {
    state: SharedState,
    sink: StatusSink,
    engine: Arc<dyn TranscriptionEngine>,
    paths: AppPaths,
}

impl JobContext {
    /// Job boundary: every error is caught here and turned into status text.
    async fn run_job(self, job: JobSpec, _guard: JobGuard) {
        if let Err(e) = self.execute(job).await {
            let message = e.to_string();
            {
                let mut st = self.state.lock().unwrap();
                st.pipeline = PipelineState::Error;
                st.error_message = Some(message.clone());
            }
            self.sink.set(message);
            log::error!("pipeline job failed: {e}");
        }
        // _guard drops here → busy indicator stops no earlier than the job.
    }

    async fn execute(&self, job: JobSpec) -> Result<(), PipelineError> {
        // Results location is created lazily and idempotently, before any
        // file lands in it.
        self.paths.ensure_results_dir()?;

        let audio_path = match job {
            JobSpec::LocalFile(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                self.sink.set(format!("Loaded file: {name}"));
                path
            }

            JobSpec::Download {
                url,
                strategy,
                start_message,
            } => {
                self.set_pipeline(PipelineState::Downloading);
                self.sink.set(start_message);

                let staging = StagingGuard::create()?;
                let acquired = strategy.acquire(&url, staging.path(), &self.sink).await?;
                log::debug!(
                    "acquired {} ({}) via {}",
                    acquired.path.display(),
                    acquired.format,
                    strategy.name()
                );

                // The file moves into the results location before
                // transcription begins, never after.
                let dest = relocate_into_results(&acquired, &self.paths.results_dir)?;
                self.sink.set("DL OK - starting .midi conversion ..");
                dest
            }
        };

        // ── Transcription (blocking → thread pool) ───────────────────────
        self.set_pipeline(PipelineState::Transcribing);
        let midi_path = midi_output_path(&audio_path, &self.paths.results_dir);

        let load_path = audio_path.clone();
        let samples = tokio::task::spawn_blocking(move || audio::load_audio(&load_path))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))??;

        let engine = Arc::clone(&self.engine);
        let out = midi_path.clone();
        let result = tokio::task::spawn_blocking(move || engine.transcribe(&samples, &out))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                // A partial output file is never treated as valid.
                let _ = std::fs::remove_file(&midi_path);
                return Err(e.into());
            }
        };

        log::info!(
            "conversion finished: {} notes from {:.1} s → {}",
            summary.notes,
            summary.duration_secs,
            midi_path.display()
        );

        let open_results = {
            let mut st = self.state.lock().unwrap();
            st.pipeline = PipelineState::Done;
            st.last_midi = Some(midi_path);
            st.error_message = None;
            st.config.ui.open_results_on_success
        };
        self.sink.set("Conversion OK");

        if open_results {
            if let Err(e) = player::open_results_folder(&self.paths.results_dir) {
                log::warn!("could not open results folder: {e}");
            }
        }

        Ok(())
    }

    fn set_pipeline(&self, state: PipelineState) {
        let mut st = self.state.lock().unwrap();
        st.pipeline = state;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
