//! Pipeline orchestrator module for piano-to-midi.
//!
//! This module wires the full acquire → relocate → transcribe pipeline and
//! exposes the shared state that the UI reads every frame.
//!
//! # Architecture
//!
//! ```text
//! PipelineCommand (mpsc)
//!        │
//!        ▼
//! PipelineOrchestrator::run()  ← async tokio task
//!        │
//!        ├─ ConvertUrl  → classify → strategy.acquire (per-job staging dir)
//!        │                        → relocate into results/
//!        │                        → spawn_blocking(load_audio)
//!        │                        → spawn_blocking(engine.transcribe)
//!        │
//!        └─ ConvertFile → spawn_blocking(load_audio)
//!                       → spawn_blocking(engine.transcribe)
//!
//! StatusSink  ←── written by jobs, read by the UI each frame
//! SharedState (Arc<Mutex<AppState>>) ←── read by egui update() each frame
//! BusyFlag    ←── taken at dispatch, released when the job completes
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{BusyFlag, PipelineCommand, PipelineError, PipelineOrchestrator};
pub use state::{new_shared_state, AppState, PipelineState, SharedState};
