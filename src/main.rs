//! Application entry point — piano-to-midi transcriber.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Resolve the project layout ([`AppPaths`]).
//! 4. Build the transcription engine from the provisioned checkpoint —
//!    accelerated execution when available, CPU otherwise; a stub that
//!    reports the missing checkpoint is used so the app still launches
//!    before the setup binary has run.
//! 5. Create the tokio runtime (multi-thread, 4 workers) and the pipeline
//!    command channel.
//! 6. Spawn the pipeline orchestrator on the runtime.
//! 7. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::mpsc;

use piano_to_midi::{
    acquire::{AcquisitionStrategy, SpotifyDownloader, YtDlpDownloader},
    app::PianoToMidiApp,
    config::{AppConfig, AppPaths},
    pipeline::{new_shared_state, PipelineCommand, PipelineOrchestrator},
    status::StatusSink,
    transcribe::{
        find_checkpoint_by_id, CheckpointPaths, OnnxTranscriber, TranscribeError,
        TranscriptionEngine, PIANO_CHECKPOINTS,
    },
};

use eframe::egui;

// ---------------------------------------------------------------------------
// Engine construction
// ---------------------------------------------------------------------------

/// Build the production engine, degrading to [`NoCheckpointEngine`] when the
/// checkpoint has not been provisioned yet.
fn build_engine(config: &AppConfig, paths: &AppPaths) -> Arc<dyn TranscriptionEngine> {
    let info = find_checkpoint_by_id(&config.transcription.checkpoint).unwrap_or_else(|| {
        log::warn!(
            "unknown checkpoint id '{}' in settings — using '{}'",
            config.transcription.checkpoint,
            PIANO_CHECKPOINTS[0].id
        );
        &PIANO_CHECKPOINTS[0]
    });

    let checkpoint_path = CheckpointPaths::new(paths).resolve(info);

    match OnnxTranscriber::load(
        &checkpoint_path,
        config.transcription.engine,
        config.transcription.onset_threshold,
        config.transcription.frame_threshold,
    ) {
        Ok(engine) => {
            log::info!(
                "checkpoint loaded: {} ({} engine)",
                checkpoint_path.display(),
                engine.kind().label()
            );
            Arc::new(engine)
        }
        Err(e) => {
            log::warn!(
                "could not load checkpoint ({}): {e}. Transcription will return an error.",
                checkpoint_path.display()
            );
            // Use a stub that always returns an explanatory error so the app
            // still launches without a provisioned checkpoint.
            Arc::new(NoCheckpointEngine {
                path: checkpoint_path.display().to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_inner_size([620.0, 170.0])
        .with_min_inner_size([520.0, 140.0]);

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("piano-to-midi starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Project layout
    let paths = AppPaths::new();

    // 4. Transcription engine (engine kind resolved once, at process start)
    let engine = build_engine(&config, &paths);

    // 5. Tokio runtime (4 workers — one job + its subprocess plumbing)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 6. Shared handles + channel setup
    let state = new_shared_state(config.clone());
    let sink = StatusSink::new();
    let busy = Arc::new(AtomicBool::new(false));
    let (command_tx, command_rx) = mpsc::channel::<PipelineCommand>(16);

    // Acquisition strategies — the managed ffmpeg is handed to yt-dlp only
    // when the setup binary has provisioned it.
    let ffmpeg = paths
        .ffmpeg_available()
        .then(|| paths.ffmpeg_file.clone());
    let generic: Arc<dyn AcquisitionStrategy> =
        Arc::new(YtDlpDownloader::new(&config.download, ffmpeg));
    let spotify: Arc<dyn AcquisitionStrategy> = Arc::new(SpotifyDownloader::new(&config.download));

    // Spawn pipeline orchestrator onto the tokio runtime
    {
        let orchestrator = PipelineOrchestrator::new(
            Arc::clone(&state),
            sink.clone(),
            Arc::clone(&busy),
            engine,
            generic,
            spotify,
            paths.clone(),
        );
        rt.spawn(orchestrator.run(command_rx));
    }

    // 7. Build the egui app and run it (blocks until the window is closed)
    let app = PianoToMidiApp::new(state, sink, busy, command_tx, paths);
    let options = native_options(&config);

    eframe::run_native(
        "PiaMidi Transcriber",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}

// ---------------------------------------------------------------------------
// NoCheckpointEngine — fallback when the checkpoint is not present
// ---------------------------------------------------------------------------

struct NoCheckpointEngine {
    path: String,
}

impl TranscriptionEngine for NoCheckpointEngine {
    fn transcribe(
        &self,
        _samples: &[f32],
        _output: &Path,
    ) -> Result<piano_to_midi::transcribe::TranscriptionSummary, TranscribeError> {
        Err(TranscribeError::CheckpointNotFound(self.path.clone()))
    }

    fn kind(&self) -> piano_to_midi::transcribe::EngineKind {
        piano_to_midi::transcribe::EngineKind::Cpu
    }
}
