//! piano-to-midi desktop shell — egui/eframe application.
//!
//! # Architecture
//!
//! [`PianoToMidiApp`] is the top-level [`eframe::App`].  It owns the UI
//! input fields and three read handles into the pipeline:
//!
//! * `command_tx` — sends [`PipelineCommand`] to the pipeline orchestrator.
//! * `sink`      — the status channel; its current text is rendered in the
//!   status bar every frame (`Status: …`).
//! * `busy`      — the dispatch busy flag; drives the indeterminate spinner.
//!
//! The window mirrors the classic layout: a "Play" group with the external
//! player launcher, a "(Down-)load & convert" group with the local-file and
//! URL inputs, and a bottom status bar with the busy indicator.  While a job
//! runs the UI re-polls on a ~500 ms cadence so the spinner animates and
//! worker status writes become visible.

use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::AppPaths;
use crate::pipeline::{BusyFlag, PipelineCommand, SharedState};
use crate::player;
use crate::status::StatusSink;

/// Repaint cadence while a background job is running.
const BUSY_POLL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// PianoToMidiApp
// ---------------------------------------------------------------------------

/// eframe application — the transcriber window.
pub struct PianoToMidiApp {
    // ── Pipeline handles ─────────────────────────────────────────────────
    /// Shared application state written by the orchestrator.
    state: SharedState,
    /// Status channel, rendered in the bottom bar.
    sink: StatusSink,
    /// Dispatch busy flag; `true` while a job + its guard are alive.
    busy: BusyFlag,
    /// Send commands to the background pipeline orchestrator.
    command_tx: mpsc::Sender<PipelineCommand>,

    // ── Filesystem layout ────────────────────────────────────────────────
    paths: AppPaths,
    /// Checked once at startup, like the original interface build.
    player_available: bool,

    // ── Input fields ─────────────────────────────────────────────────────
    url_input: String,
    file_input: String,
}

impl PianoToMidiApp {
    /// Create a new [`PianoToMidiApp`].
    pub fn new(
        state: SharedState,
        sink: StatusSink,
        busy: BusyFlag,
        command_tx: mpsc::Sender<PipelineCommand>,
        paths: AppPaths,
    ) -> Self {
        let player_available = paths.player_available();
        Self {
            state,
            sink,
            busy,
            command_tx,
            paths,
            player_available,
            url_input: String::new(),
            file_input: String::new(),
        }
    }

    fn is_busy(&self) -> bool {
        self.busy.load(std::sync::atomic::Ordering::SeqCst)
            || self.state.lock().unwrap().pipeline.is_busy()
    }

    fn send(&self, command: PipelineCommand) {
        if self.command_tx.try_send(command).is_err() {
            self.sink.set("Busy — another conversion is still running");
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────

    fn on_launch_player(&self) {
        match player::launch_player(&self.paths) {
            Ok(()) => self.sink.set("Launched Midi Player"),
            Err(e) => self.sink.set(e.to_string()),
        }
    }

    fn on_load_file(&mut self) {
        let path = self.file_input.trim().to_string();
        if path.is_empty() {
            self.sink.set("Load file aborted");
            return;
        }
        self.send(PipelineCommand::ConvertFile(PathBuf::from(path)));
    }

    fn on_load_url(&mut self) {
        // Empty input is classified by the dispatcher, which reports the
        // cancellation message without scheduling a job.
        self.send(PipelineCommand::ConvertUrl(self.url_input.clone()));
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_actions(&mut self, ui: &mut egui::Ui) {
        let busy = self.is_busy();

        ui.horizontal(|ui| {
            // Play group
            ui.group(|ui| {
                ui.vertical(|ui| {
                    ui.label(egui::RichText::new("Play").small());
                    let launch = ui
                        .add_enabled(
                            self.player_available,
                            egui::Button::new("Launch Midi Player"),
                        )
                        .on_hover_text("Launch external midi player")
                        .on_disabled_hover_text("External midi player not found!");
                    if launch.clicked() {
                        self.on_launch_player();
                    }
                });
            });

            // Load & convert group
            ui.group(|ui| {
                ui.vertical(|ui| {
                    ui.label(egui::RichText::new("(Down-)load & convert").small());

                    ui.horizontal(|ui| {
                        ui.add(
                            egui::TextEdit::singleline(&mut self.file_input)
                                .hint_text("path to a local audio file")
                                .desired_width(260.0),
                        );
                        let load_file = ui
                            .add_enabled(!busy, egui::Button::new("Load File"))
                            .on_hover_text("Load a local .mp3 file to convert to .midi");
                        if load_file.clicked() {
                            self.on_load_file();
                        }
                    });

                    ui.horizontal(|ui| {
                        ui.add(
                            egui::TextEdit::singleline(&mut self.url_input)
                                .hint_text("https://…")
                                .desired_width(260.0),
                        );
                        let load_url = ui
                            .add_enabled(!busy, egui::Button::new("Load URL"))
                            .on_hover_text(
                                "Enter URL to download & convert to .mp3 and .midi afterwards\n\
                                 Supported tested platforms: Youtube, Soundcloud, Spotify",
                            );
                        if load_url.clicked() {
                            self.on_load_url();
                        }
                    });
                });
            });
        });
    }

    fn draw_status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("Status: {}", self.sink.current()));

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if self.is_busy() {
                    ui.add(egui::Spinner::new());
                }
            });
        });
    }
}

// ---------------------------------------------------------------------------
// eframe::App
// ---------------------------------------------------------------------------

impl eframe::App for PianoToMidiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_actions(ui);
            ui.separator();
            self.draw_status_bar(ui);
        });

        // Status text and the busy flag are written from worker threads;
        // poll them at the spinner cadence instead of waiting for input.
        ctx.request_repaint_after(BUSY_POLL);
    }
}
