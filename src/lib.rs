//! piano-to-midi — download, convert and transcribe piano audio to MIDI.
//!
//! A desktop utility that acquires audio (local file, YouTube/SoundCloud
//! URL, or Spotify URL), normalises it to 16 kHz mono PCM, and runs it
//! through a pre-trained piano-transcription model to produce a `.midi`
//! file in the `results/` directory.
//!
//! # Subsystems
//!
//! | Module        | Responsibility                                          |
//! |---------------|---------------------------------------------------------|
//! | [`acquire`]   | URL classification + yt-dlp / spotdl download strategies |
//! | [`audio`]     | file decode → mono 16 kHz f32 PCM                        |
//! | [`transcribe`]| ONNX engine, note postprocessing, MIDI writing           |
//! | [`pipeline`]  | orchestrator, state machine, busy-flag dispatch guard    |
//! | [`status`]    | last-write-wins status channel read by the UI            |
//! | [`config`]    | settings.toml + project-relative lib/results layout      |
//! | [`setup`]     | bootstrap asset provisioning (ffmpeg, checkpoint, player)|
//! | [`app`]       | egui shell                                               |
//! | [`player`]    | external MIDI player + results-folder reveal             |

pub mod acquire;
pub mod app;
pub mod audio;
pub mod config;
pub mod pipeline;
pub mod player;
pub mod setup;
pub mod status;
pub mod transcribe;
