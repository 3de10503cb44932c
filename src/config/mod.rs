//! Configuration module for piano-to-midi.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for the project-relative asset/results layout, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, PLAYER_FILE_NAME};
pub use settings::{AppConfig, DownloadConfig, EnginePreference, TranscriptionConfig, UiConfig};
