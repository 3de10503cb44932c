//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// EnginePreference
// ---------------------------------------------------------------------------

/// Which execution engine the transcription model should run on.
///
/// The actual engine is resolved once at process start: `Auto` probes for an
/// accelerated provider and falls back to CPU when none is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnginePreference {
    /// Accelerated when available, CPU otherwise (recommended).
    Auto,
    /// Force the accelerated provider; engine construction fails when it is
    /// not available.
    Accelerated,
    /// Force CPU inference.
    Cpu,
}

impl Default for EnginePreference {
    fn default() -> Self {
        Self::Auto
    }
}

// ---------------------------------------------------------------------------
// TranscriptionConfig
// ---------------------------------------------------------------------------

/// Settings for the piano-transcription engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Checkpoint identifier (see `transcribe::model::PIANO_CHECKPOINTS`).
    pub checkpoint: String,
    /// Execution engine preference.
    pub engine: EnginePreference,
    /// Onset probability above which a new note is started.
    pub onset_threshold: f32,
    /// Frame probability below which a sounding note is released.
    pub frame_threshold: f32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            checkpoint: "crnn-piano-v1".into(),
            engine: EnginePreference::default(),
            onset_threshold: 0.3,
            frame_threshold: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// DownloadConfig
// ---------------------------------------------------------------------------

/// Settings for the URL acquisition strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Audio container every download is transcoded to (`"mp3"`).
    pub audio_format: String,
    /// Target bitrate passed to the transcoder (e.g. `"192K"`).
    pub audio_quality: String,
    /// yt-dlp executable — name resolved on `PATH` or an absolute path.
    pub yt_dlp_bin: String,
    /// spotdl executable — name resolved on `PATH` or an absolute path.
    pub spotdl_bin: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            audio_format: "mp3".into(),
            audio_quality: "192K".into(),
            yt_dlp_bin: "yt-dlp".into(),
            spotdl_bin: "spotdl".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window appearance and behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Last saved window position `(x, y)` in screen pixels.  `None` means
    /// let the OS / window manager pick a position on first launch.
    pub window_position: Option<(f32, f32)>,
    /// Reveal the results folder in the file browser after a successful
    /// conversion.
    pub open_results_on_success: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_position: None,
            open_results_on_success: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use piano_to_midi::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transcription engine settings.
    pub transcription: TranscriptionConfig,
    /// URL download settings.
    pub download: DownloadConfig,
    /// UI / window settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.transcription.checkpoint, loaded.transcription.checkpoint);
        assert_eq!(original.transcription.engine, loaded.transcription.engine);
        assert_eq!(original.download.audio_format, loaded.download.audio_format);
        assert_eq!(original.download.audio_quality, loaded.download.audio_quality);
        assert_eq!(original.download.yt_dlp_bin, loaded.download.yt_dlp_bin);
        assert_eq!(original.ui.open_results_on_success, loaded.ui.open_results_on_success);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.transcription.checkpoint, default.transcription.checkpoint);
        assert_eq!(config.download.audio_format, default.download.audio_format);
    }

    /// Verify the shipped defaults.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.transcription.checkpoint, "crnn-piano-v1");
        assert_eq!(cfg.transcription.engine, EnginePreference::Auto);
        assert!((cfg.transcription.onset_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(cfg.download.audio_format, "mp3");
        assert_eq!(cfg.download.yt_dlp_bin, "yt-dlp");
        assert_eq!(cfg.download.spotdl_bin, "spotdl");
        assert!(cfg.ui.open_results_on_success);
        assert!(cfg.ui.window_position.is_none());
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.transcription.engine = EnginePreference::Cpu;
        cfg.transcription.onset_threshold = 0.5;
        cfg.download.audio_quality = "320K".into();
        cfg.download.yt_dlp_bin = "/opt/yt-dlp".into();
        cfg.ui.window_position = Some((100.0, 200.0));
        cfg.ui.open_results_on_success = false;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.transcription.engine, EnginePreference::Cpu);
        assert!((loaded.transcription.onset_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(loaded.download.audio_quality, "320K");
        assert_eq!(loaded.download.yt_dlp_bin, "/opt/yt-dlp");
        assert_eq!(loaded.ui.window_position, Some((100.0, 200.0)));
        assert!(!loaded.ui.open_results_on_success);
    }
}
