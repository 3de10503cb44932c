//! Application paths — project-relative asset/results layout plus the
//! platform config directory.
//!
//! Layout (relative to the working directory, matching the setup binary):
//!
//! ```text
//! ./ffmpeg[.exe]     media transcoder used by yt-dlp
//! ./lib/             model checkpoint + optional external MIDI player
//! ./results/         final .midi files and relocated audio files
//! ```
//!
//! `settings.toml` lives in the platform config dir via the `dirs` crate:
//!   Windows: %APPDATA%\piano-to-midi\
//!   macOS:   ~/Library/Application Support/piano-to-midi/
//!   Linux:   ~/.config/piano-to-midi/

use std::io;
use std::path::{Path, PathBuf};

/// File name of the optional external MIDI player executable.
pub const PLAYER_FILE_NAME: &str = "MidiSheetMusic-2.6.2.exe";

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Root the relative layout hangs off (normally the working directory).
    pub root: PathBuf,
    /// Directory for the model checkpoint and the optional player.
    pub lib_dir: PathBuf,
    /// Directory for final MIDI and relocated audio files.
    pub results_dir: PathBuf,
    /// Full path to the managed ffmpeg binary.
    pub ffmpeg_file: PathBuf,
    /// Full path to the optional external MIDI player executable.
    pub player_file: PathBuf,
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "piano-to-midi";

    /// Resolves all paths against the current working directory.
    ///
    /// Falls back to `.` if the working directory cannot be determined
    /// (should be extremely rare in practice).
    pub fn new() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_root(root)
    }

    /// Resolves all paths against an explicit root (useful for tests).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();

        let ffmpeg_name = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };

        let lib_dir = root.join("lib");
        let results_dir = root.join("results");
        let ffmpeg_file = root.join(ffmpeg_name);
        let player_file = lib_dir.join(PLAYER_FILE_NAME);

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let settings_file = config_dir.join("settings.toml");

        Self {
            root,
            lib_dir,
            results_dir,
            ffmpeg_file,
            player_file,
            config_dir,
            settings_file,
        }
    }

    /// Create the results directory if it does not exist yet.
    ///
    /// Idempotent — calling this twice leaves exactly one directory and
    /// returns `Ok` both times. Returns the directory path for chaining.
    pub fn ensure_results_dir(&self) -> io::Result<&Path> {
        std::fs::create_dir_all(&self.results_dir)?;
        Ok(&self.results_dir)
    }

    /// Create the lib directory if it does not exist yet (idempotent).
    pub fn ensure_lib_dir(&self) -> io::Result<&Path> {
        std::fs::create_dir_all(&self.lib_dir)?;
        Ok(&self.lib_dir)
    }

    /// `true` when the optional external MIDI player has been provisioned.
    pub fn player_available(&self) -> bool {
        self.player_file.is_file()
    }

    /// `true` when the managed ffmpeg binary has been provisioned.
    ///
    /// When absent, yt-dlp is left to find ffmpeg on `PATH`.
    pub fn ffmpeg_available(&self) -> bool {
        self.ffmpeg_file.is_file()
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_is_relative_to_root() {
        let paths = AppPaths::with_root("/work");
        assert_eq!(paths.lib_dir, Path::new("/work/lib"));
        assert_eq!(paths.results_dir, Path::new("/work/results"));
        assert_eq!(
            paths.player_file,
            Path::new("/work/lib").join(PLAYER_FILE_NAME)
        );
    }

    #[test]
    fn settings_file_is_named_settings_toml() {
        let paths = AppPaths::new();
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
    }

    #[test]
    fn ensure_results_dir_creates_directory() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::with_root(dir.path());

        assert!(!paths.results_dir.exists());
        paths.ensure_results_dir().expect("create");
        assert!(paths.results_dir.is_dir());
    }

    #[test]
    fn ensure_results_dir_is_idempotent() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::with_root(dir.path());

        paths.ensure_results_dir().expect("first create");
        paths.ensure_results_dir().expect("second create is a no-op");

        assert!(paths.results_dir.is_dir());
        // Exactly one entry named "results" in the root.
        let count = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() == "results")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn player_available_reflects_file_presence() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::with_root(dir.path());

        assert!(!paths.player_available());

        paths.ensure_lib_dir().expect("lib dir");
        std::fs::write(&paths.player_file, b"stub").expect("write stub");
        assert!(paths.player_available());
    }
}
