//! External MIDI player launch and results-folder reveal.
//!
//! The optional sheet-music player is a Windows executable provisioned into
//! `lib/` by the setup binary; launching it on any other platform reports a
//! status message instead of failing silently.  Opening the results folder
//! works everywhere via the platform file browser.

use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::config::AppPaths;

// ---------------------------------------------------------------------------
// PlayerError
// ---------------------------------------------------------------------------

/// Errors from launching the external MIDI player.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The player executable has not been provisioned into `lib/`.
    #[error("External midi player not found!")]
    NotFound,

    /// The player is a Windows-only feature.
    #[error("Midi Player is a Windows-only feature!")]
    UnsupportedPlatform,

    /// The executable exists but could not be started.
    #[error("Failed to launch midi player: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// launch_player
// ---------------------------------------------------------------------------

/// Launch the external MIDI player executable from `lib/`.
///
/// The process is spawned detached; this returns as soon as the launch
/// succeeds.
pub fn launch_player(paths: &AppPaths) -> Result<(), PlayerError> {
    if !paths.player_available() {
        return Err(PlayerError::NotFound);
    }

    if !cfg!(windows) {
        return Err(PlayerError::UnsupportedPlatform);
    }

    Command::new(&paths.player_file).spawn()?;
    log::info!("launched midi player: {}", paths.player_file.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// open_results_folder
// ---------------------------------------------------------------------------

/// Reveal `dir` in the platform file browser.
pub fn open_results_folder(dir: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let cmd = "open";
    #[cfg(target_os = "windows")]
    let cmd = "explorer";
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let cmd = "xdg-open";

    Command::new(cmd).arg(dir).spawn()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_player_reports_not_found() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::with_root(dir.path());

        let err = launch_player(&paths).unwrap_err();
        assert!(matches!(err, PlayerError::NotFound));
    }

    #[cfg(not(windows))]
    #[test]
    fn provisioned_player_is_windows_only_elsewhere() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::with_root(dir.path());

        paths.ensure_lib_dir().unwrap();
        std::fs::write(&paths.player_file, b"stub exe").unwrap();

        let err = launch_player(&paths).unwrap_err();
        assert!(matches!(err, PlayerError::UnsupportedPlatform));
    }

    #[test]
    fn error_messages_match_the_status_wording() {
        assert_eq!(
            PlayerError::NotFound.to_string(),
            "External midi player not found!"
        );
        assert_eq!(
            PlayerError::UnsupportedPlatform.to_string(),
            "Midi Player is a Windows-only feature!"
        );
    }
}
