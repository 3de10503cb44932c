//! Bootstrap provisioning — binary assets downloaded into the project
//! layout before the UI process starts.
//!
//! Three assets are managed:
//!
//! 1. a static ffmpeg build (single-file, per-platform) used by yt-dlp,
//! 2. the pre-trained transcription checkpoint into `lib/`,
//! 3. the optional external MIDI player installer into `lib/`.
//!
//! Missing assets are downloaded with retries through a `.part` temp file
//! that is renamed into place only on success, so an interrupted run never
//! leaves a truncated file looking valid.  Failure is fatal for the first
//! two assets and skippable for the player.
//!
//! Environment checks (unsupported OS) abort with a non-zero status before
//! anything is downloaded; these are the only process-fatal errors in the
//! application.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::{AppPaths, PLAYER_FILE_NAME};
use crate::transcribe::PIANO_CHECKPOINTS;

const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_SECS: u64 = 2;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Single-file static ffmpeg builds, one per supported platform.
const FFMPEG_BASE_URL: &str =
    "https://github.com/eugeneware/ffmpeg-static/releases/download/b6.0";

/// Installer for the optional external sheet-music player.
const PLAYER_URL: &str = "http://midisheetmusic.com/downloads/MidiSheetMusic-2.6.2.exe";

// ---------------------------------------------------------------------------
// SetupError
// ---------------------------------------------------------------------------

/// All errors that can arise during bootstrap.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The detected operating system has no asset builds.
    #[error("OS '{0}' not supported")]
    UnsupportedOs(String),

    /// The remote responded, but not with the file (404 and friends).
    #[error("URL not found ({status}): {url}")]
    MissingRemote { url: String, status: u16 },

    /// Network-level failure talking to the remote.
    #[error("Download failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Filesystem failure while provisioning.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// One downloadable binary asset and where it lands.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Short name for log/status lines.
    pub name: &'static str,
    /// Source URL.
    pub url: String,
    /// Destination file.
    pub dest: PathBuf,
    /// Optional assets log a warning on failure instead of aborting.
    pub optional: bool,
}

/// Verify the detected OS has asset builds available.
pub fn ensure_supported_os() -> Result<(), SetupError> {
    match std::env::consts::OS {
        "windows" | "linux" | "macos" => Ok(()),
        other => Err(SetupError::UnsupportedOs(other.to_string())),
    }
}

fn ffmpeg_url() -> Result<String, SetupError> {
    let build = match std::env::consts::OS {
        "windows" => "ffmpeg-win32-x64",
        "linux" => "ffmpeg-linux-x64",
        "macos" => "ffmpeg-darwin-x64",
        other => return Err(SetupError::UnsupportedOs(other.to_string())),
    };
    Ok(format!("{FFMPEG_BASE_URL}/{build}"))
}

/// The full asset list for this installation.
pub fn required_assets(paths: &AppPaths) -> Result<Vec<Asset>, SetupError> {
    let checkpoint = &PIANO_CHECKPOINTS[0];

    Ok(vec![
        Asset {
            name: "ffmpeg",
            url: ffmpeg_url()?,
            dest: paths.ffmpeg_file.clone(),
            optional: false,
        },
        Asset {
            name: "transcription checkpoint",
            url: checkpoint.source_url.to_string(),
            dest: paths.lib_dir.join(checkpoint.file_name),
            optional: false,
        },
        Asset {
            name: "midi player",
            url: PLAYER_URL.to_string(),
            dest: paths.lib_dir.join(PLAYER_FILE_NAME),
            optional: true,
        },
    ])
}

// ---------------------------------------------------------------------------
// run_setup
// ---------------------------------------------------------------------------

/// Provision every missing asset.
///
/// Idempotent — assets already present are skipped, so re-running after an
/// aborted download only fetches what is missing.
pub fn run_setup(paths: &AppPaths) -> Result<(), SetupError> {
    ensure_supported_os()?;
    paths.ensure_lib_dir()?;

    let client = reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|source| SetupError::Http {
            url: "<client construction>".into(),
            source,
        })?;

    for asset in required_assets(paths)? {
        if asset.dest.is_file() {
            log::info!("{} already present at {}", asset.name, asset.dest.display());
            continue;
        }

        match download_with_retry(&client, &asset) {
            Ok(()) => log::info!("{} provisioned at {}", asset.name, asset.dest.display()),
            Err(e) if asset.optional => {
                log::warn!("skipping optional {}: {e}", asset.name);
            }
            Err(e) => return Err(e),
        }
    }

    // ffmpeg must be executable on unix; downloads arrive without the bit.
    #[cfg(unix)]
    if paths.ffmpeg_file.is_file() {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&paths.ffmpeg_file)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&paths.ffmpeg_file, perms)?;
    }

    Ok(())
}

fn download_with_retry(
    client: &reqwest::blocking::Client,
    asset: &Asset,
) -> Result<(), SetupError> {
    let mut last_err: Option<SetupError> = None;

    for attempt in 1..=MAX_RETRIES {
        log::info!(
            "Downloading {} from {} (attempt {attempt}/{MAX_RETRIES})",
            asset.name,
            asset.url
        );

        match try_download(client, &asset.url, &asset.dest) {
            Ok(()) => return Ok(()),
            // A definitive 4xx will not get better on retry.
            Err(e @ SetupError::MissingRemote { .. }) => return Err(e),
            Err(e) => {
                log::warn!("download attempt {attempt} failed: {e}");
                last_err = Some(e);
                if attempt < MAX_RETRIES {
                    std::thread::sleep(Duration::from_secs(
                        RETRY_BACKOFF_SECS * attempt as u64,
                    ));
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| SetupError::MissingRemote {
        url: asset.url.clone(),
        status: 0,
    }))
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

fn try_download(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
) -> Result<(), SetupError> {
    let mut response = client
        .get(url)
        .send()
        .map_err(|source| SetupError::Http {
            url: url.into(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(SetupError::MissingRemote {
            url: url.into(),
            status: response.status().as_u16(),
        });
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = part_path(dest);
    let mut file = std::fs::File::create(&tmp)?;
    response
        .copy_to(&mut file)
        .map_err(|source| SetupError::Http {
            url: url.into(),
            source,
        })?;
    drop(file);

    std::fs::rename(&tmp, dest)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// launch_app
// ---------------------------------------------------------------------------

/// Launch the UI binary sitting next to the setup binary and wait for it.
pub fn launch_app() -> std::io::Result<std::process::ExitStatus> {
    let app_name = if cfg!(windows) {
        "piano-to-midi.exe"
    } else {
        "piano-to-midi"
    };

    let app = std::env::current_exe()?
        .parent()
        .map(|dir| dir.join(app_name))
        .filter(|p| p.is_file())
        .unwrap_or_else(|| PathBuf::from(app_name));

    log::info!("launching {}", app.display());
    std::process::Command::new(app).status()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn host_os_is_supported() {
        // The test suite only runs on the supported desktop platforms.
        ensure_supported_os().expect("supported host");
    }

    #[test]
    fn asset_list_covers_all_three_binaries() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::with_root(dir.path());
        let assets = required_assets(&paths).expect("assets");

        assert_eq!(assets.len(), 3);

        let ffmpeg = &assets[0];
        assert!(!ffmpeg.optional);
        assert_eq!(ffmpeg.dest, paths.ffmpeg_file);

        let checkpoint = &assets[1];
        assert!(!checkpoint.optional);
        assert!(checkpoint
            .dest
            .to_string_lossy()
            .contains("note_F1=0.9677_pedal_F1=0.9186"));
        assert!(checkpoint.dest.starts_with(&paths.lib_dir));

        let player = &assets[2];
        assert!(player.optional);
        assert_eq!(player.dest, paths.player_file);
    }

    #[test]
    fn part_path_appends_suffix_in_place() {
        let p = part_path(Path::new("/work/lib/model.onnx"));
        assert_eq!(p, Path::new("/work/lib/model.onnx.part"));
    }
}
