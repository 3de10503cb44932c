//! Audio acquisition — URL in, local audio file out.
//!
//! # Architecture
//!
//! ```text
//! user input ──▶ classify() ──▶ SourceKind
//!                                 ├─ Empty    → no job, "cancelled" status
//!                                 ├─ Spotify  → SpotifyDownloader (spotdl)
//!                                 └─ Url      → YtDlpDownloader  (yt-dlp)
//!                                        │
//!                                        ▼
//!                         AcquiredAudio in a per-job staging dir
//!                                        │
//!                                        ▼
//!                        relocate_into_results() → results/<name>
//! ```
//!
//! Each strategy is a capability-polymorphic unit behind
//! [`AcquisitionStrategy`]: it performs network retrieval, transcodes to the
//! configured container when needed (delegated to the tool), and reports
//! progress through its own [`StatusSink`] handle on a throttled cadence.
//! Strategies never touch UI state.

pub mod spotify;
pub mod ytdlp;

pub use spotify::SpotifyDownloader;
pub use ytdlp::YtDlpDownloader;

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::status::StatusSink;

/// Cadence for download-progress status updates.
pub(crate) const PROGRESS_INTERVAL: std::time::Duration =
    std::time::Duration::from_millis(500);

// ---------------------------------------------------------------------------
// SourceKind / classify
// ---------------------------------------------------------------------------

/// Classification of a user-supplied URL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Empty or whitespace-only input — the prompt was cancelled.
    Empty,
    /// Contains the Spotify domain marker.
    Spotify,
    /// Any other non-empty string — handed to the generic downloader.
    Url,
}

/// Classify `input` by shape.
///
/// Unrecognised or malformed URLs are deliberately *not* rejected here —
/// they go to the generic downloader, whose own failure surfaces as a
/// status message.
///
/// ```
/// use piano_to_midi::acquire::{classify, SourceKind};
///
/// assert_eq!(classify(""), SourceKind::Empty);
/// assert_eq!(classify("https://open.spotify.com/track/abc123"), SourceKind::Spotify);
/// assert_eq!(classify("https://youtu.be/xyz"), SourceKind::Url);
/// ```
pub fn classify(input: &str) -> SourceKind {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        SourceKind::Empty
    } else if trimmed.contains("spotify.com") {
        SourceKind::Spotify
    } else {
        SourceKind::Url
    }
}

// ---------------------------------------------------------------------------
// AcquireError
// ---------------------------------------------------------------------------

/// All errors that can arise during acquisition and relocation.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The external tool could not be launched at all.
    #[error("Failed to launch {tool}: {source} — is it installed?")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran but exited with a failure.
    #[error("{tool} failed: {detail}")]
    Tool { tool: String, detail: String },

    /// The tool reported success but no audio file appeared.
    #[error("Download finished but no audio file was produced")]
    NoAudioProduced,

    /// The produced file does not carry a known audio extension.
    #[error("Moving file failed, .midi conversion aborted: {0} is not audio")]
    NotAudio(String),

    /// Filesystem error during staging or relocation.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// AcquiredAudio
// ---------------------------------------------------------------------------

/// Audio container extensions accepted by the relocation step.
pub const AUDIO_EXTENSIONS: &[&str] =
    &["mp3", "m4a", "wav", "wma", "aiff", "flac", "ogg", "opus"];

/// Result of a successful acquisition — consumed exactly once by relocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredAudio {
    /// Resolved local file path (inside the job's staging directory).
    pub path: PathBuf,
    /// Lower-cased audio-container tag (`"mp3"`, `"m4a"`, …).
    pub format: String,
}

impl AcquiredAudio {
    /// Wrap `path`, validating its extension against [`AUDIO_EXTENSIONS`].
    pub fn from_path(path: PathBuf) -> Result<Self, AcquireError> {
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| AUDIO_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| AcquireError::NotAudio(path.display().to_string()))?;
        Ok(Self { path, format })
    }
}

// ---------------------------------------------------------------------------
// AcquisitionStrategy trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for URL acquisition strategies.
///
/// # Contract
///
/// - On success the returned file exists inside `staging`.
/// - Progress is reported only through `sink` (throttled); the strategy
///   never touches UI widgets.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Tool name for status/log messages.
    fn name(&self) -> &'static str;

    /// Retrieve `url` into `staging` and return the produced audio file.
    async fn acquire(
        &self,
        url: &str,
        staging: &Path,
        sink: &StatusSink,
    ) -> Result<AcquiredAudio, AcquireError>;
}

// ---------------------------------------------------------------------------
// Relocation
// ---------------------------------------------------------------------------

/// Move an acquired file into the results directory.
///
/// Uses `rename` and falls back to copy + remove when staging and results
/// live on different filesystems.  Returns the final path.
pub fn relocate_into_results(
    acquired: &AcquiredAudio,
    results_dir: &Path,
) -> Result<PathBuf, AcquireError> {
    let file_name = acquired
        .path
        .file_name()
        .ok_or_else(|| AcquireError::NotAudio(acquired.path.display().to_string()))?;
    let dest = results_dir.join(file_name);

    if std::fs::rename(&acquired.path, &dest).is_err() {
        std::fs::copy(&acquired.path, &dest)?;
        std::fs::remove_file(&acquired.path)?;
    }

    log::info!("relocated {} → {}", acquired.path.display(), dest.display());
    Ok(dest)
}

/// Most recently modified audio file in `dir`, if any.
///
/// The download tools pick their own output names, so the strategy locates
/// the result by scanning its private staging directory afterwards.
pub fn newest_audio_file(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_audio = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_audio {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let is_newer = newest
            .as_ref()
            .map(|(t, _)| modified > *t)
            .unwrap_or(true);
        if is_newer {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

// ---------------------------------------------------------------------------
// Subprocess plumbing shared by both strategies
// ---------------------------------------------------------------------------

/// Spawn `command`, stream its stdout line-by-line into `on_line`, capture
/// stderr, and fail with the stderr tail when the tool exits non-zero.
pub(crate) async fn run_streaming(
    mut command: Command,
    tool: &'static str,
    mut on_line: impl FnMut(&str) + Send,
) -> Result<(), AcquireError> {
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| AcquireError::Spawn {
        tool: tool.into(),
        source,
    })?;

    let stdout = child.stdout.take().expect("stdout piped above");
    let mut stderr = child.stderr.take().expect("stderr piped above");

    let stdout_task = async {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            on_line(&line);
        }
    };
    let stderr_task = async {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text).await;
        text
    };

    let ((), stderr_text) = tokio::join!(stdout_task, stderr_task);
    let status = child.wait().await?;

    if !status.success() {
        return Err(AcquireError::Tool {
            tool: tool.into(),
            detail: stderr_tail(&stderr_text),
        });
    }
    Ok(())
}

/// Last few non-empty stderr lines, for compact status messages.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return "exited with a failure status".into();
    }
    lines[lines.len().saturating_sub(3)..].join(" | ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // ---- classify ----------------------------------------------------------

    #[test]
    fn empty_string_is_empty() {
        assert_eq!(classify(""), SourceKind::Empty);
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(classify("   \t"), SourceKind::Empty);
    }

    #[test]
    fn spotify_marker_selects_spotify() {
        assert_eq!(
            classify("https://open.spotify.com/track/abc123"),
            SourceKind::Spotify
        );
    }

    #[test]
    fn plain_spotify_domain_selects_spotify() {
        assert_eq!(classify("spotify.com/track/x"), SourceKind::Spotify);
    }

    #[test]
    fn youtube_url_selects_generic() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            SourceKind::Url
        );
    }

    #[test]
    fn malformed_string_still_selects_generic() {
        // The generic downloader owns the failure, not the classifier.
        assert_eq!(classify("not a url at all"), SourceKind::Url);
    }

    // ---- AcquiredAudio -----------------------------------------------------

    #[test]
    fn known_extension_is_accepted_case_insensitively() {
        let audio = AcquiredAudio::from_path(PathBuf::from("/tmp/Foo.MP3")).expect("accepted");
        assert_eq!(audio.format, "mp3");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = AcquiredAudio::from_path(PathBuf::from("/tmp/foo.webm.part")).unwrap_err();
        assert!(matches!(err, AcquireError::NotAudio(_)));
    }

    #[test]
    fn missing_extension_is_rejected() {
        let err = AcquiredAudio::from_path(PathBuf::from("/tmp/noext")).unwrap_err();
        assert!(matches!(err, AcquireError::NotAudio(_)));
    }

    // ---- relocate_into_results ---------------------------------------------

    #[test]
    fn relocate_moves_file_into_results() {
        let dir = tempdir().expect("temp dir");
        let staging = dir.path().join("staging");
        let results = dir.path().join("results");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::create_dir_all(&results).unwrap();

        let src = staging.join("foo.mp3");
        std::fs::write(&src, b"audio").unwrap();

        let acquired = AcquiredAudio::from_path(src.clone()).unwrap();
        let dest = relocate_into_results(&acquired, &results).expect("relocate");

        assert_eq!(dest, results.join("foo.mp3"));
        assert!(dest.is_file());
        assert!(!src.exists());
    }

    // ---- newest_audio_file -------------------------------------------------

    #[test]
    fn newest_audio_file_ignores_non_audio() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("partial.webm.part"), b"x").unwrap();

        let found = newest_audio_file(dir.path()).expect("scan");
        assert!(found.is_none());
    }

    #[test]
    fn newest_audio_file_picks_latest() {
        let dir = tempdir().expect("temp dir");
        let old = dir.path().join("old.mp3");
        let new = dir.path().join("new.mp3");
        std::fs::write(&old, b"x").unwrap();
        std::fs::write(&new, b"x").unwrap();

        // Backdate the older file so the ordering is deterministic.
        let past = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
        let file = std::fs::File::options().write(true).open(&old).unwrap();
        file.set_modified(past).unwrap();
        drop(file);

        let found = newest_audio_file(dir.path()).expect("scan");
        assert_eq!(found, Some(new));
    }

    // ---- stderr_tail -------------------------------------------------------

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let tail = stderr_tail("one\ntwo\nthree\nfour\n");
        assert_eq!(tail, "two | three | four");
    }

    #[test]
    fn stderr_tail_of_empty_output() {
        assert_eq!(stderr_tail("  \n\n"), "exited with a failure status");
    }
}
