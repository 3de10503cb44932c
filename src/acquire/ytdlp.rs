//! Generic URL acquisition via `yt-dlp`.
//!
//! Covers video-sharing sites (YouTube, SoundCloud, …) and direct audio
//! links.  The tool extracts the best audio stream and transcodes it to the
//! configured container through ffmpeg; when the setup binary has
//! provisioned a managed ffmpeg, its location is passed explicitly so no
//! `PATH` lookup is needed.
//!
//! Progress reporting uses `--progress-template` with a JSON payload per
//! line, parsed and forwarded to the status sink at a throttled cadence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::DownloadConfig;
use crate::status::StatusSink;

use super::{
    newest_audio_file, run_streaming, AcquireError, AcquiredAudio, AcquisitionStrategy,
    PROGRESS_INTERVAL,
};

/// Template handed to `--progress-template`: one JSON object per progress
/// tick on stdout (the `download:` prefix scopes it to the download phase).
const PROGRESS_TEMPLATE: &str = "download:%(progress)j";

// ---------------------------------------------------------------------------
// YtDlpDownloader
// ---------------------------------------------------------------------------

/// [`AcquisitionStrategy`] backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    bin: String,
    audio_format: String,
    audio_quality: String,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlpDownloader {
    /// Build from the download config and an optional managed ffmpeg path.
    pub fn new(config: &DownloadConfig, ffmpeg_location: Option<PathBuf>) -> Self {
        Self {
            bin: config.yt_dlp_bin.clone(),
            audio_format: config.audio_format.clone(),
            audio_quality: config.audio_quality.clone(),
            ffmpeg_location,
        }
    }

    fn command(&self, url: &str, staging: &Path) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--extract-audio")
            .arg("--audio-format")
            .arg(&self.audio_format)
            .arg("--audio-quality")
            .arg(&self.audio_quality)
            .arg("--no-playlist")
            .arg("--newline")
            .arg("--progress-template")
            .arg(PROGRESS_TEMPLATE)
            .arg("--output")
            .arg(staging.join("%(title)s.%(ext)s"));

        if let Some(ffmpeg) = &self.ffmpeg_location {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }

        cmd.arg("--").arg(url);
        cmd
    }
}

/// Turn one progress-template line into status text, if it is one.
///
/// Non-JSON lines (post-processor chatter, warnings) yield `None`.
fn progress_line(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line.trim()).ok()?;
    let percent = value.get("_percent_str")?.as_str()?.trim().to_string();
    let eta = value
        .get("_eta_str")
        .and_then(|v| v.as_str())
        .unwrap_or("?")
        .trim()
        .to_string();
    Some(format!("Downloading.. {percent} (ETA {eta})"))
}

#[async_trait]
impl AcquisitionStrategy for YtDlpDownloader {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn acquire(
        &self,
        url: &str,
        staging: &Path,
        sink: &StatusSink,
    ) -> Result<AcquiredAudio, AcquireError> {
        std::fs::create_dir_all(staging)?;

        let mut throttle = sink.throttled(PROGRESS_INTERVAL);
        run_streaming(self.command(url, staging), self.name(), |line| {
            if let Some(text) = progress_line(line) {
                throttle.set(text);
            }
        })
        .await?;

        let file = newest_audio_file(staging)?.ok_or(AcquireError::NoAudioProduced)?;
        AcquiredAudio::from_path(file)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn downloader() -> YtDlpDownloader {
        YtDlpDownloader::new(&DownloadConfig::default(), None)
    }

    #[test]
    fn progress_line_parses_template_json() {
        let line = r#"{"_percent_str": " 42.3%", "_eta_str": "00:12"}"#;
        assert_eq!(
            progress_line(line),
            Some("Downloading.. 42.3% (ETA 00:12)".into())
        );
    }

    #[test]
    fn progress_line_without_eta_still_reports() {
        let line = r#"{"_percent_str": "100%"}"#;
        assert_eq!(progress_line(line), Some("Downloading.. 100% (ETA ?)".into()));
    }

    #[test]
    fn non_json_chatter_is_skipped() {
        assert_eq!(progress_line("[ExtractAudio] Destination: song.mp3"), None);
        assert_eq!(progress_line(""), None);
    }

    #[test]
    fn command_includes_format_and_output_template() {
        let cmd = downloader().command("https://example.com/v", Path::new("/tmp/staging"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"mp3".to_string()));
        assert!(args.contains(&"192K".to_string()));
        assert!(args.iter().any(|a| a.ends_with("%(title)s.%(ext)s")));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
    }

    #[test]
    fn command_passes_managed_ffmpeg_location() {
        let dl = YtDlpDownloader::new(
            &DownloadConfig::default(),
            Some(PathBuf::from("/work/ffmpeg")),
        );
        let cmd = dl.command("u", Path::new("/tmp/s"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let idx = args
            .iter()
            .position(|a| a == "--ffmpeg-location")
            .expect("flag present");
        assert_eq!(args[idx + 1], "/work/ffmpeg");
    }

    #[tokio::test]
    async fn missing_binary_surfaces_spawn_error() {
        let mut config = DownloadConfig::default();
        config.yt_dlp_bin = "/nonexistent/yt-dlp".into();
        let dl = YtDlpDownloader::new(&config, None);

        let dir = tempfile::tempdir().expect("temp dir");
        let sink = StatusSink::new();
        let err = dl
            .acquire("https://example.com", dir.path(), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, AcquireError::Spawn { .. }));
    }
}
