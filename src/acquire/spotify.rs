//! Spotify URL acquisition via `spotdl`.
//!
//! spotdl resolves the Spotify metadata, finds a matching audio source and
//! transcodes to the configured container.  Its stdout is conversational
//! ("Found 1 song", "Downloaded …"), so lines are forwarded to the status
//! sink as-is, throttled.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::DownloadConfig;
use crate::status::StatusSink;

use super::{
    newest_audio_file, run_streaming, AcquireError, AcquiredAudio, AcquisitionStrategy,
    PROGRESS_INTERVAL,
};

// ---------------------------------------------------------------------------
// SpotifyDownloader
// ---------------------------------------------------------------------------

/// [`AcquisitionStrategy`] backed by the `spotdl` executable.
#[derive(Debug, Clone)]
pub struct SpotifyDownloader {
    bin: String,
    audio_format: String,
}

impl SpotifyDownloader {
    /// Build from the download config.
    pub fn new(config: &DownloadConfig) -> Self {
        Self {
            bin: config.spotdl_bin.clone(),
            audio_format: config.audio_format.clone(),
        }
    }

    fn command(&self, url: &str, staging: &Path) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("download")
            .arg(url)
            .arg("--format")
            .arg(&self.audio_format)
            .arg("--output")
            .arg(staging.join("{title}.{output-ext}"));
        cmd
    }
}

#[async_trait]
impl AcquisitionStrategy for SpotifyDownloader {
    fn name(&self) -> &'static str {
        "spotdl"
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
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                throttle.set(trimmed.to_string());
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

    #[test]
    fn command_is_a_download_invocation() {
        let dl = SpotifyDownloader::new(&DownloadConfig::default());
        let cmd = dl.command("https://open.spotify.com/track/abc", Path::new("/tmp/s"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args[0], "download");
        assert_eq!(args[1], "https://open.spotify.com/track/abc");
        assert!(args.contains(&"mp3".to_string()));
        assert!(args.iter().any(|a| a.ends_with("{title}.{output-ext}")));
    }

    #[tokio::test]
    async fn missing_binary_surfaces_spawn_error() {
        let mut config = DownloadConfig::default();
        config.spotdl_bin = "/nonexistent/spotdl".into();
        let dl = SpotifyDownloader::new(&config);

        let dir = tempfile::tempdir().expect("temp dir");
        let sink = StatusSink::new();
        let err = dl
            .acquire("https://open.spotify.com/track/abc", dir.path(), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, AcquireError::Spawn { .. }));
    }
}
