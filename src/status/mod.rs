//! Status reporting — a single-slot, last-write-wins text channel.
//!
//! [`StatusSink`] carries human-readable progress messages from background
//! jobs to the UI.  There is exactly one "current" message at any time and
//! no history: rapid interleaved writes overwrite each other, which is
//! acceptable for a status bar.
//!
//! Every acquisition/transcription call receives its own cloned handle
//! instead of writing to any process-global channel, so concurrent code
//! never races on shared stdout state.  Download progress callbacks run on
//! the worker thread and must only write to the sink — never touch UI
//! widgets — which the type enforces by construction.
//!
//! [`ProgressThrottle`] wraps a sink for high-frequency progress callbacks
//! (download percentage lines) and drops updates arriving faster than its
//! interval.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// StatusSink
// ---------------------------------------------------------------------------

/// Cloneable handle to the single status slot.
///
/// Cheap to clone (`Arc` clone); all clones share the same slot, so the
/// last write from any thread wins.  The UI reads [`current`](Self::current)
/// every frame.
#[derive(Debug, Clone, Default)]
pub struct StatusSink {
    slot: Arc<Mutex<String>>,
}

impl StatusSink {
    /// Create a sink with an empty current message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current message (last write wins).
    pub fn set(&self, text: impl Into<String>) {
        let text = text.into();
        log::debug!("status: {text}");
        *self.slot.lock().unwrap() = text;
    }

    /// Snapshot of the current message.
    pub fn current(&self) -> String {
        self.slot.lock().unwrap().clone()
    }

    /// Wrap this sink in a throttle for high-frequency progress updates.
    pub fn throttled(&self, min_interval: Duration) -> ProgressThrottle {
        ProgressThrottle {
            sink: self.clone(),
            min_interval,
            last_write: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressThrottle
// ---------------------------------------------------------------------------

/// Rate-limited writer over a [`StatusSink`].
///
/// The first write always goes through; subsequent writes within
/// `min_interval` of the previous accepted write are dropped.  Progress
/// callbacks fire many times per second during a download — the status bar
/// only needs a ~2 Hz cadence.
#[derive(Debug)]
pub struct ProgressThrottle {
    sink: StatusSink,
    min_interval: Duration,
    last_write: Option<Instant>,
}

impl ProgressThrottle {
    /// Write `text` unless a previous write happened within the interval.
    ///
    /// Returns `true` when the write was accepted.
    pub fn set(&mut self, text: impl Into<String>) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_write {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_write = Some(now);
        self.sink.set(text);
        true
    }

    /// Write `text` unconditionally (used for terminal messages like
    /// "download finished" that must not be dropped).
    pub fn force(&mut self, text: impl Into<String>) {
        self.last_write = Some(Instant::now());
        self.sink.set(text);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sink_is_empty() {
        let sink = StatusSink::new();
        assert_eq!(sink.current(), "");
    }

    #[test]
    fn last_write_wins() {
        let sink = StatusSink::new();
        sink.set("first");
        sink.set("second");
        assert_eq!(sink.current(), "second");
    }

    #[test]
    fn clones_share_the_same_slot() {
        let sink = StatusSink::new();
        let handle = sink.clone();

        handle.set("written via clone");
        assert_eq!(sink.current(), "written via clone");
    }

    #[test]
    fn sink_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StatusSink>();
    }

    #[test]
    fn throttle_accepts_first_write() {
        let sink = StatusSink::new();
        let mut throttle = sink.throttled(Duration::from_secs(60));

        assert!(throttle.set("12%"));
        assert_eq!(sink.current(), "12%");
    }

    #[test]
    fn throttle_drops_rapid_writes() {
        let sink = StatusSink::new();
        let mut throttle = sink.throttled(Duration::from_secs(60));

        assert!(throttle.set("12%"));
        assert!(!throttle.set("13%"));
        assert_eq!(sink.current(), "12%");
    }

    #[test]
    fn throttle_accepts_after_interval() {
        let sink = StatusSink::new();
        let mut throttle = sink.throttled(Duration::from_millis(0));

        assert!(throttle.set("12%"));
        assert!(throttle.set("13%"));
        assert_eq!(sink.current(), "13%");
    }

    #[test]
    fn force_bypasses_the_throttle() {
        let sink = StatusSink::new();
        let mut throttle = sink.throttled(Duration::from_secs(60));

        assert!(throttle.set("12%"));
        throttle.force("DL OK");
        assert_eq!(sink.current(), "DL OK");
    }
}
