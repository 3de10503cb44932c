//! MIDI file output — note events to a Standard MIDI File.
//!
//! The engine's postprocessing yields [`NoteEvent`]s in absolute seconds;
//! this module encodes them as a single-track SMF with a fixed 120 BPM
//! tempo map, and owns the output-path bookkeeping (`song.mp3` →
//! `results/song.midi`).

use std::collections::BinaryHeap;
use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use midly::num::{u15, u24, u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
};

// ---------------------------------------------------------------------------
// NoteEvent
// ---------------------------------------------------------------------------

/// One transcribed piano note in absolute time.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// MIDI note number (21..=108 for the 88 piano keys).
    pub pitch: u8,
    /// Note start in seconds from the beginning of the audio.
    pub onset_secs: f32,
    /// Note end in seconds; always `>= onset_secs`.
    pub offset_secs: f32,
    /// MIDI velocity (1..=127).
    pub velocity: u8,
}

// ---------------------------------------------------------------------------
// Timing parameters
// ---------------------------------------------------------------------------

/// Pulses per quarter note written into the SMF header.
const PPQ: u16 = 480;

/// Tempo meta event: 500 000 µs per quarter note = 120 BPM.
const TEMPO_USPQ: u32 = 500_000;

/// Ticks per second at the fixed tempo (PPQ * 1e6 / TEMPO_USPQ).
const TICKS_PER_SECOND: f64 = PPQ as f64 * 1_000_000.0 / TEMPO_USPQ as f64;

fn secs_to_ticks(secs: f32) -> u32 {
    (secs.max(0.0) as f64 * TICKS_PER_SECOND).round() as u32
}

// ---------------------------------------------------------------------------
// midi_output_path
// ---------------------------------------------------------------------------

/// Compute the MIDI destination for `input`: the input's file name with its
/// extension replaced by `midi`, placed in `results_dir`.
///
/// Independent of platform path separators — only the final path component
/// of `input` matters.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use piano_to_midi::transcribe::midi_output_path;
///
/// let out = midi_output_path(Path::new("downloads/song.mp3"), Path::new("results"));
/// assert_eq!(out, Path::new("results/song.midi"));
/// ```
pub fn midi_output_path(input: &Path, results_dir: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("output"));
    results_dir.join(file_name).with_extension("midi")
}

// ---------------------------------------------------------------------------
// write_midi
// ---------------------------------------------------------------------------

/// Encode `events` as a single-track Standard MIDI File at `path`.
///
/// Events may arrive in any order; note-offs are emitted before note-ons
/// that fall on the same tick so re-struck notes are never swallowed.
pub fn write_midi(events: &[NoteEvent], path: &Path) -> std::io::Result<()> {
    // (tick, is_note_on, pitch, velocity); Reverse for a min-heap ordered by
    // tick, with note-off (false) sorting before note-on at the same tick.
    let mut heap: BinaryHeap<Reverse<(u32, bool, u8, u8)>> = BinaryHeap::new();

    for ev in events {
        let on_tick = secs_to_ticks(ev.onset_secs);
        let off_tick = secs_to_ticks(ev.offset_secs).max(on_tick + 1);
        heap.push(Reverse((on_tick, true, ev.pitch, ev.velocity)));
        heap.push(Reverse((off_tick, false, ev.pitch, 0)));
    }

    let mut track: Vec<TrackEvent> = Vec::with_capacity(events.len() * 2 + 2);
    track.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(TEMPO_USPQ))),
    });

    let mut current_tick = 0u32;
    while let Some(Reverse((tick, is_on, pitch, velocity))) = heap.pop() {
        let delta = tick - current_tick;
        current_tick = tick;

        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::from(pitch.min(127)),
                vel: u7::from(velocity.clamp(1, 127)),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::from(pitch.min(127)),
                vel: u7::from(0),
            }
        };

        track.push(TrackEvent {
            delta: u28::from(delta),
            kind: TrackEventKind::Midi {
                channel: u4::from(0),
                message,
            },
        });
    }

    track.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(u15::from(PPQ)),
        },
        tracks: vec![track],
    };

    smf.save(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- midi_output_path --------------------------------------------------

    #[test]
    fn output_path_replaces_extension_with_midi() {
        let out = midi_output_path(Path::new("song.mp3"), Path::new("results"));
        assert_eq!(out, Path::new("results/song.midi"));
    }

    #[test]
    fn output_path_uses_only_the_file_name() {
        let out = midi_output_path(
            Path::new("/some/deep/dir/sonata.wav"),
            Path::new("/work/results"),
        );
        assert_eq!(out, Path::new("/work/results/sonata.midi"));
    }

    #[test]
    fn output_path_handles_multi_dot_names() {
        let out = midi_output_path(Path::new("my.track.m4a"), Path::new("results"));
        assert_eq!(out, Path::new("results/my.track.midi"));
    }

    // ---- write_midi --------------------------------------------------------

    fn note(pitch: u8, onset: f32, offset: f32, velocity: u8) -> NoteEvent {
        NoteEvent {
            pitch,
            onset_secs: onset,
            offset_secs: offset,
            velocity,
        }
    }

    #[test]
    fn written_file_parses_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.midi");

        let events = vec![note(60, 0.0, 0.5, 80), note(64, 0.25, 1.0, 90)];
        write_midi(&events, &path).expect("write");

        let bytes = std::fs::read(&path).expect("read back");
        let smf = Smf::parse(&bytes).expect("valid SMF");
        assert_eq!(smf.tracks.len(), 1);

        // 2 notes * (on + off) + tempo + end-of-track
        assert_eq!(smf.tracks[0].len(), 6);
    }

    #[test]
    fn note_off_precedes_note_on_at_same_tick() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("restruck.midi");

        // Same key released and re-struck at t = 0.5 s.
        let events = vec![note(60, 0.0, 0.5, 80), note(60, 0.5, 1.0, 80)];
        write_midi(&events, &path).expect("write");

        let bytes = std::fs::read(&path).expect("read back");
        let smf = Smf::parse(&bytes).expect("valid SMF");

        let kinds: Vec<bool> = smf.tracks[0]
            .iter()
            .filter_map(|ev| match ev.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { .. },
                    ..
                } => Some(true),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { .. },
                    ..
                } => Some(false),
                _ => None,
            })
            .collect();

        // on(0.0), off(0.5), on(0.5), off(1.0)
        assert_eq!(kinds, vec![true, false, true, false]);
    }

    #[test]
    fn zero_length_note_still_gets_a_positive_duration() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tiny.midi");

        write_midi(&[note(72, 1.0, 1.0, 64)], &path).expect("write");

        let bytes = std::fs::read(&path).expect("read back");
        let smf = Smf::parse(&bytes).expect("valid SMF");
        // tempo + on + off + end-of-track
        assert_eq!(smf.tracks[0].len(), 4);
    }

    #[test]
    fn empty_event_list_writes_a_valid_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("empty.midi");

        write_midi(&[], &path).expect("write");

        let bytes = std::fs::read(&path).expect("read back");
        let smf = Smf::parse(&bytes).expect("valid SMF");
        assert_eq!(smf.tracks[0].len(), 2); // tempo + end-of-track
    }
}
