//! # Score and Events
//!
//! The score is the common intermediate representation shared by the MIDI
//! byte encoder, the playback driver and the persistence adapter: an ordered
//! mapping from milliseconds-since-start to the events that fire at that
//! instant.
//!
//! ## Ordering guarantees
//! - Timestamps iterate in ascending order (the map is a `BTreeMap`).
//! - Events sharing a timestamp keep their insertion order.
//! - The score is append-only: nothing removes or reorders a recorded event.
//!
//! ## Event schema
//! Events serialize with a `func` discriminator (`start_note`, `end_note`,
//! `control_change`), which is the schema the snapshot document uses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CantusError;
use crate::note::{Control, Instrument, Note, MAX_CHANNEL, MAX_DATA};

/// A discrete musical event at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "func", rename_all = "snake_case")]
pub enum Event {
    StartNote {
        channel: u8,
        note: Note,
        velocity: u8,
    },
    EndNote {
        channel: u8,
        note: Note,
    },
    ControlChange {
        channel: u8,
        control: Control,
        value: u8,
    },
}

impl Event {
    /// Begin sounding `note` on `channel` at `velocity`.
    ///
    /// Fails on an out-of-range channel or velocity before any event exists,
    /// so nothing malformed can ever reach a score or an output buffer.
    pub fn start_note(note: Note, channel: u8, velocity: u8) -> Result<Self, CantusError> {
        if channel > MAX_CHANNEL {
            return Err(CantusError::OutOfRange {
                field: "channel",
                value: channel as u32,
                max: MAX_CHANNEL as u32,
            });
        }
        if velocity > MAX_DATA {
            return Err(CantusError::OutOfRange {
                field: "velocity",
                value: velocity as u32,
                max: MAX_DATA as u32,
            });
        }
        Ok(Event::StartNote {
            channel,
            note,
            velocity,
        })
    }

    /// Stop sounding `note` on `channel`.
    pub fn end_note(note: Note, channel: u8) -> Result<Self, CantusError> {
        if channel > MAX_CHANNEL {
            return Err(CantusError::OutOfRange {
                field: "channel",
                value: channel as u32,
                max: MAX_CHANNEL as u32,
            });
        }
        Ok(Event::EndNote { channel, note })
    }

    /// Set controller `control` to `value` on `channel`.
    pub fn control_change(channel: u8, control: Control, value: u8) -> Result<Self, CantusError> {
        if channel > MAX_CHANNEL {
            return Err(CantusError::OutOfRange {
                field: "channel",
                value: channel as u32,
                max: MAX_CHANNEL as u32,
            });
        }
        if value > MAX_DATA {
            return Err(CantusError::OutOfRange {
                field: "value",
                value: value as u32,
                max: MAX_DATA as u32,
            });
        }
        Ok(Event::ControlChange {
            channel,
            control,
            value,
        })
    }
}

/// Pairs a channel with the instrument that should be programmed on it
/// before playback or serialization starts.
///
/// Serialized as the `[channel, instrument]` pair of the snapshot schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "(u8, Instrument)", from = "(u8, Instrument)")]
pub struct InstrumentAssignment {
    pub channel: u8,
    pub instrument: Instrument,
}

impl From<InstrumentAssignment> for (u8, Instrument) {
    fn from(a: InstrumentAssignment) -> Self {
        (a.channel, a.instrument)
    }
}

impl From<(u8, Instrument)> for InstrumentAssignment {
    fn from((channel, instrument): (u8, Instrument)) -> Self {
        Self {
            channel,
            instrument,
        }
    }
}

/// Ordered mapping from milliseconds-since-start to the events firing then.
///
/// Mutable only through [`Score::record`]; negative timestamps are
/// unrepresentable by construction (keys are `u64`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    buckets: BTreeMap<u64, Vec<Event>>,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event` to the bucket at `time_ms`, creating it if absent.
    ///
    /// Insertion order within the bucket is preserved; chords are recorded
    /// as consecutive events at the same timestamp.
    pub fn record(&mut self, time_ms: u64, event: Event) {
        self.buckets.entry(time_ms).or_default().push(event);
    }

    /// Timestamp buckets in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[Event])> {
        self.buckets.iter().map(|(t, evs)| (*t, evs.as_slice()))
    }

    /// Number of timestamp buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Milliseconds of the last bucket, if any.
    pub fn end_ms(&self) -> Option<u64> {
        self.buckets.keys().next_back().copied()
    }

    pub(crate) fn buckets(&self) -> &BTreeMap<u64, Vec<Event>> {
        &self.buckets
    }

    pub(crate) fn from_buckets(buckets: BTreeMap<u64, Vec<Event>>) -> Self {
        Self { buckets }
    }
}

/// Convert a beat position (quarter-note beats) at `bpm` to milliseconds.
///
/// Computes `round(beat / bpm * 60000)`. Rejects negative or non-finite
/// beats and non-positive tempos before anything is recorded.
pub fn beat_to_ms(beat: f64, bpm: f64) -> Result<u64, CantusError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(CantusError::BadTempo(bpm));
    }
    if !beat.is_finite() || beat < 0.0 {
        return Err(CantusError::BadBeat(beat));
    }
    Ok((beat / bpm * 60000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::PitchedNote;

    fn note(pitch: u8) -> Note {
        Note::Pitched(PitchedNote::new(pitch, 0, 100).unwrap())
    }

    #[test]
    fn record_preserves_insertion_order_within_bucket() {
        let mut score = Score::new();
        for pitch in [48, 52, 55] {
            score.record(500, Event::start_note(note(pitch), 0, 100).unwrap());
        }
        let (t, events) = score.iter().next().unwrap();
        assert_eq!(t, 500);
        let pitches: Vec<u8> = events
            .iter()
            .map(|e| match e {
                Event::StartNote { note, .. } => note.pitch_or_key(),
                _ => panic!("expected start_note"),
            })
            .collect();
        assert_eq!(pitches, vec![48, 52, 55]);
    }

    #[test]
    fn buckets_iterate_in_ascending_time_order() {
        let mut score = Score::new();
        score.record(1000, Event::end_note(note(48), 0).unwrap());
        score.record(0, Event::start_note(note(48), 0, 100).unwrap());
        score.record(500, Event::control_change(0, Control::Volume, 90).unwrap());
        let times: Vec<u64> = score.iter().map(|(t, _)| t).collect();
        assert_eq!(times, vec![0, 500, 1000]);
        assert_eq!(score.end_ms(), Some(1000));
    }

    #[test]
    fn event_constructors_reject_out_of_range_values() {
        assert!(Event::start_note(note(48), 16, 100).is_err());
        assert!(Event::start_note(note(48), 0, 200).is_err());
        assert!(Event::control_change(0, Control::Volume, 128).is_err());
        assert!(Event::end_note(note(48), 16).is_err());
    }

    #[test]
    fn beat_to_ms_uses_schedule_rounding() {
        // One quarter beat at 120 bpm is half a second.
        assert_eq!(beat_to_ms(1.0, 120.0).unwrap(), 500);
        assert_eq!(beat_to_ms(0.0, 120.0).unwrap(), 0);
        // 1 beat at 96 bpm = 625 ms exactly
        assert_eq!(beat_to_ms(1.0, 96.0).unwrap(), 625);
        assert!(beat_to_ms(-1.0, 120.0).is_err());
        assert!(beat_to_ms(1.0, 0.0).is_err());
        assert!(beat_to_ms(f64::NAN, 120.0).is_err());
    }
}
