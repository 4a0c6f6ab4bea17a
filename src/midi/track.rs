//! # MIDI Track Chunk Encoder
//!
//! Walks a track's musical content in performance order and emits a
//! byte-exact Standard MIDI File track chunk: the 4-byte `MTrk` tag, a
//! big-endian payload length, then a stream of delta-time-prefixed events
//! terminated by the end-of-track meta event.
//!
//! ## Encoder state
//! [`TrackEncoder`] is per-encode-session state: the output buffer, the
//! pending encoded delta-time, the ticks accumulated by rests and the
//! lazily-applied instrument change. One encoder is created per encode call
//! and consumed by [`TrackEncoder::into_bytes`], so independent tracks can
//! be encoded concurrently without any shared state.
//!
//! ## Delta-time discipline
//! Every event is prefixed by the current pending delta-time. Rest slots
//! never emit bytes; they accumulate ticks that the next sounding event's
//! prefix carries. Within a simultaneous group only the first note carries
//! the pending delta; the rest follow at delta 0, and the matching note-off
//! group mirrors the pattern.
//!
//! ## Tick resolution
//! Durations convert to ticks as `round((1/denominator) * 288)`: 288 ticks
//! per whole note, 72 per quarter.

use super::{keys, vlq};
use crate::containers::{Bar, Track};
use crate::error::CantusError;
use crate::note::{Instrument, Note, MAX_CHANNEL, MAX_DATA, REGISTER_SHIFT};

/// Ticks per whole note; a duration denominator `d` lasts `round(288/d)`.
pub const TICKS_PER_WHOLE_NOTE: u32 = 288;

const TRACK_TAG: &[u8; 4] = b"MTrk";
const END_OF_TRACK: [u8; 4] = [0x00, 0xff, 0x2f, 0x00];

const META: u8 = 0xff;
const META_TRACK_NAME: u8 = 0x03;
const META_SET_TEMPO: u8 = 0x51;
const META_TIME_SIGNATURE: u8 = 0x58;
const META_KEY_SIGNATURE: u8 = 0x59;

const NOTE_OFF: u8 = 0x8;
const NOTE_ON: u8 = 0x9;
const CONTROLLER: u8 = 0xb;
const PROGRAM_CHANGE: u8 = 0xc;

/// Bank select controller number.
const BANK_SELECT: u8 = 0x00;

/// Ticks for one duration denominator (4 = quarter note = 72 ticks).
pub fn duration_ticks(value: u32) -> u32 {
    ((1.0 / value as f64) * TICKS_PER_WHOLE_NOTE as f64).round() as u32
}

/// Stateful encoder for one MIDI track chunk.
///
/// # Example
/// ```
/// use cantus::midi::TrackEncoder;
/// use cantus::{Bar, Note, PitchedNote, Track};
///
/// let mut bar = Bar::new("C", (4, 4));
/// let c = Note::Pitched(PitchedNote::new(48, 0, 100).unwrap());
/// bar.place_notes(vec![c], 4).unwrap();
/// let mut track = Track::new(None, 120.0);
/// track.add_bar(bar);
///
/// let bytes = TrackEncoder::encode_track(&track).unwrap();
/// assert_eq!(&bytes[..4], b"MTrk");
/// ```
pub struct TrackEncoder {
    data: Vec<u8>,
    /// Encoded delta-time prefixed to the next emitted event.
    delta: Vec<u8>,
    /// Ticks accumulated by rest slots, not yet carried by an event.
    rest_ticks: u32,
    /// Instrument change applied lazily before the first note.
    pending_instrument: Option<Instrument>,
}

impl TrackEncoder {
    /// Start a track chunk at `bpm`; writes the initial tempo meta event.
    pub fn new(bpm: f64) -> Result<Self, CantusError> {
        let mut encoder = Self {
            data: Vec::new(),
            delta: vec![0x00],
            rest_ticks: 0,
            pending_instrument: None,
        };
        encoder.set_tempo(bpm)?;
        Ok(encoder)
    }

    /// Encode a whole track into a finished chunk.
    pub fn encode_track(track: &Track) -> Result<Vec<u8>, CantusError> {
        let mut encoder = Self::new(track.bpm)?;
        encoder.play_track(track)?;
        Ok(encoder.into_bytes())
    }

    /// Emit a track's name, instrument and bars in performance order.
    pub fn play_track(&mut self, track: &Track) -> Result<(), CantusError> {
        if let Some(name) = &track.name {
            self.set_track_name(name)?;
        }
        self.rest_ticks = 0;
        if let Some(instrument) = &track.instrument {
            self.pending_instrument = Some(instrument.clone());
        }
        for bar in track.bars() {
            self.play_bar(bar)?;
        }
        Ok(())
    }

    /// Emit one bar: its meter and key signature, then each slot.
    ///
    /// The time-signature event carries any delta pending from earlier
    /// rests; the key signature follows at delta 0. Rest slots accumulate
    /// ticks silently; a slot-level tempo change is emitted before its
    /// notes, carrying the pending rest delta so no time is lost.
    pub fn play_bar(&mut self, bar: &Bar) -> Result<(), CantusError> {
        self.set_delta(self.rest_ticks);
        self.rest_ticks = 0;
        self.set_meter(bar.meter)?;
        self.set_delta(0);
        self.set_key(&bar.key)?;
        for slot in bar.slots() {
            let tick = duration_ticks(slot.value);
            if let Some(bpm) = slot.tempo_change {
                self.set_delta(self.rest_ticks);
                self.rest_ticks = 0;
                self.set_tempo(bpm)?;
                self.set_delta(0);
            }
            if slot.notes.is_empty() {
                self.rest_ticks += tick;
            } else {
                self.set_delta(self.rest_ticks);
                self.rest_ticks = 0;
                self.play_notes(&slot.notes)?;
                self.set_delta(tick);
                self.stop_notes(&slot.notes)?;
            }
        }
        Ok(())
    }

    /// Note-on for a simultaneous group: the first note carries the pending
    /// delta (and triggers any lazy instrument setup), the rest follow at
    /// delta 0. An empty group emits nothing.
    fn play_notes(&mut self, notes: &[Note]) -> Result<(), CantusError> {
        let Some((first, rest)) = notes.split_first() else {
            return Ok(());
        };
        // Validate the whole group before the first byte so a bad note
        // cannot leave a half-written chord behind.
        for note in notes {
            Self::midi_key(note)?;
        }
        self.play_note(first)?;
        self.set_delta(0);
        for note in rest {
            self.play_note(note)?;
        }
        Ok(())
    }

    /// Note-off mirror of [`Self::play_notes`].
    fn stop_notes(&mut self, notes: &[Note]) -> Result<(), CantusError> {
        let Some((first, rest)) = notes.split_first() else {
            return Ok(());
        };
        for note in notes {
            Self::midi_key(note)?;
        }
        self.stop_note(first)?;
        self.set_delta(0);
        for note in rest {
            self.stop_note(note)?;
        }
        Ok(())
    }

    fn play_note(&mut self, note: &Note) -> Result<(), CantusError> {
        let key = Self::midi_key(note)?;
        if let Some(instrument) = self.pending_instrument.take() {
            self.set_instrument(note.channel(), &instrument)?;
        }
        self.channel_event(NOTE_ON, note.channel(), &[key, note.velocity()])
    }

    fn stop_note(&mut self, note: &Note) -> Result<(), CantusError> {
        let key = Self::midi_key(note)?;
        self.channel_event(NOTE_OFF, note.channel(), &[key, note.velocity()])
    }

    /// Bank select plus program change. Consumes the pending delta on the
    /// bank select; the program change and the following note-on land at
    /// delta 0, so the group's total delta stays intact.
    fn set_instrument(&mut self, channel: u8, instrument: &Instrument) -> Result<(), CantusError> {
        self.channel_event(CONTROLLER, channel, &[BANK_SELECT, instrument.bank])?;
        self.set_delta(0);
        self.channel_event(PROGRAM_CHANGE, channel, &[instrument.program])
    }

    /// Controller event, e.g. volume or sustain.
    pub fn controller(&mut self, channel: u8, control: u8, value: u8) -> Result<(), CantusError> {
        self.channel_event(CONTROLLER, channel, &[control, value])
    }

    /// Tempo meta event: 3-byte big-endian microseconds per quarter note,
    /// `60_000_000 / bpm` with integer division.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), CantusError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(CantusError::BadTempo(bpm));
        }
        let mpqn = (60_000_000.0 / bpm) as u32;
        if mpqn > 0x00ff_ffff {
            return Err(CantusError::BadTempo(bpm));
        }
        let bytes = mpqn.to_be_bytes();
        self.meta_event(META_SET_TEMPO, &bytes[1..4]);
        Ok(())
    }

    /// Time-signature meta event: numerator, log2(denominator), then the
    /// fixed clock and metronome bytes.
    pub fn set_meter(&mut self, meter: (u8, u8)) -> Result<(), CantusError> {
        let (numerator, denominator) = meter;
        if denominator == 0 || !denominator.is_power_of_two() {
            return Err(CantusError::BadMeter(denominator));
        }
        let exponent = denominator.trailing_zeros() as u8;
        self.meta_event(META_TIME_SIGNATURE, &[numerator, exponent, 0x18, 0x08]);
        Ok(())
    }

    /// Key-signature meta event: signed accidental count plus mode byte.
    pub fn set_key(&mut self, key: &str) -> Result<(), CantusError> {
        let (fifths, mode) = keys::signature(key)
            .ok_or_else(|| CantusError::UnknownKey(key.to_string()))?;
        self.meta_event(META_KEY_SIGNATURE, &[fifths as u8, mode as u8]);
        Ok(())
    }

    /// Track-name meta event, always at delta 0.
    pub fn set_track_name(&mut self, name: &str) -> Result<(), CantusError> {
        if !name.is_ascii() {
            return Err(CantusError::NonAsciiTrackName(name.to_string()));
        }
        self.data.push(0x00);
        self.data.push(META);
        self.data.push(META_TRACK_NAME);
        self.data.extend_from_slice(&vlq::encode(name.len() as u32));
        self.data.extend_from_slice(name.as_bytes());
        Ok(())
    }

    /// Set the delta-time prefixed to the next event.
    fn set_delta(&mut self, ticks: u32) {
        self.delta = vlq::encode(ticks);
    }

    /// Channel event: status byte `(type << 4) | channel` plus data bytes.
    /// Everything is validated before the first byte is written.
    fn channel_event(
        &mut self,
        event_type: u8,
        channel: u8,
        params: &[u8],
    ) -> Result<(), CantusError> {
        if channel > MAX_CHANNEL {
            return Err(CantusError::OutOfRange {
                field: "channel",
                value: channel as u32,
                max: MAX_CHANNEL as u32,
            });
        }
        for &param in params {
            if param > MAX_DATA {
                return Err(CantusError::OutOfRange {
                    field: "data byte",
                    value: param as u32,
                    max: MAX_DATA as u32,
                });
            }
        }
        self.data.extend_from_slice(&self.delta);
        self.data.push((event_type << 4) | channel);
        self.data.extend_from_slice(params);
        Ok(())
    }

    fn meta_event(&mut self, meta_type: u8, payload: &[u8]) {
        self.data.extend_from_slice(&self.delta);
        self.data.push(META);
        self.data.push(meta_type);
        self.data.extend_from_slice(&vlq::encode(payload.len() as u32));
        self.data.extend_from_slice(payload);
    }

    /// The MIDI key number after the fixed register shift.
    fn midi_key(note: &Note) -> Result<u8, CantusError> {
        let raw = note.pitch_or_key() as u32 + REGISTER_SHIFT as u32;
        if raw > MAX_DATA as u32 {
            return Err(CantusError::OutOfRange {
                field: "midi key",
                value: raw,
                max: MAX_DATA as u32,
            });
        }
        Ok(raw as u8)
    }

    /// Finish the chunk: tag, big-endian payload length, payload,
    /// end-of-track meta event.
    pub fn into_bytes(self) -> Vec<u8> {
        let payload_len = (self.data.len() + END_OF_TRACK.len()) as u32;
        let mut out = Vec::with_capacity(self.data.len() + 12);
        out.extend_from_slice(TRACK_TAG);
        out.extend_from_slice(&payload_len.to_be_bytes());
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&END_OF_TRACK);
        out
    }

    #[cfg(test)]
    fn payload(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{PercussionNote, PitchedNote};

    fn pitched(pitch: u8, channel: u8, velocity: u8) -> Note {
        Note::Pitched(PitchedNote::new(pitch, channel, velocity).unwrap())
    }

    #[test]
    fn quarter_note_ticks() {
        assert_eq!(duration_ticks(1), 288);
        assert_eq!(duration_ticks(2), 144);
        assert_eq!(duration_ticks(4), 72);
        assert_eq!(duration_ticks(8), 36);
    }

    #[test]
    fn new_writes_tempo_meta_event() {
        let encoder = TrackEncoder::new(120.0).unwrap();
        // 60_000_000 / 120 = 500_000 = 0x07a120
        assert_eq!(encoder.payload(), &[0x00, 0xff, 0x51, 0x03, 0x07, 0xa1, 0x20]);
    }

    #[test]
    fn tempo_rejects_non_positive_bpm() {
        assert!(TrackEncoder::new(0.0).is_err());
        assert!(TrackEncoder::new(-10.0).is_err());
        assert!(TrackEncoder::new(f64::NAN).is_err());
    }

    #[test]
    fn meter_event_bytes() {
        let mut encoder = TrackEncoder::new(120.0).unwrap();
        let before = encoder.payload().len();
        encoder.set_meter((6, 8)).unwrap();
        assert_eq!(
            &encoder.payload()[before..],
            &[0x00, 0xff, 0x58, 0x04, 0x06, 0x03, 0x18, 0x08]
        );
    }

    #[test]
    fn meter_rejects_non_power_of_two_denominator() {
        let mut encoder = TrackEncoder::new(120.0).unwrap();
        let before = encoder.payload().len();
        assert!(matches!(
            encoder.set_meter((4, 6)),
            Err(CantusError::BadMeter(6))
        ));
        // nothing was written
        assert_eq!(encoder.payload().len(), before);
    }

    #[test]
    fn key_signature_bytes() {
        let mut encoder = TrackEncoder::new(120.0).unwrap();
        let before = encoder.payload().len();
        encoder.set_key("F").unwrap();
        // one flat: 0xff, major mode
        assert_eq!(&encoder.payload()[before..], &[0x00, 0xff, 0x59, 0x02, 0xff, 0x00]);

        let before = encoder.payload().len();
        encoder.set_key("e").unwrap();
        // one sharp, minor mode
        assert_eq!(&encoder.payload()[before..], &[0x00, 0xff, 0x59, 0x02, 0x01, 0x01]);
    }

    #[test]
    fn unknown_key_writes_nothing() {
        let mut encoder = TrackEncoder::new(120.0).unwrap();
        let before = encoder.payload().len();
        assert!(matches!(
            encoder.set_key("H"),
            Err(CantusError::UnknownKey(_))
        ));
        assert_eq!(encoder.payload().len(), before);
    }

    #[test]
    fn track_name_event_bytes() {
        let mut encoder = TrackEncoder::new(120.0).unwrap();
        let before = encoder.payload().len();
        encoder.set_track_name("Lead").unwrap();
        assert_eq!(
            &encoder.payload()[before..],
            &[0x00, 0xff, 0x03, 0x04, b'L', b'e', b'a', b'd']
        );
        assert!(encoder.set_track_name("Solistin Ä").is_err());
    }

    #[test]
    fn single_quarter_note_stream() {
        let mut bar = Bar::new("C", (4, 4));
        bar.place_notes(vec![pitched(48, 0, 100)], 4).unwrap();
        bar.place_rest(4).unwrap();
        bar.place_rest(2).unwrap();
        let mut track = Track::new(None, 120.0);
        track.add_bar(bar);

        let bytes = TrackEncoder::encode_track(&track).unwrap();
        assert_eq!(&bytes[..4], b"MTrk");
        let payload_len = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
        assert_eq!(payload_len, bytes.len() - 8);
        let payload = &bytes[8..];

        let expected: Vec<u8> = [
            // tempo 120 bpm
            &[0x00, 0xff, 0x51, 0x03, 0x07, 0xa1, 0x20][..],
            // 4/4 meter
            &[0x00, 0xff, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08],
            // C major
            &[0x00, 0xff, 0x59, 0x02, 0x00, 0x00],
            // note on: pitch 48 + register shift = 0x3c
            &[0x00, 0x90, 0x3c, 0x64],
            // note off after one quarter (72 ticks)
            &[0x48, 0x80, 0x3c, 0x64],
            // trailing rests emit nothing; end of track
            &[0x00, 0xff, 0x2f, 0x00],
        ]
        .concat();
        assert_eq!(payload, expected.as_slice());
    }

    #[test]
    fn rest_accumulates_into_next_note_delta() {
        let mut bar = Bar::new("C", (4, 4));
        bar.place_rest(4).unwrap();
        bar.place_rest(4).unwrap();
        bar.place_notes(vec![pitched(50, 0, 80)], 4).unwrap();
        let mut track = Track::new(None, 120.0);
        track.add_bar(bar);

        let mut encoder = TrackEncoder::new(track.bpm).unwrap();
        encoder.play_track(&track).unwrap();
        let payload = encoder.payload().to_vec();
        // two quarter rests = 144 ticks = VLQ [0x81, 0x10] before the note on
        let needle = [0x81, 0x10, 0x90, 0x3e, 0x50];
        assert!(
            payload.windows(needle.len()).any(|w| w == needle),
            "note on should carry the accumulated rest delta: {payload:02x?}"
        );
    }

    #[test]
    fn chord_first_note_carries_delta_rest_at_zero() {
        let mut bar = Bar::new("C", (4, 4));
        bar.place_rest(4).unwrap();
        bar.place_notes(
            vec![pitched(48, 0, 100), pitched(52, 0, 100), pitched(55, 0, 100)],
            4,
        )
        .unwrap();
        let mut track = Track::new(None, 120.0);
        track.add_bar(bar);

        let mut encoder = TrackEncoder::new(track.bpm).unwrap();
        encoder.play_track(&track).unwrap();
        let payload = encoder.payload().to_vec();

        let expected_tail: Vec<u8> = [
            // note-on group: first carries the 72-tick rest delta
            &[0x48, 0x90, 0x3c, 0x64][..],
            &[0x00, 0x90, 0x40, 0x64],
            &[0x00, 0x90, 0x43, 0x64],
            // note-off group: first carries the chord duration
            &[0x48, 0x80, 0x3c, 0x64],
            &[0x00, 0x80, 0x40, 0x64],
            &[0x00, 0x80, 0x43, 0x64],
        ]
        .concat();
        assert!(payload.ends_with(&expected_tail), "payload: {payload:02x?}");
    }

    #[test]
    fn pending_instrument_precedes_first_note_only() {
        let mut bar = Bar::new("C", (4, 4));
        bar.place_notes(vec![pitched(48, 2, 100)], 4).unwrap();
        bar.place_notes(vec![pitched(50, 2, 100)], 4).unwrap();
        let mut track = Track::new(Some(Instrument::with_bank(24, 1).unwrap()), 120.0);
        track.add_bar(bar);

        let mut encoder = TrackEncoder::new(track.bpm).unwrap();
        encoder.play_track(&track).unwrap();
        let payload = encoder.payload().to_vec();

        // bank select on channel 2, then program change, then the note
        let setup = [0x00, 0xb2, 0x00, 0x01, 0x00, 0xc2, 0x18, 0x00, 0x92, 0x3c, 0x64];
        assert!(
            payload.windows(setup.len()).any(|w| w == setup),
            "instrument setup missing: {payload:02x?}"
        );
        // exactly one program change
        let count = payload.windows(2).filter(|w| w[0] == 0x00 && w[1] == 0xc2).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn slot_tempo_change_carries_pending_rest_delta() {
        let mut bar = Bar::new("C", (4, 4));
        bar.place_rest(4).unwrap();
        bar.place_notes_with_tempo(vec![pitched(48, 0, 100)], 4, 60.0)
            .unwrap();
        let mut track = Track::new(None, 120.0);
        track.add_bar(bar);

        let mut encoder = TrackEncoder::new(track.bpm).unwrap();
        encoder.play_track(&track).unwrap();
        let payload = encoder.payload().to_vec();

        // tempo meta (60 bpm = 1_000_000 us = 0x0f4240) prefixed by 72 ticks,
        // then the note at delta 0
        let needle = [0x48, 0xff, 0x51, 0x03, 0x0f, 0x42, 0x40, 0x00, 0x90, 0x3c, 0x64];
        assert!(
            payload.windows(needle.len()).any(|w| w == needle),
            "tempo change should carry the rest delta: {payload:02x?}"
        );
    }

    #[test]
    fn percussion_key_past_register_shift_fails_before_writing() {
        let hit = Note::Percussion(PercussionNote::new(120, 9, 100, None).unwrap());
        let mut bar = Bar::new("C", (4, 4));
        bar.place_notes(vec![hit], 4).unwrap();
        let mut track = Track::new(None, 120.0);
        track.add_bar(bar);

        let mut encoder = TrackEncoder::new(track.bpm).unwrap();
        let before = encoder.payload().len();
        let meta_len = {
            // meter + key are emitted before the slot fails
            let mut probe = TrackEncoder::new(120.0).unwrap();
            probe.set_meter((4, 4)).unwrap();
            probe.set_key("C").unwrap();
            probe.payload().len() - before
        };
        assert!(encoder.play_track(&track).is_err());
        // the failing note group left no partial event bytes
        assert_eq!(encoder.payload().len(), before + meta_len);
    }
}
