//! # Note Model
//!
//! Value types consumed by the score builder and the encoders: pitched and
//! percussion notes, instrument descriptors and MIDI controller identifiers.
//!
//! Note-name parsing and interval arithmetic live outside this crate; notes
//! enter the core as integer pitch values where 0 is C in octave 0 (so
//! middle C, C-4, is pitch 48).
//!
//! All constructors validate their MIDI ranges up front. Nothing in this
//! crate clamps: an out-of-range channel or velocity is an error, never a
//! coerced value.

use serde::{Deserialize, Serialize};

use crate::error::CantusError;

/// Highest valid MIDI channel.
pub const MAX_CHANNEL: u8 = 15;
/// Highest valid MIDI data byte (velocity, controller value, key number).
pub const MAX_DATA: u8 = 127;
/// Register shift applied by the track encoder: pitch 0 (C-0) lands on MIDI
/// key 12.
pub const REGISTER_SHIFT: u8 = 12;

fn check(field: &'static str, value: u8, max: u8) -> Result<(), CantusError> {
    if value > max {
        return Err(CantusError::OutOfRange {
            field,
            value: value as u32,
            max: max as u32,
        });
    }
    Ok(())
}

/// A melodic note: integer pitch plus per-note channel and velocity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchedNote {
    pub pitch: u8,
    pub channel: u8,
    pub velocity: u8,
}

impl PitchedNote {
    /// Create a pitched note.
    ///
    /// `pitch` 0 is C-0; 48 is middle C. The maximum is 115 so that the
    /// encoder's fixed register shift of 12 still fits in a data byte.
    ///
    /// # Example
    /// ```
    /// use cantus::PitchedNote;
    ///
    /// let middle_c = PitchedNote::new(48, 0, 100).unwrap();
    /// assert_eq!(middle_c.pitch, 48);
    /// assert!(PitchedNote::new(48, 16, 100).is_err()); // channel out of range
    /// ```
    pub fn new(pitch: u8, channel: u8, velocity: u8) -> Result<Self, CantusError> {
        check("pitch", pitch, MAX_DATA - REGISTER_SHIFT)?;
        check("channel", channel, MAX_CHANNEL)?;
        check("velocity", velocity, MAX_DATA)?;
        Ok(Self {
            pitch,
            channel,
            velocity,
        })
    }
}

/// A percussion hit: a key number on the percussion map instead of a pitch.
///
/// `duration_ms` optionally caps how long the hit sounds. Some percussion
/// voices ring until damped (a triangle, an open hi-hat); a cap schedules the
/// note-off early even when the containing slot lasts longer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercussionNote {
    pub key: u8,
    pub channel: u8,
    pub velocity: u8,
    pub duration_ms: Option<u64>,
}

impl PercussionNote {
    pub fn new(
        key: u8,
        channel: u8,
        velocity: u8,
        duration_ms: Option<u64>,
    ) -> Result<Self, CantusError> {
        check("key", key, MAX_DATA)?;
        check("channel", channel, MAX_CHANNEL)?;
        check("velocity", velocity, MAX_DATA)?;
        Ok(Self {
            key,
            channel,
            velocity,
            duration_ms,
        })
    }
}

/// Either kind of note. The playback driver dispatches percussion notes
/// through a distinct sink capability, so the distinction survives all the
/// way to the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Note {
    Pitched(PitchedNote),
    Percussion(PercussionNote),
}

impl Note {
    pub fn channel(&self) -> u8 {
        match self {
            Note::Pitched(n) => n.channel,
            Note::Percussion(n) => n.channel,
        }
    }

    pub fn velocity(&self) -> u8 {
        match self {
            Note::Pitched(n) => n.velocity,
            Note::Percussion(n) => n.velocity,
        }
    }

    /// The raw pitch or key number, before any register shift.
    pub fn pitch_or_key(&self) -> u8 {
        match self {
            Note::Pitched(n) => n.pitch,
            Note::Percussion(n) => n.key,
        }
    }
}

impl From<PitchedNote> for Note {
    fn from(n: PitchedNote) -> Self {
        Note::Pitched(n)
    }
}

impl From<PercussionNote> for Note {
    fn from(n: PercussionNote) -> Self {
        Note::Percussion(n)
    }
}

/// Instrument descriptor: a General MIDI program number plus a bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub program: u8,
    pub bank: u8,
}

impl Instrument {
    /// Instrument on the default bank 1.
    pub fn new(program: u8) -> Result<Self, CantusError> {
        Self::with_bank(program, 1)
    }

    pub fn with_bank(program: u8, bank: u8) -> Result<Self, CantusError> {
        check("program", program, MAX_DATA)?;
        check("bank", bank, MAX_DATA)?;
        Ok(Self { program, bank })
    }
}

/// MIDI controller identifiers.
///
/// The named variants cover the controllers the sequencer exposes directly;
/// `Raw` carries any other controller number. Serialized as the bare
/// controller number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum Control {
    Vibrato,
    Volume,
    Pan,
    Expression,
    Sustain,
    Reverb,
    Chorus,
    Raw(u8),
}

impl Control {
    /// The MIDI controller number.
    pub fn number(self) -> u8 {
        match self {
            Control::Vibrato => 1,
            Control::Volume => 7,
            Control::Pan => 10,
            Control::Expression => 11,
            Control::Sustain => 64,
            Control::Reverb => 91,
            Control::Chorus => 93,
            Control::Raw(n) => n,
        }
    }
}

impl From<Control> for u8 {
    fn from(c: Control) -> Self {
        c.number()
    }
}

impl From<u8> for Control {
    fn from(n: u8) -> Self {
        match n {
            1 => Control::Vibrato,
            7 => Control::Volume,
            10 => Control::Pan,
            11 => Control::Expression,
            64 => Control::Sustain,
            91 => Control::Reverb,
            93 => Control::Chorus,
            other => Control::Raw(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitched_note_validates_ranges() {
        assert!(PitchedNote::new(48, 0, 100).is_ok());
        assert!(PitchedNote::new(116, 0, 100).is_err()); // would overflow after register shift
        assert!(PitchedNote::new(48, 16, 100).is_err());
        assert!(PitchedNote::new(48, 0, 128).is_err());
    }

    #[test]
    fn percussion_note_validates_ranges() {
        assert!(PercussionNote::new(35, 9, 100, None).is_ok());
        assert!(PercussionNote::new(128, 9, 100, None).is_err());
        assert!(PercussionNote::new(35, 9, 200, None).is_err());
    }

    #[test]
    fn control_number_round_trip() {
        assert_eq!(Control::Volume.number(), 7);
        assert_eq!(Control::from(7), Control::Volume);
        assert_eq!(Control::from(21), Control::Raw(21));
        assert_eq!(Control::Raw(21).number(), 21);
    }

    #[test]
    fn control_serializes_as_number() {
        let json = serde_json::to_string(&Control::Sustain).unwrap();
        assert_eq!(json, "64");
        let back: Control = serde_json::from_str("93").unwrap();
        assert_eq!(back, Control::Chorus);
    }
}
