//! Key-signature lookup for the key-signature meta event.
//!
//! MIDI stores a key signature as a signed count of accidentals (negative =
//! flats, positive = sharps) plus a mode byte. The count comes from the key
//! name's position in the canonical circle-of-fifths ordering, biased by 7.

/// Major key names ordered from 7 flats to 7 sharps.
pub const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];

/// Minor key names (lowercase) ordered from 7 flats to 7 sharps.
pub const MINOR_KEYS: [&str; 15] = [
    "ab", "eb", "bb", "f", "c", "g", "d", "a", "e", "b", "f#", "c#", "g#", "d#", "a#",
];

/// Mode byte of the key-signature meta event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Major = 0,
    Minor = 1,
}

/// Look up a key name: lowercase names are minor, anything else major.
///
/// Returns the accidental count (-7 flats to +7 sharps) and the mode, or
/// `None` for a name in neither list.
pub fn signature(key: &str) -> Option<(i8, Mode)> {
    let minor = key.chars().next().is_some_and(|c| c.is_lowercase());
    let (table, mode) = if minor {
        (&MINOR_KEYS, Mode::Minor)
    } else {
        (&MAJOR_KEYS, Mode::Major)
    };
    table
        .iter()
        .position(|&k| k == key)
        .map(|idx| (idx as i8 - 7, mode))
}
