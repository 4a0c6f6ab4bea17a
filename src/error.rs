//! # Error Types
//!
//! This module defines all error types for the cantus sequencing library.
//!
//! Errors fall into four groups, matching where in the pipeline they occur:
//! - **Format violations**: a value that cannot be represented in the MIDI
//!   byte format (out-of-range data byte, unknown key name, non-power-of-two
//!   meter denominator). Raised by the encoder before any byte is written.
//! - **Schedule violations**: invalid timing input while building a score
//!   (negative or non-finite beat position, non-positive tempo, overfull bar).
//! - **Sink failures**: propagated from a [`Synth`](crate::playback::Synth)
//!   implementation during playback; the remaining schedule is aborted.
//! - **Snapshot/IO failures**: malformed snapshot documents or file errors.
//!
//! No component clamps out-of-range values; every violation is reported.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CantusError {
    /// A numeric field exceeds its MIDI range.
    ///
    /// Raised before any byte or event is produced, so a failing call never
    /// leaves partial output behind.
    #[error("{field} out of range: {value} (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    /// Key name not found in the canonical major/minor key lists.
    ///
    /// Valid names run from "Cb" to "C#" for major keys and "ab" to "a#"
    /// (lowercase) for minor keys.
    #[error("unknown key signature: {0:?}")]
    UnknownKey(String),

    /// Time signature denominator that is not a power of two.
    ///
    /// The MIDI time-signature meta event stores the denominator as a
    /// power-of-two exponent, so meters like 4/6 cannot be encoded.
    #[error("meter denominator must be a power of two, got {0}")]
    BadMeter(u8),

    /// Track name containing non-ASCII bytes.
    #[error("track name must be ASCII: {0:?}")]
    NonAsciiTrackName(String),

    /// Tempo that is zero, negative or non-finite.
    #[error("tempo must be positive and finite, got {0} bpm")]
    BadTempo(f64),

    /// Beat position that is negative or non-finite.
    ///
    /// Score timestamps are milliseconds since the start of the session and
    /// can never be negative.
    #[error("beat position must be non-negative and finite, got {0}")]
    BadBeat(f64),

    /// Zero passed where a duration denominator is required.
    #[error("duration denominator must be positive")]
    ZeroDuration,

    /// More note value placed into a bar than its meter allows.
    #[error("bar is full: {placed} beats placed, meter allows {capacity}")]
    BarOverflow { placed: f64, capacity: f64 },

    /// Track/channel list length mismatch when rendering multiple tracks.
    #[error("got {channels} channels for {tracks} tracks")]
    ChannelCountMismatch { tracks: usize, channels: usize },

    /// Failure reported by the playback sink.
    ///
    /// The driver performs no retry; the schedule is abandoned at the
    /// failing dispatch.
    #[error("playback sink failure: {0}")]
    Sink(String),

    /// Malformed snapshot document.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
