//! # MIDI Byte Encoding
//!
//! Byte-exact serialization of a track's musical content to the Standard
//! MIDI File track-chunk format.
//!
//! ## Sub-modules
//! - `vlq` - variable-length quantity encode/decode
//! - `keys` - canonical key-name tables for the key-signature meta event
//! - `track` - the [`TrackEncoder`] producing finished `MTrk` chunks
//!
//! ## Entry point
//! [`TrackEncoder::encode_track`] converts a [`Track`](crate::Track) into a
//! complete chunk; the long-form API (`new` + `play_track`/`play_bar` +
//! `into_bytes`) exposes the same machinery stepwise.

pub mod keys;
pub mod track;
pub mod vlq;

pub use track::{duration_ticks, TrackEncoder, TICKS_PER_WHOLE_NOTE};
