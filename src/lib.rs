pub mod containers;
pub mod error;
pub mod midi;
pub mod note;
pub mod persist;
pub mod playback;
pub mod score;

pub use containers::{Bar, ControlChangeEvent, RawSnippet, Slot, Track};
pub use error::CantusError;
pub use note::{Control, Instrument, Note, PercussionNote, PitchedNote};
pub use playback::{Sequencer, Synth};
pub use score::{beat_to_ms, Event, InstrumentAssignment, Score};

/// Encode a track into a complete MIDI track chunk.
/// This is the main entry point for the byte encoder.
pub fn encode_track(track: &Track) -> Result<Vec<u8>, CantusError> {
    midi::TrackEncoder::encode_track(track)
}

/// Render tracks into a millisecond-keyed score, one channel per track.
/// This is the main entry point for the playback and persistence paths.
pub fn sequence_tracks(
    tracks: &[Track],
    channels: &[u8],
    bpm: Option<f64>,
) -> Result<Sequencer, CantusError> {
    let mut sequencer = Sequencer::new();
    sequencer.play_tracks(tracks, channels, bpm)?;
    Ok(sequencer)
}
