//! The sink contract the playback driver drives.

use crate::error::CantusError;
use crate::note::{PercussionNote, PitchedNote};

/// A synthesizer-like sink.
///
/// The driver treats implementations as opaque services: every dispatch is
/// synchronous, and a returned error aborts the remaining schedule. The
/// `sleep` capability is the driver's only suspension point, expressed in
/// the sink's native time unit (seconds) so implementations can map it to
/// their own clock.
///
/// Percussion notes go through distinct capabilities from melodic notes;
/// sinks commonly route them to a drum kit rather than a pitched voice.
pub trait Synth {
    /// Program `program`/`bank` on `channel`; called once per assignment
    /// before any timed event.
    fn set_instrument(&mut self, channel: u8, program: u8, bank: u8) -> Result<(), CantusError>;

    fn play_note(
        &mut self,
        note: &PitchedNote,
        channel: u8,
        velocity: u8,
    ) -> Result<(), CantusError>;

    fn stop_note(&mut self, note: &PitchedNote, channel: u8) -> Result<(), CantusError>;

    fn play_percussion_note(
        &mut self,
        note: &PercussionNote,
        channel: u8,
        velocity: u8,
    ) -> Result<(), CantusError>;

    fn stop_percussion_note(
        &mut self,
        note: &PercussionNote,
        channel: u8,
    ) -> Result<(), CantusError>;

    fn control_change(&mut self, channel: u8, control: u8, value: u8) -> Result<(), CantusError>;

    /// Block for `seconds` of wall-clock time.
    fn sleep(&mut self, seconds: f64);
}
