//! # Playback
//!
//! Real-time playback of a finished score against a synthesizer-like sink.
//!
//! ## Sub-modules
//! - `synth` - the [`Synth`] sink trait (the crate's audio boundary)
//! - `sequencer` - the [`Sequencer`]: score building plus the timed
//!   playback loop with cooperative cancellation
//!
//! No audio is synthesized here; the driver only decides *when* each sink
//! call happens and in what order.

mod sequencer;
mod synth;


pub use sequencer::Sequencer;
pub use synth::Synth;
