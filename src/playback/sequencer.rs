//! # Sequencer
//!
//! Builds the millisecond-keyed score from tracks and drives a sink through
//! it in real time.
//!
//! The sequencer owns the score and the instrument assignments exclusively
//! while building; playback, encoding and persistence borrow the finished
//! score immutably, so there is never concurrent mutation and consumption.
//!
//! ## Playback model
//! Single-threaded and cooperative: the only suspension point is the sink's
//! `sleep` between timestamp buckets. Cancellation is polled once per bucket
//! before the wait; an in-flight dispatch is never interrupted.

use std::path::Path;

use log::info;

use crate::containers::{check_channel, Track};
use crate::error::CantusError;
use crate::note::Note;
use crate::persist;
use crate::playback::Synth;
use crate::score::{Event, InstrumentAssignment, Score};

/// Seconds slept after the last bucket so the final tail is not cut off.
const DRAIN_SECONDS: f64 = 2.0;

/// Accumulates tracks into a score and plays it against a [`Synth`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequencer {
    score: Score,
    instruments: Vec<InstrumentAssignment>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously built score, e.g. a loaded snapshot.
    pub fn from_parts(score: Score, instruments: Vec<InstrumentAssignment>) -> Self {
        Self { score, instruments }
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn instruments(&self) -> &[InstrumentAssignment] {
        &self.instruments
    }

    /// Render one track into the score on `channel`.
    ///
    /// Walks the bars in sequence, accumulating a running start time; a
    /// bar's own tempo overrides the governing tempo from that bar onward,
    /// and slot-level tempo changes persist the same way. The track's
    /// snippets and control events merge in afterwards at their own
    /// computed offsets.
    pub fn play_track(
        &mut self,
        track: &Track,
        channel: u8,
        bpm: Option<f64>,
    ) -> Result<(), CantusError> {
        check_channel(channel)?;
        let mut bpm = bpm.unwrap_or(track.bpm);
        let mut start_ms: u64 = 0;
        for bar in track.bars() {
            if let Some(bar_bpm) = bar.bpm {
                bpm = bar_bpm;
            }
            let (duration, next_bpm) = bar.schedule(&mut self.score, start_ms, channel, bpm)?;
            start_ms += duration;
            bpm = next_bpm;
        }
        for snippet in track.snippets() {
            snippet.schedule(&mut self.score, bpm)?;
        }
        for event in track.events() {
            event.schedule(&mut self.score, channel, bpm)?;
        }
        Ok(())
    }

    /// Render several tracks, one channel each.
    ///
    /// Records an instrument assignment for every track that declares an
    /// instrument, then renders each track separately so tempo changes in
    /// one track never leak into another.
    pub fn play_tracks(
        &mut self,
        tracks: &[Track],
        channels: &[u8],
        bpm: Option<f64>,
    ) -> Result<(), CantusError> {
        if tracks.len() != channels.len() {
            return Err(CantusError::ChannelCountMismatch {
                tracks: tracks.len(),
                channels: channels.len(),
            });
        }
        for (track, &channel) in tracks.iter().zip(channels) {
            check_channel(channel)?;
            if let Some(instrument) = &track.instrument {
                self.instruments.push(InstrumentAssignment {
                    channel,
                    instrument: instrument.clone(),
                });
            }
        }
        for (track, &channel) in tracks.iter().zip(channels) {
            self.play_track(track, channel, bpm)?;
        }
        Ok(())
    }

    /// Drive `synth` through the score in real time.
    ///
    /// Instruments are programmed first, then buckets dispatch in ascending
    /// timestamp order with one `sleep` for each gap between distinct
    /// timestamps. Events within a bucket fire back-to-back in insertion
    /// order.
    ///
    /// `stop` is polled once per bucket before its wait; once it returns
    /// true no further sink calls are made and the final drain sleep is
    /// skipped. A sink error aborts the remaining schedule.
    pub fn play_score(
        &self,
        synth: &mut dyn Synth,
        mut stop: Option<&mut dyn FnMut() -> bool>,
    ) -> Result<(), CantusError> {
        for assignment in &self.instruments {
            synth.set_instrument(
                assignment.channel,
                assignment.instrument.program,
                assignment.instrument.bank,
            )?;
            info!(
                "instrument: {} bank: {} channel: {}",
                assignment.instrument.program, assignment.instrument.bank, assignment.channel
            );
        }

        let mut current_ms: u64 = 0;
        for (start_ms, events) in self.score.iter() {
            if let Some(stop) = stop.as_deref_mut() {
                if stop() {
                    info!("playback cancelled at {} ms", current_ms);
                    return Ok(());
                }
            }
            let wait = start_ms.saturating_sub(current_ms);
            if wait > 0 {
                synth.sleep(wait as f64 / 1000.0);
            }
            current_ms = start_ms;
            for event in events {
                Self::dispatch(synth, start_ms, event)?;
            }
        }
        synth.sleep(DRAIN_SECONDS);
        Ok(())
    }

    fn dispatch(synth: &mut dyn Synth, at_ms: u64, event: &Event) -> Result<(), CantusError> {
        match event {
            Event::StartNote {
                channel,
                note,
                velocity,
            } => {
                match note {
                    Note::Percussion(p) => synth.play_percussion_note(p, *channel, *velocity)?,
                    Note::Pitched(p) => synth.play_note(p, *channel, *velocity)?,
                }
                info!(
                    "start: {} note: {} velocity: {} channel: {}",
                    at_ms,
                    note.pitch_or_key(),
                    velocity,
                    channel
                );
            }
            Event::EndNote { channel, note } => {
                match note {
                    Note::Percussion(p) => synth.stop_percussion_note(p, *channel)?,
                    Note::Pitched(p) => synth.stop_note(p, *channel)?,
                }
                info!("stop: {} note: {} channel: {}", at_ms, note.pitch_or_key(), channel);
            }
            Event::ControlChange {
                channel,
                control,
                value,
            } => {
                synth.control_change(*channel, control.number(), *value)?;
                info!(
                    "control change: {} control: {} value: {} channel: {}",
                    at_ms,
                    control.number(),
                    value,
                    channel
                );
            }
        }
        Ok(())
    }

    /// Save the score and instrument assignments as a JSON snapshot.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CantusError> {
        persist::save(path, &self.instruments, &self.score)
    }

    /// Load a sequencer back from a JSON snapshot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CantusError> {
        let (instruments, score) = persist::load(path)?;
        Ok(Self::from_parts(score, instruments))
    }
}
