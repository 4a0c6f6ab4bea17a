//! # Input Containers
//!
//! The narrow interface the core consumes from upstream: bars of note slots,
//! tracks of bars, and the auxiliary per-track elements (control events and
//! pre-rendered snippets) that merge into the same score.
//!
//! A bar exposes its meter, key and an ordered sequence of slots; each slot
//! is a beat position, a duration denominator and a (possibly empty) group of
//! simultaneous notes. An empty group is a rest. A slot may also carry a
//! tempo change that takes effect at that slot.
//!
//! Beat positions are quarter-note beats. Duration denominators follow the
//! usual note-value convention: 1 = whole, 2 = half, 4 = quarter, 8 = eighth.

use crate::error::CantusError;
use crate::note::{Control, Instrument, Note, MAX_CHANNEL};
use crate::score::{beat_to_ms, Event, Score};

/// Milliseconds for `beats` quarter-note beats at `bpm`, unrounded.
fn beats_to_ms_f(beats: f64, bpm: f64) -> Result<f64, CantusError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(CantusError::BadTempo(bpm));
    }
    if !beats.is_finite() || beats < 0.0 {
        return Err(CantusError::BadBeat(beats));
    }
    Ok(beats / bpm * 60000.0)
}

/// One slot of a bar: simultaneous notes (or a rest) at a beat position.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Position within the bar, in quarter-note beats.
    pub beat: f64,
    /// Duration denominator (4 = quarter note).
    pub value: u32,
    /// Simultaneous notes; empty means a rest.
    pub notes: Vec<Note>,
    /// Tempo change taking effect at this slot.
    pub tempo_change: Option<f64>,
}

impl Slot {
    /// Length of this slot in quarter-note beats.
    pub fn beats(&self) -> f64 {
        4.0 / self.value as f64
    }
}

/// A bar: key, meter, optional bar-level tempo, and its slots in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Key name, e.g. "C" or "F#"; lowercase names are minor keys.
    pub key: String,
    /// Time signature as (numerator, denominator).
    pub meter: (u8, u8),
    /// Tempo override taking effect at this bar.
    pub bpm: Option<f64>,
    slots: Vec<Slot>,
    cursor: f64,
}

impl Default for Bar {
    fn default() -> Self {
        Self::new("C", (4, 4))
    }
}

impl Bar {
    pub fn new(key: &str, meter: (u8, u8)) -> Self {
        Self {
            key: key.to_string(),
            meter,
            bpm: None,
            slots: Vec::new(),
            cursor: 0.0,
        }
    }

    /// Full length of the bar in quarter-note beats.
    pub fn capacity_beats(&self) -> f64 {
        self.meter.0 as f64 * 4.0 / self.meter.1 as f64
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// True when no more note value fits.
    pub fn is_full(&self) -> bool {
        self.cursor >= self.capacity_beats() - 1e-9
    }

    /// Place a group of simultaneous notes at the current position.
    ///
    /// `value` is the duration denominator (4 = quarter note). An empty
    /// group is accepted and behaves as a rest. Placing past the bar's
    /// meter capacity is an error.
    pub fn place_notes(&mut self, notes: Vec<Note>, value: u32) -> Result<(), CantusError> {
        self.place(notes, value, None)
    }

    /// Place notes and change the governing tempo at the same slot.
    pub fn place_notes_with_tempo(
        &mut self,
        notes: Vec<Note>,
        value: u32,
        bpm: f64,
    ) -> Result<(), CantusError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(CantusError::BadTempo(bpm));
        }
        self.place(notes, value, Some(bpm))
    }

    /// Place a rest at the current position.
    pub fn place_rest(&mut self, value: u32) -> Result<(), CantusError> {
        self.place(Vec::new(), value, None)
    }

    fn place(
        &mut self,
        notes: Vec<Note>,
        value: u32,
        tempo_change: Option<f64>,
    ) -> Result<(), CantusError> {
        if value == 0 {
            return Err(CantusError::ZeroDuration);
        }
        let beats = 4.0 / value as f64;
        let capacity = self.capacity_beats();
        if self.cursor + beats > capacity + 1e-9 {
            return Err(CantusError::BarOverflow {
                placed: self.cursor + beats,
                capacity,
            });
        }
        self.slots.push(Slot {
            beat: self.cursor,
            value,
            notes,
            tempo_change,
        });
        self.cursor += beats;
        Ok(())
    }

    /// Record this bar's note-on/note-off events into `score`.
    ///
    /// `start_ms` is the absolute start of the bar. Each sounding slot
    /// schedules a start event at the slot's offset and an end event at
    /// offset + duration; percussion duration caps shorten the end. Rests
    /// only advance time. Returns the bar's full duration in milliseconds
    /// (padded to the meter capacity) and the tempo governing after the
    /// last slot.
    pub(crate) fn schedule(
        &self,
        score: &mut Score,
        start_ms: u64,
        channel: u8,
        bpm: f64,
    ) -> Result<(u64, f64), CantusError> {
        let mut cur_bpm = bpm;
        let mut cursor_beat = 0.0;
        let mut cursor_ms = 0.0;
        for slot in &self.slots {
            if slot.beat > cursor_beat + 1e-9 {
                cursor_ms += beats_to_ms_f(slot.beat - cursor_beat, cur_bpm)?;
                cursor_beat = slot.beat;
            }
            if let Some(t) = slot.tempo_change {
                if !t.is_finite() || t <= 0.0 {
                    return Err(CantusError::BadTempo(t));
                }
                cur_bpm = t;
            }
            let dur_ms = beats_to_ms_f(slot.beats(), cur_bpm)?;
            let on = start_ms + cursor_ms.round() as u64;
            for note in &slot.notes {
                score.record(on, Event::start_note(note.clone(), channel, note.velocity())?);
                let mut off = start_ms + (cursor_ms + dur_ms).round() as u64;
                if let Note::Percussion(p) = note {
                    if let Some(cap) = p.duration_ms {
                        off = off.min(on + cap);
                    }
                }
                score.record(off, Event::end_note(note.clone(), channel)?);
            }
            cursor_beat += slot.beats();
            cursor_ms += dur_ms;
        }
        let capacity = self.capacity_beats();
        if capacity > cursor_beat {
            cursor_ms += beats_to_ms_f(capacity - cursor_beat, cur_bpm)?;
        }
        Ok((cursor_ms.round() as u64, cur_bpm))
    }
}

/// A controller move at a beat position, e.g. turning up chorus mid-track.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlChangeEvent {
    /// Position from the start of the track, in quarter-note beats.
    pub beat: f64,
    pub control: Control,
    pub value: u8,
}

impl ControlChangeEvent {
    pub fn new(beat: f64, control: Control, value: u8) -> Self {
        Self {
            beat,
            control,
            value,
        }
    }

    pub(crate) fn schedule(
        &self,
        score: &mut Score,
        channel: u8,
        bpm: f64,
    ) -> Result<(), CantusError> {
        let t = beat_to_ms(self.beat, bpm)?;
        score.record(t, Event::control_change(channel, self.control, self.value)?);
        Ok(())
    }
}

/// A pre-rendered, millisecond-keyed score fragment placed at a beat offset.
///
/// Useful for material that does not fit the bar model, like a percussion
/// loop rendered elsewhere. The fragment's own timestamps are relative to
/// the snippet start.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSnippet {
    pub start_beat: f64,
    events: Score,
}

impl RawSnippet {
    pub fn new(start_beat: f64, events: Score) -> Self {
        Self { start_beat, events }
    }

    pub(crate) fn schedule(&self, score: &mut Score, bpm: f64) -> Result<(), CantusError> {
        let base = beat_to_ms(self.start_beat, bpm)?;
        for (t, events) in self.events.iter() {
            for event in events {
                score.record(base + t, event.clone());
            }
        }
        Ok(())
    }
}

/// A track: an instrument, a tempo, bars in order, plus auxiliary elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: Option<String>,
    pub instrument: Option<Instrument>,
    pub bpm: f64,
    bars: Vec<Bar>,
    snippets: Vec<RawSnippet>,
    events: Vec<ControlChangeEvent>,
}

impl Track {
    pub fn new(instrument: Option<Instrument>, bpm: f64) -> Self {
        Self {
            name: None,
            instrument,
            bpm,
            bars: Vec::new(),
            snippets: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn add_bar(&mut self, bar: Bar) -> &mut Self {
        self.bars.push(bar);
        self
    }

    /// Add the same bar several times in a row.
    pub fn add_bar_times(&mut self, bar: Bar, n_times: usize) -> &mut Self {
        for _ in 0..n_times {
            self.bars.push(bar.clone());
        }
        self
    }

    /// Attach a controller move, e.g. turning on chorus.
    pub fn add_event(&mut self, event: ControlChangeEvent) -> &mut Self {
        self.events.push(event);
        self
    }

    pub fn add_snippet(&mut self, snippet: RawSnippet) -> &mut Self {
        self.snippets.push(snippet);
        self
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn snippets(&self) -> &[RawSnippet] {
        &self.snippets
    }

    pub fn events(&self) -> &[ControlChangeEvent] {
        &self.events
    }
}

pub(crate) fn check_channel(channel: u8) -> Result<(), CantusError> {
    if channel > MAX_CHANNEL {
        return Err(CantusError::OutOfRange {
            field: "channel",
            value: channel as u32,
            max: MAX_CHANNEL as u32,
        });
    }
    Ok(())
}
