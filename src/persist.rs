//! # Snapshot Persistence
//!
//! Round-trips the (instrument assignments, score) pair to a JSON document:
//!
//! ```json
//! {
//!   "instruments": [[0, {"program": 24, "bank": 1}]],
//!   "score": {
//!     "0":   [{"func": "start_note", "channel": 0, "note": {...}, "velocity": 100}],
//!     "500": [{"func": "end_note", "channel": 0, "note": {...}}]
//!   }
//! }
//! ```
//!
//! JSON maps only take string keys, so score timestamps serialize as decimal
//! strings and parse back to integers on load. A malformed document fails as
//! a whole; no partial state is ever adopted.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CantusError;
use crate::score::{Event, InstrumentAssignment, Score};

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets().len()))?;
        for (time_ms, events) in self.buckets() {
            map.serialize_entry(&time_ms.to_string(), events)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoreVisitor;

        impl<'de> Visitor<'de> for ScoreVisitor {
            type Value = Score;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from millisecond timestamps to event lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Score, A::Error> {
                let mut buckets = BTreeMap::new();
                while let Some((key, events)) = access.next_entry::<String, Vec<Event>>()? {
                    let time_ms: u64 = key.parse().map_err(|_| {
                        de::Error::custom(format!("invalid timestamp key {key:?}"))
                    })?;
                    buckets.insert(time_ms, events);
                }
                Ok(Score::from_buckets(buckets))
            }
        }

        deserializer.deserialize_map(ScoreVisitor)
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    instruments: Vec<InstrumentAssignment>,
    score: Score,
}

/// Serialize a snapshot to a JSON string.
pub fn to_json(
    instruments: &[InstrumentAssignment],
    score: &Score,
) -> Result<String, CantusError> {
    let snapshot = Snapshot {
        instruments: instruments.to_vec(),
        score: score.clone(),
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

/// Parse a snapshot from a JSON string.
pub fn from_json(json: &str) -> Result<(Vec<InstrumentAssignment>, Score), CantusError> {
    let snapshot: Snapshot = serde_json::from_str(json)?;
    Ok((snapshot.instruments, snapshot.score))
}

/// Write a snapshot file.
pub fn save(
    path: impl AsRef<Path>,
    instruments: &[InstrumentAssignment],
    score: &Score,
) -> Result<(), CantusError> {
    fs::write(path, to_json(instruments, score)?)?;
    Ok(())
}

/// Read a snapshot file.
pub fn load(path: impl AsRef<Path>) -> Result<(Vec<InstrumentAssignment>, Score), CantusError> {
    from_json(&fs::read_to_string(path)?)
}
