//! Normalized card readouts and the punch normalizer.
//!
//! Transport layers deliver a [`RawReadout`] — card number, device
//! ticks, optional start/finish marks, and a per-device sequence id.
//! [`Readout::normalize`] converts ticks to [`OTime`] values and
//! rejects structurally invalid data before it can enter the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::OTime;

/// A timestamped chip-read event at one control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Punch {
    /// Control code as punched.
    pub code: String,
    /// Wall-clock punch time.
    pub time: OTime,
}

impl Punch {
    /// Creates a punch.
    pub fn new(code: impl Into<String>, time: OTime) -> Self {
        Self {
            code: code.into(),
            time,
        }
    }
}

/// A punch as delivered by the device transport, in device ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPunch {
    /// Control code as punched.
    pub code: String,
    /// Device ticks since race-day midnight.
    pub ticks: i64,
}

/// A card readout as delivered by the device transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReadout {
    /// Card number read from the chip.
    pub card_number: u32,
    /// Punches in punch order.
    pub punches: Vec<RawPunch>,
    /// Explicit start-station mark, if the card has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ticks: Option<i64>,
    /// Explicit finish-station mark, if the card has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_ticks: Option<i64>,
    /// Monotonically increasing per-device sequence id.
    pub sequence_id: u64,
}

/// Structurally invalid punch data, rejected before entering the pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedReadout {
    /// The card number is zero.
    #[error("readout {sequence_id} has no card number")]
    MissingCard { sequence_id: u64 },
    /// A punch carries an empty control code.
    #[error("readout {sequence_id} punch {index} has a blank code")]
    BlankCode { sequence_id: u64, index: usize },
    /// A tick value is negative.
    #[error("readout {sequence_id} punch {index} has a negative time")]
    NegativeTick { sequence_id: u64, index: usize },
}

/// A canonical, validated card readout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readout {
    /// Card number read from the chip.
    pub card_number: u32,
    /// Punches in punch order.
    pub punches: Vec<Punch>,
    /// Explicit start-station mark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_mark: Option<OTime>,
    /// Explicit finish-station mark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_mark: Option<OTime>,
    /// Sequence id carried over from the transport, for duplicate detection.
    pub sequence_id: u64,
    /// When the readout reached this system.
    pub received_at: OTime,
}

impl Readout {
    /// Normalizes a raw readout, stamping it with the current wall clock.
    pub fn normalize(raw: &RawReadout, accuracy: u8) -> Result<Self, MalformedReadout> {
        Self::normalize_at(raw, accuracy, OTime::now())
    }

    /// Normalizes a raw readout with an explicit receive time.
    pub fn normalize_at(
        raw: &RawReadout,
        accuracy: u8,
        received_at: OTime,
    ) -> Result<Self, MalformedReadout> {
        let sequence_id = raw.sequence_id;
        if raw.card_number == 0 {
            return Err(MalformedReadout::MissingCard { sequence_id });
        }

        let mut punches = Vec::with_capacity(raw.punches.len());
        for (index, punch) in raw.punches.iter().enumerate() {
            if punch.code.trim().is_empty() {
                return Err(MalformedReadout::BlankCode { sequence_id, index });
            }
            if punch.ticks < 0 {
                return Err(MalformedReadout::NegativeTick { sequence_id, index });
            }
            punches.push(Punch {
                code: punch.code.trim().to_string(),
                time: OTime::from_ticks(punch.ticks, accuracy),
            });
        }

        let mark = |ticks: Option<i64>, index: usize| match ticks {
            Some(t) if t < 0 => Err(MalformedReadout::NegativeTick { sequence_id, index }),
            Some(t) => Ok(Some(OTime::from_ticks(t, accuracy))),
            None => Ok(None),
        };

        Ok(Self {
            card_number: raw.card_number,
            start_mark: mark(raw.start_ticks, raw.punches.len())?,
            finish_mark: mark(raw.finish_ticks, raw.punches.len())?,
            punches,
            sequence_id,
            received_at,
        })
    }

    /// Merges punches and marks from another readout of the same card.
    ///
    /// Punches are unioned by (code, time) and kept in time order; marks
    /// are filled where missing. Returns true if anything changed.
    pub fn merge_with(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for punch in &other.punches {
            if !self.punches.contains(punch) {
                self.punches.push(punch.clone());
                changed = true;
            }
        }
        if changed {
            self.punches.sort_by_key(|p| p.time);
        }
        if self.start_mark.is_none() && other.start_mark.is_some() {
            self.start_mark = other.start_mark;
            changed = true;
        }
        if self.finish_mark.is_none() && other.finish_mark.is_some() {
            self.finish_mark = other.finish_mark;
            changed = true;
        }
        changed
    }

    /// Time of the last punch, if any.
    #[must_use]
    pub fn last_punch_time(&self) -> Option<OTime> {
        self.punches.iter().map(|p| p.time).max()
    }

    /// Time of the first punch with the given code.
    #[must_use]
    pub fn first_punch_at(&self, code: &str) -> Option<OTime> {
        self.punches.iter().find(|p| p.code == code).map(|p| p.time)
    }

    /// Time of the last punch with the given code.
    #[must_use]
    pub fn last_punch_at(&self, code: &str) -> Option<OTime> {
        self.punches
            .iter()
            .rev()
            .find(|p| p.code == code)
            .map(|p| p.time)
    }
}
