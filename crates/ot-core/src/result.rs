//! Computed results, statuses and places.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ranking::Qualification;
use crate::readout::Readout;
use crate::time::OTime;
use crate::types::{PersonId, ResultId};

/// Terminal status of a result.
///
/// One closed enum used uniformly through the pipeline. Sorting uses
/// [`ResultStatus::precedence`]: OK strictly dominates every other
/// status, so elapsed time only breaks ties within one status bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Not yet resolved.
    #[default]
    None,
    Ok,
    MissingPunch,
    Disqualified,
    DidNotFinish,
    DidNotStart,
    OverTime,
    Cancelled,
    /// Previously cancelled, back in normal recomputation.
    Restored,
}

impl ResultStatus {
    /// Sort precedence: lower sorts first. OK is strictly first.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Ok | Self::Restored => 0,
            Self::OverTime => 1,
            Self::MissingPunch => 2,
            Self::Disqualified => 3,
            Self::DidNotFinish => 4,
            Self::DidNotStart => 5,
            Self::Cancelled => 6,
            Self::None => 7,
        }
    }

    /// Whether this status qualifies for a numbered place.
    #[must_use]
    pub const fn qualifies(self) -> bool {
        matches!(self, Self::Ok | Self::Restored)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "-",
            Self::Ok => "OK",
            Self::MissingPunch => "MP",
            Self::Disqualified => "DSQ",
            Self::DidNotFinish => "DNF",
            Self::DidNotStart => "DNS",
            Self::OverTime => "OVT",
            Self::Cancelled => "CANCELLED",
            Self::Restored => "RESTORED",
        };
        write!(f, "{s}")
    }
}

/// Place within a group.
///
/// Numeric places go only to qualifying, in-competition results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Place {
    /// No place (non-qualifying status, or placement not yet run).
    #[default]
    None,
    /// Out of competition: counted as a finisher, never numbered.
    OutOfCompetition,
    /// Numbered place, 1-based.
    Numbered(u32),
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::OutOfCompetition => write!(f, "o/c"),
            Self::Numbered(n) => write!(f, "{n}"),
        }
    }
}

/// One leg of a competitor's split analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    /// Index within the readout's punch list.
    pub index: usize,
    /// Index of the matched course control, None for extra punches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_index: Option<usize>,
    /// Control code as punched.
    pub code: String,
    /// Absolute punch time.
    pub absolute_time: OTime,
    /// Time since the competitor's start.
    pub relative_time: OTime,
    /// Time since the previous matched control (or the start).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg_time: Option<OTime>,
    /// Rank of this leg time within the group, 1-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg_place: Option<u32>,
    /// Rank of the cumulative time at this control within the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_place: Option<u32>,
}

/// A result: one readout, at most one person, and computed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResult {
    /// Unique identifier.
    pub id: ResultId,
    /// The matched competitor, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonId>,
    /// The readout this result was computed from.
    pub readout: Readout,
    /// Resolved start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<OTime>,
    /// Resolved finish time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<OTime>,
    /// Elapsed time including penalty, minus credit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<OTime>,
    /// Accumulated penalty time.
    #[serde(default)]
    pub penalty_time: OTime,
    /// Accumulated penalty laps.
    #[serde(default)]
    pub penalty_laps: u32,
    /// Time credited back (rest control).
    #[serde(default)]
    pub credit_time: OTime,
    /// Score for point-based disciplines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    /// Computed status.
    #[serde(default)]
    pub status: ResultStatus,
    /// Operator override: survives recomputation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_status: Option<ResultStatus>,
    /// Place within the group.
    #[serde(default)]
    pub place: Place,
    /// Qualification earned at this race, assigned after placement.
    #[serde(default)]
    pub assigned_rank: Qualification,
    /// Leg-by-leg split analysis.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legs: Vec<Leg>,
}

impl RaceResult {
    /// Creates an unresolved result for a readout.
    #[must_use]
    pub fn new(readout: Readout, person: Option<PersonId>) -> Self {
        Self {
            id: ResultId::generate(),
            person,
            readout,
            start_time: None,
            finish_time: None,
            elapsed: None,
            penalty_time: OTime::ZERO,
            penalty_laps: 0,
            credit_time: OTime::ZERO,
            score: None,
            status: ResultStatus::None,
            manual_status: None,
            place: Place::None,
            assigned_rank: Qualification::NotQualified,
            legs: Vec::new(),
        }
    }

    /// Sort key for placement: status precedence, then score
    /// (descending, score courses only), then elapsed time.
    #[must_use]
    pub fn sort_key(&self, scored: bool) -> (u8, i64, i64) {
        let score = if scored {
            -self.score.unwrap_or(0)
        } else {
            0
        };
        let elapsed = self.elapsed.map_or(i64::MAX, OTime::as_msec);
        (self.status.precedence(), score, elapsed)
    }

    /// Clears fields owned by the compute pipeline before a recompute.
    pub fn reset_computed(&mut self) {
        self.start_time = None;
        self.finish_time = None;
        self.elapsed = None;
        self.penalty_time = OTime::ZERO;
        self.penalty_laps = 0;
        self.credit_time = OTime::ZERO;
        self.score = None;
        self.status = ResultStatus::None;
        self.place = Place::None;
        self.assigned_rank = Qualification::NotQualified;
        self.legs.clear();
    }
}
