//! Race-wide timing policy.
//!
//! All policy knobs live in one strongly-typed record validated once at
//! load time. Every field has a sensible default so a race file may
//! specify only what it overrides.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::{MAX_TIME_ACCURACY, OTime, TimeRounding};

/// Where a competitor's start time comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartSource {
    /// Declared start time from the start protocol.
    #[default]
    Protocol,
    /// Start-station mark on the card.
    Station,
    /// First punch at the configured start control.
    Cp,
    /// External start gate; falls back to station mark, then protocol.
    Gate,
}

/// Where a competitor's finish time comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishSource {
    /// Finish-station mark on the card.
    #[default]
    Station,
    /// Last punch at the configured finish control.
    Cp,
}

/// What to do when no finish time can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissedFinishPolicy {
    /// Force a zero elapsed time.
    Zero,
    /// Disqualify the competitor.
    Dsq,
    /// Use the time the readout was received.
    Readout,
    /// Last punch time plus a fixed penalty.
    Penalty,
    /// No substitute: the result is DidNotFinish.
    #[default]
    Dnf,
}

/// Penalty accounting for marked-route courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkedRouteMode {
    /// No penalty accounting.
    #[default]
    Off,
    /// Each penalty event adds a fixed time.
    Time,
    /// Each penalty event adds one penalty lap.
    Laps,
}

/// Score assignment for placed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoresMode {
    /// No scores.
    #[default]
    Off,
    /// Look the place up in a score table.
    Array,
    /// Evaluate a formula over `time` and `leader`.
    Formula,
}

/// How a repeated readout of an already-seen card is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Create an additional result.
    #[default]
    SeveralResults,
    /// Defer to manual bib assignment.
    BibRequest,
    /// Merge punches into the existing result.
    Merge,
    /// Drop the repeated readout.
    Ignore,
}

/// Invalid policy combinations caught at load time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `time_accuracy` beyond millisecond precision.
    #[error("time_accuracy must be 0..={MAX_TIME_ACCURACY}, got {0}")]
    AccuracyOutOfRange(u8),
    /// Array scoring enabled with an empty table.
    #[error("scores_mode is 'array' but scores_array is empty")]
    EmptyScoresArray,
    /// Formula scoring enabled with an empty formula.
    #[error("scores_mode is 'formula' but scores_formula is empty")]
    EmptyScoresFormula,
}

/// Race-wide timing and result policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Start time source.
    pub start_source: StartSource,
    /// Control code used when `start_source` is `cp`.
    pub start_cp_number: u32,
    /// Finish time source.
    pub finish_source: FinishSource,
    /// Control code used when `finish_source` is `cp`.
    pub finish_cp_number: u32,
    /// Missed-finish handling.
    pub missed_finish: MissedFinishPolicy,
    /// Fixed penalty for `missed_finish = penalty`.
    pub missed_finish_penalty: OTime,
    /// Marked-route penalty accounting.
    pub marked_route_mode: MarkedRouteMode,
    /// Time per penalty event for `marked_route_mode = time`.
    pub marked_route_penalty_time: OTime,
    /// Keep marked-route results OK even when incomplete.
    pub marked_route_dont_dsq: bool,
    /// Escalate an incomplete course check to Disqualified instead of
    /// MissingPunch.
    pub dsq_on_incomplete: bool,
    /// Subtract time spent reaching the credit control.
    pub credit_time_enabled: bool,
    /// Control code of the credit (rest) control.
    pub credit_time_cp: u32,
    /// Score assignment mode.
    pub scores_mode: ScoresMode,
    /// Score per place for `scores_mode = array` (last entry repeats).
    pub scores_array: Vec<i64>,
    /// Formula over `time` and `leader` for `scores_mode = formula`.
    pub scores_formula: String,
    /// Decimal places of a second carried by times (0..=3).
    pub time_accuracy: u8,
    /// Rounding applied when reducing to `time_accuracy`.
    pub time_rounding: TimeRounding,
    /// Let repeated punches of one code satisfy repeated controls.
    pub allow_duplicate_punches: bool,
    /// Reduce finish-before-start differences into an under-24h window.
    pub midnight_rollover: bool,
    /// Repeated card readout handling.
    pub duplicate_policy: DuplicatePolicy,
    /// Window within which a repeated readout counts as a duplicate.
    pub duplicate_timeout: OTime,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            start_source: StartSource::default(),
            start_cp_number: 31,
            finish_source: FinishSource::default(),
            finish_cp_number: 90,
            missed_finish: MissedFinishPolicy::default(),
            missed_finish_penalty: OTime::from_sec(60),
            marked_route_mode: MarkedRouteMode::default(),
            marked_route_penalty_time: OTime::from_sec(60),
            marked_route_dont_dsq: false,
            dsq_on_incomplete: true,
            credit_time_enabled: false,
            credit_time_cp: 0,
            scores_mode: ScoresMode::default(),
            scores_array: Vec::new(),
            scores_formula: String::new(),
            time_accuracy: 0,
            time_rounding: TimeRounding::default(),
            allow_duplicate_punches: false,
            midnight_rollover: true,
            duplicate_policy: DuplicatePolicy::default(),
            duplicate_timeout: OTime::hms(0, 5, 0),
        }
    }
}

impl RaceConfig {
    /// Validates policy combinations. Called once at race load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_accuracy > MAX_TIME_ACCURACY {
            return Err(ConfigError::AccuracyOutOfRange(self.time_accuracy));
        }
        if self.scores_mode == ScoresMode::Array && self.scores_array.is_empty() {
            return Err(ConfigError::EmptyScoresArray);
        }
        if self.scores_mode == ScoresMode::Formula && self.scores_formula.trim().is_empty() {
            return Err(ConfigError::EmptyScoresFormula);
        }
        Ok(())
    }
}
