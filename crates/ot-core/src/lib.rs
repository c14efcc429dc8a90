//! Core domain logic for orienteering race timing.
//!
//! This crate contains the computation pipeline for:
//! - Readout intake: normalizing device punch data and duplicate handling
//! - Course validation: matching punch streams against course definitions
//! - Resolution: start/finish sources, penalties, credits and statuses
//! - Ranking: placement, split/leg analytics and scoring per group

pub mod config;
pub mod course;
pub mod person;
pub mod placement;
pub mod race;
pub mod ranking;
pub mod readout;
pub mod resolver;
pub mod result;
pub mod scoring;
pub mod splits;
pub mod time;
pub mod types;
pub mod validator;

pub use config::{
    DuplicatePolicy, FinishSource, MarkedRouteMode, MissedFinishPolicy, RaceConfig, ScoresMode,
    StartSource,
};
pub use course::{Course, CourseControl, CourseVariant, parse_control_spec};
pub use person::{Group, Person, Sex};
pub use race::{Race, RaceError, ReadoutOutcome, RecalcReport};
pub use ranking::{Qualification, Ranking, RankingItem};
pub use readout::{MalformedReadout, Punch, RawPunch, RawReadout, Readout};
pub use result::{Leg, Place, RaceResult, ResultStatus};
pub use time::{OTime, TimeRounding};
pub use types::{CourseId, GroupId, PersonId, ResultId};
pub use validator::{PunchClass, Validation, validate};
