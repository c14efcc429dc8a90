//! Competitors and groups (categories).

use serde::{Deserialize, Serialize};

use crate::ranking::{Qualification, Ranking};
use crate::time::OTime;
use crate::types::{CourseId, GroupId, PersonId};

/// Sex restriction on a group. Entry-list data, not enforced by the
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    /// No restriction.
    #[default]
    Any,
    Male,
    Female,
}

/// A start group (age/sex category) sharing one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier, e.g. "M21".
    pub id: GroupId,
    /// The course this group runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<CourseId>,
    /// Sex restriction.
    #[serde(default)]
    pub sex: Sex,
    /// Minimum competitor age (0 = unrestricted).
    #[serde(default)]
    pub min_age: u8,
    /// Maximum competitor age (0 = unrestricted).
    #[serde(default)]
    pub max_age: u8,
    /// Competitors slower than this are scored OverTime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time: Option<OTime>,
    /// Start interval between competitors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_interval: Option<OTime>,
    /// Start corridor number.
    #[serde(default)]
    pub start_corridor: u32,
    /// Qualification rank configuration.
    #[serde(default)]
    pub ranking: Ranking,
    /// Number of finishers, maintained by the placement engine.
    #[serde(default)]
    pub count_finished: usize,
}

impl Group {
    /// Creates a group running the given course.
    #[must_use]
    pub fn new(id: GroupId, course: Option<CourseId>) -> Self {
        Self {
            id,
            course,
            sex: Sex::Any,
            min_age: 0,
            max_age: 0,
            max_time: None,
            start_interval: None,
            start_corridor: 0,
            ranking: Ranking::default(),
            count_finished: 0,
        }
    }
}

/// A competitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier.
    pub id: PersonId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Bib number.
    pub bib: u32,
    /// Assigned timing card number, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<u32>,
    /// The group this person starts in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupId>,
    /// Declared (protocol) start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<OTime>,
    /// Current sport qualification, feeds the group rank.
    #[serde(default)]
    pub qual: Qualification,
    /// Excluded from numbered placement, still counted as a finisher.
    #[serde(default)]
    pub is_out_of_competition: bool,
}

impl Person {
    /// Creates a person with a bib in a group.
    #[must_use]
    pub fn new(id: PersonId, bib: u32, group: Option<GroupId>) -> Self {
        Self {
            id,
            name: String::new(),
            bib,
            card_number: None,
            group,
            start_time: None,
            qual: Qualification::NotQualified,
            is_out_of_competition: false,
        }
    }
}
