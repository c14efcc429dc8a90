//! Courses and course controls.
//!
//! A control is matched by its code, by one of its pre-parsed
//! alternative codes (marked-route forks), or by a wildcard kind.
//! Legacy course definitions encode alternatives in a mini-syntax like
//! `31(31,41-43,51)`, `%` (any control) or `*(31,32,33)` (any unseen
//! control from a list); [`parse_control_spec`] parses that syntax once
//! at course-edit time so validation never re-parses strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::CourseId;

/// How punches are matched against the course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseVariant {
    /// Controls must be visited in order.
    Ordered,
    /// Controls may be visited in any order.
    FreeOrder,
    /// Ordered with tolerated wrong fork choices under penalty.
    MarkedRoute,
    /// Point-valued controls, no completeness requirement.
    Score,
}

/// Matching behavior of a single control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// The control's own code or one of its alternatives.
    #[default]
    Exact,
    /// Any code (or any from the alternatives list).
    Any,
    /// Any code not punched earlier in the readout.
    AnyUnique,
}

/// One checkpoint on a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseControl {
    /// The preferred (correct) code.
    pub code: String,
    /// Matching behavior.
    #[serde(default)]
    pub kind: ControlKind,
    /// Acceptable alternative codes, already expanded (no ranges).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    /// Length of the leg ending at this control, in meters.
    #[serde(default)]
    pub length_m: u32,
    /// Point value for score courses.
    #[serde(default = "default_score")]
    pub score: u32,
}

const fn default_score() -> u32 {
    1
}

impl CourseControl {
    /// Creates a plain control matched only by its own code.
    pub fn exact(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            kind: ControlKind::Exact,
            alternatives: Vec::new(),
            length_m: 0,
            score: 1,
        }
    }

    /// Whether a punched code satisfies this control.
    ///
    /// `seen` holds the codes punched earlier in the readout, used by
    /// [`ControlKind::AnyUnique`].
    #[must_use]
    pub fn accepts(&self, code: &str, seen: &[&str]) -> bool {
        match self.kind {
            ControlKind::Exact => {
                code == self.code || self.alternatives.iter().any(|a| a == code)
            }
            ControlKind::Any => self.in_list_or_unrestricted(code),
            ControlKind::AnyUnique => {
                self.in_list_or_unrestricted(code) && !seen.contains(&code)
            }
        }
    }

    /// Whether a match through this control is the non-preferred fork.
    #[must_use]
    pub fn is_wrong_fork(&self, code: &str) -> bool {
        self.kind == ControlKind::Exact && code != self.code
    }

    fn in_list_or_unrestricted(&self, code: &str) -> bool {
        self.alternatives.is_empty() || self.alternatives.iter().any(|a| a == code)
    }
}

/// A course definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Unique identifier. Courses named after a bib take precedence in
    /// person-to-course lookup.
    pub id: CourseId,
    /// How punches are matched.
    pub variant: CourseVariant,
    /// Ordered control list.
    #[serde(default)]
    pub controls: Vec<CourseControl>,
    /// Total course length in meters.
    #[serde(default)]
    pub length_m: u32,
    /// Total climb in meters.
    #[serde(default)]
    pub climb_m: u32,
}

impl Course {
    /// Creates an ordered course from plain control codes.
    pub fn ordered(id: CourseId, codes: &[&str]) -> Self {
        Self {
            id,
            variant: CourseVariant::Ordered,
            controls: codes.iter().map(|code| CourseControl::exact(*code)).collect(),
            length_m: 0,
            climb_m: 0,
        }
    }

    /// The preferred code of every control, in order.
    #[must_use]
    pub fn code_list(&self) -> Vec<&str> {
        self.controls.iter().map(|c| c.code.as_str()).collect()
    }

    /// Whether two courses have the same control sequence.
    #[must_use]
    pub fn same_controls(&self, other: &Self) -> bool {
        self.controls.len() == other.controls.len()
            && self
                .controls
                .iter()
                .zip(&other.controls)
                .all(|(a, b)| a.code == b.code && a.kind == b.kind)
    }
}

/// Errors from parsing the legacy control mini-syntax.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlParseError {
    /// The control specification was empty.
    #[error("empty control specification")]
    Empty,
    /// Unbalanced or misplaced parentheses.
    #[error("malformed alternatives list in {0:?}")]
    MalformedList(String),
    /// A range like `43-41` runs backwards or is not numeric.
    #[error("invalid code range {0:?}")]
    InvalidRange(String),
}

/// Parses a legacy control specification into a structured control.
///
/// Accepted forms: `31`, `31(31,32,33)`, `31(31-33)`, `31(31,41-43,51)`,
/// `%`, `%(31,32)`, `*`, `*(31,32)`. Performed once at course-edit
/// time; the validator only ever sees the expanded lists.
pub fn parse_control_spec(spec: &str) -> Result<CourseControl, ControlParseError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(ControlParseError::Empty);
    }

    let (base, list) = match (spec.find('('), spec.rfind(')')) {
        (Some(open), Some(close)) if open < close && close == spec.len() - 1 => {
            (&spec[..open], Some(&spec[open + 1..close]))
        }
        (None, None) => (spec, None),
        _ => return Err(ControlParseError::MalformedList(spec.to_string())),
    };

    let kind = match base {
        "%" => ControlKind::Any,
        "*" => ControlKind::AnyUnique,
        _ => ControlKind::Exact,
    };

    let mut alternatives = Vec::new();
    if let Some(list) = list {
        for item in list.split(',') {
            let item = item.trim();
            match item.split_once('-') {
                Some((lo, hi)) => {
                    let lo: u32 = lo
                        .trim()
                        .parse()
                        .map_err(|_| ControlParseError::InvalidRange(item.to_string()))?;
                    let hi: u32 = hi
                        .trim()
                        .parse()
                        .map_err(|_| ControlParseError::InvalidRange(item.to_string()))?;
                    if lo > hi {
                        return Err(ControlParseError::InvalidRange(item.to_string()));
                    }
                    alternatives.extend((lo..=hi).map(|c| c.to_string()));
                }
                None => {
                    if item.is_empty() {
                        return Err(ControlParseError::MalformedList(spec.to_string()));
                    }
                    alternatives.push(item.to_string());
                }
            }
        }
    }

    let code = if kind == ControlKind::Exact {
        base.to_string()
    } else {
        // wildcard controls have no preferred code of their own
        String::new()
    };

    Ok(CourseControl {
        code,
        kind,
        alternatives,
        length_m: 0,
        score: 1,
    })
}
