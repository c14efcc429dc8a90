//! Course validation: matching a punch stream against a course.
//!
//! The validator is a pure function. Ordered and marked-route courses
//! use a greedy two-pointer scan that tolerates interspersed spurious
//! punches but not a skipped control; free-order courses only require
//! every control's code to appear; score courses accumulate points and
//! have no completeness requirement.

use serde::{Deserialize, Serialize};

use crate::course::{Course, CourseVariant};
use crate::readout::Punch;

/// Per-punch classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PunchClass {
    /// Consumed a course control.
    Valid,
    /// Spurious: did not advance the course.
    Extra,
}

/// A marked-route penalty event: a non-preferred fork was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyEvent {
    /// Index of the offending punch.
    pub punch_index: usize,
    /// Code actually punched.
    pub code: String,
    /// The preferred code of the control it matched.
    pub expected: String,
}

/// Outcome of validating one readout against one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Whether the course requirement was fully satisfied.
    pub complete: bool,
    /// Parallel to the punches: matched course index, or None for Extra.
    pub matched: Vec<Option<usize>>,
    /// Marked-route penalty events, in punch order.
    pub penalties: Vec<PenaltyEvent>,
    /// Accumulated points (score courses only).
    pub score: i64,
}

impl Validation {
    /// Classification of the punch at `index`.
    #[must_use]
    pub fn class_of(&self, index: usize) -> PunchClass {
        if self.matched.get(index).copied().flatten().is_some() {
            PunchClass::Valid
        } else {
            PunchClass::Extra
        }
    }

    fn trivially_complete(punch_count: usize) -> Self {
        Self {
            complete: true,
            matched: vec![None; punch_count],
            penalties: Vec::new(),
            score: 0,
        }
    }
}

/// Validates a punch sequence against a course.
///
/// `allow_duplicates` lets repeated punches of one code satisfy
/// repeated same-code controls (ring/repeat-punch formats).
#[must_use]
pub fn validate(punches: &[Punch], course: &Course, allow_duplicates: bool) -> Validation {
    // An empty course is trivially complete.
    if course.controls.is_empty() {
        return Validation::trivially_complete(punches.len());
    }

    match course.variant {
        CourseVariant::Ordered | CourseVariant::MarkedRoute => {
            scan_ordered(punches, course, course.variant == CourseVariant::MarkedRoute)
        }
        CourseVariant::FreeOrder => scan_free_order(punches, course, allow_duplicates),
        CourseVariant::Score => scan_score(punches, course, allow_duplicates),
    }
}

/// Greedy two-pointer scan for ordered and marked-route courses.
fn scan_ordered(punches: &[Punch], course: &Course, marked_route: bool) -> Validation {
    let mut matched = vec![None; punches.len()];
    let mut penalties = Vec::new();
    let mut pointer = 0;
    let mut seen: Vec<&str> = Vec::with_capacity(punches.len());

    for (index, punch) in punches.iter().enumerate() {
        if pointer < course.controls.len() {
            let control = &course.controls[pointer];
            if control.accepts(&punch.code, &seen) {
                matched[index] = Some(pointer);
                if marked_route && control.is_wrong_fork(&punch.code) {
                    penalties.push(PenaltyEvent {
                        punch_index: index,
                        code: punch.code.clone(),
                        expected: control.code.clone(),
                    });
                }
                pointer += 1;
            }
        }
        seen.push(&punch.code);
    }

    Validation {
        complete: pointer == course.controls.len(),
        matched,
        penalties,
        score: 0,
    }
}

/// Set matching for free-order courses: order ignored.
fn scan_free_order(punches: &[Punch], course: &Course, allow_duplicates: bool) -> Validation {
    let mut matched = vec![None; punches.len()];
    let mut satisfied = vec![false; course.controls.len()];
    let mut used_codes: Vec<&str> = Vec::new();

    for (index, punch) in punches.iter().enumerate() {
        if !allow_duplicates && used_codes.contains(&punch.code.as_str()) {
            continue;
        }
        let slot = course
            .controls
            .iter()
            .enumerate()
            .position(|(i, control)| !satisfied[i] && control.accepts(&punch.code, &[]));
        if let Some(i) = slot {
            satisfied[i] = true;
            matched[index] = Some(i);
            used_codes.push(&punch.code);
        }
    }

    Validation {
        complete: satisfied.iter().all(|s| *s),
        matched,
        penalties: Vec::new(),
        score: 0,
    }
}

/// Point accumulation for score courses.
fn scan_score(punches: &[Punch], course: &Course, allow_duplicates: bool) -> Validation {
    let mut matched = vec![None; punches.len()];
    let mut score = 0_i64;
    let mut counted: Vec<&str> = Vec::new();

    for (index, punch) in punches.iter().enumerate() {
        if !allow_duplicates && counted.contains(&punch.code.as_str()) {
            continue;
        }
        let hit = course
            .controls
            .iter()
            .position(|control| control.accepts(&punch.code, &[]));
        if let Some(i) = hit {
            matched[index] = Some(i);
            score += i64::from(course.controls[i].score);
            counted.push(&punch.code);
        }
    }

    Validation {
        complete: true,
        matched,
        penalties: Vec::new(),
        score,
    }
}
