//! Split and leg analysis.
//!
//! Per-person legs are derived from the same matched punch indices the
//! validator produced, so a punch is attributed to the control it
//! actually satisfied. Group analysis ranks each matched leg against
//! the other qualifying results in the group and records the leg
//! leader per control.

use serde::{Deserialize, Serialize};

use crate::result::{Leg, RaceResult};
use crate::time::OTime;
use crate::types::ResultId;
use crate::validator::Validation;

/// Fastest leg to one control within a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegLeader {
    /// Course control index the leg ends at.
    pub course_index: usize,
    /// Control code as punched by the leader.
    pub code: String,
    /// The leading leg time.
    pub leg_time: OTime,
    /// Result holding the leading leg.
    pub result: ResultId,
}

/// Builds per-punch legs for one result.
///
/// `validation` must come from validating this result's readout, so the
/// matched indices line up punch for punch. Every punch gets a leg;
/// only matched legs carry a course index and take part in group
/// ranking. Leg times measure from the previous punch (or the start),
/// matching how time is spent on the ground.
pub fn build_legs(result: &mut RaceResult, validation: &Validation, rollover: bool) {
    let start = result.start_time.unwrap_or(OTime::ZERO);
    let mut previous = start;
    result.legs = result
        .readout
        .punches
        .iter()
        .enumerate()
        .map(|(index, punch)| {
            let leg = Leg {
                index,
                course_index: validation.matched.get(index).copied().flatten(),
                code: punch.code.clone(),
                absolute_time: punch.time,
                relative_time: punch.time.elapsed_from(start, rollover),
                leg_time: Some(punch.time.elapsed_from(previous, rollover)),
                leg_place: None,
                relative_place: None,
            };
            previous = punch.time;
            leg
        })
        .collect();
}

/// Ranks matched legs across a group and returns the leg leaders.
///
/// Only qualifying results compete for leg places and leadership.
/// Ranks are 1-based; equal times share a rank.
pub fn rank_group_legs(results: &mut [&mut RaceResult]) -> Vec<LegLeader> {
    let max_index = results
        .iter()
        .flat_map(|r| r.legs.iter().filter_map(|l| l.course_index))
        .max();
    let Some(max_index) = max_index else {
        return Vec::new();
    };

    let mut leaders = Vec::new();
    for course_index in 0..=max_index {
        // (result position, leg position, leg time, relative time)
        let mut entries: Vec<(usize, usize, OTime, OTime)> = Vec::new();
        for (ri, result) in results.iter().enumerate() {
            if !result.status.qualifies() {
                continue;
            }
            let hit = result
                .legs
                .iter()
                .position(|l| l.course_index == Some(course_index));
            if let Some(li) = hit {
                let leg = &result.legs[li];
                if let Some(leg_time) = leg.leg_time {
                    entries.push((ri, li, leg_time, leg.relative_time));
                }
            }
        }
        if entries.is_empty() {
            continue;
        }

        for &(ri, li, leg_time, relative_time) in &entries {
            let leg_place = entries.iter().filter(|e| e.2 < leg_time).count() + 1;
            let relative_place = entries.iter().filter(|e| e.3 < relative_time).count() + 1;
            let leg = &mut results[ri].legs[li];
            leg.leg_place = Some(leg_place as u32);
            leg.relative_place = Some(relative_place as u32);
        }

        if let Some(&(ri, li, leg_time, _)) = entries.iter().min_by_key(|e| e.2) {
            leaders.push(LegLeader {
                course_index,
                code: results[ri].legs[li].code.clone(),
                leg_time,
                result: results[ri].id.clone(),
            });
        }
    }
    leaders
}
