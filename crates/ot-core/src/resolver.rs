//! Status and time resolution.
//!
//! Turns a readout plus reference data into a finished result: resolved
//! start and finish times, elapsed time with penalties and credits
//! applied, and a terminal status. The resolver never panics on missing
//! data; every gap maps to a status or a configured substitute.

use tracing::debug;

use crate::config::{FinishSource, MarkedRouteMode, MissedFinishPolicy, RaceConfig, StartSource};
use crate::course::{Course, CourseVariant};
use crate::person::{Group, Person};
use crate::result::{RaceResult, ResultStatus};
use crate::time::OTime;
use crate::validator::{Validation, validate};

/// Resolves one result in place.
///
/// Returns the course validation so callers can feed the same matched
/// punch indices into split analysis without re-scanning.
pub fn resolve(
    result: &mut RaceResult,
    person: Option<&Person>,
    group: Option<&Group>,
    course: Option<&Course>,
    config: &RaceConfig,
) -> Option<Validation> {
    result.reset_computed();

    result.start_time = resolve_start(result, person, config);
    result.finish_time = resolve_finish(result, config);

    let validation = course.map(|c| validate(&result.readout.punches, c, config.allow_duplicate_punches));

    // Marked-route penalty accounting comes from wrong-fork events.
    if let Some(v) = &validation {
        match config.marked_route_mode {
            MarkedRouteMode::Off => {}
            MarkedRouteMode::Time => {
                result.penalty_time = config
                    .marked_route_penalty_time
                    .times(u32::try_from(v.penalties.len()).unwrap_or(u32::MAX));
            }
            MarkedRouteMode::Laps => {
                result.penalty_laps = u32::try_from(v.penalties.len()).unwrap_or(u32::MAX);
            }
        }
        if matches!(course.map(|c| c.variant), Some(CourseVariant::Score)) {
            result.score = Some(v.score);
        }
    }

    let mut status = ResultStatus::Ok;

    // A readout with no punches and no marks never started the course.
    if result.readout.punches.is_empty()
        && result.readout.start_mark.is_none()
        && result.readout.finish_mark.is_none()
    {
        status = ResultStatus::DidNotStart;
    } else if result.finish_time.is_none() {
        status = apply_missed_finish(result, config);
    }

    if status == ResultStatus::Ok {
        if let Some(v) = &validation {
            if !v.complete {
                let tolerated = matches!(course.map(|c| c.variant), Some(CourseVariant::MarkedRoute))
                    && config.marked_route_dont_dsq;
                if !tolerated {
                    status = if config.dsq_on_incomplete {
                        ResultStatus::Disqualified
                    } else {
                        ResultStatus::MissingPunch
                    };
                }
            }
        }
    }

    if config.credit_time_enabled {
        result.credit_time = credit_time(result, config);
    }

    if let Some(finish) = result.finish_time {
        let start = result.start_time.unwrap_or(OTime::ZERO);
        let run = finish.elapsed_from(start, config.midnight_rollover);
        let elapsed = run
            .saturating_add(result.penalty_time)
            .saturating_sub(result.credit_time)
            .round(config.time_accuracy, config.time_rounding);
        result.elapsed = Some(elapsed);

        if status == ResultStatus::Ok {
            if let Some(max_time) = group.and_then(|g| g.max_time) {
                if elapsed > max_time {
                    status = ResultStatus::OverTime;
                }
            }
        }
    }

    result.status = match result.manual_status {
        None | Some(ResultStatus::Restored) => status,
        Some(manual) => {
            debug!(result = %result.id, %manual, "manual status override");
            manual
        }
    };

    validation
}

fn resolve_start(result: &RaceResult, person: Option<&Person>, config: &RaceConfig) -> Option<OTime> {
    let protocol = person.and_then(|p| p.start_time);
    match config.start_source {
        StartSource::Protocol => protocol,
        StartSource::Station => result.readout.start_mark.or(protocol),
        StartSource::Cp => result
            .readout
            .first_punch_at(&config.start_cp_number.to_string())
            .or(protocol),
        // No gate feed is wired into the readout path; a gate time would
        // arrive as a station mark on supporting hardware.
        StartSource::Gate => result.readout.start_mark.or(protocol),
    }
}

fn resolve_finish(result: &RaceResult, config: &RaceConfig) -> Option<OTime> {
    match config.finish_source {
        FinishSource::Station => result.readout.finish_mark,
        FinishSource::Cp => result
            .readout
            .last_punch_at(&config.finish_cp_number.to_string()),
    }
}

/// Applies the missed-finish policy; may substitute a finish time.
fn apply_missed_finish(result: &mut RaceResult, config: &RaceConfig) -> ResultStatus {
    match config.missed_finish {
        MissedFinishPolicy::Zero => {
            result.finish_time = result.start_time;
            ResultStatus::Ok
        }
        MissedFinishPolicy::Dsq => ResultStatus::Disqualified,
        MissedFinishPolicy::Readout => {
            result.finish_time = Some(result.readout.received_at);
            ResultStatus::Ok
        }
        MissedFinishPolicy::Penalty => match result.readout.last_punch_time() {
            Some(last) => {
                result.finish_time = Some(last.saturating_add(config.missed_finish_penalty));
                ResultStatus::Ok
            }
            None => ResultStatus::DidNotFinish,
        },
        MissedFinishPolicy::Dnf => ResultStatus::DidNotFinish,
    }
}

/// Time credited back at the rest control.
///
/// Each punch at the credit control credits the span since the previous
/// punch, or since the start for the first punch of the readout.
fn credit_time(result: &RaceResult, config: &RaceConfig) -> OTime {
    let code = config.credit_time_cp.to_string();
    let start = result.start_time.unwrap_or(OTime::ZERO);
    let mut credit = OTime::ZERO;
    let mut previous = start;
    for punch in &result.readout.punches {
        if punch.code == code {
            credit = credit.saturating_add(punch.time.saturating_sub(previous));
        }
        previous = punch.time;
    }
    credit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoresMode;
    use crate::course::parse_control_spec;
    use crate::readout::{RawPunch, RawReadout, Readout};
    use crate::time::TimeRounding;
    use crate::types::{CourseId, GroupId, PersonId};

    fn readout(punches: &[(&str, i64)], start: Option<i64>, finish: Option<i64>) -> Readout {
        Readout::normalize_at(
            &RawReadout {
                card_number: 7,
                punches: punches
                    .iter()
                    .map(|(code, sec)| RawPunch {
                        code: (*code).to_string(),
                        ticks: *sec,
                    })
                    .collect(),
                start_ticks: start,
                finish_ticks: finish,
                sequence_id: 1,
            },
            0,
            OTime::hms(13, 0, 0),
        )
        .unwrap()
    }

    fn person_starting(start: OTime) -> Person {
        let mut p = Person::new(PersonId::new("p1").unwrap(), 101, None);
        p.start_time = Some(start);
        p
    }

    fn course(codes: &[&str]) -> Course {
        Course::ordered(CourseId::new("c").unwrap(), codes)
    }

    fn sec(t: OTime) -> i64 {
        t.as_msec() / 1_000
    }

    #[test]
    fn protocol_start_station_finish() {
        let start = OTime::hms(10, 0, 0);
        // finish mark at 10:45:30
        let mut result = RaceResult::new(
            readout(&[("31", 36_600)], None, Some(38_730)),
            None,
        );
        let person = person_starting(start);

        resolve(&mut result, Some(&person), None, Some(&course(&["31"])), &RaceConfig::default());
        assert_eq!(result.status, ResultStatus::Ok);
        assert_eq!(result.start_time, Some(start));
        assert_eq!(result.finish_time, Some(OTime::hms(10, 45, 30)));
        assert_eq!(result.elapsed, Some(OTime::hms(0, 45, 30)));
    }

    #[test]
    fn station_start_overrides_protocol() {
        let config = RaceConfig {
            start_source: StartSource::Station,
            ..RaceConfig::default()
        };
        let mut result = RaceResult::new(
            readout(&[("31", 36_600)], Some(36_060), Some(37_200)),
            None,
        );
        let person = person_starting(OTime::hms(10, 0, 0));

        resolve(&mut result, Some(&person), None, None, &config);
        assert_eq!(result.start_time, Some(OTime::from_sec(36_060)));
        assert_eq!(result.elapsed, Some(OTime::hms(0, 19, 0)));
    }

    #[test]
    fn gate_start_uses_station_mark_then_protocol() {
        let config = RaceConfig {
            start_source: StartSource::Gate,
            ..RaceConfig::default()
        };
        let person = person_starting(OTime::hms(10, 0, 0));

        // a station mark stands in for the gate feed
        let mut result = RaceResult::new(
            readout(&[("31", 36_600)], Some(36_060), Some(37_200)),
            None,
        );
        resolve(&mut result, Some(&person), None, None, &config);
        assert_eq!(result.start_time, Some(OTime::from_sec(36_060)));
        assert_eq!(result.elapsed, Some(OTime::hms(0, 19, 0)));

        // without one, the protocol start applies
        let mut result = RaceResult::new(
            readout(&[("31", 36_600)], None, Some(37_200)),
            None,
        );
        resolve(&mut result, Some(&person), None, None, &config);
        assert_eq!(result.start_time, Some(OTime::hms(10, 0, 0)));
        assert_eq!(result.elapsed, Some(OTime::hms(0, 20, 0)));
    }

    #[test]
    fn cp_sources_use_punches() {
        let config = RaceConfig {
            start_source: StartSource::Cp,
            finish_source: FinishSource::Cp,
            ..RaceConfig::default()
        };
        // start cp 31 punched twice: first counts; finish cp 90: last counts
        let mut result = RaceResult::new(
            readout(
                &[("31", 36_000), ("31", 36_010), ("90", 37_000), ("90", 37_100)],
                None,
                None,
            ),
            None,
        );

        resolve(&mut result, None, None, None, &config);
        assert_eq!(result.start_time, Some(OTime::from_sec(36_000)));
        assert_eq!(result.finish_time, Some(OTime::from_sec(37_100)));
        assert_eq!(result.elapsed, Some(OTime::from_sec(1_100)));
    }

    #[test]
    fn missed_finish_policies() {
        let start = OTime::hms(10, 0, 0);
        let person = person_starting(start);
        let base = readout(&[("31", 36_600)], None, None);

        let mut r = RaceResult::new(base.clone(), None);
        resolve(&mut r, Some(&person), None, None, &RaceConfig::default());
        assert_eq!(r.status, ResultStatus::DidNotFinish);
        assert_eq!(r.elapsed, None);

        let mut r = RaceResult::new(base.clone(), None);
        let config = RaceConfig {
            missed_finish: MissedFinishPolicy::Dsq,
            ..RaceConfig::default()
        };
        resolve(&mut r, Some(&person), None, None, &config);
        assert_eq!(r.status, ResultStatus::Disqualified);

        let mut r = RaceResult::new(base.clone(), None);
        let config = RaceConfig {
            missed_finish: MissedFinishPolicy::Readout,
            ..RaceConfig::default()
        };
        resolve(&mut r, Some(&person), None, None, &config);
        // readout received at 13:00:00
        assert_eq!(r.elapsed, Some(OTime::hms(3, 0, 0)));

        let mut r = RaceResult::new(base.clone(), None);
        let config = RaceConfig {
            missed_finish: MissedFinishPolicy::Penalty,
            ..RaceConfig::default()
        };
        resolve(&mut r, Some(&person), None, None, &config);
        // last punch 10:10:00 plus the 60 s penalty
        assert_eq!(sec(r.finish_time.unwrap()), 36_660);
        assert_eq!(r.elapsed, Some(OTime::hms(0, 11, 0)));

        let mut r = RaceResult::new(base, None);
        let config = RaceConfig {
            missed_finish: MissedFinishPolicy::Zero,
            ..RaceConfig::default()
        };
        resolve(&mut r, Some(&person), None, None, &config);
        assert_eq!(r.elapsed, Some(OTime::ZERO));
        assert_eq!(r.status, ResultStatus::Ok);
    }

    #[test]
    fn incomplete_course_status_follows_policy() {
        let person = person_starting(OTime::hms(10, 0, 0));

        let mut result = RaceResult::new(
            readout(&[("31", 36_600)], None, Some(37_200)),
            None,
        );
        resolve(
            &mut result,
            Some(&person),
            None,
            Some(&course(&["31", "32"])),
            &RaceConfig::default(),
        );
        assert_eq!(result.status, ResultStatus::Disqualified);
        // elapsed is still computed for review
        assert!(result.elapsed.is_some());

        let config = RaceConfig {
            dsq_on_incomplete: false,
            ..RaceConfig::default()
        };
        let mut result = RaceResult::new(
            readout(&[("31", 36_600)], None, Some(37_200)),
            None,
        );
        resolve(&mut result, Some(&person), None, Some(&course(&["31", "32"])), &config);
        assert_eq!(result.status, ResultStatus::MissingPunch);
    }

    #[test]
    fn marked_route_penalties_and_tolerance() {
        let mut c = course(&["31", "41"]);
        c.variant = CourseVariant::MarkedRoute;
        c.controls[0] = parse_control_spec("31(31,32,33)").unwrap();

        let config = RaceConfig {
            marked_route_mode: MarkedRouteMode::Time,
            marked_route_penalty_time: OTime::from_sec(60),
            ..RaceConfig::default()
        };
        // wrong fork 32, complete course
        let mut result = RaceResult::new(
            readout(&[("32", 36_300), ("41", 36_600)], Some(36_000), Some(36_900)),
            None,
        );
        let config = RaceConfig {
            start_source: StartSource::Station,
            ..config
        };
        resolve(&mut result, None, None, Some(&c), &config);
        assert_eq!(result.status, ResultStatus::Ok);
        assert_eq!(result.penalty_time, OTime::from_sec(60));
        // 15 min run plus 1 min penalty
        assert_eq!(result.elapsed, Some(OTime::hms(0, 16, 0)));

        // laps mode counts events instead
        let config = RaceConfig {
            marked_route_mode: MarkedRouteMode::Laps,
            ..config
        };
        let mut result = RaceResult::new(
            readout(&[("32", 36_300), ("41", 36_600)], Some(36_000), Some(36_900)),
            None,
        );
        resolve(&mut result, None, None, Some(&c), &config);
        assert_eq!(result.penalty_laps, 1);
        assert_eq!(result.penalty_time, OTime::ZERO);

        // incomplete marked route stays un-disqualified when configured
        let config = RaceConfig {
            marked_route_dont_dsq: true,
            ..config
        };
        let mut result = RaceResult::new(
            readout(&[("32", 36_300)], Some(36_000), Some(36_900)),
            None,
        );
        resolve(&mut result, None, None, Some(&c), &config);
        assert_eq!(result.status, ResultStatus::Ok);
    }

    #[test]
    fn credit_time_subtracts_rest_spans() {
        let config = RaceConfig {
            start_source: StartSource::Station,
            credit_time_enabled: true,
            credit_time_cp: 92,
            ..RaceConfig::default()
        };
        // rest control 92 visited twice: 30 min and 20 min spans
        let mut result = RaceResult::new(
            readout(
                &[("31", 600), ("92", 2_400), ("32", 3_000), ("92", 4_200)],
                Some(0),
                Some(4_800),
            ),
            None,
        );
        resolve(&mut result, None, None, None, &config);
        assert_eq!(result.credit_time, OTime::hms(0, 50, 0));
        assert_eq!(result.elapsed, Some(OTime::hms(0, 30, 0)));
    }

    #[test]
    fn over_time_against_group_max() {
        let mut group = Group::new(GroupId::new("M21").unwrap(), None);
        group.max_time = Some(OTime::hms(0, 15, 0));

        let mut result = RaceResult::new(
            readout(&[("31", 36_600)], Some(36_000), Some(37_200)),
            None,
        );
        let config = RaceConfig {
            start_source: StartSource::Station,
            ..RaceConfig::default()
        };
        resolve(&mut result, None, Some(&group), None, &config);
        assert_eq!(result.status, ResultStatus::OverTime);
        assert_eq!(result.elapsed, Some(OTime::hms(0, 20, 0)));
    }

    #[test]
    fn midnight_rollover_window() {
        let config = RaceConfig {
            start_source: StartSource::Station,
            ..RaceConfig::default()
        };
        let mut result = RaceResult::new(
            readout(&[("31", 84_600)], Some(84_600), Some(900)),
            None,
        );
        resolve(&mut result, None, None, None, &config);
        // 23:30 start, 00:15 finish
        assert_eq!(result.elapsed, Some(OTime::hms(0, 45, 0)));

        let config = RaceConfig {
            midnight_rollover: false,
            ..config
        };
        let mut result = RaceResult::new(
            readout(&[("31", 84_600)], Some(84_600), Some(900)),
            None,
        );
        resolve(&mut result, None, None, None, &config);
        assert_eq!(result.elapsed, Some(OTime::ZERO));
    }

    #[test]
    fn manual_status_survives_recompute() {
        let mut result = RaceResult::new(
            readout(&[("31", 36_600)], Some(36_000), Some(37_200)),
            None,
        );
        result.manual_status = Some(ResultStatus::Disqualified);
        let config = RaceConfig {
            start_source: StartSource::Station,
            ..RaceConfig::default()
        };
        resolve(&mut result, None, None, None, &config);
        assert_eq!(result.status, ResultStatus::Disqualified);

        // restoring puts the result back into normal computation
        result.manual_status = Some(ResultStatus::Restored);
        resolve(&mut result, None, None, None, &config);
        assert_eq!(result.status, ResultStatus::Ok);
    }

    #[test]
    fn empty_readout_is_did_not_start() {
        let mut result = RaceResult::new(readout(&[], None, None), None);
        resolve(&mut result, None, None, None, &RaceConfig::default());
        assert_eq!(result.status, ResultStatus::DidNotStart);
    }

    #[test]
    fn elapsed_is_rounded_to_accuracy() {
        let config = RaceConfig {
            start_source: StartSource::Station,
            time_accuracy: 0,
            time_rounding: TimeRounding::Down,
            scores_mode: ScoresMode::Off,
            ..RaceConfig::default()
        };
        let mut result = RaceResult::new(
            Readout::normalize_at(
                &RawReadout {
                    card_number: 7,
                    punches: vec![RawPunch {
                        code: "31".to_string(),
                        ticks: 605_500,
                    }],
                    start_ticks: Some(600_000),
                    finish_ticks: Some(612_700),
                    sequence_id: 1,
                },
                3,
                OTime::ZERO,
            )
            .unwrap(),
            None,
        );
        resolve(&mut result, None, None, None, &config);
        // 12.7 s truncated to whole seconds
        assert_eq!(result.elapsed, Some(OTime::from_sec(12)));
    }

    #[test]
    fn score_course_carries_points() {
        let mut c = course(&["31", "32"]);
        c.variant = CourseVariant::Score;
        c.controls[0].score = 4;
        c.controls[1].score = 6;

        let config = RaceConfig {
            start_source: StartSource::Station,
            ..RaceConfig::default()
        };
        let mut result = RaceResult::new(
            readout(&[("32", 36_300), ("31", 36_500)], Some(36_000), Some(36_900)),
            None,
        );
        resolve(&mut result, None, None, Some(&c), &config);
        assert_eq!(result.score, Some(10));
        assert_eq!(result.status, ResultStatus::Ok);
    }
}
