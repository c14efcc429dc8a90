//! The race context and the computation pipeline.
//!
//! A [`Race`] is an explicit value owning all reference data, results
//! and policy; every pipeline call takes it by reference. There is no
//! ambient current race. The pipeline has a single writer: readouts
//! enter through [`Race::process_readout`] and computed fields are
//! refreshed wholesale by [`Race::recalculate`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{DuplicatePolicy, RaceConfig, ScoresMode};
use crate::course::{Course, CourseVariant};
use crate::person::{Group, Person};
use crate::placement::assign_places;
use crate::ranking::{Qualification, assign_ranks};
use crate::readout::{MalformedReadout, RawReadout, Readout};
use crate::resolver::resolve;
use crate::result::RaceResult;
use crate::scoring::{Formula, score_for_place};
use crate::splits::{LegLeader, build_legs, rank_group_legs};
use crate::types::{CourseId, GroupId, PersonId, ResultId};

/// Errors from race-level operations.
#[derive(Debug, Error)]
pub enum RaceError {
    /// The race file carries an invalid policy combination.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    /// A readout was structurally invalid.
    #[error(transparent)]
    Malformed(#[from] MalformedReadout),
    /// A result id that is not part of this race.
    #[error("unknown result {0}")]
    UnknownResult(ResultId),
    /// A bib number no competitor carries.
    #[error("no competitor with bib {0}")]
    UnknownBib(u32),
}

/// What happened to an incoming readout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadoutOutcome {
    /// A new result was created.
    Created(ResultId),
    /// Punches were merged into an existing result.
    Merged(ResultId),
    /// A repeated readout was dropped.
    Ignored,
    /// A result was created without a competitor; the operator must
    /// assign a bib before it can rank.
    NeedsBib(ResultId),
}

/// Per-group artifacts of a recomputation.
#[derive(Debug, Clone, Default)]
pub struct RecalcReport {
    /// Leg leaders per group, in group order.
    pub leg_leaders: Vec<(GroupId, Vec<LegLeader>)>,
}

/// A complete race: reference data, policy and results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    /// Race title for display.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub persons: Vec<Person>,
    #[serde(default)]
    pub results: Vec<RaceResult>,
    #[serde(default)]
    pub config: RaceConfig,
}

impl Race {
    /// Creates an empty race under the given policy.
    #[must_use]
    pub fn new(config: RaceConfig) -> Self {
        Self {
            title: String::new(),
            courses: Vec::new(),
            groups: Vec::new(),
            persons: Vec::new(),
            results: Vec::new(),
            config,
        }
    }

    /// Validates the policy record. Called once after loading.
    pub fn validate(&self) -> Result<(), RaceError> {
        self.config.validate()?;
        Ok(())
    }

    /// The competitor assigned the given card, if any.
    #[must_use]
    pub fn find_person_by_card(&self, card_number: u32) -> Option<&Person> {
        self.persons
            .iter()
            .find(|p| p.card_number == Some(card_number))
    }

    /// The competitor with the given bib, if any.
    #[must_use]
    pub fn find_person_by_bib(&self, bib: u32) -> Option<&Person> {
        self.persons.iter().find(|p| p.bib == bib)
    }

    /// The group the person starts in.
    #[must_use]
    pub fn find_group(&self, person: &Person) -> Option<&Group> {
        group_of(&self.groups, person)
    }

    /// The course a person runs.
    ///
    /// A course named after the person's bib takes precedence over the
    /// group course, so individual (relay) course assignments win.
    #[must_use]
    pub fn find_course(&self, person: &Person) -> Option<&Course> {
        course_of(&self.courses, &self.groups, person)
    }

    /// Takes one raw readout into the race.
    ///
    /// The readout is normalized, matched to a competitor by card
    /// number, and checked against existing results of the same card
    /// under the duplicate policy. Computed fields are not refreshed;
    /// call [`Race::recalculate`] afterwards.
    pub fn process_readout(&mut self, raw: &RawReadout) -> Result<ReadoutOutcome, RaceError> {
        let readout = Readout::normalize(raw, self.config.time_accuracy)?;
        self.take_readout(readout)
    }

    /// [`Race::process_readout`] for an already-normalized readout.
    pub fn take_readout(&mut self, readout: Readout) -> Result<ReadoutOutcome, RaceError> {
        let person = self
            .find_person_by_card(readout.card_number)
            .map(|p| p.id.clone());

        let duplicate = self.results.iter().position(|r| {
            r.readout.card_number == readout.card_number
                && (r.readout.sequence_id == readout.sequence_id
                    || within_timeout(r, &readout, self.config.duplicate_timeout))
        });

        let outcome = match duplicate {
            None => {
                let result = RaceResult::new(readout, person);
                let id = result.id.clone();
                self.results.push(result);
                ReadoutOutcome::Created(id)
            }
            Some(index) => {
                let existing = &mut self.results[index];
                // An identical transmission is always dropped.
                if existing.readout.sequence_id == readout.sequence_id
                    && existing.readout.punches == readout.punches
                {
                    debug!(card = readout.card_number, "retransmitted readout dropped");
                    return Ok(ReadoutOutcome::Ignored);
                }
                match self.config.duplicate_policy {
                    DuplicatePolicy::SeveralResults => {
                        let result = RaceResult::new(readout, person);
                        let id = result.id.clone();
                        self.results.push(result);
                        ReadoutOutcome::Created(id)
                    }
                    DuplicatePolicy::Merge => {
                        existing.readout.merge_with(&readout);
                        ReadoutOutcome::Merged(existing.id.clone())
                    }
                    DuplicatePolicy::Ignore => ReadoutOutcome::Ignored,
                    DuplicatePolicy::BibRequest => {
                        let result = RaceResult::new(readout, None);
                        let id = result.id.clone();
                        self.results.push(result);
                        ReadoutOutcome::NeedsBib(id)
                    }
                }
            }
        };

        info!(?outcome, "readout processed");
        Ok(outcome)
    }

    /// Attaches a competitor, by bib, to a result waiting for one.
    pub fn assign_bib(&mut self, result_id: &ResultId, bib: u32) -> Result<(), RaceError> {
        let person_id = self
            .find_person_by_bib(bib)
            .map(|p| p.id.clone())
            .ok_or(RaceError::UnknownBib(bib))?;
        let result = self
            .results
            .iter_mut()
            .find(|r| &r.id == result_id)
            .ok_or_else(|| RaceError::UnknownResult(result_id.clone()))?;
        result.person = Some(person_id);
        Ok(())
    }

    /// Recomputes every result, then places, splits and scores per group.
    ///
    /// One result failing to resolve is logged and skipped; it never
    /// blocks the rest of its group.
    pub fn recalculate(&mut self) -> RecalcReport {
        let formula = self.parse_formula();
        self.resolve_all();

        let mut report = RecalcReport::default();
        let person_group: HashMap<PersonId, GroupId> = self
            .persons
            .iter()
            .filter_map(|p| p.group.clone().map(|g| (p.id.clone(), g)))
            .collect();
        let out_of_competition: Vec<PersonId> = self
            .persons
            .iter()
            .filter(|p| p.is_out_of_competition)
            .map(|p| p.id.clone())
            .collect();
        let person_qual: HashMap<PersonId, Qualification> = self
            .persons
            .iter()
            .map(|p| (p.id.clone(), p.qual))
            .collect();

        let group_ids: Vec<GroupId> = self.groups.iter().map(|g| g.id.clone()).collect();
        for group_id in group_ids {
            let scored = self.group_is_scored(&group_id);
            let mut ranking = self
                .groups
                .iter()
                .find(|g| g.id == group_id)
                .map(|g| g.ranking.clone())
                .unwrap_or_default();
            let mut members: Vec<&mut RaceResult> = self
                .results
                .iter_mut()
                .filter(|r| {
                    r.person
                        .as_ref()
                        .and_then(|p| person_group.get(p))
                        .is_some_and(|g| *g == group_id)
                })
                .collect();

            let finished = assign_places(&mut members, scored, |r| {
                r.person
                    .as_ref()
                    .is_some_and(|p| out_of_competition.contains(p))
            });
            let leaders = rank_group_legs(&mut members);
            assign_ranks(&mut members, &mut ranking, |r| {
                r.person
                    .as_ref()
                    .and_then(|p| person_qual.get(p))
                    .copied()
                    .unwrap_or_default()
            });

            assign_scores(&mut members, &self.config, formula.as_ref());
            drop(members);

            if let Some(group) = self.groups.iter_mut().find(|g| g.id == group_id) {
                group.count_finished = finished;
                group.ranking = ranking;
            }
            report.leg_leaders.push((group_id, leaders));
        }

        report
    }

    /// Resolves every result and rebuilds its legs.
    fn resolve_all(&mut self) {
        let persons: HashMap<PersonId, Person> = self
            .persons
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect();

        for result in &mut self.results {
            let person = result.person.as_ref().and_then(|id| persons.get(id));
            let group = person.and_then(|p| group_of(&self.groups, p));
            let course = person.and_then(|p| course_of(&self.courses, &self.groups, p));

            if let Some(c) = course {
                if c.controls.is_empty() {
                    warn!(course = %c.id, "course has no controls; check passes trivially");
                }
            }

            let validation = resolve(result, person, group, course, &self.config);
            if let Some(v) = &validation {
                build_legs(result, v, self.config.midnight_rollover);
            }
        }
    }

    fn group_is_scored(&self, group_id: &GroupId) -> bool {
        self.groups
            .iter()
            .find(|g| g.id == *group_id)
            .and_then(|g| g.course.as_ref())
            .and_then(|id| self.courses.iter().find(|c| c.id == *id))
            .is_some_and(|c| c.variant == CourseVariant::Score)
    }

    fn parse_formula(&self) -> Option<Formula> {
        if self.config.scores_mode != ScoresMode::Formula {
            return None;
        }
        match Formula::parse(&self.config.scores_formula) {
            Ok(f) => Some(f),
            Err(error) => {
                warn!(%error, "score formula rejected; scores left unset");
                None
            }
        }
    }
}

fn group_of<'a>(groups: &'a [Group], person: &Person) -> Option<&'a Group> {
    let id = person.group.as_ref()?;
    groups.iter().find(|g| g.id == *id)
}

fn course_of<'a>(courses: &'a [Course], groups: &[Group], person: &Person) -> Option<&'a Course> {
    let by_name = |name: &str| {
        CourseId::new(name)
            .ok()
            .and_then(|id| courses.iter().find(|c| c.id == id))
    };

    if person.bib > 0 {
        if let Some(course) = by_name(&person.bib.to_string()) {
            return Some(course);
        }
    }
    // Relay fallback: bibs above 1000 also answer to "<number>.<leg>".
    if person.bib > 1_000 {
        let relay = format!("{}.{}", person.bib % 1_000, person.bib / 1_000);
        if let Some(course) = by_name(&relay) {
            return Some(course);
        }
    }

    let group = group_of(groups, person)?;
    let id = group.course.as_ref()?;
    courses.iter().find(|c| c.id == *id)
}

/// Score after placement: table lookup or formula over elapsed seconds.
fn assign_scores(members: &mut [&mut RaceResult], config: &RaceConfig, formula: Option<&Formula>) {
    match config.scores_mode {
        ScoresMode::Off => {}
        ScoresMode::Array => {
            for result in members.iter_mut() {
                result.score = Some(score_for_place(&config.scores_array, result.place));
            }
        }
        ScoresMode::Formula => {
            let Some(formula) = formula else { return };
            let leader = members
                .iter()
                .filter(|r| r.status.qualifies())
                .filter_map(|r| r.elapsed)
                .min();
            let Some(leader) = leader else { return };
            for result in members.iter_mut() {
                let Some(elapsed) = result.elapsed else {
                    continue;
                };
                #[allow(clippy::cast_precision_loss)]
                let score = formula.score(
                    elapsed.as_msec() as f64 / 1_000.0,
                    leader.as_msec() as f64 / 1_000.0,
                );
                match score {
                    Ok(score) => result.score = Some(score),
                    Err(error) => {
                        warn!(result = %result.id, %error, "score evaluation failed");
                    }
                }
            }
        }
    }
}

fn within_timeout(existing: &RaceResult, readout: &Readout, timeout: crate::time::OTime) -> bool {
    let earlier = existing.readout.received_at.min(readout.received_at);
    let later = existing.readout.received_at.max(readout.received_at);
    later.saturating_sub(earlier) <= timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StartSource;
    use crate::readout::RawPunch;
    use crate::result::{Place, ResultStatus};
    use crate::time::OTime;

    fn raw(card: u32, sequence_id: u64, punches: &[(&str, i64)], finish: i64) -> RawReadout {
        RawReadout {
            card_number: card,
            punches: punches
                .iter()
                .map(|(code, sec)| RawPunch {
                    code: (*code).to_string(),
                    ticks: *sec,
                })
                .collect(),
            start_ticks: Some(36_000),
            finish_ticks: Some(finish),
            sequence_id,
        }
    }

    fn race() -> Race {
        let config = RaceConfig {
            start_source: StartSource::Station,
            ..RaceConfig::default()
        };
        let mut race = Race::new(config);
        race.courses
            .push(Course::ordered(CourseId::new("A").unwrap(), &["31", "32", "33"]));
        let group = Group::new(GroupId::new("M21").unwrap(), Some(CourseId::new("A").unwrap()));
        race.groups.push(group);
        for (id, bib, card) in [("p1", 101, 1_001), ("p2", 102, 1_002), ("p3", 103, 1_003)] {
            let mut person = Person::new(
                PersonId::new(id).unwrap(),
                bib,
                Some(GroupId::new("M21").unwrap()),
            );
            person.card_number = Some(card);
            race.persons.push(person);
        }
        race
    }

    fn take(race: &mut Race, raw: &RawReadout) -> ReadoutOutcome {
        let readout =
            Readout::normalize_at(raw, race.config.time_accuracy, OTime::hms(12, 0, 0)).unwrap();
        race.take_readout(readout).unwrap()
    }

    #[test]
    fn end_to_end_places_a_group() {
        let mut race = race();
        // p1 36:10, p2 and p3 tie at 36:30
        take(&mut race, &raw(1_001, 1, &[("31", 36_600), ("32", 37_200), ("33", 37_800)], 38_170));
        take(&mut race, &raw(1_002, 2, &[("31", 36_700), ("32", 37_300), ("33", 37_900)], 38_190));
        take(&mut race, &raw(1_003, 3, &[("31", 36_650), ("32", 37_350), ("33", 37_950)], 38_190));

        race.recalculate();

        let by_card = |card: u32| {
            race.results
                .iter()
                .find(|r| r.readout.card_number == card)
                .unwrap()
        };
        assert_eq!(by_card(1_001).status, ResultStatus::Ok);
        assert_eq!(by_card(1_001).place, Place::Numbered(1));
        assert_eq!(by_card(1_002).place, Place::Numbered(2));
        assert_eq!(by_card(1_003).place, Place::Numbered(2));
        assert_eq!(race.groups[0].count_finished, 3);
        assert!(!by_card(1_001).legs.is_empty());
    }

    #[test]
    fn unknown_card_still_creates_a_result() {
        let mut race = race();
        let outcome = take(&mut race, &raw(9_999, 1, &[("31", 36_600)], 37_000));
        assert!(matches!(outcome, ReadoutOutcome::Created(_)));
        assert_eq!(race.results[0].person, None);

        race.recalculate();
        // resolves without a course; no placement without a group
        assert_eq!(race.results[0].place, Place::None);
    }

    #[test]
    fn retransmission_is_always_dropped() {
        let mut race = race();
        let r = raw(1_001, 7, &[("31", 36_600)], 37_000);
        assert!(matches!(take(&mut race, &r), ReadoutOutcome::Created(_)));
        assert_eq!(take(&mut race, &r), ReadoutOutcome::Ignored);
        assert_eq!(race.results.len(), 1);
    }

    #[test]
    fn duplicate_policy_merge() {
        let mut race = race();
        race.config.duplicate_policy = DuplicatePolicy::Merge;
        take(&mut race, &raw(1_001, 1, &[("31", 36_600)], 37_000));
        let outcome = take(&mut race, &raw(1_001, 2, &[("32", 36_700)], 37_000));
        assert!(matches!(outcome, ReadoutOutcome::Merged(_)));
        assert_eq!(race.results.len(), 1);
        assert_eq!(race.results[0].readout.punches.len(), 2);
    }

    #[test]
    fn duplicate_policy_ignore_and_several() {
        let mut race = race();
        race.config.duplicate_policy = DuplicatePolicy::Ignore;
        take(&mut race, &raw(1_001, 1, &[("31", 36_600)], 37_000));
        assert_eq!(
            take(&mut race, &raw(1_001, 2, &[("32", 36_700)], 37_000)),
            ReadoutOutcome::Ignored
        );
        assert_eq!(race.results.len(), 1);

        race.config.duplicate_policy = DuplicatePolicy::SeveralResults;
        let outcome = take(&mut race, &raw(1_001, 3, &[("32", 36_800)], 37_100));
        assert!(matches!(outcome, ReadoutOutcome::Created(_)));
        assert_eq!(race.results.len(), 2);
    }

    #[test]
    fn bib_request_defers_to_operator() {
        let mut race = race();
        race.config.duplicate_policy = DuplicatePolicy::BibRequest;
        take(&mut race, &raw(1_001, 1, &[("31", 36_600)], 37_000));
        let outcome = take(&mut race, &raw(1_001, 2, &[("32", 36_700)], 37_050));
        let ReadoutOutcome::NeedsBib(id) = outcome else {
            panic!("expected NeedsBib, got {outcome:?}");
        };

        assert!(matches!(
            race.assign_bib(&id, 999),
            Err(RaceError::UnknownBib(999))
        ));
        race.assign_bib(&id, 102).unwrap();
        let result = race.results.iter().find(|r| r.id == id).unwrap();
        assert_eq!(result.person, Some(PersonId::new("p2").unwrap()));
    }

    #[test]
    fn bib_named_course_beats_group_course() {
        let mut race = race();
        race.courses
            .push(Course::ordered(CourseId::new("101").unwrap(), &["31"]));

        let person = race.find_person_by_bib(101).unwrap();
        let course = race.find_course(person).unwrap();
        assert_eq!(course.id.as_str(), "101");

        // the others still run the group course
        let person = race.find_person_by_bib(102).unwrap();
        assert_eq!(race.find_course(person).unwrap().id.as_str(), "A");
    }

    #[test]
    fn relay_bibs_use_dotted_course_names() {
        let mut race = race();
        race.courses
            .push(Course::ordered(CourseId::new("15.2").unwrap(), &["31"]));
        let mut person = Person::new(
            PersonId::new("r1").unwrap(),
            2_015,
            Some(GroupId::new("M21").unwrap()),
        );
        person.card_number = Some(1_015);
        race.persons.push(person);

        let person = race.find_person_by_bib(2_015).unwrap();
        assert_eq!(race.find_course(person).unwrap().id.as_str(), "15.2");

        // a course named after the full bib beats the relay form
        race.courses
            .push(Course::ordered(CourseId::new("2015").unwrap(), &["31"]));
        let person = race.find_person_by_bib(2_015).unwrap();
        assert_eq!(race.find_course(person).unwrap().id.as_str(), "2015");
    }

    #[test]
    fn recalculate_assigns_ranks() {
        let mut race = race();
        let group = race.groups.first_mut().unwrap();
        group.ranking.is_active = true;
        for item in &mut group.ranking.items {
            if item.qual == Qualification::Master {
                item.is_active = true;
            }
        }

        // p1 wins, p2 and p3 tie at place 2
        take(&mut race, &raw(1_001, 1, &[("31", 36_600), ("32", 37_200), ("33", 37_800)], 38_170));
        take(&mut race, &raw(1_002, 2, &[("31", 36_700), ("32", 37_300), ("33", 37_900)], 38_190));
        take(&mut race, &raw(1_003, 3, &[("31", 36_650), ("32", 37_350), ("33", 37_950)], 38_190));
        race.recalculate();

        let by_card = |card: u32| {
            race.results
                .iter()
                .find(|r| r.readout.card_number == card)
                .unwrap()
        };
        // three finishers never make a group rank, but the place
        // threshold on the master item still awards the top two places
        assert_eq!(race.groups[0].ranking.rank_scores, None);
        assert_eq!(by_card(1_001).assigned_rank, Qualification::Master);
        assert_eq!(by_card(1_002).assigned_rank, Qualification::Master);
    }

    #[test]
    fn array_scores_follow_places() {
        let mut race = race();
        race.config.scores_mode = ScoresMode::Array;
        race.config.scores_array = vec![10, 8, 6];
        take(&mut race, &raw(1_001, 1, &[("31", 36_600), ("32", 37_200), ("33", 37_800)], 38_170));
        take(&mut race, &raw(1_002, 2, &[("31", 36_700), ("32", 37_300), ("33", 37_900)], 38_190));
        race.recalculate();

        let by_card = |card: u32| {
            race.results
                .iter()
                .find(|r| r.readout.card_number == card)
                .unwrap()
        };
        assert_eq!(by_card(1_001).score, Some(10));
        assert_eq!(by_card(1_002).score, Some(8));
    }

    #[test]
    fn formula_scores_use_leader_time() {
        let mut race = race();
        race.config.scores_mode = ScoresMode::Formula;
        race.config.scores_formula = "200 * leader / time".to_string();
        // 1000 s and 2000 s runs
        take(&mut race, &raw(1_001, 1, &[("31", 36_100), ("32", 36_300), ("33", 36_500)], 37_000));
        take(&mut race, &raw(1_002, 2, &[("31", 36_400), ("32", 36_900), ("33", 37_500)], 38_000));
        race.recalculate();

        let by_card = |card: u32| {
            race.results
                .iter()
                .find(|r| r.readout.card_number == card)
                .unwrap()
        };
        assert_eq!(by_card(1_001).score, Some(200));
        assert_eq!(by_card(1_002).score, Some(100));
    }

    #[test]
    fn broken_formula_leaves_scores_unset() {
        let mut race = race();
        race.config.scores_mode = ScoresMode::Formula;
        race.config.scores_formula = "200 * speed".to_string();
        take(&mut race, &raw(1_001, 1, &[("31", 36_100), ("32", 36_300), ("33", 36_500)], 37_000));
        race.recalculate();
        assert_eq!(race.results[0].score, None);
    }

    #[test]
    fn recalculate_is_idempotent() {
        let mut race = race();
        take(&mut race, &raw(1_001, 1, &[("31", 36_600), ("32", 37_200), ("33", 37_800)], 38_170));
        take(&mut race, &raw(1_002, 2, &[("31", 36_700), ("32", 37_300), ("33", 37_900)], 38_190));

        race.recalculate();
        let first: Vec<(Place, ResultStatus)> =
            race.results.iter().map(|r| (r.place, r.status)).collect();
        race.recalculate();
        let second: Vec<(Place, ResultStatus)> =
            race.results.iter().map(|r| (r.place, r.status)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn race_file_round_trip() {
        let mut race = race();
        race.title = "Spring Cup".to_string();
        take(&mut race, &raw(1_001, 1, &[("31", 36_600), ("32", 37_200), ("33", 37_800)], 38_170));
        race.recalculate();

        let json = serde_json::to_string_pretty(&race).unwrap();
        let parsed: Race = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.title, race.title);
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].place, race.results[0].place);
        parsed.validate().unwrap();
    }
}
