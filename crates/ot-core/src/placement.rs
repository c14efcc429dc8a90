//! Placement within a group.
//!
//! Results are ordered by status precedence first, so an OK result
//! always ranks above a faster disqualified one, then by score
//! (descending, score courses) and elapsed time. Numbered places go to
//! qualifying, in-competition results; ties share a place and the next
//! distinct result skips past them (1, 1, 3).

use crate::result::{Place, RaceResult};

/// Sorts a group's results and assigns places in place.
///
/// `scored` enables score-descending ordering; `is_out_of_competition`
/// identifies results whose competitor runs outside the competition.
/// Returns the number of finished results. Idempotent: re-running over
/// already-placed results reproduces the same order and places.
pub fn assign_places(
    results: &mut [&mut RaceResult],
    scored: bool,
    is_out_of_competition: impl Fn(&RaceResult) -> bool,
) -> usize {
    results.sort_by(|a, b| a.sort_key(scored).cmp(&b.sort_key(scored)));

    let mut numbered = 0_u32;
    let mut place = 0_u32;
    let mut previous: Option<(i64, i64)> = None;

    for result in results.iter_mut() {
        if !result.status.qualifies() {
            result.place = Place::None;
            continue;
        }
        if is_out_of_competition(result) {
            result.place = Place::OutOfCompetition;
            continue;
        }
        numbered += 1;
        let (_, score, elapsed) = result.sort_key(scored);
        if previous != Some((score, elapsed)) {
            place = numbered;
        }
        result.place = Place::Numbered(place);
        previous = Some((score, elapsed));
    }

    results.iter().filter(|r| r.finish_time.is_some()).count()
}
