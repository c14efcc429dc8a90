//! The `results` subcommand: recompute and print result lists.

use std::path::Path;

use anyhow::Result;

use ot_core::{Person, Race};

use crate::commands::util::{fmt_time, load_race};

pub fn run(race_path: &Path, group_filter: Option<&str>) -> Result<()> {
    let mut race = load_race(race_path)?;
    race.recalculate();
    print_results(&race, group_filter);
    Ok(())
}

fn print_results(race: &Race, group_filter: Option<&str>) {
    if !race.title.is_empty() {
        println!("{}", race.title);
        println!();
    }

    for group in &race.groups {
        if group_filter.is_some_and(|g| g != group.id.as_str()) {
            continue;
        }
        println!("{} ({} finished)", group.id, group.count_finished);

        let mut members: Vec<(&Person, &ot_core::RaceResult)> = race
            .results
            .iter()
            .filter_map(|result| {
                let person = result
                    .person
                    .as_ref()
                    .and_then(|id| race.persons.iter().find(|p| p.id == *id))?;
                (person.group.as_ref() == Some(&group.id)).then_some((person, result))
            })
            .collect();
        let scored = group
            .course
            .as_ref()
            .and_then(|id| race.courses.iter().find(|c| c.id == *id))
            .is_some_and(|c| c.variant == ot_core::CourseVariant::Score);
        members.sort_by(|a, b| a.1.sort_key(scored).cmp(&b.1.sort_key(scored)));

        for (person, result) in members {
            let score = result.score.map(|s| s.to_string()).unwrap_or_default();
            println!(
                "{:>4}  {:<4} {:<24} {:>10}  {:<4} {}",
                result.place.to_string(),
                person.bib,
                person.name,
                fmt_time(result.elapsed),
                result.status,
                score,
            );
        }
        println!();
    }
}
