//! The `splits` subcommand: per-group leg analytics.

use std::path::Path;

use anyhow::Result;

use crate::commands::util::{fmt_time, load_race};

pub fn run(race_path: &Path, group_filter: Option<&str>) -> Result<()> {
    let mut race = load_race(race_path)?;
    let report = race.recalculate();

    for (group_id, leaders) in &report.leg_leaders {
        if group_filter.is_some_and(|g| g != group_id.as_str()) {
            continue;
        }
        println!("{group_id}");

        for result in &race.results {
            let Some(person) = result
                .person
                .as_ref()
                .and_then(|id| race.persons.iter().find(|p| p.id == *id))
            else {
                continue;
            };
            if person.group.as_ref() != Some(group_id) || result.legs.is_empty() {
                continue;
            }
            println!("  {} ({})", person.name, person.bib);
            for leg in &result.legs {
                let marker = if leg.course_index.is_some() { " " } else { "+" };
                println!(
                    "   {}{:<5} {:>10} {:>10}  leg {:>3}  overall {:>3}",
                    marker,
                    leg.code,
                    fmt_time(leg.leg_time),
                    leg.relative_time,
                    leg.leg_place.map(|p| p.to_string()).unwrap_or_default(),
                    leg.relative_place.map(|p| p.to_string()).unwrap_or_default(),
                );
            }
        }

        if !leaders.is_empty() {
            println!("  leg leaders:");
            for leader in leaders {
                let name = race
                    .results
                    .iter()
                    .find(|r| r.id == leader.result)
                    .and_then(|r| r.person.as_ref())
                    .and_then(|id| race.persons.iter().find(|p| p.id == *id))
                    .map_or("?", |p| p.name.as_str());
                println!(
                    "    {:<5} {:>10}  {}",
                    leader.code, leader.leg_time, name
                );
            }
        }
        println!();
    }
    Ok(())
}
