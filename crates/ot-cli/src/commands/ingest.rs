//! The `ingest` subcommand: take one readout into a race file.

use std::path::Path;

use anyhow::{Context, Result};

use ot_core::{RawReadout, ReadoutOutcome};

use crate::commands::util::{load_race, save_race};

pub fn run(race_path: &Path, readout_path: &Path) -> Result<()> {
    let mut race = load_race(race_path)?;

    let text = std::fs::read_to_string(readout_path)
        .with_context(|| format!("failed to read readout file {}", readout_path.display()))?;
    let raw: RawReadout = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse readout file {}", readout_path.display()))?;

    let outcome = race
        .process_readout(&raw)
        .context("readout was rejected")?;
    race.recalculate();
    save_race(&race, race_path)?;

    match outcome {
        ReadoutOutcome::Created(id) => println!("created result {id}"),
        ReadoutOutcome::Merged(id) => println!("merged into result {id}"),
        ReadoutOutcome::Ignored => println!("ignored duplicate readout"),
        ReadoutOutcome::NeedsBib(id) => println!("result {id} needs a bib assignment"),
    }
    Ok(())
}
