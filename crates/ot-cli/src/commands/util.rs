//! Shared helpers for subcommands.

use std::path::Path;

use anyhow::{Context, Result};

use ot_core::{OTime, Race};

/// Loads and validates a race file.
pub fn load_race(path: &Path) -> Result<Race> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read race file {}", path.display()))?;
    let race: Race = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse race file {}", path.display()))?;
    race.validate()
        .with_context(|| format!("invalid race settings in {}", path.display()))?;
    Ok(race)
}

/// Saves a race file, pretty-printed.
pub fn save_race(race: &Race, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(race).context("failed to serialize race")?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write race file {}", path.display()))?;
    Ok(())
}

/// Formats an optional time for table output.
pub fn fmt_time(time: Option<OTime>) -> String {
    time.map(|t| t.to_string()).unwrap_or_default()
}
