//! The `replay` subcommand: drive the full device-worker path from a log.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use ot_device::{DeviceWorker, JsonlSource};

use crate::commands::util::{load_race, save_race};

pub fn run(race_path: &Path, log_path: &Path, poll_ms: u64) -> Result<()> {
    let mut race = load_race(race_path)?;

    let source = JsonlSource::open(
        log_path.file_name().map_or_else(
            || "log".to_string(),
            |n| n.to_string_lossy().into_owned(),
        ),
        log_path,
    )
    .with_context(|| format!("failed to open readout log {}", log_path.display()))?;

    let (sender, receiver) = mpsc::channel();
    let worker = DeviceWorker::spawn(source, sender, Duration::from_millis(poll_ms))
        .context("failed to start device worker")?;

    // A replayed log stops producing; a few idle polls in a row mean
    // the file is drained.
    let idle_window = Duration::from_millis(poll_ms.saturating_mul(10).max(100));
    let mut taken = 0_usize;
    while let Ok(raw) = receiver.recv_timeout(idle_window) {
        match race.process_readout(&raw) {
            Ok(outcome) => {
                info!(card = raw.card_number, ?outcome, "replayed");
                taken += 1;
            }
            // a bad record never blocks the rest of the log
            Err(error) => warn!(card = raw.card_number, %error, "readout rejected"),
        }
    }
    worker.stop();

    race.recalculate();
    save_race(&race, race_path)?;
    println!("replayed {taken} readouts into {}", race_path.display());
    Ok(())
}
