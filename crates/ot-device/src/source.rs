//! Readout sources.
//!
//! A [`ReadoutSource`] is anything that hands over raw card readouts:
//! a station driver, a serial bridge, or the JSONL log file used for
//! replay and testing. Sources are polled from a dedicated worker
//! thread, so a poll may block briefly but must eventually return.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use ot_core::RawReadout;

/// Errors a source may report. The worker logs and keeps polling.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Underlying transport failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A record that could not be decoded.
    #[error("bad readout record at line {line}: {source}")]
    Decode {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
}

/// A supplier of raw readouts.
///
/// `poll` returns the next readout if one is available, `Ok(None)` when
/// there is nothing yet, and an error for transport or decode failures.
pub trait ReadoutSource: Send {
    /// Human-readable device name, used for thread and log naming.
    fn name(&self) -> &str;

    /// Fetches the next readout, if any.
    fn poll(&mut self) -> Result<Option<RawReadout>, SourceError>;
}

/// Tails a JSON-lines readout log.
///
/// Each line is one [`RawReadout`] in JSON. The source remembers its
/// position, so lines appended after a poll are picked up by later
/// polls. A line without a trailing newline is treated as still being
/// written and held back until it completes.
pub struct JsonlSource {
    name: String,
    reader: BufReader<File>,
    pending: String,
    line: u64,
}

impl JsonlSource {
    /// Opens a readout log.
    pub fn open(name: impl Into<String>, path: &Path) -> Result<Self, SourceError> {
        Ok(Self {
            name: name.into(),
            reader: BufReader::new(File::open(path)?),
            pending: String::new(),
            line: 0,
        })
    }
}

impl ReadoutSource for JsonlSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> Result<Option<RawReadout>, SourceError> {
        loop {
            let read = self.reader.read_line(&mut self.pending)?;
            if read == 0 {
                return Ok(None);
            }
            if !self.pending.ends_with('\n') {
                // mid-write line; finish it on a later poll
                return Ok(None);
            }
            self.line += 1;
            let record = self.pending.trim();
            if record.is_empty() {
                self.pending.clear();
                continue;
            }
            let readout = serde_json::from_str(record).map_err(|source| SourceError::Decode {
                line: self.line,
                source,
            });
            self.pending.clear();
            return readout.map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};

    fn record(card: u32, sequence_id: u64) -> String {
        format!(
            r#"{{"card_number": {card}, "punches": [{{"code": "31", "ticks": 36600}}], "sequence_id": {sequence_id}}}"#
        )
    }

    #[test]
    fn reads_appended_lines_across_polls() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", record(1_001, 1)).unwrap();
        file.flush().unwrap();

        let mut source = JsonlSource::open("log", file.path()).unwrap();
        assert_eq!(source.poll().unwrap().unwrap().card_number, 1_001);
        assert!(source.poll().unwrap().is_none());

        writeln!(file, "{}", record(1_002, 2)).unwrap();
        file.flush().unwrap();
        assert_eq!(source.poll().unwrap().unwrap().card_number, 1_002);
    }

    #[test]
    fn holds_back_partial_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let full = record(1_001, 1);
        let (head, tail) = full.split_at(20);
        write!(file, "{head}").unwrap();
        file.flush().unwrap();

        let mut source = JsonlSource::open("log", file.path()).unwrap();
        assert!(source.poll().unwrap().is_none());

        writeln!(file, "{tail}").unwrap();
        file.flush().unwrap();
        assert_eq!(source.poll().unwrap().unwrap().card_number, 1_001);
    }

    #[test]
    fn skips_blank_lines_and_reports_bad_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", record(1_001, 1)).unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut source = JsonlSource::open("log", file.path()).unwrap();
        assert_eq!(source.poll().unwrap().unwrap().card_number, 1_001);
        assert!(matches!(
            source.poll(),
            Err(SourceError::Decode { line: 3, .. })
        ));
    }
}
