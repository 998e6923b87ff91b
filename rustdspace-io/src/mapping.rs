//! Calibration-mapping lookup: logical keys to run-number strings.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use std::collections::BTreeMap;

use rustdspace_core::DrangeId;

use crate::error::{Error, Result};

/// One mapping entry as stored on disk.
#[derive(Debug, Deserialize)]
struct RawEntry {
    /// Inclusive run range this entry covers, e.g. `"119977-120000"`.
    runs: String,
    /// Logical key to run-number-string associations.
    keys: BTreeMap<String, String>,
}

#[derive(Debug)]
struct Entry {
    lo: u32,
    hi: u32,
    keys: BTreeMap<String, String>,
}

/// Run-range-keyed lookup of logical run-number keys.
///
/// An entry covers an inclusive run range; looking a key up for a run
/// selects the entry covering that run, then resolves the key within it.
#[derive(Debug)]
pub struct CalMapping {
    entries: Vec<Entry>,
}

impl CalMapping {
    /// Loads a mapping file (a JSON array of entries).
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let raw: Vec<RawEntry> = serde_json::from_reader(reader)?;
        let entries = raw
            .into_iter()
            .map(|entry| {
                let (lo, hi) = parse_range(&entry.runs)?;
                Ok(Entry {
                    lo,
                    hi,
                    keys: entry.keys,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Resolves `key` for `run`.
    ///
    /// `context` is appended to the error when the key is absent, so the
    /// caller can say which mode or entry the key was expected under.
    pub fn lookup(&self, run: u32, key: &str, context: &str) -> Result<&str> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.lo <= run && run <= entry.hi)
            .ok_or(Error::UncoveredRun { run })?;
        entry
            .keys
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingKey {
                key: key.to_string(),
                context: context.to_string(),
            })
    }
}

fn parse_range(text: &str) -> Result<(u32, u32)> {
    let bad = |reason: &str| Error::InvalidRunString {
        text: text.to_string(),
        reason: reason.to_string(),
    };
    let (lo, hi) = match text.split_once('-') {
        Some((lo, hi)) => (
            lo.trim().parse().map_err(|_| bad("bad range start"))?,
            hi.trim().parse().map_err(|_| bad("bad range end"))?,
        ),
        None => {
            let run = text.trim().parse().map_err(|_| bad("bad run number"))?;
            (run, run)
        }
    };
    if hi < lo {
        return Err(bad("range runs backwards"));
    }
    Ok((lo, hi))
}

/// The logical key naming a d-range's vanadium run.
pub fn vanadium_key(drange: DrangeId) -> String {
    format!("vanadium_{drange}")
}

/// The logical key naming a d-range's empty-container run.
pub fn empty_key(drange: DrangeId) -> String {
    format!("empty_{drange}")
}
