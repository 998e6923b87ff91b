//! Run-file reading and the raw-loader collaborator interface.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::debug;
use rustdspace_core::HistogramSeries;

use crate::error::{Error, Result};
use crate::runs::parse_run_ranges;

/// Reads one run file into a histogram series.
///
/// The on-disk format is the series' JSON form: run logs plus one
/// `{edges, counts, errors}` object per spectrum; histogram invariants are
/// validated during deserialization.
pub fn read_series(path: &Path) -> Result<HistogramSeries> {
    let reader = BufReader::new(File::open(path)?);
    let series: HistogramSeries = serde_json::from_reader(reader)?;
    if series.num_spectra() == 0 {
        return Err(Error::Core(rustdspace_core::Error::EmptySeries));
    }
    Ok(series)
}

/// Writes a histogram series as a run file.
pub fn write_series(path: &Path, series: &HistogramSeries) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, series)?;
    Ok(())
}

/// The loader collaborator: turns a run-number string into loaded series,
/// one per run file.
pub trait RawLoader {
    /// Loads every run named by `run_number_string`.
    fn load_raw(&self, run_number_string: &str) -> Result<Vec<HistogramSeries>>;
}

/// Loads `<INSTRUMENT><run>.json` run files from a data directory.
#[derive(Debug, Clone)]
pub struct JsonRunLoader {
    data_dir: PathBuf,
    instrument: String,
}

impl JsonRunLoader {
    /// Creates a loader rooted at `data_dir` for one instrument prefix.
    pub fn new(data_dir: impl Into<PathBuf>, instrument: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            instrument: instrument.into(),
        }
    }

    /// Returns the file path a run number resolves to.
    pub fn path_for(&self, run: u32) -> PathBuf {
        self.data_dir.join(format!("{}{run}.json", self.instrument))
    }
}

impl RawLoader for JsonRunLoader {
    fn load_raw(&self, run_number_string: &str) -> Result<Vec<HistogramSeries>> {
        let runs = parse_run_ranges(run_number_string)?;
        runs.into_iter()
            .map(|run| {
                let path = self.path_for(run);
                debug!("loading run {run} from {}", path.display());
                read_series(&path)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustdspace_core::{SeriesLogs, Spectrum};

    fn sample_series(run_number: u32) -> HistogramSeries {
        let spectrum =
            Spectrum::new(vec![0.0, 1.0, 2.0], vec![3.0, 4.0], vec![1.5, 2.0]).unwrap();
        HistogramSeries::new(vec![spectrum], SeriesLogs::new(run_number, 250.0)).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("OSIRIS100.json");

        let series = sample_series(100);
        write_series(&path, &series).unwrap();
        let loaded = read_series(&path).unwrap();
        assert_eq!(loaded, series);
    }

    #[test]
    fn test_invalid_histogram_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"spectra": [{"edges": [1.0, 0.5], "counts": [2.0], "errors": [1.0]}],
                "logs": {"run_number": 1, "charge": 10.0}}"#,
        )
        .unwrap();
        assert!(read_series(&path).is_err());
    }

    #[test]
    fn test_loader_resolves_run_strings() {
        let dir = tempfile::tempdir().unwrap();
        for run in [200, 201, 203] {
            write_series(
                &dir.path().join(format!("OSIRIS{run}.json")),
                &sample_series(run),
            )
            .unwrap();
        }

        let loader = JsonRunLoader::new(dir.path(), "OSIRIS");
        let loaded = loader.load_raw("200-201, 203").unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].logs().run_number, 203);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = JsonRunLoader::new(dir.path(), "OSIRIS");
        assert!(matches!(loader.load_raw("42"), Err(Error::Io(_))));
    }
}
