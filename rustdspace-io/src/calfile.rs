//! Calibration-table parsing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustdspace_core::{CalRow, Calibration, Grouping};

use crate::error::{Error, Result};

/// A parsed calibration table: per-spectrum diffractometer constants plus
/// the focusing group column.
///
/// The on-disk format is a commented ASCII table with one row per spectrum:
///
/// ```text
/// # spectrum  difc      difa  tzero  group
/// 0           15700.0   0.0   0.0    1
/// 1           15712.4   0.0   0.0    1
/// ```
///
/// One file feeds both the calibration and the focusing step.
#[derive(Debug, Clone)]
pub struct CalTable {
    /// Per-spectrum diffractometer constants.
    pub calibration: Calibration,
    /// Per-spectrum focusing groups.
    pub grouping: Grouping,
}

impl CalTable {
    /// Loads and validates a calibration table.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);

        let mut rows = Vec::new();
        let mut groups = Vec::new();
        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = line_idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 5 {
                return Err(Error::InvalidCalFile {
                    line: line_no,
                    reason: format!("expected 5 columns, found {}", fields.len()),
                });
            }

            let spectrum: usize = parse_field(fields[0], line_no, "spectrum index")?;
            if spectrum != rows.len() {
                return Err(Error::InvalidCalFile {
                    line: line_no,
                    reason: format!("expected spectrum {}, found {spectrum}", rows.len()),
                });
            }

            let difc: f64 = parse_field(fields[1], line_no, "difc")?;
            let difa: f64 = parse_field(fields[2], line_no, "difa")?;
            let tzero: f64 = parse_field(fields[3], line_no, "tzero")?;
            let group: usize = parse_field(fields[4], line_no, "group")?;

            rows.push(CalRow::new(difc, difa, tzero));
            groups.push(group);
        }

        Ok(Self {
            calibration: Calibration::new(rows)?,
            grouping: Grouping::new(groups)?,
        })
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, line: usize, name: &str) -> Result<T> {
    field.parse().map_err(|_| Error::InvalidCalFile {
        line,
        reason: format!("cannot parse {name} from '{field}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# spectrum  difc  difa  tzero  group").unwrap();
        writeln!(file, "0  15700.0  0.0  0.0  1").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "1  15712.4  0.5  -3.2  1").unwrap();
        writeln!(file, "2  16100.0  0.0  0.0  0").unwrap();

        let table = CalTable::load(file.path()).unwrap();
        assert_eq!(table.calibration.len(), 3);
        assert_eq!(table.calibration.row(1).tzero, -3.2);
        assert_eq!(table.grouping.output_groups(), vec![1]);
        assert_eq!(table.grouping.members(1), vec![0, 1]);
    }

    #[test]
    fn test_bad_column_count() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0  15700.0  0.0  1").unwrap();

        let err = CalTable::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidCalFile { line: 1, .. }));
    }

    #[test]
    fn test_out_of_order_rows_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0  15700.0  0.0  0.0  1").unwrap();
        writeln!(file, "2  15800.0  0.0  0.0  1").unwrap();

        let err = CalTable::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidCalFile { line: 2, .. }));
    }

    #[test]
    fn test_unparsable_field_names_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0  fast  0.0  0.0  1").unwrap();

        let err = CalTable::load(file.path()).unwrap_err().to_string();
        assert!(err.contains("difc"));
    }
}
