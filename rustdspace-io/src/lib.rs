//! rustdspace-io: File formats and run resolution for rustdspace.
//!
//! This crate supplies the reduction's external collaborators: the raw-run
//! loader, run-number string parsing, the calibration-mapping lookup and the
//! calibration/grouping table parser.
//!

mod calfile;
mod error;
mod loader;
mod mapping;
mod runs;

pub use calfile::CalTable;
pub use error::{Error, Result};
pub use loader::{read_series, write_series, JsonRunLoader, RawLoader};
pub use mapping::{empty_key, vanadium_key, CalMapping};
pub use runs::parse_run_ranges;
