//! rustdspace-core: Core types and traits for time-of-flight diffraction reduction.
//!
//! This crate provides the foundational abstractions for d-range reduction:
//! histogram data, the acquisition-window table, the calibration model and
//! the numeric capability trait implemented by reduction backends.
//!

pub mod calibration;
pub mod drange;
pub mod error;
pub mod histogram;
pub mod ops;

pub use calibration::{CalRow, Calibration, Grouping};
pub use drange::{DrangeId, RangeEntry, RangeTable, Window};
pub use error::{Error, Result};
pub use histogram::{HistogramSeries, SeriesLogs, Spectrum};
pub use ops::HistogramOps;
