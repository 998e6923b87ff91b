//! Error types for rustdspace-core.

use thiserror::Error;

use crate::drange::DrangeId;

/// Result type alias for reduction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for reduction operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A loaded run's time extent matches no acquisition window.
    #[error("no d-range matches time window [{lo}, {hi}]")]
    UnknownTimeWindow { lo: f64, hi: f64 },

    /// D-range index outside 1..=12.
    #[error("invalid d-range index: {0} (expected 1..=12)")]
    InvalidDrange(u8),

    /// Histogram arrays violate the edges/counts/errors length contract.
    #[error("inconsistent histogram: {0}")]
    InvalidHistogram(String),

    /// A series was constructed without any spectra.
    #[error("series has no spectra")]
    EmptySeries,

    /// An operation over a collection of series received none.
    #[error("no input series")]
    NoSeries,

    /// Channel-wise arithmetic on operands with different binning.
    #[error("bin edges of operands do not match")]
    BinningMismatch,

    /// Series entering a merge disagree on spectrum count.
    #[error("spectrum count mismatch: expected {expected}, found {found}")]
    SpectrumCountMismatch { expected: usize, found: usize },

    /// Current normalization is undefined for non-positive charge.
    #[error("run {run} has non-positive accumulated charge")]
    ZeroCharge { run: u32 },

    /// Unit conversion requested with no calibration attached.
    #[error("no calibration attached to series")]
    MissingCalibration,

    /// Calibration row count does not cover the series.
    #[error("calibration has {rows} rows but series has {spectra} spectra")]
    CalibrationMismatch { rows: usize, spectra: usize },

    /// Calibration constants do not map the time axis onto a valid d axis.
    #[error("calibration produced a non-physical d-spacing axis for spectrum {spectrum}")]
    CalibrationDomain { spectrum: usize },

    /// Grouping row count does not cover the series.
    #[error("grouping covers {groups} spectra but series has {spectra}")]
    GroupingMismatch { groups: usize, spectra: usize },

    /// Crop window lies entirely outside the data.
    #[error("crop window [{lo}, {hi}) does not intersect the data")]
    EmptyCrop { lo: f64, hi: f64 },

    /// Vanadium correction requested for a bucket without a vanadium run.
    #[error("{drange} requested vanadium correction but has no vanadium run")]
    MissingVanadium { drange: DrangeId },

    /// Calibration table with no rows.
    #[error("empty calibration table")]
    EmptyCalibration,

    /// Grouping table with no rows.
    #[error("empty grouping table")]
    EmptyGrouping,
}
