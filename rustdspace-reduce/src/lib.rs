//! rustdspace-reduce: Reduction algorithms for d-range diffraction data.
//!
//! This crate turns runs acquired in overlapping d-range windows into one
//! continuous d-spacing spectrum:
//! - **rebin-and-sum** combines repeat runs of one window
//! - **bucketing** groups loaded runs by acquisition window
//! - **calibrate-and-focus** produces each bucket's focused spectrum
//! - **overlap merge** joins the buckets without double counting
//!
#![warn(missing_docs)]

mod bucket;
mod combine;
mod focus;
mod kernel;
mod merge;
mod reduction;

pub use bucket::{assign_dranges, DrangeBucket, ProcessOptions, RunKind};
pub use combine::rebin_and_sum;
pub use focus::calibrate_and_focus;
pub use kernel::StandardOps;
pub use merge::{merge_dspacing_runs, FocusedRun};
pub use reduction::{focus_dranges, reduce};

// Re-export the core types the pipeline is written against.
pub use rustdspace_core::{Calibration, DrangeId, Grouping, HistogramOps, RangeTable, Window};
