//! The numeric capability interface consumed by the reduction pipeline.

use std::sync::Arc;

use crate::calibration::{Calibration, Grouping};
use crate::drange::Window;
use crate::error::Result;
use crate::histogram::HistogramSeries;

/// The narrow set of histogram primitives the reduction is written against.
///
/// The pipeline takes an implementation by reference, so any numeric backend
/// satisfying these contracts is substitutable — including deterministic
/// fakes in tests. Implementations must not mask failures: every contract
/// violation surfaces as an error, and only `mask_nonfinite` deliberately
/// rewrites values.
pub trait HistogramOps: Send + Sync {
    /// Divides every channel by the run's accumulated charge, producing
    /// counts per unit exposure. Non-positive charge is an error.
    fn normalize_by_charge(&self, series: &mut HistogramSeries) -> Result<()>;

    /// Attaches per-spectrum diffractometer constants to the series.
    /// The table must carry one row per spectrum.
    fn apply_calibration(&self, series: &mut HistogramSeries, cal: &Arc<Calibration>)
        -> Result<()>;

    /// Converts the x axis from time-of-flight to d-spacing using the
    /// attached calibration. Bin edges are mapped in place and stay ragged
    /// across spectra; no re-alignment is performed.
    fn convert_units(&self, series: &mut HistogramSeries) -> Result<()>;

    /// Sums grouped spectra into one output spectrum per distinct nonzero
    /// group id, establishing the focused binning.
    fn focus(&self, series: &HistogramSeries, grouping: &Grouping) -> Result<HistogramSeries>;

    /// Clips every spectrum to exactly `window`; boundary bins are split
    /// proportionally. A window with no overlap at all is an error.
    fn crop(&self, series: &HistogramSeries, window: Window) -> Result<HistogramSeries>;

    /// Redistributes `series` onto `reference`'s bin edges by proportional
    /// overlap, spectrum by spectrum. A single-spectrum reference is applied
    /// to every spectrum of `series`.
    fn rebin_to_match(
        &self,
        series: &HistogramSeries,
        reference: &HistogramSeries,
    ) -> Result<HistogramSeries>;

    /// Channel-wise sum; errors combine in quadrature, accumulated charge
    /// adds, remaining logs come from `lhs`. Binnings must match.
    fn add(&self, lhs: &HistogramSeries, rhs: &HistogramSeries) -> Result<HistogramSeries>;

    /// Channel-wise difference with quadrature errors. Binnings must match.
    fn subtract(&self, lhs: &HistogramSeries, rhs: &HistogramSeries) -> Result<HistogramSeries>;

    /// Channel-wise ratio with relative errors combined in quadrature.
    /// Zero denominators yield non-finite values; callers decide whether to
    /// mask them. Binnings must match.
    fn divide(&self, lhs: &HistogramSeries, rhs: &HistogramSeries) -> Result<HistogramSeries>;

    /// Multiplies counts and errors by a scalar.
    fn scale(&self, series: &mut HistogramSeries, factor: f64);

    /// Replaces non-finite counts and errors with 0.0.
    fn mask_nonfinite(&self, series: &mut HistogramSeries);

    /// Combines single-spectrum series covering distinct, possibly
    /// overlapping ranges onto the union of their bin edges, summing
    /// overlapping coverage.
    fn merge_ranges(&self, inputs: &[HistogramSeries]) -> Result<HistogramSeries>;

    /// Reassembles single-spectrum series into one multi-spectrum series,
    /// in input order; logs come from the first input.
    fn conjoin(&self, inputs: Vec<HistogramSeries>) -> Result<HistogramSeries>;
}
