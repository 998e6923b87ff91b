//! Combining repeat runs of one acquisition window.

use rustdspace_core::error::{Error, Result};
use rustdspace_core::{HistogramOps, HistogramSeries};

/// Rebins repeat runs onto the member with the fewest bins, then sums them.
///
/// The reference member (ties: lowest index) keeps its binning and is not
/// rebinned onto itself. Summing accumulates the runs' charge, so a later
/// current-normalization yields a true exposure-weighted average across the
/// repeats. A single-element input is returned unchanged.
pub fn rebin_and_sum<B: HistogramOps>(
    series: Vec<HistogramSeries>,
    ops: &B,
) -> Result<HistogramSeries> {
    let mut series = series;
    match series.len() {
        0 => return Err(Error::NoSeries),
        1 => return Ok(series.remove(0)),
        _ => {}
    }

    let reference_idx = series
        .iter()
        .enumerate()
        .min_by_key(|(_, s)| s.spectrum(0).len())
        .map(|(idx, _)| idx)
        .unwrap_or(0);

    let mut total = series.remove(reference_idx);
    for other in &series {
        let rebinned = ops.rebin_to_match(other, &total)?;
        total = ops.add(&total, &rebinned)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::StandardOps;
    use approx::assert_relative_eq;
    use rustdspace_core::{SeriesLogs, Spectrum};

    fn run(run_number: u32, charge: f64, edges: Vec<f64>, counts: Vec<f64>) -> HistogramSeries {
        let errors = counts.iter().map(|c| c.sqrt()).collect();
        let spectrum = Spectrum::new(edges, counts, errors).unwrap();
        HistogramSeries::new(vec![spectrum], SeriesLogs::new(run_number, charge)).unwrap()
    }

    #[test]
    fn test_single_input_returned_unchanged() {
        let input = run(10, 150.0, vec![0.0, 1.0, 2.0], vec![3.0, 4.0]);
        let expected = input.clone();
        let combined = rebin_and_sum(vec![input], &StandardOps::new()).unwrap();
        assert_eq!(combined, expected);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            rebin_and_sum(vec![], &StandardOps::new()),
            Err(Error::NoSeries)
        ));
    }

    #[test]
    fn test_sums_on_coarsest_binning() {
        // Second run has the fewest bins and supplies the output binning.
        let fine = run(1, 100.0, vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![2.0; 4]);
        let coarse = run(2, 200.0, vec![0.0, 2.0, 4.0], vec![6.0, 6.0]);

        let combined = rebin_and_sum(vec![fine, coarse], &StandardOps::new()).unwrap();
        assert_eq!(combined.spectrum(0).edges(), &[0.0, 2.0, 4.0]);
        assert_eq!(combined.spectrum(0).counts(), &[10.0, 10.0]);
    }

    #[test]
    fn test_charge_is_additive() {
        let a = run(1, 120.0, vec![0.0, 1.0], vec![1.0]);
        let b = run(2, 80.0, vec![0.0, 1.0], vec![1.0]);
        let c = run(3, 50.0, vec![0.0, 1.0], vec![1.0]);

        let combined = rebin_and_sum(vec![a, b, c], &StandardOps::new()).unwrap();
        assert_relative_eq!(combined.logs().charge, 250.0);
        // Non-additive logs come from the reference run.
        assert_eq!(combined.logs().run_number, 1);
    }

    #[test]
    fn test_reference_tie_prefers_lowest_index() {
        let a = run(7, 1.0, vec![0.0, 1.0, 2.0], vec![1.0, 1.0]);
        let b = run(8, 1.0, vec![0.0, 1.0, 2.0], vec![2.0, 2.0]);

        let combined = rebin_and_sum(vec![a, b], &StandardOps::new()).unwrap();
        assert_eq!(combined.logs().run_number, 7);
    }
}
