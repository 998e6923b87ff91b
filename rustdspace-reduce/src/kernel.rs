//! The standard numeric backend for the reduction pipeline.

use std::sync::Arc;

use rustdspace_core::error::{Error, Result};
use rustdspace_core::{
    Calibration, Grouping, HistogramOps, HistogramSeries, Spectrum, Window,
};

/// Relative tolerance used when deduplicating union bin edges.
const EDGE_MERGE_TOLERANCE: f64 = 1e-9;

/// Reference implementation of [`HistogramOps`].
///
/// Rebinning is conservative: counts redistribute in proportion to the
/// overlap of source and target bins, and squared errors carry the same
/// fractions, so total intensity is preserved wherever target bins cover the
/// source axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardOps;

impl StandardOps {
    /// Creates the standard backend.
    pub fn new() -> Self {
        Self
    }
}

/// Redistributes one spectrum's data onto `target_edges`, returning counts
/// and errors. Target bins outside the source support receive zero.
fn rebin_arrays(
    src_edges: &[f64],
    src_counts: &[f64],
    src_errors: &[f64],
    target_edges: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let n_target = target_edges.len() - 1;
    let mut counts = vec![0.0; n_target];
    let mut variances = vec![0.0; n_target];

    let mut start = 0;
    for i in 0..src_counts.len() {
        let (lo, hi) = (src_edges[i], src_edges[i + 1]);
        let width = hi - lo;
        // Target bins ending before this source bin cannot overlap any
        // later source bin either, so the cursor never moves back.
        while start < n_target && target_edges[start + 1] <= lo {
            start += 1;
        }
        let mut j = start;
        while j < n_target && target_edges[j] < hi {
            let overlap = hi.min(target_edges[j + 1]) - lo.max(target_edges[j]);
            if overlap > 0.0 {
                let fraction = overlap / width;
                counts[j] += src_counts[i] * fraction;
                variances[j] += src_errors[i] * src_errors[i] * fraction;
            }
            j += 1;
        }
    }

    (counts, variances.into_iter().map(f64::sqrt).collect())
}

fn rebin_spectrum(src: &Spectrum, target_edges: &[f64]) -> Result<Spectrum> {
    let (counts, errors) = rebin_arrays(src.edges(), src.counts(), src.errors(), target_edges);
    Spectrum::new(target_edges.to_vec(), counts, errors)
}

/// Checks that two spectra share identical bin edges.
fn edges_match(a: &Spectrum, b: &Spectrum) -> bool {
    a.edges() == b.edges()
}

/// Applies a channel-wise binary operation, validating shape compatibility.
fn zip_spectra<F>(lhs: &HistogramSeries, rhs: &HistogramSeries, op: F) -> Result<Vec<Spectrum>>
where
    F: Fn(&Spectrum, &Spectrum) -> Result<Spectrum>,
{
    if lhs.num_spectra() != rhs.num_spectra() {
        return Err(Error::SpectrumCountMismatch {
            expected: lhs.num_spectra(),
            found: rhs.num_spectra(),
        });
    }
    lhs.spectra()
        .iter()
        .zip(rhs.spectra())
        .map(|(a, b)| {
            if !edges_match(a, b) {
                return Err(Error::BinningMismatch);
            }
            op(a, b)
        })
        .collect()
}

fn crop_spectrum(src: &Spectrum, window: Window) -> Result<Spectrum> {
    let lo = window.lo.max(src.first_edge());
    let hi = window.hi.min(src.last_edge());
    if lo >= hi {
        return Err(Error::EmptyCrop {
            lo: window.lo,
            hi: window.hi,
        });
    }

    // The clipped axis keeps every interior source edge and replaces the
    // outermost edges by the window bounds.
    let mut edges = vec![lo];
    edges.extend(src.edges().iter().copied().filter(|e| *e > lo && *e < hi));
    edges.push(hi);

    let mut counts = Vec::with_capacity(edges.len() - 1);
    let mut errors = Vec::with_capacity(edges.len() - 1);
    let mut src_bin = 0;
    for pair in edges.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        // Each output bin lies inside exactly one source bin.
        while src.edges()[src_bin + 1] <= a {
            src_bin += 1;
        }
        let src_width = src.edges()[src_bin + 1] - src.edges()[src_bin];
        let fraction = (b - a) / src_width;
        counts.push(src.counts()[src_bin] * fraction);
        errors.push((src.errors()[src_bin] * src.errors()[src_bin] * fraction).sqrt());
    }

    Spectrum::new(edges, counts, errors)
}

impl HistogramOps for StandardOps {
    fn normalize_by_charge(&self, series: &mut HistogramSeries) -> Result<()> {
        let charge = series.logs().charge;
        if charge <= 0.0 {
            return Err(Error::ZeroCharge {
                run: series.logs().run_number,
            });
        }
        for spectrum in series.spectra_mut() {
            for value in spectrum.counts_mut() {
                *value /= charge;
            }
            for value in spectrum.errors_mut() {
                *value /= charge;
            }
        }
        Ok(())
    }

    fn apply_calibration(
        &self,
        series: &mut HistogramSeries,
        cal: &Arc<Calibration>,
    ) -> Result<()> {
        if cal.len() != series.num_spectra() {
            return Err(Error::CalibrationMismatch {
                rows: cal.len(),
                spectra: series.num_spectra(),
            });
        }
        series.set_calibration(Arc::clone(cal));
        Ok(())
    }

    fn convert_units(&self, series: &mut HistogramSeries) -> Result<()> {
        let cal = series.take_calibration().ok_or(Error::MissingCalibration)?;
        if cal.len() != series.num_spectra() {
            return Err(Error::CalibrationMismatch {
                rows: cal.len(),
                spectra: series.num_spectra(),
            });
        }

        let mut converted = Vec::with_capacity(series.num_spectra());
        for (i, spectrum) in series.spectra().iter().enumerate() {
            let row = cal.row(i);
            let edges: Option<Vec<f64>> =
                spectrum.edges().iter().map(|tof| row.tof_to_d(*tof)).collect();
            let edges = edges.ok_or(Error::CalibrationDomain { spectrum: i })?;
            let converted_spectrum =
                Spectrum::new(edges, spectrum.counts().to_vec(), spectrum.errors().to_vec())
                    .map_err(|_| Error::CalibrationDomain { spectrum: i })?;
            converted.push(converted_spectrum);
        }
        series.replace_spectra(converted)
    }

    fn focus(&self, series: &HistogramSeries, grouping: &Grouping) -> Result<HistogramSeries> {
        if grouping.len() != series.num_spectra() {
            return Err(Error::GroupingMismatch {
                groups: grouping.len(),
                spectra: series.num_spectra(),
            });
        }
        let output_groups = grouping.output_groups();
        if output_groups.is_empty() {
            return Err(Error::EmptyGrouping);
        }

        let mut focused = Vec::with_capacity(output_groups.len());
        for group_id in output_groups {
            let members = grouping.members(group_id);
            let reference = members
                .iter()
                .copied()
                .min_by_key(|i| series.spectrum(*i).len())
                .ok_or(Error::EmptyGrouping)?;
            let target_edges = series.spectrum(reference).edges().to_vec();

            let mut counts = vec![0.0; target_edges.len() - 1];
            let mut variances = vec![0.0; target_edges.len() - 1];
            for member in members {
                let (member_counts, member_errors) = if member == reference {
                    let s = series.spectrum(member);
                    (s.counts().to_vec(), s.errors().to_vec())
                } else {
                    rebin_arrays(
                        series.spectrum(member).edges(),
                        series.spectrum(member).counts(),
                        series.spectrum(member).errors(),
                        &target_edges,
                    )
                };
                for (acc, value) in counts.iter_mut().zip(&member_counts) {
                    *acc += value;
                }
                for (acc, error) in variances.iter_mut().zip(&member_errors) {
                    *acc += error * error;
                }
            }
            let errors = variances.into_iter().map(f64::sqrt).collect();
            focused.push(Spectrum::new(target_edges, counts, errors)?);
        }

        HistogramSeries::new(focused, series.logs().clone())
    }

    fn crop(&self, series: &HistogramSeries, window: Window) -> Result<HistogramSeries> {
        let cropped = series
            .spectra()
            .iter()
            .map(|s| crop_spectrum(s, window))
            .collect::<Result<Vec<_>>>()?;
        HistogramSeries::new(cropped, series.logs().clone())
    }

    fn rebin_to_match(
        &self,
        series: &HistogramSeries,
        reference: &HistogramSeries,
    ) -> Result<HistogramSeries> {
        let broadcast = reference.num_spectra() == 1;
        if !broadcast && reference.num_spectra() != series.num_spectra() {
            return Err(Error::SpectrumCountMismatch {
                expected: series.num_spectra(),
                found: reference.num_spectra(),
            });
        }

        let rebinned = series
            .spectra()
            .iter()
            .enumerate()
            .map(|(i, spectrum)| {
                let target = reference.spectrum(if broadcast { 0 } else { i });
                rebin_spectrum(spectrum, target.edges())
            })
            .collect::<Result<Vec<_>>>()?;
        HistogramSeries::new(rebinned, series.logs().clone())
    }

    fn add(&self, lhs: &HistogramSeries, rhs: &HistogramSeries) -> Result<HistogramSeries> {
        let spectra = zip_spectra(lhs, rhs, |a, b| {
            let counts = a.counts().iter().zip(b.counts()).map(|(x, y)| x + y).collect();
            let errors = a
                .errors()
                .iter()
                .zip(b.errors())
                .map(|(x, y)| (x * x + y * y).sqrt())
                .collect();
            Spectrum::new(a.edges().to_vec(), counts, errors)
        })?;

        let mut logs = lhs.logs().clone();
        logs.charge += rhs.logs().charge;
        HistogramSeries::new(spectra, logs)
    }

    fn subtract(&self, lhs: &HistogramSeries, rhs: &HistogramSeries) -> Result<HistogramSeries> {
        let spectra = zip_spectra(lhs, rhs, |a, b| {
            let counts = a.counts().iter().zip(b.counts()).map(|(x, y)| x - y).collect();
            let errors = a
                .errors()
                .iter()
                .zip(b.errors())
                .map(|(x, y)| (x * x + y * y).sqrt())
                .collect();
            Spectrum::new(a.edges().to_vec(), counts, errors)
        })?;
        HistogramSeries::new(spectra, lhs.logs().clone())
    }

    fn divide(&self, lhs: &HistogramSeries, rhs: &HistogramSeries) -> Result<HistogramSeries> {
        let spectra = zip_spectra(lhs, rhs, |a, b| {
            let counts: Vec<f64> =
                a.counts().iter().zip(b.counts()).map(|(x, y)| x / y).collect();
            let errors = a
                .errors()
                .iter()
                .zip(a.counts())
                .zip(b.errors().iter().zip(b.counts()))
                .zip(&counts)
                .map(|(((ea, ya), (eb, yb)), ratio)| {
                    let rel_a = ea / ya;
                    let rel_b = eb / yb;
                    ratio.abs() * (rel_a * rel_a + rel_b * rel_b).sqrt()
                })
                .collect();
            Spectrum::new(a.edges().to_vec(), counts, errors)
        })?;
        HistogramSeries::new(spectra, lhs.logs().clone())
    }

    fn scale(&self, series: &mut HistogramSeries, factor: f64) {
        for spectrum in series.spectra_mut() {
            for value in spectrum.counts_mut() {
                *value *= factor;
            }
            for value in spectrum.errors_mut() {
                *value *= factor;
            }
        }
    }

    fn mask_nonfinite(&self, series: &mut HistogramSeries) {
        for spectrum in series.spectra_mut() {
            for i in 0..spectrum.len() {
                if !spectrum.counts()[i].is_finite() {
                    spectrum.counts_mut()[i] = 0.0;
                    spectrum.errors_mut()[i] = 0.0;
                } else if !spectrum.errors()[i].is_finite() {
                    spectrum.errors_mut()[i] = 0.0;
                }
            }
        }
    }

    fn merge_ranges(&self, inputs: &[HistogramSeries]) -> Result<HistogramSeries> {
        let first = inputs.first().ok_or(Error::NoSeries)?;
        for input in inputs {
            if input.num_spectra() != 1 {
                return Err(Error::SpectrumCountMismatch {
                    expected: 1,
                    found: input.num_spectra(),
                });
            }
        }
        if inputs.len() == 1 {
            return Ok(first.clone());
        }

        // Union axis: every input edge, sorted, with near-identical edges
        // collapsed onto their first representative.
        let mut edges: Vec<f64> = inputs
            .iter()
            .flat_map(|input| input.spectrum(0).edges().iter().copied())
            .collect();
        edges.sort_by(f64::total_cmp);
        edges.dedup_by(|b, a| (*b - *a).abs() <= EDGE_MERGE_TOLERANCE * a.abs().max(1.0));

        let mut counts = vec![0.0; edges.len() - 1];
        let mut variances = vec![0.0; edges.len() - 1];
        for input in inputs {
            let spectrum = input.spectrum(0);
            let (c, e) = rebin_arrays(spectrum.edges(), spectrum.counts(), spectrum.errors(), &edges);
            for (acc, value) in counts.iter_mut().zip(&c) {
                *acc += value;
            }
            for (acc, error) in variances.iter_mut().zip(&e) {
                *acc += error * error;
            }
        }
        let errors = variances.into_iter().map(f64::sqrt).collect();

        let mut logs = first.logs().clone();
        logs.charge = inputs.iter().map(|input| input.logs().charge).sum();
        HistogramSeries::new(vec![Spectrum::new(edges, counts, errors)?], logs)
    }

    fn conjoin(&self, inputs: Vec<HistogramSeries>) -> Result<HistogramSeries> {
        let logs = inputs.first().ok_or(Error::NoSeries)?.logs().clone();
        let mut spectra = Vec::with_capacity(inputs.len());
        for input in inputs {
            if input.num_spectra() != 1 {
                return Err(Error::SpectrumCountMismatch {
                    expected: 1,
                    found: input.num_spectra(),
                });
            }
            spectra.extend(input.into_spectra());
        }
        HistogramSeries::new(spectra, logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rustdspace_core::{CalRow, SeriesLogs};

    fn series(edges: Vec<f64>, counts: Vec<f64>) -> HistogramSeries {
        let errors = counts.iter().map(|c| c.abs().sqrt()).collect();
        let spectrum = Spectrum::new(edges, counts, errors).unwrap();
        HistogramSeries::new(vec![spectrum], SeriesLogs::new(1, 100.0)).unwrap()
    }

    #[test]
    fn test_rebin_conserves_totals() {
        let src = series(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![4.0, 8.0, 2.0, 6.0]);
        let target = series(vec![0.0, 2.0, 4.0], vec![0.0, 0.0]);
        let ops = StandardOps::new();

        let rebinned = ops.rebin_to_match(&src, &target).unwrap();
        let total: f64 = rebinned.spectrum(0).counts().iter().sum();
        assert_relative_eq!(total, 20.0);
        assert_eq!(rebinned.spectrum(0).counts(), &[12.0, 8.0]);
    }

    #[test]
    fn test_rebin_splits_fractionally() {
        let src = series(vec![0.0, 2.0], vec![10.0]);
        let target = series(vec![0.0, 0.5, 2.0], vec![0.0, 0.0]);
        let ops = StandardOps::new();

        let rebinned = ops.rebin_to_match(&src, &target).unwrap();
        assert_relative_eq!(rebinned.spectrum(0).counts()[0], 2.5);
        assert_relative_eq!(rebinned.spectrum(0).counts()[1], 7.5);
    }

    #[test]
    fn test_rebin_outside_support_is_zero() {
        let src = series(vec![1.0, 2.0], vec![6.0]);
        let target = series(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 0.0, 0.0]);
        let ops = StandardOps::new();

        let rebinned = ops.rebin_to_match(&src, &target).unwrap();
        assert_eq!(rebinned.spectrum(0).counts(), &[0.0, 6.0, 0.0]);
    }

    #[test]
    fn test_normalize_by_charge() {
        let mut ws = series(vec![0.0, 1.0, 2.0], vec![50.0, 100.0]);
        let ops = StandardOps::new();
        ops.normalize_by_charge(&mut ws).unwrap();
        assert_relative_eq!(ws.spectrum(0).counts()[0], 0.5);
        assert_relative_eq!(ws.spectrum(0).counts()[1], 1.0);

        ws.logs_mut().charge = 0.0;
        assert!(matches!(
            ops.normalize_by_charge(&mut ws),
            Err(Error::ZeroCharge { .. })
        ));
    }

    #[test]
    fn test_subtract_quadrature_errors() {
        let a = series(vec![0.0, 1.0], vec![9.0]);
        let b = series(vec![0.0, 1.0], vec![16.0]);
        let ops = StandardOps::new();

        let diff = ops.subtract(&a, &b).unwrap();
        assert_relative_eq!(diff.spectrum(0).counts()[0], -7.0);
        assert_relative_eq!(diff.spectrum(0).errors()[0], 5.0);
    }

    #[test]
    fn test_add_accumulates_charge() {
        let a = series(vec![0.0, 1.0], vec![1.0]);
        let b = series(vec![0.0, 1.0], vec![2.0]);
        let ops = StandardOps::new();

        let sum = ops.add(&a, &b).unwrap();
        assert_relative_eq!(sum.spectrum(0).counts()[0], 3.0);
        assert_relative_eq!(sum.logs().charge, 200.0);
    }

    #[test]
    fn test_binning_mismatch_rejected() {
        let a = series(vec![0.0, 1.0], vec![1.0]);
        let b = series(vec![0.0, 2.0], vec![2.0]);
        let ops = StandardOps::new();
        assert!(matches!(ops.add(&a, &b), Err(Error::BinningMismatch)));
    }

    #[test]
    fn test_divide_by_zero_then_mask() {
        let a = series(vec![0.0, 1.0, 2.0], vec![4.0, 6.0]);
        let b = series(vec![0.0, 1.0, 2.0], vec![2.0, 0.0]);
        let ops = StandardOps::new();

        let mut ratio = ops.divide(&a, &b).unwrap();
        assert_relative_eq!(ratio.spectrum(0).counts()[0], 2.0);
        assert!(!ratio.spectrum(0).counts()[1].is_finite());

        ops.mask_nonfinite(&mut ratio);
        assert_eq!(ratio.spectrum(0).counts()[1], 0.0);
        assert_eq!(ratio.spectrum(0).errors()[1], 0.0);
        assert!(ratio.spectrum(0).counts()[0].is_finite());
    }

    #[test]
    fn test_crop_spans_window_exactly() {
        let ws = series(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![4.0, 4.0, 4.0, 4.0]);
        let ops = StandardOps::new();

        let cropped = ops.crop(&ws, Window::new(0.5, 3.5)).unwrap();
        let spectrum = cropped.spectrum(0);
        assert_eq!(spectrum.edges(), &[0.5, 1.0, 2.0, 3.0, 3.5]);
        assert_relative_eq!(spectrum.counts()[0], 2.0);
        assert_relative_eq!(spectrum.counts()[1], 4.0);
        assert_relative_eq!(spectrum.counts()[3], 2.0);
    }

    #[test]
    fn test_crop_outside_data_fails() {
        let ws = series(vec![0.0, 1.0], vec![1.0]);
        let ops = StandardOps::new();
        assert!(matches!(
            ops.crop(&ws, Window::new(5.0, 6.0)),
            Err(Error::EmptyCrop { .. })
        ));
    }

    #[test]
    fn test_convert_units_linear() {
        let mut ws = series(vec![15000.0, 30000.0, 45000.0], vec![5.0, 7.0]);
        let cal = Arc::new(Calibration::new(vec![CalRow::new(15000.0, 0.0, 0.0)]).unwrap());
        let ops = StandardOps::new();

        ops.apply_calibration(&mut ws, &cal).unwrap();
        ops.convert_units(&mut ws).unwrap();
        assert_eq!(ws.spectrum(0).edges(), &[1.0, 2.0, 3.0]);
        assert_eq!(ws.spectrum(0).counts(), &[5.0, 7.0]);
        assert!(ws.calibration().is_none());
    }

    #[test]
    fn test_convert_units_requires_calibration() {
        let mut ws = series(vec![0.0, 1.0], vec![1.0]);
        let ops = StandardOps::new();
        assert!(matches!(
            ops.convert_units(&mut ws),
            Err(Error::MissingCalibration)
        ));
    }

    #[test]
    fn test_focus_groups_and_sums() {
        let s0 = Spectrum::new(vec![0.0, 1.0, 2.0], vec![1.0, 2.0], vec![1.0, 1.0]).unwrap();
        let s1 = Spectrum::new(vec![0.0, 1.0, 2.0], vec![3.0, 4.0], vec![1.0, 1.0]).unwrap();
        let s2 = Spectrum::new(vec![0.0, 2.0], vec![10.0], vec![2.0]).unwrap();
        let ws = HistogramSeries::new(vec![s0, s1, s2], SeriesLogs::new(1, 1.0)).unwrap();
        let grouping = Grouping::new(vec![1, 1, 2]).unwrap();
        let ops = StandardOps::new();

        let focused = ops.focus(&ws, &grouping).unwrap();
        assert_eq!(focused.num_spectra(), 2);
        assert_eq!(focused.spectrum(0).counts(), &[4.0, 6.0]);
        assert_eq!(focused.spectrum(1).counts(), &[10.0]);
    }

    #[test]
    fn test_focus_excludes_group_zero() {
        let s0 = Spectrum::new(vec![0.0, 1.0], vec![1.0], vec![1.0]).unwrap();
        let s1 = Spectrum::new(vec![0.0, 1.0], vec![5.0], vec![1.0]).unwrap();
        let ws = HistogramSeries::new(vec![s0, s1], SeriesLogs::new(1, 1.0)).unwrap();
        let grouping = Grouping::new(vec![0, 1]).unwrap();
        let ops = StandardOps::new();

        let focused = ops.focus(&ws, &grouping).unwrap();
        assert_eq!(focused.num_spectra(), 1);
        assert_eq!(focused.spectrum(0).counts(), &[5.0]);
    }

    #[test]
    fn test_merge_ranges_unions_edges() {
        let a = series(vec![0.0, 1.0, 2.0], vec![2.0, 2.0]);
        let b = series(vec![1.0, 2.0, 3.0], vec![4.0, 4.0]);
        let ops = StandardOps::new();

        let merged = ops.merge_ranges(&[a, b]).unwrap();
        let spectrum = merged.spectrum(0);
        assert_eq!(spectrum.edges(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(spectrum.counts(), &[2.0, 6.0, 4.0]);
        assert_relative_eq!(merged.logs().charge, 200.0);
    }

    #[test]
    fn test_conjoin_orders_spectra() {
        let a = series(vec![0.0, 1.0], vec![1.0]);
        let b = series(vec![2.0, 3.0], vec![2.0]);
        let ops = StandardOps::new();

        let joined = ops.conjoin(vec![a, b]).unwrap();
        assert_eq!(joined.num_spectra(), 2);
        assert_eq!(joined.spectrum(0).counts(), &[1.0]);
        assert_eq!(joined.spectrum(1).counts(), &[2.0]);
    }
}
