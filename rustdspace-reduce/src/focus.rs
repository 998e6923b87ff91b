//! The per-run calibration and focusing pipeline.

use std::sync::Arc;

use rustdspace_core::error::Result;
use rustdspace_core::{Calibration, Grouping, HistogramOps, HistogramSeries, Window};

/// Calibrates one run and focuses it into the bucket's d-spacing window.
///
/// Steps, in order: normalize by accumulated charge, attach the calibration
/// table, convert the x axis to d-spacing (edges stay ragged), focus into
/// grouped spectra when a grouping is supplied, and clip to `window`. Any
/// failing step propagates unchanged; there is no partial result.
pub fn calibrate_and_focus<B: HistogramOps>(
    series: HistogramSeries,
    cal: &Arc<Calibration>,
    grouping: Option<&Grouping>,
    window: Window,
    ops: &B,
) -> Result<HistogramSeries> {
    let mut series = series;
    ops.normalize_by_charge(&mut series)?;
    ops.apply_calibration(&mut series, cal)?;
    ops.convert_units(&mut series)?;
    let series = match grouping {
        Some(grouping) => ops.focus(&series, grouping)?,
        None => series,
    };
    ops.crop(&series, window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::StandardOps;
    use approx::assert_relative_eq;
    use rustdspace_core::{CalRow, SeriesLogs, Spectrum};

    fn two_detector_run() -> HistogramSeries {
        let edges: Vec<f64> = (0..=40).map(|k| 47100.0 + f64::from(k) * 1000.0).collect();
        let spectra = (0..2)
            .map(|_| {
                Spectrum::new(edges.clone(), vec![10.0; 40], vec![10.0_f64.sqrt(); 40]).unwrap()
            })
            .collect();
        HistogramSeries::new(spectra, SeriesLogs::new(42, 200.0)).unwrap()
    }

    #[test]
    fn test_pipeline_focuses_and_crops() {
        let cal =
            Arc::new(Calibration::new(vec![CalRow::new(15700.0, 0.0, 0.0); 2]).unwrap());
        let grouping = Grouping::new(vec![1, 1]).unwrap();
        let window = Window::new(3.1, 4.3);
        let ops = StandardOps::new();

        let focused =
            calibrate_and_focus(two_detector_run(), &cal, Some(&grouping), window, &ops).unwrap();

        assert_eq!(focused.num_spectra(), 1);
        let spectrum = focused.spectrum(0);
        assert_relative_eq!(spectrum.first_edge(), 3.1, max_relative = 1e-12);
        assert_relative_eq!(spectrum.last_edge(), 4.3, max_relative = 1e-12);
    }

    #[test]
    fn test_pipeline_without_grouping_keeps_detectors() {
        let cal =
            Arc::new(Calibration::new(vec![CalRow::new(15700.0, 0.0, 0.0); 2]).unwrap());
        let window = Window::new(3.1, 4.3);
        let ops = StandardOps::new();

        let result = calibrate_and_focus(two_detector_run(), &cal, None, window, &ops).unwrap();
        assert_eq!(result.num_spectra(), 2);
    }

    #[test]
    fn test_pipeline_propagates_calibration_mismatch() {
        // One calibration row cannot cover two detectors.
        let cal = Arc::new(Calibration::new(vec![CalRow::new(15700.0, 0.0, 0.0)]).unwrap());
        let window = Window::new(3.1, 4.3);
        let ops = StandardOps::new();

        assert!(calibrate_and_focus(two_detector_run(), &cal, None, window, &ops).is_err());
    }
}
