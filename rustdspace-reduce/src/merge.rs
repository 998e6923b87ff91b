//! Cross-bucket merge of focused d-range spectra.

use log::debug;
use rustdspace_core::error::{Error, Result};
use rustdspace_core::{DrangeId, HistogramOps, HistogramSeries, RangeTable, Window};

/// One populated bucket's focused output, tagged with its d-range.
#[derive(Debug, Clone)]
pub struct FocusedRun {
    /// The d-range the series was focused for.
    pub drange: DrangeId,
    /// The focused series, cropped to the d-range's window.
    pub series: HistogramSeries,
}

/// Counts the contributing windows covering `x`, floored at one.
///
/// The floor guards the later division: bins outside every window (possible
/// only for non-contiguous contributions) keep their summed value.
fn overlap_weight(windows: &[Window], x: f64) -> f64 {
    let covering = windows.iter().filter(|w| w.contains(x)).count();
    covering.max(1) as f64
}

/// Divides every bin by the number of d-range windows covering its
/// midpoint, converting the additive overlap into an average.
fn correct_drange_overlap(series: &mut HistogramSeries, windows: &[Window]) {
    for spectrum in series.spectra_mut() {
        for i in 0..spectrum.len() {
            let weight = overlap_weight(windows, spectrum.midpoint(i));
            spectrum.counts_mut()[i] /= weight;
            spectrum.errors_mut()[i] /= weight;
        }
    }
}

/// Merges the focused series of every populated bucket into one continuous
/// multi-spectrum result.
///
/// A single contributor is returned unchanged. Otherwise the contributing
/// series must agree on spectrum count (a mismatch aborts the whole merge);
/// matching spectra are merged index by index onto the union of their bin
/// edges, reassembled, and overlap-corrected so that regions covered by
/// several d-ranges average rather than sum.
pub fn merge_dspacing_runs<B: HistogramOps>(
    focused: Vec<FocusedRun>,
    table: &RangeTable,
    ops: &B,
) -> Result<HistogramSeries> {
    let mut focused = focused;
    match focused.len() {
        0 => return Err(Error::NoSeries),
        1 => return Ok(focused.remove(0).series),
        _ => {}
    }

    let expected = focused[0].series.num_spectra();
    for run in &focused {
        if run.series.num_spectra() != expected {
            return Err(Error::SpectrumCountMismatch {
                expected,
                found: run.series.num_spectra(),
            });
        }
    }
    debug!(
        "merging {} focused d-ranges with {expected} spectra each",
        focused.len()
    );

    let mut merged_per_index = Vec::with_capacity(expected);
    for index in 0..expected {
        let slices = focused
            .iter()
            .map(|run| run.series.extract_spectrum(index))
            .collect::<Result<Vec<_>>>()?;
        merged_per_index.push(ops.merge_ranges(&slices)?);
    }
    let mut merged = ops.conjoin(merged_per_index)?;

    let windows: Vec<Window> = focused.iter().map(|run| table.dspacing(run.drange)).collect();
    correct_drange_overlap(&mut merged, &windows);
    Ok(merged)
}
