//! Grouping loaded runs by acquisition window and per-bucket processing.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};
use rustdspace_core::error::{Error, Result};
use rustdspace_core::{
    Calibration, DrangeId, Grouping, HistogramOps, HistogramSeries, RangeTable,
};

use crate::combine::rebin_and_sum;
use crate::focus::calibrate_and_focus;

/// Role of a loaded run within its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// A sample measurement; repeats accumulate.
    Sample,
    /// The vanadium reference for the window; last one loaded wins.
    Vanadium,
    /// The empty-container measurement; last one loaded wins.
    Empty,
}

/// Per-bucket processing switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Subtract the bucket's empty-container run from the summed sample.
    pub subtract_empty: bool,
    /// Divide the focused sample by the focused vanadium.
    pub vanadium_correct: bool,
    /// Scale applied to the rebinned empty run before subtraction.
    pub container_scale: Option<f64>,
}

impl ProcessOptions {
    /// Creates options with every correction disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables container subtraction.
    pub fn with_subtract_empty(mut self) -> Self {
        self.subtract_empty = true;
        self
    }

    /// Enables vanadium normalization.
    pub fn with_vanadium_correct(mut self) -> Self {
        self.vanadium_correct = true;
        self
    }

    /// Sets the container scale factor.
    pub fn with_container_scale(mut self, factor: f64) -> Self {
        self.container_scale = Some(factor);
        self
    }
}

/// All runs belonging to one acquisition window.
///
/// Buckets are immutable once the assignment pass completes; processing
/// derives the focused series without mutating the bucket.
#[derive(Debug, Clone)]
pub struct DrangeBucket {
    drange: DrangeId,
    samples: Vec<HistogramSeries>,
    vanadium: Option<HistogramSeries>,
    empty: Option<HistogramSeries>,
}

impl DrangeBucket {
    fn new(drange: DrangeId) -> Self {
        Self {
            drange,
            samples: Vec::new(),
            vanadium: None,
            empty: None,
        }
    }

    /// Returns the bucket's d-range.
    #[inline]
    pub fn drange(&self) -> DrangeId {
        self.drange
    }

    /// Returns the sample repeats assigned to this bucket.
    #[inline]
    pub fn samples(&self) -> &[HistogramSeries] {
        &self.samples
    }

    /// Returns true if at least one sample run was assigned.
    #[inline]
    pub fn has_sample(&self) -> bool {
        !self.samples.is_empty()
    }

    /// Returns the vanadium run, if one was assigned.
    #[inline]
    pub fn vanadium(&self) -> Option<&HistogramSeries> {
        self.vanadium.as_ref()
    }

    /// Returns the empty-container run, if one was assigned.
    #[inline]
    pub fn empty(&self) -> Option<&HistogramSeries> {
        self.empty.as_ref()
    }

    /// Produces the bucket's focused series.
    ///
    /// Returns `Ok(None)` for a bucket without sample runs; such buckets
    /// contribute nothing downstream. The result is deterministic in the
    /// bucket's contents, and the driver invokes it exactly once per bucket
    /// and reduction.
    pub fn process<B: HistogramOps>(
        &self,
        table: &RangeTable,
        cal: &Arc<Calibration>,
        grouping: Option<&Grouping>,
        options: &ProcessOptions,
        ops: &B,
    ) -> Result<Option<HistogramSeries>> {
        if !self.has_sample() {
            return Ok(None);
        }

        let mut sample = rebin_and_sum(self.samples.clone(), ops)?;

        if options.subtract_empty {
            if let Some(empty) = &self.empty {
                let mut empty_rebinned = ops.rebin_to_match(empty, &sample)?;
                if let Some(factor) = options.container_scale {
                    ops.scale(&mut empty_rebinned, factor);
                }
                sample = ops.subtract(&sample, &empty_rebinned)?;
            } else {
                // Not an error: the subtraction is skipped and the log
                // line is the only trace.
                warn!(
                    "{}: container subtraction requested but no empty run is loaded, continuing without it",
                    self.drange
                );
            }
        }

        let window = table.dspacing(self.drange);
        let mut sample = calibrate_and_focus(sample, cal, grouping, window, ops)?;

        if options.vanadium_correct {
            let vanadium = self.vanadium.as_ref().ok_or(Error::MissingVanadium {
                drange: self.drange,
            })?;
            let vanadium = calibrate_and_focus(vanadium.clone(), cal, grouping, window, ops)?;
            let vanadium = ops.rebin_to_match(&vanadium, &sample)?;
            sample = ops.divide(&sample, &vanadium)?;
            ops.mask_nonfinite(&mut sample);
        }

        Ok(Some(sample))
    }
}

/// Groups loaded runs into buckets keyed by their acquisition window.
///
/// This is a pure build step: the map is complete before any bucket is
/// processed, and the returned buckets are never mutated afterwards. Sample
/// repeats with a run number already present in their bucket are dropped;
/// a second vanadium or empty run for one window replaces the first.
pub fn assign_dranges(
    runs: Vec<(RunKind, HistogramSeries)>,
    table: &RangeTable,
) -> Result<BTreeMap<DrangeId, DrangeBucket>> {
    let mut buckets: BTreeMap<DrangeId, DrangeBucket> = BTreeMap::new();

    for (kind, series) in runs {
        let (lo, hi) = series.time_extent();
        let drange = table.classify(lo, hi)?;
        debug!(
            "run {} ({kind:?}) assigned to {drange}",
            series.logs().run_number
        );

        let bucket = buckets
            .entry(drange)
            .or_insert_with(|| DrangeBucket::new(drange));
        match kind {
            RunKind::Sample => {
                let run_number = series.logs().run_number;
                if !bucket
                    .samples
                    .iter()
                    .any(|s| s.logs().run_number == run_number)
                {
                    bucket.samples.push(series);
                }
            }
            RunKind::Vanadium => bucket.vanadium = Some(series),
            RunKind::Empty => bucket.empty = Some(series),
        }
    }

    Ok(buckets)
}
