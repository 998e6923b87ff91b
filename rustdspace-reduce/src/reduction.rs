//! Top-level drivers tying bucketing, focusing and merging together.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;
use rayon::prelude::*;
use rustdspace_core::error::Result;
use rustdspace_core::{Calibration, DrangeId, Grouping, HistogramOps, HistogramSeries, RangeTable};

use crate::bucket::{assign_dranges, DrangeBucket, ProcessOptions, RunKind};
use crate::merge::{merge_dspacing_runs, FocusedRun};

/// Focuses every populated bucket, in d-range order.
///
/// Buckets are independent until the merge, so they are processed in
/// parallel; the output order is deterministic regardless. Buckets without
/// sample runs contribute nothing.
pub fn focus_dranges<B: HistogramOps>(
    buckets: &BTreeMap<DrangeId, DrangeBucket>,
    table: &RangeTable,
    cal: &Arc<Calibration>,
    grouping: Option<&Grouping>,
    options: &ProcessOptions,
    ops: &B,
) -> Result<Vec<FocusedRun>> {
    let populated = buckets.values().filter(|b| b.has_sample()).count();
    info!("focusing {populated} populated d-ranges of {} loaded", buckets.len());

    let focused: Result<Vec<Option<FocusedRun>>> = buckets
        .par_iter()
        .map(|(drange, bucket)| {
            bucket
                .process(table, cal, grouping, options, ops)
                .map(|series| {
                    series.map(|series| FocusedRun {
                        drange: *drange,
                        series,
                    })
                })
        })
        .collect();

    Ok(focused?.into_iter().flatten().collect())
}

/// Runs the full reduction: bucket assignment, per-bucket focusing and the
/// overlap-corrected merge.
pub fn reduce<B: HistogramOps>(
    runs: Vec<(RunKind, HistogramSeries)>,
    table: &RangeTable,
    cal: &Arc<Calibration>,
    grouping: Option<&Grouping>,
    options: &ProcessOptions,
    ops: &B,
) -> Result<HistogramSeries> {
    let buckets = assign_dranges(runs, table)?;
    let focused = focus_dranges(&buckets, table, cal, grouping, options, ops)?;
    merge_dspacing_runs(focused, table, ops)
}
