//!
//! Command-line interface for d-range diffraction reduction.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;

use rustdspace_core::{DrangeId, HistogramSeries, RangeTable};
use rustdspace_io::{
    empty_key, parse_run_ranges, read_series, vanadium_key, write_series, CalMapping, CalTable,
    JsonRunLoader, RawLoader,
};
use rustdspace_reduce::{
    assign_dranges, focus_dranges, merge_dspacing_runs, ProcessOptions, RunKind, StandardOps,
};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    RustdspaceIo(#[from] rustdspace_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] rustdspace_core::Error),

    #[error("No sample runs were given")]
    NoSampleRuns,
}

/// Time-of-flight diffraction d-range reduction.
#[derive(Parser)]
#[command(name = "rustdspace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce sample runs into a continuous d-spacing spectrum
    Reduce {
        /// Sample run numbers, e.g. "119977-119979"
        #[arg(long)]
        sample: String,

        /// Vanadium run numbers (overrides mapping resolution)
        #[arg(long)]
        vanadium: Option<String>,

        /// Empty-container run numbers (overrides mapping resolution)
        #[arg(long)]
        empty: Option<String>,

        /// Calibration-mapping file for per-d-range run resolution
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Calibration table (difc/difa/tzero/group per spectrum)
        #[arg(long)]
        cal: PathBuf,

        /// Directory holding the run files
        #[arg(long, default_value = ".")]
        data_dir: PathBuf,

        /// Instrument prefix of the run files
        #[arg(long, default_value = "OSIRIS")]
        instrument: String,

        /// Subtract the empty-container run per d-range
        #[arg(long)]
        subtract_empty: bool,

        /// Divide by the focused vanadium per d-range
        #[arg(long)]
        vanadium_correct: bool,

        /// Scale the empty-container run before subtraction
        #[arg(long)]
        container_scale: Option<f64>,

        /// Skip focusing; keep per-detector spectra
        #[arg(long)]
        no_focus: bool,

        /// Write per-d-range outputs instead of the merged spectrum
        #[arg(long)]
        no_merge: bool,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a run file
    Info {
        /// Input run file
        input: PathBuf,
    },

    /// Print the d-range acquisition-window table
    Ranges,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Reduce {
            sample,
            vanadium,
            empty,
            mapping,
            cal,
            data_dir,
            instrument,
            subtract_empty,
            vanadium_correct,
            container_scale,
            no_focus,
            no_merge,
            output,
            verbose,
        } => reduce_command(&ReduceArgs {
            sample,
            vanadium,
            empty,
            mapping,
            cal,
            data_dir,
            instrument,
            subtract_empty,
            vanadium_correct,
            container_scale,
            no_focus,
            no_merge,
            output,
            verbose,
        }),
        Commands::Info { input } => info_command(&input),
        Commands::Ranges => {
            ranges_command();
            Ok(())
        }
    }
}

struct ReduceArgs {
    sample: String,
    vanadium: Option<String>,
    empty: Option<String>,
    mapping: Option<PathBuf>,
    cal: PathBuf,
    data_dir: PathBuf,
    instrument: String,
    subtract_empty: bool,
    vanadium_correct: bool,
    container_scale: Option<f64>,
    no_focus: bool,
    no_merge: bool,
    output: PathBuf,
    verbose: bool,
}

/// Resolves a run-number string per populated d-range from the mapping.
fn runs_from_mapping(
    mapping: &CalMapping,
    first_sample_run: u32,
    populated: &BTreeSet<DrangeId>,
    key_for: fn(DrangeId) -> String,
) -> Result<String> {
    let mut resolved = Vec::with_capacity(populated.len());
    for drange in populated {
        let key = key_for(*drange);
        let runs = mapping.lookup(
            first_sample_run,
            &key,
            "this must be listed under the mapping entry covering the sample runs",
        )?;
        resolved.push(runs.to_string());
    }
    Ok(resolved.join(","))
}

fn reduce_command(args: &ReduceArgs) -> Result<()> {
    let table = RangeTable::osiris();
    let loader = JsonRunLoader::new(&args.data_dir, &args.instrument);

    let cal_table = CalTable::load(&args.cal)?;
    let calibration = Arc::new(cal_table.calibration);
    let grouping = (!args.no_focus).then_some(&cal_table.grouping);

    let sample_runs = loader.load_raw(&args.sample)?;
    if sample_runs.is_empty() {
        return Err(CliError::NoSampleRuns);
    }
    if args.verbose {
        eprintln!("Loaded {} sample run(s)", sample_runs.len());
    }

    let mut populated = BTreeSet::new();
    for series in &sample_runs {
        let (lo, hi) = series.time_extent();
        populated.insert(table.classify(lo, hi)?);
    }
    let first_sample_run = parse_run_ranges(&args.sample)?[0];

    let mut runs: Vec<(RunKind, HistogramSeries)> = sample_runs
        .into_iter()
        .map(|series| (RunKind::Sample, series))
        .collect();

    let cal_mapping = match &args.mapping {
        Some(path) => Some(CalMapping::load(path)?),
        None => None,
    };

    if args.vanadium_correct {
        let vanadium_string = match (&args.vanadium, &cal_mapping) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(mapping)) => {
                runs_from_mapping(mapping, first_sample_run, &populated, vanadium_key)?
            }
            (None, None) => String::new(),
        };
        if !vanadium_string.is_empty() {
            for series in loader.load_raw(&vanadium_string)? {
                runs.push((RunKind::Vanadium, series));
            }
        }
    }

    if args.subtract_empty {
        let empty_string = match (&args.empty, &cal_mapping) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(mapping)) => {
                runs_from_mapping(mapping, first_sample_run, &populated, empty_key)?
            }
            (None, None) => String::new(),
        };
        if !empty_string.is_empty() {
            for series in loader.load_raw(&empty_string)? {
                runs.push((RunKind::Empty, series));
            }
        }
    }

    let mut options = ProcessOptions::new();
    options.subtract_empty = args.subtract_empty;
    options.vanadium_correct = args.vanadium_correct;
    options.container_scale = args.container_scale;

    let ops = StandardOps::new();
    let buckets = assign_dranges(runs, &table)?;
    let focused = focus_dranges(&buckets, &table, &calibration, grouping, &options, &ops)?;
    if args.verbose {
        eprintln!("Focused {} populated d-range(s)", focused.len());
    }

    if args.no_merge {
        for run in &focused {
            let path = drange_output_path(&args.output, run.drange);
            write_series(&path, &run.series)?;
            if args.verbose {
                eprintln!("Wrote {}", path.display());
            }
        }
    } else {
        let merged = merge_dspacing_runs(focused, &table, &ops)?;
        write_series(&args.output, &merged)?;
        if args.verbose {
            eprintln!("Wrote {}", args.output.display());
        }
    }

    Ok(())
}

/// Derives `result_drange3.json` style paths for unmerged outputs.
fn drange_output_path(output: &Path, drange: DrangeId) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("focused");
    output.with_file_name(format!("{stem}_{drange}.json"))
}

fn info_command(input: &Path) -> Result<()> {
    let series = read_series(input)?;
    let table = RangeTable::osiris();
    let (lo, hi) = series.time_extent();

    println!("Run number:   {}", series.logs().run_number);
    println!("Charge:       {} µA·h", series.logs().charge);
    println!("Spectra:      {}", series.num_spectra());
    println!("Bins:         {}", series.spectrum(0).len());
    println!("X extent:     [{lo}, {hi}]");
    match table.classify(lo, hi) {
        Ok(drange) => println!("D-range:      {drange}"),
        Err(_) => println!("D-range:      (no exact window match)"),
    }

    let total: f64 = series
        .spectra()
        .iter()
        .flat_map(|s| s.counts().iter())
        .sum();
    println!("Total counts: {total}");
    Ok(())
}

fn ranges_command() {
    let table = RangeTable::osiris();
    println!("{:<10} {:>22} {:>18}", "d-range", "time window (µs)", "d window (Å)");
    for entry in table.iter() {
        println!(
            "{:<10} {:>22} {:>18}",
            entry.id.to_string(),
            entry.time.to_string(),
            entry.dspacing.to_string()
        );
    }
}
