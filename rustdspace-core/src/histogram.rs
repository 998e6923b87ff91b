//! Histogram data types operated on throughout the reduction.

use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::error::{Error, Result};

/// A single detector channel: `n + 1` bin edges, `n` counts, `n` errors.
///
/// Edges are strictly increasing; the lengths of the three arrays are
/// validated on construction and cannot be broken afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawSpectrum", into = "RawSpectrum"))]
pub struct Spectrum {
    edges: Vec<f64>,
    counts: Vec<f64>,
    errors: Vec<f64>,
}

impl Spectrum {
    /// Creates a spectrum, validating the histogram invariants.
    pub fn new(edges: Vec<f64>, counts: Vec<f64>, errors: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::InvalidHistogram(format!(
                "need at least 2 bin edges, got {}",
                edges.len()
            )));
        }
        if counts.len() != edges.len() - 1 || errors.len() != edges.len() - 1 {
            return Err(Error::InvalidHistogram(format!(
                "{} edges require {} counts/errors, got {}/{}",
                edges.len(),
                edges.len() - 1,
                counts.len(),
                errors.len()
            )));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidHistogram(
                "bin edges are not strictly increasing".into(),
            ));
        }
        Ok(Self {
            edges,
            counts,
            errors,
        })
    }

    /// Returns the bin edges (length `len() + 1`).
    #[inline]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Returns the bin counts.
    #[inline]
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    /// Returns the bin uncertainties.
    #[inline]
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    /// Mutable access to the counts; the array length is fixed.
    #[inline]
    pub fn counts_mut(&mut self) -> &mut [f64] {
        &mut self.counts
    }

    /// Mutable access to the errors; the array length is fixed.
    #[inline]
    pub fn errors_mut(&mut self) -> &mut [f64] {
        &mut self.errors
    }

    /// Returns the number of bins.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if the spectrum has no bins (never holds for a
    /// validated spectrum).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Returns the first bin edge.
    #[inline]
    pub fn first_edge(&self) -> f64 {
        self.edges[0]
    }

    /// Returns the last bin edge.
    #[inline]
    pub fn last_edge(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Returns the midpoint of bin `i`.
    #[inline]
    pub fn midpoint(&self, i: usize) -> f64 {
        (self.edges[i] + self.edges[i + 1]) / 2.0
    }
}

/// Unvalidated mirror of [`Spectrum`] used for (de)serialization.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct RawSpectrum {
    edges: Vec<f64>,
    counts: Vec<f64>,
    errors: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawSpectrum> for Spectrum {
    type Error = Error;

    fn try_from(raw: RawSpectrum) -> Result<Self> {
        Spectrum::new(raw.edges, raw.counts, raw.errors)
    }
}

#[cfg(feature = "serde")]
impl From<Spectrum> for RawSpectrum {
    fn from(s: Spectrum) -> Self {
        RawSpectrum {
            edges: s.edges,
            counts: s.counts,
            errors: s.errors,
        }
    }
}

/// Scalar run metadata carried alongside the histogram data.
///
/// `charge` is the accumulated exposure ("proton charge"); it is the one
/// field combined additively when repeat runs are summed. Everything else is
/// taken from the reference run on combination.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeriesLogs {
    /// Run number this data was recorded under.
    pub run_number: u32,
    /// Accumulated proton charge (µA·h).
    pub charge: f64,
    /// Any further scalar logs.
    #[cfg_attr(feature = "serde", serde(default))]
    pub extra: BTreeMap<String, f64>,
}

impl SeriesLogs {
    /// Creates logs for a run.
    pub fn new(run_number: u32, charge: f64) -> Self {
        Self {
            run_number,
            charge,
            extra: BTreeMap::new(),
        }
    }
}

/// An ordered collection of spectra sharing one set of run logs.
///
/// This is the unit every reduction step consumes and produces. A slot for
/// per-spectrum calibration constants is filled by the apply-calibration
/// primitive and consumed by unit conversion; it never round-trips through
/// serialization.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramSeries {
    spectra: Vec<Spectrum>,
    logs: SeriesLogs,
    #[cfg_attr(feature = "serde", serde(skip))]
    calibration: Option<Arc<Calibration>>,
}

impl HistogramSeries {
    /// Creates a series from spectra and logs. At least one spectrum is
    /// required.
    pub fn new(spectra: Vec<Spectrum>, logs: SeriesLogs) -> Result<Self> {
        if spectra.is_empty() {
            return Err(Error::EmptySeries);
        }
        Ok(Self {
            spectra,
            logs,
            calibration: None,
        })
    }

    /// Returns the spectra.
    #[inline]
    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    /// Mutable access to the spectra.
    #[inline]
    pub fn spectra_mut(&mut self) -> &mut [Spectrum] {
        &mut self.spectra
    }

    /// Returns spectrum `i`.
    #[inline]
    pub fn spectrum(&self, i: usize) -> &Spectrum {
        &self.spectra[i]
    }

    /// Returns the number of spectra.
    #[inline]
    pub fn num_spectra(&self) -> usize {
        self.spectra.len()
    }

    /// Returns the run logs.
    #[inline]
    pub fn logs(&self) -> &SeriesLogs {
        &self.logs
    }

    /// Mutable access to the run logs.
    #[inline]
    pub fn logs_mut(&mut self) -> &mut SeriesLogs {
        &mut self.logs
    }

    /// Returns the first spectrum's x extent, used to classify a run
    /// against the acquisition-window table.
    pub fn time_extent(&self) -> (f64, f64) {
        let first = &self.spectra[0];
        (first.first_edge(), first.last_edge())
    }

    /// Extracts spectrum `i` as a standalone single-spectrum series with a
    /// copy of this series' logs.
    pub fn extract_spectrum(&self, i: usize) -> Result<Self> {
        let spectrum = self
            .spectra
            .get(i)
            .ok_or(Error::SpectrumCountMismatch {
                expected: i + 1,
                found: self.spectra.len(),
            })?
            .clone();
        Self::new(vec![spectrum], self.logs.clone())
    }

    /// Replaces the spectra, keeping logs and calibration.
    pub fn replace_spectra(&mut self, spectra: Vec<Spectrum>) -> Result<()> {
        if spectra.is_empty() {
            return Err(Error::EmptySeries);
        }
        self.spectra = spectra;
        Ok(())
    }

    /// Consumes the series, returning its spectra.
    pub fn into_spectra(self) -> Vec<Spectrum> {
        self.spectra
    }

    /// Returns the attached calibration, if any.
    #[inline]
    pub fn calibration(&self) -> Option<&Arc<Calibration>> {
        self.calibration.as_ref()
    }

    /// Attaches per-spectrum calibration constants.
    pub fn set_calibration(&mut self, cal: Arc<Calibration>) {
        self.calibration = Some(cal);
    }

    /// Detaches and returns the calibration.
    pub fn take_calibration(&mut self) -> Option<Arc<Calibration>> {
        self.calibration.take()
    }
}
