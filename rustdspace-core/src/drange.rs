//! Acquisition-window table: d-range ids and their time / d-spacing windows.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of hardware acquisition windows.
pub const NUM_DRANGES: u8 = 12;

/// Time-of-flight window (µs) of each d-range, in d-range order.
const TIME_WINDOWS: [[f64; 2]; NUM_DRANGES as usize] = [
    [11700.0, 51700.0],
    [29400.0, 69400.0],
    [47100.0, 87100.0],
    [64800.0, 104800.0],
    [82500.0, 122500.0],
    [100200.0, 140200.0],
    [117900.0, 157900.0],
    [135500.0, 175500.0],
    [153200.0, 193200.0],
    [170900.0, 210900.0],
    [188600.0, 228600.0],
    [206300.0, 246300.0],
];

/// D-spacing window (Å) of each d-range, in d-range order. Adjacent windows
/// overlap; the merge's weighting relies on these intervals.
const DSPACING_WINDOWS: [[f64; 2]; NUM_DRANGES as usize] = [
    [0.7, 2.5],
    [2.1, 3.3],
    [3.1, 4.3],
    [4.1, 5.3],
    [5.2, 6.2],
    [6.2, 7.3],
    [7.3, 8.3],
    [8.3, 9.5],
    [9.4, 10.6],
    [10.4, 11.6],
    [11.0, 12.5],
    [12.0, 13.7],
];

/// A half-open interval `[lo, hi)` on one of the x axes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Window {
    /// Inclusive lower bound.
    pub lo: f64,
    /// Exclusive upper bound.
    pub hi: f64,
}

impl Window {
    /// Creates a window.
    #[inline]
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Returns true if `x` lies inside `[lo, hi)`.
    #[inline]
    pub fn contains(&self, x: f64) -> bool {
        self.lo <= x && x < self.hi
    }

    /// Returns the window width.
    #[inline]
    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lo, self.hi)
    }
}

/// Identifier of one hardware acquisition window (1..=12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DrangeId(u8);

impl DrangeId {
    /// Creates a d-range id, rejecting indices outside 1..=12.
    pub fn new(index: u8) -> Result<Self> {
        if (1..=NUM_DRANGES).contains(&index) {
            Ok(Self(index))
        } else {
            Err(Error::InvalidDrange(index))
        }
    }

    /// Returns the 1-based index.
    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for DrangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "drange{}", self.0)
    }
}

/// One row of the acquisition-window table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeEntry {
    /// The d-range this row describes.
    pub id: DrangeId,
    /// Raw time-of-flight window (µs).
    pub time: Window,
    /// Calibrated d-spacing window (Å).
    pub dspacing: Window,
}

/// The static lookup between d-range ids and their acquisition windows.
///
/// Built once and passed by reference into the components that classify,
/// crop or weight by window; there is no ambient global copy.
#[derive(Debug, Clone)]
pub struct RangeTable {
    entries: Vec<RangeEntry>,
}

impl RangeTable {
    /// The OSIRIS hardware window table.
    pub fn osiris() -> Self {
        let entries = (0..NUM_DRANGES as usize)
            .map(|i| RangeEntry {
                id: DrangeId(i as u8 + 1),
                time: Window::new(TIME_WINDOWS[i][0], TIME_WINDOWS[i][1]),
                dspacing: Window::new(DSPACING_WINDOWS[i][0], DSPACING_WINDOWS[i][1]),
            })
            .collect();
        Self { entries }
    }

    /// Classifies a run by the exact extent of its time axis.
    ///
    /// The acquisition hardware produces bit-exact window bounds, so the
    /// match is exact equality; no tolerance is applied.
    pub fn classify(&self, lo: f64, hi: f64) -> Result<DrangeId> {
        self.entries
            .iter()
            .find(|entry| entry.time.lo == lo && entry.time.hi == hi)
            .map(|entry| entry.id)
            .ok_or(Error::UnknownTimeWindow { lo, hi })
    }

    /// Returns the table row for a d-range.
    pub fn entry(&self, id: DrangeId) -> &RangeEntry {
        &self.entries[usize::from(id.0) - 1]
    }

    /// Returns the d-spacing window of a d-range.
    #[inline]
    pub fn dspacing(&self, id: DrangeId) -> Window {
        self.entry(id).dspacing
    }

    /// Iterates over the table rows in d-range order.
    pub fn iter(&self) -> impl Iterator<Item = &RangeEntry> {
        self.entries.iter()
    }
}

impl Default for RangeTable {
    fn default() -> Self {
        Self::osiris()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drange_id_bounds() {
        assert!(DrangeId::new(0).is_err());
        assert!(DrangeId::new(13).is_err());
        let id = DrangeId::new(3).unwrap();
        assert_eq!(id.index(), 3);
        assert_eq!(id.to_string(), "drange3");
    }

    #[test]
    fn test_window_is_half_open() {
        let w = Window::new(2.1, 3.3);
        assert!(w.contains(2.1));
        assert!(w.contains(3.2999));
        assert!(!w.contains(3.3));
        assert!(!w.contains(2.0999));
    }

    #[test]
    fn test_classify_exact_match() {
        let table = RangeTable::osiris();
        let id = table.classify(47100.0, 87100.0).unwrap();
        assert_eq!(id.index(), 3);
        assert_eq!(table.dspacing(id), Window::new(3.1, 4.3));
    }

    #[test]
    fn test_classify_rejects_inexact_extent() {
        let table = RangeTable::osiris();
        assert!(matches!(
            table.classify(47100.0001, 87100.0),
            Err(Error::UnknownTimeWindow { .. })
        ));
    }

    #[test]
    fn test_adjacent_windows_overlap() {
        let table = RangeTable::osiris();
        let first = table.dspacing(DrangeId::new(1).unwrap());
        let second = table.dspacing(DrangeId::new(2).unwrap());
        assert!(second.lo < first.hi);
    }
}
