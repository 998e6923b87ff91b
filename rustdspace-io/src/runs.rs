//! Run-number string parsing.

use crate::error::{Error, Result};

fn parse_number(text: &str, full: &str) -> Result<u32> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidRunString {
            text: full.to_string(),
            reason: format!("'{}' is not a run number", text.trim()),
        })
}

/// Parses a run-number string such as `"119977-119979, 119981"` into the
/// ordered list of run numbers it names. Ranges are inclusive.
pub fn parse_run_ranges(text: &str) -> Result<Vec<u32>> {
    let mut runs = Vec::new();
    for part in text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(Error::InvalidRunString {
                text: text.to_string(),
                reason: "empty element".to_string(),
            });
        }
        if let Some((start, end)) = part.split_once('-') {
            let start = parse_number(start, text)?;
            let end = parse_number(end, text)?;
            if end < start {
                return Err(Error::InvalidRunString {
                    text: text.to_string(),
                    reason: format!("range {part} runs backwards"),
                });
            }
            runs.extend(start..=end);
        } else {
            runs.push(parse_number(part, text)?);
        }
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_run() {
        assert_eq!(parse_run_ranges("119977").unwrap(), vec![119977]);
    }

    #[test]
    fn test_ranges_and_lists() {
        assert_eq!(
            parse_run_ranges("119977-119979, 119981").unwrap(),
            vec![119977, 119978, 119979, 119981]
        );
    }

    #[test]
    fn test_whitespace_tolerated() {
        assert_eq!(
            parse_run_ranges(" 100 - 102 ,105").unwrap(),
            vec![100, 101, 102, 105]
        );
    }

    #[test]
    fn test_backwards_range_rejected() {
        assert!(parse_run_ranges("105-100").is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_run_ranges("").is_err());
        assert!(parse_run_ranges("abc").is_err());
        assert!(parse_run_ranges("100,,105").is_err());
    }
}
