//! Canonical result structures and shared text-scanning helpers.
//!
//! Simulator listings bury the data table under banner lines and column
//! headers; each dialect knows its own begin marker and column layout, and
//! delegates the row scanning to the helpers here.

use crate::dialect::Dialect;
use crate::error::SimError;
use std::path::Path;

/// One DC sweep sample. `i` is already in the IBIS active convention.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DcPoint {
    pub v: f64,
    pub i: f64,
}

/// One transient sample at a simulator-chosen time point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TranPoint {
    pub t: f64,
    pub v: f64,
    pub i: Option<f64>,
}

/// Read and parse a DC sweep result file.
pub fn read_dc(dialect: &dyn Dialect, path: &Path) -> Result<Vec<DcPoint>, SimError> {
    let text = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let points = dialect
        .parse_dc(&text)
        .map_err(|detail| SimError::parse(path, detail))?;
    if points.is_empty() {
        return Err(SimError::parse(path, "no V/I rows found"));
    }
    tracing::debug!(file = %path.display(), rows = points.len(), "parsed DC sweep");
    Ok(points)
}

/// Read and parse a transient result file.
pub fn read_tran(dialect: &dyn Dialect, path: &Path) -> Result<Vec<TranPoint>, SimError> {
    let text = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let mut points = dialect
        .parse_tran(&text)
        .map_err(|detail| SimError::parse(path, detail))?;
    if points.is_empty() {
        return Err(SimError::parse(path, "no transient rows found"));
    }
    // Listings occasionally interleave restart blocks; keep time ordered.
    points.sort_by(|a, b| a.t.total_cmp(&b.t));
    tracing::debug!(file = %path.display(), rows = points.len(), "parsed transient");
    Ok(points)
}

/// Collect whitespace-separated all-numeric rows appearing after the `n`-th
/// occurrence of `marker` (case-insensitive). Header lines and terminator
/// glyphs between the marker and the data are skipped; non-numeric lines
/// inside the data region are ignored.
pub(crate) fn numeric_rows_after_marker(text: &str, marker: &str, n: usize) -> Vec<Vec<f64>> {
    let marker = marker.to_ascii_lowercase();
    let mut seen = 0usize;
    let mut rows = Vec::new();
    for line in text.lines() {
        if seen < n {
            if line.to_ascii_lowercase().contains(&marker) {
                seen += 1;
            }
            continue;
        }
        if let Some(row) = numeric_row(line) {
            rows.push(row);
        }
    }
    rows
}

/// Parse a line into numbers if every token is numeric and there are at
/// least two of them.
pub(crate) fn numeric_row(line: &str) -> Option<Vec<f64>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    let mut row = Vec::with_capacity(tokens.len());
    for tok in tokens {
        row.push(tok.parse::<f64>().ok()?);
    }
    Some(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_row_rejects_headers() {
        assert!(numeric_row("volt     current").is_none());
        assert!(numeric_row("x").is_none());
        assert_eq!(
            numeric_row("1.0e-9  3.30e+00"),
            Some(vec![1.0e-9, 3.3])
        );
    }

    #[test]
    fn test_rows_after_second_marker() {
        let text = "**** banner\njunk\n**** data\n0.0 1.0\n0.1 2.0\n";
        let rows = numeric_rows_after_marker(text, "****", 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![0.1, 2.0]);
    }
}
