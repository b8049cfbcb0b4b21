//! Eldo dialect: SPICE-syntax decks, double-banner listings.

use crate::deck::DeckRequest;
use crate::dialect::{render_spice_style, Dialect};
use crate::reader::{numeric_rows_after_marker, DcPoint, TranPoint};
use lib_types::SpiceType;

/// Eldo prints a banner for the run and a second one ahead of each data
/// table; rows are read after the second.
const DATA_MARKER: &str = "****";

pub struct Eldo;

impl Dialect for Eldo {
    fn kind(&self) -> SpiceType {
        SpiceType::Eldo
    }

    fn render_deck(&self, req: &DeckRequest) -> String {
        render_spice_style(req, ".OPTION NOASCII\n", true)
    }

    fn parse_dc(&self, text: &str) -> Result<Vec<DcPoint>, String> {
        let rows = numeric_rows_after_marker(text, DATA_MARKER, 2);
        if rows.is_empty() {
            return Err(format!("no data rows after second '{DATA_MARKER}' banner"));
        }
        Ok(rows
            .into_iter()
            .map(|r| DcPoint { v: r[0], i: -r[1] })
            .collect())
    }

    fn parse_tran(&self, text: &str) -> Result<Vec<TranPoint>, String> {
        let rows = numeric_rows_after_marker(text, DATA_MARKER, 2);
        if rows.is_empty() {
            return Err(format!("no data rows after second '{DATA_MARKER}' banner"));
        }
        Ok(rows
            .into_iter()
            .map(|r| TranPoint {
                t: r[0],
                v: r[1],
                i: r.get(2).map(|i| -i),
            })
            .collect())
    }

    fn default_command(&self, deck: &str, result: &str, msg: &str) -> String {
        format!("eldo -b -i {deck} -o {result} >{msg} 2>&1")
    }

    fn abort_marker(&self) -> &'static str {
        "simulation aborted"
    }

    fn convergence_marker(&self) -> &'static str {
        "no dc convergence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dc_skips_first_banner() {
        let listing = "\
**** eldo v2023.1\n\
header text\n\
**** dc analysis\n\
  x        i(vout_ig)\n\
  0.0      1.0e-3\n\
  0.1      2.0e-3\n";
        let points = Eldo.parse_dc(listing).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1], DcPoint { v: 0.1, i: -2.0e-3 });
    }
}
