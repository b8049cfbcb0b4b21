//! HSPICE dialect: `.lis`-style listings, `.OPTION INGOLD=2 POST`.

use crate::deck::DeckRequest;
use crate::dialect::{render_spice_style, Dialect};
use crate::reader::{numeric_rows_after_marker, DcPoint, TranPoint};
use lib_types::SpiceType;

/// Data tables in an HSPICE listing follow a `******` banner line.
const DATA_MARKER: &str = "******";

pub struct Hspice;

impl Dialect for Hspice {
    fn kind(&self) -> SpiceType {
        SpiceType::Hspice
    }

    fn render_deck(&self, req: &DeckRequest) -> String {
        // INGOLD=2 forces plain exponent notation in the listing, which is
        // what the row scanner expects.
        render_spice_style(req, ".OPTION INGOLD=2 POST\n", true)
    }

    fn parse_dc(&self, text: &str) -> Result<Vec<DcPoint>, String> {
        let rows = numeric_rows_after_marker(text, DATA_MARKER, 1);
        if rows.is_empty() {
            return Err(format!("no data rows after '{DATA_MARKER}' banner"));
        }
        Ok(rows
            .into_iter()
            .map(|r| DcPoint {
                v: r[0],
                // Listing current follows the passive convention (positive
                // into the source's + terminal); flip to IBIS active.
                i: -r[1],
            })
            .collect())
    }

    fn parse_tran(&self, text: &str) -> Result<Vec<TranPoint>, String> {
        let rows = numeric_rows_after_marker(text, DATA_MARKER, 1);
        if rows.is_empty() {
            return Err(format!("no data rows after '{DATA_MARKER}' banner"));
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
        format!("hspice -i {deck} -o {result} 2>{msg}")
    }

    fn abort_marker(&self) -> &'static str {
        "aborted"
    }

    fn convergence_marker(&self) -> &'static str {
        "convergence failure"
    }
}
