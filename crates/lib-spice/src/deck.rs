//! Dialect-independent deck description.
//!
//! The analysis layer assembles a [`DeckRequest`] for each (curve, corner)
//! pair; a [`crate::Dialect`] renders it into simulator-specific text. The
//! swept source and the supply sources carry fixed names so current probes
//! stay stable across decks.

use lib_types::{Corner, CurveType};

/// Name of the source swept by DC analyses; pad current is probed through it.
pub const SWEEP_SOURCE: &str = "VOUT_IG";

/// Name of the series Vds offset source.
pub const VDS_SOURCE: &str = "VDS_IG";

/// A supply rail bias at one corner.
#[derive(Clone, Debug, PartialEq)]
pub struct SupplyBias {
    pub name: String,
    pub node: String,
    pub volts: f64,
}

/// Stimulus applied to a control pin (logical input or output enable).
#[derive(Clone, Debug, PartialEq)]
pub enum Stimulus {
    /// Constant drive for DC sweeps and for held enables during transients.
    Dc { name: String, node: String, volts: f64 },
    /// Edge drive for ramp and waveform runs.
    Pulse {
        name: String,
        node: String,
        low: f64,
        high: f64,
        delay: f64,
        rise: f64,
        fall: f64,
        width: f64,
        period: f64,
    },
}

/// Passive termination / fixture elements and auxiliary sources.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Resistor { name: String, n1: String, n2: String, ohms: f64 },
    Capacitor { name: String, n1: String, n2: String, farads: f64 },
    Inductor { name: String, n1: String, n2: String, henries: f64 },
    /// A fixed voltage source, e.g. the swept pad source (at 0 V) or a
    /// fixture bias.
    VSource { name: String, n1: String, n2: String, volts: f64 },
}

/// The control cards.
#[derive(Clone, Debug, PartialEq)]
pub enum Analysis {
    /// `.DC` sweep of [`SWEEP_SOURCE`]; current is probed through
    /// `probe_source`, which differs from the swept source only for series
    /// elements.
    DcSweep {
        start: f64,
        stop: f64,
        step: f64,
        probe_source: String,
    },
    /// `.TRAN` run probing the pad voltage and, optionally, a supply
    /// current.
    Tran {
        stop: f64,
        probe_node: String,
        probe_source: Option<String>,
    },
}

/// Everything a dialect needs to render one complete deck.
#[derive(Clone, Debug)]
pub struct DeckRequest {
    pub title: String,
    pub curve: CurveType,
    pub corner: Corner,
    /// Buffer netlist, already passed through [`filter_netlist`].
    pub dut_netlist: String,
    /// Corner-specific device model text, appended verbatim.
    pub model_netlist: Option<String>,
    /// User-supplied extra simulator cards, appended verbatim.
    pub ext_cards: Option<String>,
    pub supplies: Vec<SupplyBias>,
    pub stimulus: Vec<Stimulus>,
    pub load: Vec<Element>,
    pub temperature: Option<f64>,
    pub analysis: Analysis,
}

/// Strip full-line comments and any `.end` card from a DUT netlist so it can
/// be spliced into a generated deck.
pub fn filter_netlist(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let first = line.split_whitespace().next();
        match first {
            Some(tok) if tok.starts_with('*') || tok.eq_ignore_ascii_case(".end") => continue,
            _ => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_netlist_drops_comments_and_end() {
        let src = "* buffer netlist\nM1 out in vdd vdd pfet w=10u\n.END\nM2 out in vss vss nfet w=5u\n";
        let filtered = filter_netlist(src);
        assert!(!filtered.contains("buffer netlist"));
        assert!(!filtered.to_lowercase().contains(".end"));
        assert!(filtered.contains("M1"));
        assert!(filtered.contains("M2"));
    }
}
