//! The simulator dialect interface.
//!
//! Three operations cover everything the pipeline needs from a simulator:
//! render a deck, read a DC sweep, read a transient. Three concrete
//! implementations exist for HSPICE, Spectre, and Eldo; adding a fourth
//! simulator means implementing this trait and nothing else.

use crate::deck::{Analysis, DeckRequest, Element, Stimulus};
use crate::error::SimError;
use crate::reader::{DcPoint, TranPoint};
use lib_types::SpiceType;

pub trait Dialect: Send + Sync {
    /// The `--spice-type` value this dialect serves.
    fn kind(&self) -> SpiceType;

    /// Render a complete deck for one (curve, corner) characterization.
    fn render_deck(&self, req: &DeckRequest) -> String;

    /// Interpret DC sweep output. Currents are returned in the IBIS active
    /// convention: the raw SPICE passive-convention probe current is negated
    /// so that positive means current driven into the die.
    fn parse_dc(&self, text: &str) -> Result<Vec<DcPoint>, String>;

    /// Interpret transient output into raw (t, V[, I]) samples.
    fn parse_tran(&self, text: &str) -> Result<Vec<TranPoint>, String>;

    /// Command line used when the user supplies no `--spice-cmd` template.
    fn default_command(&self, deck: &str, result: &str, msg: &str) -> String;

    /// Marker betraying an aborted run in the result or message file.
    fn abort_marker(&self) -> &'static str;

    /// Marker betraying a non-convergent run.
    fn convergence_marker(&self) -> &'static str;
}

/// Look up the dialect for a declared simulator type.
pub fn dialect_for(kind: SpiceType) -> &'static dyn Dialect {
    match kind {
        SpiceType::Hspice => &crate::hspice::Hspice,
        SpiceType::Spectre => &crate::spectre::Spectre,
        SpiceType::Eldo => &crate::eldo::Eldo,
    }
}

/// Shared renderer for the SPICE-syntax dialects (HSPICE and Eldo differ
/// only in option cards and framing; Spectre renders its own language).
pub(crate) fn render_spice_style(req: &DeckRequest, options: &str, with_end: bool) -> String {
    let mut deck = String::new();
    deck.push_str(&format!("* {}\n", req.title));
    deck.push_str("* deck generated by ibisgen\n\n");
    deck.push_str(&req.dut_netlist);
    if let Some(model) = &req.model_netlist {
        deck.push('\n');
        deck.push_str(model);
        deck.push('\n');
    }
    if let Some(ext) = &req.ext_cards {
        deck.push('\n');
        deck.push_str(ext);
        deck.push('\n');
    }
    for e in &req.load {
        deck.push_str(&spice_element(e));
    }
    for s in &req.supplies {
        deck.push_str(&format!("{} {} 0 DC {:.6e}\n", s.name, s.node, s.volts));
    }
    deck.push('\n');
    for s in &req.stimulus {
        deck.push_str(&spice_stimulus(s));
    }
    if let Some(temp) = req.temperature {
        deck.push_str(&format!(".TEMP {temp}\n"));
    }
    deck.push_str(options);
    deck.push_str(&spice_analysis(&req.analysis));
    if with_end {
        deck.push_str(".END\n");
    }
    deck
}

pub(crate) fn spice_element(e: &Element) -> String {
    match e {
        Element::Resistor { name, n1, n2, ohms } => format!("{name} {n1} {n2} {ohms:.6e}\n"),
        Element::Capacitor { name, n1, n2, farads } => format!("{name} {n1} {n2} {farads:.6e}\n"),
        Element::Inductor { name, n1, n2, henries } => format!("{name} {n1} {n2} {henries:.6e}\n"),
        Element::VSource { name, n1, n2, volts } => format!("{name} {n1} {n2} DC {volts:.6e}\n"),
    }
}

pub(crate) fn spice_stimulus(s: &Stimulus) -> String {
    match s {
        Stimulus::Dc { name, node, volts } => format!("{name} {node} 0 DC {volts:.6e}\n"),
        Stimulus::Pulse {
            name,
            node,
            low,
            high,
            delay,
            rise,
            fall,
            width,
            period,
        } => format!(
            "{name} {node} 0 PULSE({low:.6e} {high:.6e} {delay:.6e} {rise:.6e} {fall:.6e} {width:.6e} {period:.6e})\n"
        ),
    }
}

pub(crate) fn spice_analysis(analysis: &Analysis) -> String {
    match analysis {
        Analysis::DcSweep {
            start,
            stop,
            step,
            probe_source,
        } => format!(
            ".DC {src} {start:.6e} {stop:.6e} {step:.6e}\n.PRINT DC I({probe_source})\n",
            src = crate::deck::SWEEP_SOURCE,
        ),
        Analysis::Tran {
            stop,
            probe_node,
            probe_source,
        } => {
            // 100 output intervals over the window keeps raw prints bounded;
            // the binner resamples afterwards.
            let step = stop / 100.0;
            let mut cards = format!(".TRAN {step:.6e} {stop:.6e}\n");
            match probe_source {
                Some(src) => {
                    cards.push_str(&format!(".PRINT TRAN V({probe_node}) I({src})\n"))
                }
                None => cards.push_str(&format!(".PRINT TRAN V({probe_node})\n")),
            }
            cards
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::{Corner, CurveType};

    #[test]
    fn test_dialect_lookup_covers_all_kinds() {
        for kind in [SpiceType::Hspice, SpiceType::Spectre, SpiceType::Eldo] {
            assert_eq!(dialect_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_spice_style_deck_layout() {
        let req = DeckRequest {
            title: "Typ pullup curve for model driver".into(),
            curve: CurveType::Pullup,
            corner: Corner::Typ,
            dut_netlist: "M1 out in vdd vdd pfet w=10u\n".into(),
            model_netlist: Some(".MODEL pfet PMOS\n".into()),
            ext_cards: None,
            supplies: vec![crate::deck::SupplyBias {
                name: "VCC_IG".into(),
                node: "vdd".into(),
                volts: 3.3,
            }],
            stimulus: vec![Stimulus::Dc {
                name: "VIN_IG".into(),
                node: "in".into(),
                volts: 3.3,
            }],
            load: vec![Element::VSource {
                name: crate::deck::SWEEP_SOURCE.into(),
                n1: "out".into(),
                n2: "0".into(),
                volts: 0.0,
            }],
            temperature: Some(27.0),
            analysis: Analysis::DcSweep {
                start: -3.6,
                stop: 7.2,
                step: 0.135,
                probe_source: crate::deck::SWEEP_SOURCE.into(),
            },
        };
        let text = render_spice_style(&req, ".OPTION INGOLD=2 POST\n", true);
        let dc_pos = text.find(".DC ").unwrap();
        let end_pos = text.find(".END").unwrap();
        assert!(text.starts_with("* Typ pullup curve"));
        assert!(text.contains("VCC_IG vdd 0 DC"));
        assert!(text.contains(".TEMP 27"));
        assert!(dc_pos < end_pos);
        assert!(text.contains(".PRINT DC I(VOUT_IG)"));
    }
}
