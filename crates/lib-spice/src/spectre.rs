//! Spectre dialect: native-language decks, nutascii result format.

use crate::deck::{Analysis, DeckRequest, Element, Stimulus, SWEEP_SOURCE};
use crate::dialect::Dialect;
use crate::reader::{DcPoint, TranPoint};
use lib_types::SpiceType;

pub struct Spectre;

impl Dialect for Spectre {
    fn kind(&self) -> SpiceType {
        SpiceType::Spectre
    }

    fn render_deck(&self, req: &DeckRequest) -> String {
        let mut deck = String::new();
        deck.push_str(&format!("// {}\n", req.title));
        deck.push_str("// deck generated by ibisgen\n");
        deck.push_str("simulator lang=spice\n");
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
        deck.push_str("simulator lang=spectre\n");
        for e in &req.load {
            deck.push_str(&element(e));
        }
        for s in &req.supplies {
            deck.push_str(&format!(
                "{} ({} 0) vsource type=dc dc={:.6e}\n",
                s.name, s.node, s.volts
            ));
        }
        for s in &req.stimulus {
            deck.push_str(&stimulus(s));
        }
        if let Some(temp) = req.temperature {
            deck.push_str(&format!("settemp options temp={temp}\n"));
        }
        deck.push_str(&analysis(&req.analysis));
        deck
    }

    fn parse_dc(&self, text: &str) -> Result<Vec<DcPoint>, String> {
        let (nvars, values) = nutascii_values(text)?;
        if nvars < 2 {
            return Err(format!("expected sweep + current, got {nvars} variables"));
        }
        Ok(values
            .chunks_exact(nvars + 1)
            .map(|point| DcPoint {
                v: point[1],
                i: -point[2],
            })
            .collect())
    }

    fn parse_tran(&self, text: &str) -> Result<Vec<TranPoint>, String> {
        let (nvars, values) = nutascii_values(text)?;
        if nvars < 2 {
            return Err(format!("expected time + voltage, got {nvars} variables"));
        }
        Ok(values
            .chunks_exact(nvars + 1)
            .map(|point| TranPoint {
                t: point[1],
                v: point[2],
                i: (nvars >= 3).then(|| -point[3]),
            })
            .collect())
    }

    fn default_command(&self, deck: &str, result: &str, msg: &str) -> String {
        format!("spectre -f nutascii {deck} -r {result} >{msg} 2>&1")
    }

    fn abort_marker(&self) -> &'static str {
        "simulation aborted"
    }

    fn convergence_marker(&self) -> &'static str {
        "no convergence"
    }
}

fn element(e: &Element) -> String {
    match e {
        Element::Resistor { name, n1, n2, ohms } => {
            format!("{name} ({n1} {n2}) resistor r={ohms:.6e}\n")
        }
        Element::Capacitor { name, n1, n2, farads } => {
            format!("{name} ({n1} {n2}) capacitor c={farads:.6e}\n")
        }
        Element::Inductor { name, n1, n2, henries } => {
            format!("{name} ({n1} {n2}) inductor l={henries:.6e}\n")
        }
        Element::VSource { name, n1, n2, volts } => {
            format!("{name} ({n1} {n2}) vsource type=dc dc={volts:.6e}\n")
        }
    }
}

fn stimulus(s: &Stimulus) -> String {
    match s {
        Stimulus::Dc { name, node, volts } => {
            format!("{name} ({node} 0) vsource type=dc dc={volts:.6e}\n")
        }
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
            "{name} ({node} 0) vsource type=pulse val0={low:.6e} val1={high:.6e} delay={delay:.6e} \
             rise={rise:.6e} fall={fall:.6e} width={width:.6e} period={period:.6e}\n"
        ),
    }
}

fn analysis(a: &Analysis) -> String {
    match a {
        Analysis::DcSweep {
            start,
            stop,
            step,
            probe_source,
        } => format!(
            "sweep_ig dc dev={SWEEP_SOURCE} param=dc start={start:.6e} stop={stop:.6e} \
             step={step:.6e} save=selected\nsave {probe_source}:currents\n"
        ),
        Analysis::Tran {
            stop,
            probe_node,
            probe_source,
        } => {
            let step = stop / 100.0;
            let mut cards = format!(
                "tran_ig tran step={step:.6e} start=0 stop={stop:.6e} save=selected\n"
            );
            match probe_source {
                Some(src) => cards.push_str(&format!("save {probe_node} {src}:currents\n")),
                None => cards.push_str(&format!("save {probe_node}\n")),
            }
            cards
        }
    }
}

/// Read a nutascii block: variable count from the `No. Variables:` line,
/// then whitespace tokens after `Values:` — each point is an index followed
/// by the variable values, wrapped over as many lines as needed.
fn nutascii_values(text: &str) -> Result<(usize, Vec<f64>), String> {
    let mut nvars = None;
    let mut in_values = false;
    let mut values = Vec::new();
    for line in text.lines() {
        if in_values {
            for tok in line.split_whitespace() {
                let n: f64 = tok
                    .parse()
                    .map_err(|_| format!("bad numeric token '{tok}' in Values block"))?;
                values.push(n);
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("No. Variables:") {
            nvars = rest.trim().parse::<usize>().ok();
        } else if line.trim_start().starts_with("Values:") {
            in_values = true;
        }
    }
    let nvars = nvars.ok_or("missing 'No. Variables:' header")?;
    if !in_values {
        return Err("missing 'Values:' section".into());
    }
    if values.len() % (nvars + 1) != 0 {
        return Err(format!(
            "values count {} not a multiple of {} per point",
            values.len(),
            nvars + 1
        ));
    }
    Ok((nvars, values))
}
