//! Correlation testbench emission.
//!
//! For every characterized driver pin, write `compare_{pin}.sp`: a transient
//! deck that exercises the transistor-level buffer into the reference load
//! so its pad waveform can be overlaid against the emitted IBIS model in a
//! model-capable simulator.

use anyhow::{Context, Result};
use lib_analysis::{AnalysisOptions, PinPlan};
use lib_spice::deck::{filter_netlist, DeckRequest};
use lib_spice::{dialect_for, Analysis, Element, Stimulus, SupplyBias};
use lib_types::{Corner, CurveType, Document, RLOAD_DEFAULT, SIM_TIME_DEFAULT};

pub fn emit_testbenches(
    doc: &Document,
    plans: &[PinPlan],
    opts: &AnalysisOptions,
) -> Result<()> {
    let dialect = dialect_for(doc.spice_type);

    for plan in plans {
        // Only pins with switching behavior are worth correlating.
        let Some(item) = plan
            .items
            .iter()
            .find(|i| i.curve == CurveType::RisingRamp && i.corner == Corner::Typ)
        else {
            continue;
        };
        let comp = doc
            .components
            .iter()
            .find(|c| c.name == plan.component)
            .expect("planned component exists");
        let pin = comp.find_pin(&plan.pin).expect("planned pin exists");
        let model = doc.find_model(&item.model).expect("planned model exists");

        let netlist_path = comp
            .spice_file
            .as_ref()
            .map(|p| match &opts.config_dir {
                Some(dir) if p.is_relative() => dir.join(p),
                _ => p.clone(),
            })
            .context("component has no SPICE netlist")?;
        let netlist = std::fs::read_to_string(&netlist_path)
            .with_context(|| format!("reading {}", netlist_path.display()))?;

        let r = &item.recipe;
        let sim_time = r.sim_time.unwrap_or(SIM_TIME_DEFAULT);
        let r_load = model.resolved.r_load.unwrap_or(RLOAD_DEFAULT);
        let pad = pin.node().to_string();

        let power_node = comp.power_pin().map(|p| p.node().to_string());
        let gnd_node = comp.gnd_pin().map(|p| p.node().to_string());
        let mut supplies = Vec::new();
        if let Some(node) = &power_node {
            supplies.push(SupplyBias {
                name: "VCC_IG".into(),
                node: node.clone(),
                volts: r.vcc,
            });
        }
        if let Some(node) = &gnd_node {
            supplies.push(SupplyBias {
                name: "VGND_IG".into(),
                node: node.clone(),
                volts: r.gnd,
            });
        }

        let mut stimulus = Vec::new();
        if let Some(input) = &pin.input_pin {
            let tr = model.resolved.tr.typ.unwrap_or(sim_time / 100.0);
            let tf = model.resolved.tf.typ.unwrap_or(sim_time / 100.0);
            let width = 2.0 * sim_time;
            stimulus.push(Stimulus::Pulse {
                name: "VIN_IG".into(),
                node: input.clone(),
                low: r.gnd,
                high: r.vcc,
                delay: 0.0,
                rise: tr,
                fall: tf,
                width,
                period: 2.0 * (tr + tf + width),
            });
        }
        if let Some(enable) = &pin.enable_pin {
            stimulus.push(Stimulus::Dc {
                name: "VENA_IG".into(),
                node: enable.clone(),
                volts: r.vcc,
            });
        }

        let load = vec![Element::Resistor {
            name: "RLOAD_IG".into(),
            n1: pad.clone(),
            n2: gnd_node.clone().unwrap_or_else(|| "0".into()),
            ohms: r_load,
        }];

        let request = DeckRequest {
            title: format!(
                "correlation testbench for pin {} against {}",
                pin.name, doc.header.file_name
            ),
            curve: CurveType::RisingWave,
            corner: Corner::Typ,
            dut_netlist: filter_netlist(&netlist),
            model_netlist: model.model_file.as_ref().and_then(|p| {
                let path = match &opts.config_dir {
                    Some(dir) if p.is_relative() => dir.join(p),
                    _ => p.clone(),
                };
                std::fs::read_to_string(path).ok()
            }),
            ext_cards: None,
            supplies,
            stimulus,
            load,
            temperature: model.resolved.temp_range.typ,
            analysis: Analysis::Tran {
                stop: sim_time,
                probe_node: pad,
                probe_source: None,
            },
        };

        let out_path = opts.outdir.join(format!("compare_{}.sp", pin.name));
        std::fs::write(&out_path, dialect.render_deck(&request))
            .with_context(|| format!("writing {}", out_path.display()))?;
        tracing::info!(file = %out_path.display(), "correlation testbench written");
    }
    Ok(())
}
