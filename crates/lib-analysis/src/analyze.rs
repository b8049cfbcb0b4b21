//! Plan execution: materialize each plan item through the simulator and
//! fold the results back into the document.
//!
//! Per-item failures (simulation, parse, derivation) are captured and the
//! pipeline continues; the affected table simply stays NA. Configuration,
//! resource, and planning problems abort before any simulation starts, and
//! cancellation aborts immediately.

use crate::derive;
use crate::error::{DeriveError, PlanError};
use crate::planner::{PinPlan, PlanItem, Recipe, Termination};
use lib_spice::deck::{filter_netlist, SWEEP_SOURCE, VDS_SOURCE};
use lib_spice::{
    dialect_for, reader, Analysis, DeckRequest, Dialect, Driver, Element, RunPolicy, SimError,
    Stimulus, SupplyBias, TranPoint,
};
use lib_types::{
    Component, Corner, Corners, CurveType, Document, EnablePolarity, Model, Pin, Polarity,
    ViTable, WaveTable, WEAK_TIE_OHMS,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;

/// Fatal conditions that stop the whole run.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("cannot read {path}: {source}")]
    Resource {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("analysis cancelled")]
    Cancelled,
}

/// One captured per-item failure.
#[derive(Debug)]
pub struct ItemFailure {
    pub pin: String,
    pub model: String,
    pub curve: CurveType,
    pub corner: Corner,
    pub detail: String,
}

/// Aggregate outcome of a run.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    pub items_run: usize,
    pub items_reused: usize,
    pub failures: Vec<ItemFailure>,
}

impl AnalysisReport {
    pub fn all_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Execution settings handed down from the CLI.
pub struct AnalysisOptions {
    pub outdir: PathBuf,
    /// Directory the configuration file lives in; anchors netlist paths.
    pub config_dir: Option<PathBuf>,
    pub spice_command: Option<String>,
    pub policy: RunPolicy,
    pub cancel: Arc<AtomicBool>,
}

/// Raw per-model accumulation before derivation.
#[derive(Default)]
struct RawModel {
    dc: HashMap<CurveType, ViTable>,
    series: HashMap<usize, (f64, ViTable)>,
    ramp_rise: (Corners<f64>, Corners<f64>),
    ramp_fall: (Corners<f64>, Corners<f64>),
    waves_rising: HashMap<usize, WaveTable>,
    waves_falling: HashMap<usize, WaveTable>,
}

/// Run every plan item, in order, one pin group at a time, then derive all
/// final tables into the document's models.
pub fn analyze_document(
    doc: &mut Document,
    plans: &[PinPlan],
    opts: &AnalysisOptions,
) -> Result<AnalysisReport, AnalyzeError> {
    let dialect = dialect_for(doc.spice_type);
    let driver = Driver::new(
        dialect,
        opts.spice_command.clone(),
        opts.policy.clone(),
        opts.cancel.clone(),
    );
    let mut report = AnalysisReport::default();
    let mut raw: HashMap<String, RawModel> = HashMap::new();

    for plan in plans {
        let comp = doc
            .components
            .iter()
            .find(|c| c.name == plan.component)
            .expect("planned component exists");
        let pin = comp.find_pin(&plan.pin).expect("planned pin exists").clone();
        let nodes = SupplyNodes::find(comp, &pin)?;
        let netlist = load_netlist(comp, opts)?;
        let series_netlist = comp
            .series_spice_file
            .as_ref()
            .map(|p| read_resource(&resolve_path(p, opts)))
            .transpose()?
            .map(|t| filter_netlist(&t));
        let model_name = plan.items.first().map(|i| i.model.clone()).unwrap_or_default();
        let model = doc
            .find_model(&model_name)
            .expect("planned model exists")
            .clone();

        tracing::info!(pin = %pin.name, model = %model.name, items = plan.items.len(), "analyzing pin");

        for item in &plan.items {
            let netlist_text = if item.curve == CurveType::SeriesVi {
                series_netlist.as_deref().unwrap_or(netlist.as_str())
            } else {
                netlist.as_str()
            };
            match run_item(
                &model, &pin, &nodes, item, netlist_text, dialect, &driver, opts, &mut raw,
                &mut report,
            ) {
                Ok(()) => {}
                Err(SimError::Cancelled) => return Err(AnalyzeError::Cancelled),
                Err(e) => {
                    tracing::error!(
                        curve = item.curve.name(),
                        corner = item.corner.label(),
                        pin = %pin.name,
                        error = %e,
                        "plan item failed; table column stays NA"
                    );
                    report.failures.push(ItemFailure {
                        pin: pin.name.clone(),
                        model: model.name.clone(),
                        curve: item.curve,
                        corner: item.corner,
                        detail: e.to_string(),
                    });
                }
            }
        }
    }

    finalize_models(doc, raw, &mut report);
    Ok(report)
}

/// Resolved supply wiring for one signal pin.
struct SupplyNodes {
    power: String,
    gnd: String,
    power_clamp: Option<String>,
    gnd_clamp: Option<String>,
}

impl SupplyNodes {
    fn find(comp: &Component, pin: &Pin) -> Result<SupplyNodes, PlanError> {
        let by_label = |label: &Option<String>, pick: fn(&Pin) -> Option<&str>| {
            label
                .as_deref()
                .and_then(|l| comp.supply_pin_by_label(l, |p| pick(p)))
        };

        let power = by_label(&pin.pullup_ref, |p| p.pullup_ref.as_deref())
            .or_else(|| comp.power_pin())
            .ok_or_else(|| PlanError::MissingPowerPin {
                component: comp.name.clone(),
            })?;
        let gnd = by_label(&pin.pulldown_ref, |p| p.pulldown_ref.as_deref())
            .or_else(|| comp.gnd_pin())
            .ok_or_else(|| PlanError::MissingGndPin {
                component: comp.name.clone(),
            })?;
        let power_clamp = by_label(&pin.power_clamp_ref, |p| p.power_clamp_ref.as_deref())
            .map(|p| p.node().to_string())
            .filter(|n| !n.eq_ignore_ascii_case(power.node()));
        let gnd_clamp = by_label(&pin.gnd_clamp_ref, |p| p.gnd_clamp_ref.as_deref())
            .map(|p| p.node().to_string())
            .filter(|n| !n.eq_ignore_ascii_case(gnd.node()));

        Ok(SupplyNodes {
            power: power.node().to_string(),
            gnd: gnd.node().to_string(),
            power_clamp,
            gnd_clamp,
        })
    }
}

fn resolve_path(path: &Path, opts: &AnalysisOptions) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match &opts.config_dir {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

fn read_resource(path: &Path) -> Result<String, AnalyzeError> {
    std::fs::read_to_string(path).map_err(|source| AnalyzeError::Resource {
        path: path.to_path_buf(),
        source,
    })
}

fn load_netlist(comp: &Component, opts: &AnalysisOptions) -> Result<String, AnalyzeError> {
    let Some(file) = &comp.spice_file else {
        return Err(PlanError::MissingNetlist {
            component: comp.name.clone(),
        }
        .into());
    };
    let path = resolve_path(file, opts);
    Ok(filter_netlist(&read_resource(&path)?))
}

#[allow(clippy::too_many_arguments)]
fn run_item(
    model: &Model,
    pin: &Pin,
    nodes: &SupplyNodes,
    item: &PlanItem,
    netlist: &str,
    dialect: &dyn Dialect,
    driver: &Driver<'_>,
    opts: &AnalysisOptions,
    raw: &mut HashMap<String, RawModel>,
    report: &mut AnalysisReport,
) -> Result<(), SimError> {
    let deck_path = opts.outdir.join(format!("{}.sp", item.file_stem));
    let result_path = opts.outdir.join(format!("{}.out", item.file_stem));
    let msg_path = opts.outdir.join(format!("{}.msg", item.file_stem));

    let request = build_deck_request(model, pin, nodes, item, netlist, opts);
    // Iterate keeps an existing deck untouched so the freshness check stays
    // meaningful.
    if !(driver.policy().iterate && deck_path.exists()) {
        std::fs::write(&deck_path, dialect.render_deck(&request))
            .map_err(|e| SimError::io(&deck_path, e))?;
    }

    match driver.run(&deck_path, &result_path, &msg_path)? {
        lib_spice::RunOutcome::Ran => report.items_run += 1,
        lib_spice::RunOutcome::Reused => report.items_reused += 1,
    }

    let entry = raw.entry(model.name.clone()).or_default();
    if item.curve.is_transient() {
        let samples = reader::read_tran(dialect, &result_path)?;
        store_transient(item, &samples, entry).map_err(|e| SimError::Parse {
            path: result_path.clone(),
            detail: e.to_string(),
        })?;
    } else {
        let points = reader::read_dc(dialect, &result_path)?;
        match item.curve {
            CurveType::SeriesVi => {
                let idx = item.index.unwrap_or(0);
                let slot = entry
                    .series
                    .entry(idx)
                    .or_insert_with(|| (item.recipe.vds.unwrap_or(0.0), ViTable::default()));
                derive::merge_dc_corner(&mut slot.1, &points, item.corner);
            }
            curve => {
                let table = entry.dc.entry(curve).or_default();
                derive::merge_dc_corner(table, &points, item.corner);
            }
        }
    }

    driver.cleanup(&deck_path, &msg_path);
    Ok(())
}

fn store_transient(
    item: &PlanItem,
    samples: &[TranPoint],
    entry: &mut RawModel,
) -> Result<(), DeriveError> {
    let r = &item.recipe;
    match item.curve {
        CurveType::RisingRamp | CurveType::FallingRamp => {
            let (v_start, v_end) = if item.curve == CurveType::RisingRamp {
                (r.gnd, r.vcc)
            } else {
                (r.vcc, r.gnd)
            };
            let (dv, dt) = derive::extract_ramp(samples, v_start, v_end)?;
            let slot = if item.curve == CurveType::RisingRamp {
                &mut entry.ramp_rise
            } else {
                &mut entry.ramp_fall
            };
            slot.0.set(item.corner, dv);
            slot.1.set(item.corner, dt);
            Ok(())
        }
        CurveType::RisingWave | CurveType::FallingWave => {
            let idx = item.index.unwrap_or(0);
            let bins = item.recipe.wave_points.max(2);
            let waves = if item.curve == CurveType::RisingWave {
                &mut entry.waves_rising
            } else {
                &mut entry.waves_falling
            };
            let wave = waves.entry(idx).or_insert_with(|| WaveTable {
                fixture: r.fixture.unwrap_or_default(),
                points: Vec::new(),
            });
            let sim_time = r.sim_time.unwrap_or(lib_types::SIM_TIME_DEFAULT);
            derive::bin_transient(samples, sim_time, bins, item.corner, wave)
        }
        _ => unreachable!("store_transient called for DC curve"),
    }
}

fn build_deck_request(
    model: &Model,
    pin: &Pin,
    nodes: &SupplyNodes,
    item: &PlanItem,
    netlist: &str,
    opts: &AnalysisOptions,
) -> DeckRequest {
    let r = &item.recipe;
    let pad = pin.node().to_string();
    let title = format!(
        "{} {} curve for model {}",
        capitalize(item.corner.label()),
        item.curve.name(),
        model.name
    );

    let mut supplies = vec![
        SupplyBias {
            name: "VCC_IG".into(),
            node: nodes.power.clone(),
            volts: r.vcc,
        },
        SupplyBias {
            name: "VGND_IG".into(),
            node: nodes.gnd.clone(),
            volts: r.gnd,
        },
    ];
    if let Some(node) = &nodes.power_clamp {
        supplies.push(SupplyBias {
            name: "VCLMP_IG".into(),
            node: node.clone(),
            volts: r.vcc_clamp,
        });
    }
    if let Some(node) = &nodes.gnd_clamp {
        supplies.push(SupplyBias {
            name: "VGCLMP_IG".into(),
            node: node.clone(),
            volts: r.gnd_clamp,
        });
    }

    let mut stimulus = Vec::new();
    let mut load = Vec::new();

    // Enable drive.
    if let Some(enable_name) = &pin.enable_pin {
        let node = enable_name.clone();
        let asserted = r.enable_output;
        let (vil, vih) = logic_levels(model, r, item.corner);
        let high_means_on = model.enable == EnablePolarity::ActiveHigh;
        let volts = if asserted == high_means_on { vih } else { vil };
        stimulus.push(Stimulus::Dc {
            name: "VENA_IG".into(),
            node,
            volts,
        });
    }

    // Input drive: held DC for sweeps, pulsed for transients; weak-tied to
    // the ground reference when the buffer is disabled so the node cannot
    // float through a clamp sweep.
    if let Some(input_name) = &pin.input_pin {
        let node = input_name.clone();
        let (vil, vih) = logic_levels(model, r, item.corner);
        let inverted = model.polarity == Polarity::Inverting;
        if item.curve.is_transient() {
            let (mut low, mut high) = if r.output_high { (vil, vih) } else { (vih, vil) };
            if inverted {
                std::mem::swap(&mut low, &mut high);
            }
            let sim_time = r.sim_time.unwrap_or(lib_types::SIM_TIME_DEFAULT);
            let tr = model.resolved.tr.get_or_typ(item.corner).unwrap_or(sim_time / 100.0);
            let tf = model.resolved.tf.get_or_typ(item.corner).unwrap_or(sim_time / 100.0);
            let width = 2.0 * sim_time;
            stimulus.push(Stimulus::Pulse {
                name: "VIN_IG".into(),
                node,
                low,
                high,
                delay: 0.0,
                rise: tr,
                fall: tf,
                width,
                period: 2.0 * (tr + tf + width),
            });
        } else if r.enable_output {
            let mut level_high = r.output_high;
            if inverted {
                level_high = !level_high;
            }
            stimulus.push(Stimulus::Dc {
                name: "VIN_IG".into(),
                node,
                volts: if level_high { vih } else { vil },
            });
        } else {
            load.push(Element::Resistor {
                name: "RINWEAK_IG".into(),
                n1: node,
                n2: nodes.gnd.clone(),
                ohms: WEAK_TIE_OHMS,
            });
        }
    }

    // Termination / sweep wiring.
    let mut probe_node = pad.clone();
    let analysis = match (&r.sweep, &r.termination) {
        (Some(sweep), _) => {
            let probe_source = if item.curve == CurveType::SeriesVi {
                let pin2 = pin.series_pin.clone().unwrap_or_else(|| "core".into());
                load.push(Element::VSource {
                    name: SWEEP_SOURCE.into(),
                    n1: pin2.clone(),
                    n2: "0".into(),
                    volts: 0.0,
                });
                load.push(Element::VSource {
                    name: VDS_SOURCE.into(),
                    n1: pad.clone(),
                    n2: pin2,
                    volts: r.vds.unwrap_or(0.0),
                });
                VDS_SOURCE.to_string()
            } else {
                load.push(Element::VSource {
                    name: SWEEP_SOURCE.into(),
                    n1: pad.clone(),
                    n2: "0".into(),
                    volts: 0.0,
                });
                SWEEP_SOURCE.to_string()
            };
            Analysis::DcSweep {
                start: sweep.start,
                stop: sweep.stop,
                step: sweep.step,
                probe_source,
            }
        }
        (None, termination) => {
            match termination {
                Termination::LoadToGnd(ohms) => load.push(Element::Resistor {
                    name: "RLOAD_IG".into(),
                    n1: pad.clone(),
                    n2: nodes.gnd.clone(),
                    ohms: *ohms,
                }),
                Termination::LoadToPower(ohms) => load.push(Element::Resistor {
                    name: "RLOAD_IG".into(),
                    n1: pad.clone(),
                    n2: nodes.power.clone(),
                    ohms: *ohms,
                }),
                Termination::LoadToEclTermination(ohms) => {
                    load.push(Element::Resistor {
                        name: "RLOAD_IG".into(),
                        n1: pad.clone(),
                        n2: "eclterm".into(),
                        ohms: *ohms,
                    });
                    load.push(Element::VSource {
                        name: "VTERM_IG".into(),
                        n1: "eclterm".into(),
                        n2: nodes.power.clone(),
                        volts: lib_types::ECL_TERMINATION_VOLTAGE,
                    });
                }
                Termination::Fixture => {
                    probe_node = wire_fixture(r, &pad, item.corner, &mut load, &mut stimulus);
                }
                Termination::SweepSource => {}
            }
            let probe_source = matches!(termination, Termination::Fixture).then(|| "VCC_IG".to_string());
            Analysis::Tran {
                stop: r.sim_time.unwrap_or(lib_types::SIM_TIME_DEFAULT),
                probe_node: probe_node.clone(),
                probe_source,
            }
        }
    };

    let model_file = match item.corner {
        Corner::Typ => model.model_file.as_ref(),
        Corner::Min => model.model_file_min.as_ref().or(model.model_file.as_ref()),
        Corner::Max => model.model_file_max.as_ref().or(model.model_file.as_ref()),
    };
    let model_netlist = model_file.map(|p| {
        let path = resolve_path(p, opts);
        match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "model file missing; continuing without it");
                String::new()
            }
        }
    });
    let ext_cards = model.ext_cmd_file.as_ref().and_then(|p| {
        std::fs::read_to_string(resolve_path(p, opts)).ok()
    });

    DeckRequest {
        title,
        curve: item.curve,
        corner: item.corner,
        dut_netlist: netlist.to_string(),
        model_netlist: model_netlist.filter(|t| !t.is_empty()),
        ext_cards,
        supplies,
        stimulus,
        load,
        temperature: r.temperature,
        analysis,
    }
}

/// Build the fixture ladder from the pad outward: die parasitics first, the
/// probe sits between them and the fixture, then the fixture network into
/// its bias source. Returns the probe node.
fn wire_fixture(
    r: &Recipe,
    pad: &str,
    corner: Corner,
    load: &mut Vec<Element>,
    stimulus: &mut Vec<Stimulus>,
) -> String {
    let fixture = r.fixture.unwrap_or_default();
    let mut node = pad.to_string();
    let mut next = 0usize;
    let mut fresh = || {
        let n = format!("fxn{next}");
        next += 1;
        n
    };

    if let Some(l) = fixture.l_dut {
        let n2 = fresh();
        load.push(Element::Inductor {
            name: "LDUT_IG".into(),
            n1: node.clone(),
            n2: n2.clone(),
            henries: l,
        });
        node = n2;
    }
    if let Some(res) = fixture.r_dut {
        let n2 = fresh();
        load.push(Element::Resistor {
            name: "RDUT_IG".into(),
            n1: node.clone(),
            n2: n2.clone(),
            ohms: res,
        });
        node = n2;
    }
    if let Some(c) = fixture.c_dut {
        load.push(Element::Capacitor {
            name: "CDUT_IG".into(),
            n1: node.clone(),
            n2: "0".into(),
            farads: c,
        });
    }

    let probe = node.clone();

    if let Some(l) = fixture.l_fixture {
        let n2 = fresh();
        load.push(Element::Inductor {
            name: "LFIX_IG".into(),
            n1: node.clone(),
            n2: n2.clone(),
            henries: l,
        });
        node = n2;
    }
    if let Some(c) = fixture.c_fixture {
        load.push(Element::Capacitor {
            name: "CFIX_IG".into(),
            n1: node.clone(),
            n2: "0".into(),
            farads: c,
        });
    }
    let fix_node = fresh();
    load.push(Element::Resistor {
        name: "RFIX_IG".into(),
        n1: node,
        n2: fix_node.clone(),
        ohms: fixture.r_fixture,
    });
    let v_fixture = fixture.v_fixture.get_or_typ(corner).unwrap_or(0.0);
    stimulus.push(Stimulus::Dc {
        name: "VFIX_IG".into(),
        node: fix_node,
        volts: v_fixture,
    });
    probe
}

fn logic_levels(model: &Model, r: &Recipe, corner: Corner) -> (f64, f64) {
    let vil = model.resolved.vil.get_or_typ(corner).unwrap_or(0.3 * r.vcc);
    let vih = model.resolved.vih.get_or_typ(corner).unwrap_or(0.7 * r.vcc);
    (vil, vih)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Fold all raw data into the document's models: subtraction, clamp
/// extraction from disabled sweeps, normalization, ramps, waveforms.
fn finalize_models(doc: &mut Document, raw: HashMap<String, RawModel>, report: &mut AnalysisReport) {
    for (model_name, mut data) in raw {
        let Some(model) = doc.find_model_mut(&model_name) else {
            continue;
        };
        let vcc_typ = model
            .resolved
            .voltage_range
            .typ
            .or(model.resolved.pullup_ref.typ)
            .unwrap_or(0.0);
        let clamp_tol = model.resolved.clamp_tol.unwrap_or(0.0);
        let derate_vi = model.resolved.derate_vi_pct.unwrap_or(0.0);
        let derate_ramp = model.resolved.derate_ramp_pct.unwrap_or(0.0);

        let disabled_pu = data.dc.remove(&CurveType::DisabledPullup);
        let disabled_pd = data.dc.remove(&CurveType::DisabledPulldown);

        // Disabled sweeps double as clamp sources when no standalone clamp
        // sweep ran (the planner's multi-use tie-break).
        if let Some(du) = &disabled_pu {
            data.dc.entry(CurveType::PowerClamp).or_insert_with(|| du.clone());
        }
        if let Some(dd) = &disabled_pd {
            data.dc.entry(CurveType::GndClamp).or_insert_with(|| dd.clone());
        }

        if let Some(pu) = data.dc.get_mut(&CurveType::Pullup) {
            if let Some(du) = &disabled_pu {
                derive::subtract_disabled(pu, du);
            }
        }
        if let Some(pd) = data.dc.get_mut(&CurveType::Pulldown) {
            if let Some(dd) = &disabled_pd {
                derive::subtract_disabled(pd, dd);
            }
        }

        let mut finish = |curve: CurveType, table: ViTable| -> Option<ViTable> {
            match derive::finalize_vi(curve, table, vcc_typ, clamp_tol, derate_vi) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::error!(model = %model_name, curve = curve.name(), error = %e, "derivation failed");
                    report.failures.push(ItemFailure {
                        pin: String::new(),
                        model: model_name.clone(),
                        curve,
                        corner: Corner::Typ,
                        detail: e.to_string(),
                    });
                    None
                }
            }
        };

        model.pullup = data.dc.remove(&CurveType::Pullup).and_then(|t| finish(CurveType::Pullup, t));
        model.pulldown = data
            .dc
            .remove(&CurveType::Pulldown)
            .and_then(|t| finish(CurveType::Pulldown, t));
        model.power_clamp = data
            .dc
            .remove(&CurveType::PowerClamp)
            .and_then(|t| finish(CurveType::PowerClamp, t));
        model.gnd_clamp = data
            .dc
            .remove(&CurveType::GndClamp)
            .and_then(|t| finish(CurveType::GndClamp, t));

        let mut series: Vec<(usize, (f64, ViTable))> = data.series.into_iter().collect();
        series.sort_by_key(|(idx, _)| *idx);
        model.series_tables = series
            .into_iter()
            .filter_map(|(_, (vds, t))| finish(CurveType::SeriesVi, t).map(|t| (vds, t)))
            .collect();

        model.ramp.dv_rise = data.ramp_rise.0;
        model.ramp.dt_rise = data.ramp_rise.1;
        model.ramp.dv_fall = data.ramp_fall.0;
        model.ramp.dt_fall = data.ramp_fall.1;
        model.ramp.r_load = model.resolved.r_load.unwrap_or(lib_types::RLOAD_DEFAULT);
        derive::derate_ramp(&mut model.ramp.dt_rise, derate_ramp);
        derive::derate_ramp(&mut model.ramp.dt_fall, derate_ramp);

        let mut rising: Vec<(usize, WaveTable)> = data.waves_rising.into_iter().collect();
        rising.sort_by_key(|(idx, _)| *idx);
        model.rising_waves = rising.into_iter().map(|(_, w)| w).collect();
        let mut falling: Vec<(usize, WaveTable)> = data.waves_falling.into_iter().collect();
        falling.sort_by_key(|(idx, _)| *idx);
        model.falling_waves = falling.into_iter().map(|(_, w)| w).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_document;
    use lib_types::{Fixture, Header, ModelType};

    /// Shell stand-in for the simulator: inspects the deck and prints a
    /// plausible HSPICE listing for the analysis it finds.
    const FAKE_SIM: &str = "if grep -q 'falling_' {in}; then \
         printf ' ****** transient analysis\\n  time  voltage\\n 0.0 3.3\\n 2.0e-9 2.5\\n 5.0e-9 1.65\\n 8.0e-9 0.2\\n 1.0e-8 0.0\\n' > {out}; \
         elif grep -q '.TRAN' {in}; then \
         printf ' ****** transient analysis\\n  time  voltage\\n 0.0 0.0\\n 2.0e-9 0.8\\n 5.0e-9 1.65\\n 8.0e-9 3.1\\n 1.0e-8 3.3\\n' > {out}; \
         else \
         printf ' ****** dc transfer curves\\n  volt  current\\n -3.3 1.5e-2\\n 0.0 8.0e-3\\n 3.3 1.0e-3\\n 6.6 -2.0e-3\\n' > {out}; \
         fi";

    fn test_document(dir: &std::path::Path) -> Document {
        let netlist = dir.join("buf.sp");
        std::fs::write(&netlist, "* three stage buffer\nM1 net7 in vdd vdd pfet w=10u\nM2 net7 in vss vss nfet w=5u\n.END\n").unwrap();

        let mut doc = Document {
            header: Header {
                ibis_ver: "3.2".into(),
                file_name: "buf.ibs".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut model = Model {
            name: "driver".into(),
            model_type: ModelType::Output,
            ..Default::default()
        };
        model.resolved.voltage_range = Corners::new(3.3, 3.0, 3.6);
        model.resolved.temp_range = Corners::new(27.0, 100.0, 0.0);
        model.resolved.r_load = Some(50.0);
        model.resolved.sim_time = Some(10e-9);
        model.resolved.clamp_tol = Some(0.0);
        model.resolved.derate_vi_pct = Some(0.0);
        model.resolved.derate_ramp_pct = Some(0.0);
        model.rising_fixtures = vec![Fixture::default()];
        doc.models.push(model);
        doc.components.push(Component {
            name: "chip".into(),
            spice_file: Some(netlist),
            pins: vec![
                Pin {
                    name: "pad".into(),
                    spice_node: Some("net7".into()),
                    signal: "sig".into(),
                    model_name: "driver".into(),
                    input_pin: Some("in".into()),
                    ..Default::default()
                },
                Pin {
                    name: "in".into(),
                    signal: "din".into(),
                    model_name: "DUMMY".into(),
                    reserved: lib_types::ReservedKind::from_name("DUMMY"),
                    ..Default::default()
                },
                Pin {
                    name: "vdd".into(),
                    signal: "vdd".into(),
                    model_name: "POWER".into(),
                    reserved: lib_types::ReservedKind::from_name("POWER"),
                    ..Default::default()
                },
                Pin {
                    name: "vss".into(),
                    signal: "vss".into(),
                    model_name: "GND".into(),
                    reserved: lib_types::ReservedKind::from_name("GND"),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });
        doc
    }

    fn options(dir: &std::path::Path) -> AnalysisOptions {
        AnalysisOptions {
            outdir: dir.to_path_buf(),
            config_dir: Some(dir.to_path_buf()),
            spice_command: Some(FAKE_SIM.into()),
            policy: RunPolicy::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn test_full_pin_analysis_with_fake_simulator() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = test_document(dir.path());
        let plans = plan_document(&doc).unwrap();
        let report = analyze_document(&mut doc, &plans, &options(dir.path())).unwrap();
        assert!(report.all_ok(), "failures: {:?}", report.failures);

        let model = doc.find_model("driver").unwrap();
        let pullup = model.pullup.as_ref().expect("pullup table");
        assert!(pullup.is_monotonic());
        assert!(pullup.points.iter().all(|p| p.i.is_complete()));
        assert!(model.pulldown.is_some());
        // output-only model, no enable: no clamp tables
        assert!(model.power_clamp.is_none());

        // ramp: fake edge crosses 20% and 80% of the 0..3.3 V swing
        assert!(model.ramp.rise_rate(Corner::Typ).unwrap() > 0.0);
        assert!(model.ramp.has_fall());

        // one rising fixture, binned to the legacy 100 points
        assert_eq!(model.rising_waves.len(), 1);
        let wave = &model.rising_waves[0];
        assert_eq!(wave.len(), 100);
        assert_eq!(wave.points[0].t, 0.0);
        assert!((wave.points[99].t - 10e-9).abs() < 1e-20);
        assert!(wave.is_monotonic());
    }

    #[test]
    fn test_iterate_second_run_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = test_document(dir.path());
        let plans = plan_document(&doc).unwrap();

        let mut opts = options(dir.path());
        opts.policy.iterate = true;
        let first = analyze_document(&mut doc, &plans, &opts).unwrap();
        assert!(first.items_run > 0);
        assert_eq!(first.items_reused, 0);

        let second = analyze_document(&mut doc, &plans, &opts).unwrap();
        assert_eq!(second.items_run, 0);
        assert_eq!(second.items_reused, first.items_run);
    }

    #[test]
    fn test_simulation_failure_is_captured_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = test_document(dir.path());
        let plans = plan_document(&doc).unwrap();
        let mut opts = options(dir.path());
        // produces no result file at all
        opts.spice_command = Some("true".into());
        let report = analyze_document(&mut doc, &plans, &opts).unwrap();
        assert!(!report.all_ok());
        assert!(doc.find_model("driver").unwrap().pullup.is_none());
    }
}
