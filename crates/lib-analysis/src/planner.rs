//! The analysis orchestrator's planning stage.
//!
//! Given a resolved document, decide per pin which characterization curves
//! are required, in which corners, with which stimulus and termination, and
//! under which deterministic file names. Items are grouped per pin; a pin's
//! items complete before the next pin begins.

use crate::error::PlanError;
use lib_types::{
    file_stem, Corner, CurveType, Defaults, Document, Fixture, Model, ModelType, Pin,
    ECL_SWEEP_SPAN, MAX_SERIES_TABLES, MAX_TABLE_SIZE, MAX_WAVEFORM_TABLES, SWEEP_STEP_FLOOR,
    SWEEP_TARGET_POINTS,
};
use std::collections::HashSet;

/// DC sweep window with its adaptive step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sweep {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    pub points: usize,
}

/// Load topology for transient runs.
#[derive(Clone, Debug, PartialEq)]
pub enum Termination {
    /// The swept pad source itself; no extra load (DC curves).
    SweepSource,
    /// Load resistor to the ground rail.
    LoadToGnd(f64),
    /// Load resistor to the power rail (open-drain ramps, falling edges).
    LoadToPower(f64),
    /// Load resistor into the ECL termination supply.
    LoadToEclTermination(f64),
    /// The full user fixture network (waveform runs).
    Fixture,
}

/// Everything the deck synthesizer needs beyond the document itself.
#[derive(Clone, Debug)]
pub struct Recipe {
    /// Drive the enable pin to its asserted level.
    pub enable_output: bool,
    /// Logical state the output is driven toward (true = high / rising).
    pub output_high: bool,
    pub vcc: f64,
    pub gnd: f64,
    pub vcc_clamp: f64,
    pub gnd_clamp: f64,
    pub temperature: Option<f64>,
    pub sweep: Option<Sweep>,
    pub sim_time: Option<f64>,
    pub termination: Termination,
    pub fixture: Option<Fixture>,
    pub vds: Option<f64>,
    /// Waveform bin count (IBIS-version policy); zero for DC curves.
    pub wave_points: usize,
}

/// One scheduled characterization run.
#[derive(Clone, Debug)]
pub struct PlanItem {
    pub model: String,
    pub curve: CurveType,
    pub corner: Corner,
    /// Fixture or Vds index for curves that repeat.
    pub index: Option<usize>,
    /// Deterministic base name for deck and result files.
    pub file_stem: String,
    /// Other curves derived from this same raw simulation.
    pub multi_use: Vec<CurveType>,
    pub recipe: Recipe,
}

/// All items for one pin, executed as a group.
#[derive(Clone, Debug)]
pub struct PinPlan {
    pub component: String,
    pub pin: String,
    pub items: Vec<PlanItem>,
}

/// Adaptive step sizing: never finer than 10 mV, about 80 points, capped at
/// the IBIS table limit.
pub fn sweep_step(range: f64) -> (f64, usize) {
    let span = range.abs();
    if span < 1e-12 {
        return (SWEEP_STEP_FLOOR, 2);
    }
    let step = (span / SWEEP_TARGET_POINTS).max(SWEEP_STEP_FLOOR);
    let points = ((span / step).round() as usize + 2).min(MAX_TABLE_SIZE);
    (step, points)
}

fn sweep_between(start: f64, stop: f64) -> Sweep {
    let (step, points) = sweep_step(stop - start);
    Sweep {
        start,
        stop,
        step: if stop >= start { step } else { -step },
        points,
    }
}

/// Effective rail references with the documented fallbacks: the pullup and
/// power-clamp rails default to the voltage range, the pulldown and
/// ground-clamp rails to 0 V.
struct Rails {
    pullup: f64,
    pulldown: f64,
    power_clamp: f64,
    gnd_clamp: f64,
}

impl Rails {
    fn at(resolved: &Defaults, corner: Corner) -> Option<Rails> {
        if !corner_available(resolved, corner) {
            return None;
        }
        let vrange = resolved.voltage_range.get_or_typ(corner)?;
        Some(Rails {
            pullup: resolved.pullup_ref.get_or_typ(corner).unwrap_or(vrange),
            pulldown: resolved.pulldown_ref.get_or_typ(corner).unwrap_or(0.0),
            power_clamp: resolved.power_clamp_ref.get_or_typ(corner).unwrap_or(vrange),
            gnd_clamp: resolved.gnd_clamp_ref.get_or_typ(corner).unwrap_or(0.0),
        })
    }
}

/// A non-typical corner runs only when its defaults say something about it;
/// an entirely unset corner is skipped and its table column stays NA.
fn corner_available(resolved: &Defaults, corner: Corner) -> bool {
    if corner == Corner::Typ {
        return true;
    }
    resolved.voltage_range.get(corner).is_some()
        || resolved.temp_range.get(corner).is_some()
        || resolved.pullup_ref.get(corner).is_some()
        || resolved.pulldown_ref.get(corner).is_some()
}

/// Sweep window for one DC curve (spec ranges; ECL types use their own
/// window around the rail references).
fn sweep_window(curve: CurveType, model: &Model, rails: &Rails) -> Sweep {
    let vcc = rails.pullup;
    let vgnd = rails.pulldown;
    if model.model_type.is_ecl() {
        return match curve {
            CurveType::PowerClamp => sweep_between(rails.power_clamp, rails.power_clamp + ECL_SWEEP_SPAN),
            CurveType::GndClamp => {
                sweep_between(rails.gnd_clamp - ECL_SWEEP_SPAN, rails.power_clamp)
            }
            _ => sweep_between(vcc - ECL_SWEEP_SPAN, vcc + ECL_SWEEP_SPAN),
        };
    }
    match curve {
        CurveType::PowerClamp => sweep_between(rails.power_clamp, 2.0 * rails.power_clamp),
        CurveType::GndClamp => {
            sweep_between(rails.gnd_clamp - vcc, rails.gnd_clamp + vcc)
        }
        CurveType::SeriesVi => sweep_between(vgnd, vcc),
        _ => sweep_between(vgnd - vcc, 2.0 * vcc),
    }
}

/// Build the plan for a whole document. Reserved-name pins never produce
/// items; a model is characterized once, at the first pin that uses it.
pub fn plan_document(doc: &Document) -> Result<Vec<PinPlan>, PlanError> {
    let mut plans = Vec::new();
    let mut planned_models: HashSet<String> = HashSet::new();

    for comp in &doc.components {
        for pin in &comp.pins {
            if !pin.needs_analysis() {
                continue;
            }
            let Some(model) = doc.find_model(&pin.model_name) else {
                continue;
            };
            if model.no_model {
                tracing::info!(pin = %pin.name, model = %model.name, "skipping NoModel pin");
                continue;
            }
            if !planned_models.insert(model.name.to_ascii_lowercase()) {
                continue;
            }
            let items = plan_pin(pin, model, doc.header.wave_points())?;
            if !items.is_empty() {
                plans.push(PinPlan {
                    component: comp.name.clone(),
                    pin: pin.name.clone(),
                    items,
                });
            }
        }
    }
    Ok(plans)
}

fn plan_pin(pin: &Pin, model: &Model, wave_points: usize) -> Result<Vec<PlanItem>, PlanError> {
    let mt = model.model_type;
    let resolved = &model.resolved;
    if resolved.voltage_range.typ.is_none() {
        return Err(PlanError::MissingVoltageRange {
            model: model.name.clone(),
        });
    }
    if requires_enable(mt) && pin.enable_pin.is_none() {
        return Err(PlanError::MissingEnablePin {
            model: model.name.clone(),
            kind: mt.as_ibis_str(),
            pin: pin.name.clone(),
        });
    }
    if mt.needs_series_vi() && pin.series_pin.is_none() {
        return Err(PlanError::MissingSeriesPin {
            pin: pin.name.clone(),
        });
    }
    let has_enable = pin.enable_pin.is_some();
    let mut items = Vec::new();
    let mut push_dc = |curve: CurveType,
                       enable_output: bool,
                       output_high: bool,
                       multi_use: Vec<CurveType>,
                       index: Option<usize>,
                       vds: Option<f64>| {
        for corner in Corner::ALL {
            let Some(rails) = Rails::at(resolved, corner) else {
                tracing::debug!(model = %model.name, %corner, "corner unset, marking NA");
                continue;
            };
            let sweep = sweep_window(curve, model, &rails);
            items.push(PlanItem {
                model: model.name.clone(),
                curve,
                corner,
                index,
                file_stem: file_stem(curve, &pin.name, corner, index),
                multi_use: multi_use.clone(),
                recipe: Recipe {
                    enable_output,
                    output_high,
                    vcc: rails.pullup,
                    gnd: rails.pulldown,
                    vcc_clamp: rails.power_clamp,
                    gnd_clamp: rails.gnd_clamp,
                    temperature: resolved.temp_range.get_or_typ(corner),
                    sweep: Some(sweep),
                    sim_time: None,
                    termination: Termination::SweepSource,
                    fixture: None,
                    vds,
                    wave_points: 0,
                },
            });
        }
    };

    // Series elements only get the per-Vds V/I characterization.
    if mt.needs_series_vi() {
        let vds_list: Vec<f64> = model
            .series
            .as_ref()
            .map(|s| s.vds_list.clone())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| vec![0.0]);
        for (idx, vds) in vds_list.into_iter().take(MAX_SERIES_TABLES).enumerate() {
            push_dc(CurveType::SeriesVi, true, true, Vec::new(), Some(idx), Some(vds));
        }
        return Ok(items);
    }

    // Driver sweeps; the disabled twin both feeds the subtraction and, when
    // the type wants clamp tables, doubles as the clamp sweep (one raw
    // simulation, two uses).
    if mt.needs_pullup() {
        push_dc(CurveType::Pullup, true, true, Vec::new(), None, None);
        if has_enable {
            let multi = if mt.needs_power_clamp() {
                vec![CurveType::PowerClamp]
            } else {
                Vec::new()
            };
            push_dc(CurveType::DisabledPullup, false, true, multi, None, None);
        }
    }
    if mt.needs_pulldown() {
        push_dc(CurveType::Pulldown, true, false, Vec::new(), None, None);
        if has_enable {
            let multi = if mt.needs_gnd_clamp() {
                vec![CurveType::GndClamp]
            } else {
                Vec::new()
            };
            push_dc(CurveType::DisabledPulldown, false, false, multi, None, None);
        }
    }

    // Standalone clamp sweeps for types whose clamps are not already covered
    // by a disabled driver sweep.
    if mt.needs_power_clamp() && !(mt.needs_pullup() && has_enable) {
        push_dc(CurveType::PowerClamp, false, true, Vec::new(), None, None);
    }
    if mt.needs_gnd_clamp() && !(mt.needs_pulldown() && has_enable) {
        push_dc(CurveType::GndClamp, false, false, Vec::new(), None, None);
    }

    // Transients: ramps and waveforms.
    if mt.needs_transient() {
        let r_load = resolved.r_load.unwrap_or(lib_types::RLOAD_DEFAULT);
        let sim_time = resolved.sim_time.unwrap_or(lib_types::SIM_TIME_DEFAULT);
        let mut push_tran = |curve: CurveType, index: Option<usize>, fixture: Option<&Fixture>| {
            let rising = matches!(curve, CurveType::RisingRamp | CurveType::RisingWave);
            for corner in Corner::ALL {
                let Some(rails) = Rails::at(resolved, corner) else {
                    continue;
                };
                let termination = match fixture {
                    Some(_) => Termination::Fixture,
                    None => ramp_termination(mt, rising, r_load),
                };
                items.push(PlanItem {
                    model: model.name.clone(),
                    curve,
                    corner,
                    index,
                    file_stem: file_stem(curve, &pin.name, corner, index),
                    multi_use: Vec::new(),
                    recipe: Recipe {
                        enable_output: true,
                        output_high: rising,
                        vcc: rails.pullup,
                        gnd: rails.pulldown,
                        vcc_clamp: rails.power_clamp,
                        gnd_clamp: rails.gnd_clamp,
                        temperature: resolved.temp_range.get_or_typ(corner),
                        sweep: None,
                        sim_time: Some(sim_time),
                        termination,
                        fixture: fixture.cloned(),
                        vds: None,
                        wave_points,
                    },
                });
            }
        };

        push_tran(CurveType::RisingRamp, None, None);
        push_tran(CurveType::FallingRamp, None, None);
        for (idx, fixture) in model.rising_fixtures.iter().take(MAX_WAVEFORM_TABLES).enumerate() {
            push_tran(CurveType::RisingWave, Some(idx), Some(fixture));
        }
        for (idx, fixture) in model.falling_fixtures.iter().take(MAX_WAVEFORM_TABLES).enumerate() {
            push_tran(CurveType::FallingWave, Some(idx), Some(fixture));
        }
    }

    Ok(items)
}

/// Edge direction picks the ramp load: open-drain pulls up, open-source
/// pulls down, everything else terminates rising edges to ground and
/// falling edges to power so the driver does the work.
fn ramp_termination(mt: ModelType, rising: bool, r_load: f64) -> Termination {
    if mt.is_open_drain_family() {
        Termination::LoadToPower(r_load)
    } else if mt.is_open_source_family() {
        Termination::LoadToGnd(r_load)
    } else if mt.is_ecl() {
        Termination::LoadToEclTermination(r_load)
    } else if rising {
        Termination::LoadToGnd(r_load)
    } else {
        Termination::LoadToPower(r_load)
    }
}

/// I/O and 3-state types cannot be characterized without output-enable
/// control.
fn requires_enable(mt: ModelType) -> bool {
    matches!(
        mt,
        ModelType::ThreeState
            | ModelType::Io
            | ModelType::IoEcl
            | ModelType::IoOpenDrain
            | ModelType::IoOpenSink
            | ModelType::IoOpenSource
    )
}
