//! The `.ibs` emitter.
//!
//! Sections come out in the exact order the IBIS grammar prescribes, numbers
//! in fixed-precision scientific notation, and unavailable corners as `NA`.
//! Output is deterministic: the same document always renders byte for byte
//! identically, which is what makes `--iterate` re-runs comparable.

use crate::error::EmitError;
use lib_types::{
    Component, Corners, Document, EnablePolarity, Model, Pin, Polarity, Ramp, ViTable, WaveTable,
};
use std::fmt::Write as _;
use std::path::Path;

/// Render and write the document to `path`.
pub fn write_ibis(doc: &Document, path: &Path) -> Result<(), EmitError> {
    let text = render_ibis(doc);
    std::fs::write(path, text).map_err(|source| EmitError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(file = %path.display(), "IBIS file written");
    Ok(())
}

/// Render the document as `.ibs` text.
pub fn render_ibis(doc: &Document) -> String {
    let mut out = String::new();
    banner(&mut out, &format!("IBIS model {}", doc.header.file_name));
    keyword(&mut out, "[IBIS Ver]", &doc.header.ibis_ver);
    keyword(&mut out, "[File Name]", &doc.header.file_name);
    keyword(&mut out, "[File Rev]", &doc.header.file_rev);
    keyword(&mut out, "[Date]", &doc.header.date);
    multiline(&mut out, "[Source]", &doc.header.source);
    multiline(&mut out, "[Notes]", &doc.header.notes);
    multiline(&mut out, "[Disclaimer]", &doc.header.disclaimer);
    multiline(&mut out, "[Copyright]", &doc.header.copyright);
    out.push('\n');

    for comp in &doc.components {
        component(&mut out, comp, doc);
    }
    for model in &doc.models {
        if !model.no_model {
            model_section(&mut out, model);
        }
    }
    out.push_str("[End]\n");
    out
}

/// C-style `%1.4e`: four fractional digits, signed two-digit exponent.
fn fmt_e(v: f64) -> String {
    let formatted = format!("{:.4e}", v);
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            format!("{mantissa}e{}{:02}", if exp < 0 { '-' } else { '+' }, exp.abs())
        }
        None => formatted,
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(fmt_e).unwrap_or_else(|| "NA".to_string())
}

fn triple(c: &Corners<f64>) -> String {
    format!(
        "{:>13} {:>13} {:>13}",
        fmt_opt(c.typ),
        fmt_opt(c.min),
        fmt_opt(c.max)
    )
}

fn banner(out: &mut String, title: &str) {
    let bar = format!("|{}\n", "*".repeat(78));
    out.push_str(&bar);
    writeln!(out, "| {title}").expect("string write");
    out.push_str(&bar);
}

fn keyword(out: &mut String, kw: &str, value: &str) {
    if !value.is_empty() {
        writeln!(out, "{kw:<16}{value}").expect("string write");
    }
}

fn multiline(out: &mut String, kw: &str, value: &str) {
    let mut lines = value.lines();
    if let Some(first) = lines.next() {
        writeln!(out, "{kw:<16}{first}").expect("string write");
        for line in lines {
            writeln!(out, "{:<16}{line}", "").expect("string write");
        }
    }
}

fn component(out: &mut String, comp: &Component, doc: &Document) {
    banner(out, &format!("Component {}", comp.name));
    keyword(out, "[Component]", &comp.name);
    keyword(out, "[Manufacturer]", &comp.manufacturer);

    // Package parasitics resolve against the document defaults; the emitted
    // block is always present, NA when nothing is known.
    let mut pkg = comp.overrides.package;
    pkg.inherit(&doc.defaults.package);
    out.push_str("[Package]\n");
    writeln!(out, "| variable     typ           min           max").expect("string write");
    writeln!(out, "R_pkg  {}", triple(&pkg.r)).expect("string write");
    writeln!(out, "L_pkg  {}", triple(&pkg.l)).expect("string write");
    writeln!(out, "C_pkg  {}", triple(&pkg.c)).expect("string write");
    out.push('\n');

    if let Some(pm) = &comp.package_model {
        keyword(out, "[Package Model]", pm);
        out.push('\n');
    }

    if !comp.pins.is_empty() {
        out.push_str("[Pin]  signal_name          model_name           R_pin         L_pin         C_pin\n");
        for pin in &comp.pins {
            pin_row(out, pin, doc);
        }
        out.push('\n');
    }

    if comp.has_pin_mapping {
        out.push_str("[Pin Mapping]  pulldown_ref    pullup_ref      gnd_clamp_ref   power_clamp_ref\n");
        for pin in &comp.pins {
            let any = pin.pulldown_ref.is_some()
                || pin.pullup_ref.is_some()
                || pin.gnd_clamp_ref.is_some()
                || pin.power_clamp_ref.is_some();
            if any {
                let label = |l: &Option<String>| l.clone().unwrap_or_else(|| "NC".to_string());
                writeln!(
                    out,
                    "{:<6} {:<15} {:<15} {:<15} {:<15}",
                    pin.name,
                    label(&pin.pulldown_ref),
                    label(&pin.pullup_ref),
                    label(&pin.gnd_clamp_ref),
                    label(&pin.power_clamp_ref),
                )
                .expect("string write");
            }
        }
        out.push('\n');
    }

    if !comp.diff_pins.is_empty() {
        out.push_str("[Diff Pin]  inv_pin  vdiff     tdelay_typ  tdelay_min  tdelay_max\n");
        for dp in &comp.diff_pins {
            writeln!(
                out,
                "{:<11} {:<8} {:>9} {:>11} {:>11} {:>11}",
                dp.pin,
                dp.inv_pin,
                fmt_opt(dp.vdiff.typ),
                fmt_opt(dp.tdelay.typ),
                fmt_opt(dp.tdelay.min),
                fmt_opt(dp.tdelay.max),
            )
            .expect("string write");
        }
        out.push('\n');
    }

    if !comp.series_pin_mappings.is_empty() {
        out.push_str("[Series Pin Mapping]  pin_2    model_name\n");
        for sp in &comp.series_pin_mappings {
            let group = sp.function_group.as_deref().unwrap_or("");
            writeln!(out, "{:<21} {:<8} {:<20} {group}", sp.pin1, sp.pin2, sp.model_name)
                .expect("string write");
        }
        out.push('\n');
    }

    if !comp.series_switch_groups.is_empty() {
        out.push_str("[Series Switch Groups]\n");
        for g in &comp.series_switch_groups {
            writeln!(out, "{} {} /", g.state, g.pins.join(" ")).expect("string write");
        }
        out.push('\n');
    }

    writeln!(out, "| End of Component {}\n", comp.name).expect("string write");
}

fn pin_row(out: &mut String, pin: &Pin, doc: &Document) {
    // NoModel pins stay listed but commented, keeping the physical pin-out
    // visible without promising behavior.
    let commented = doc
        .find_model(&pin.model_name)
        .map(|m| m.no_model)
        .unwrap_or(false);
    let prefix = if commented { "| " } else { "" };
    let (r, l, c) = match &pin.parasitics {
        Some(p) => (fmt_opt(p.r.typ), fmt_opt(p.l.typ), fmt_opt(p.c.typ)),
        None => (String::new(), String::new(), String::new()),
    };
    writeln!(
        out,
        "{prefix}{:<6} {:<20} {:<20} {:>13} {:>13} {:>13}",
        pin.name, pin.signal, pin.model_name, r, l, c
    )
    .expect("string write");
}

fn model_section(out: &mut String, model: &Model) {
    banner(out, &format!("Model {}", model.name));
    keyword(out, "[Model]", &model.name);
    keyword(out, "Model_type", model.model_type.as_ibis_str());

    if model.polarity == Polarity::Inverting {
        keyword(out, "Polarity", "Inverting");
    } else {
        keyword(out, "Polarity", "Non-Inverting");
    }
    match model.enable {
        EnablePolarity::ActiveHigh => keyword(out, "Enable", "Active-High"),
        EnablePolarity::ActiveLow => keyword(out, "Enable", "Active-Low"),
    }

    scalar_param(out, "Vinl", &model.vinl);
    scalar_param(out, "Vinh", &model.vinh);
    scalar_param(out, "Vmeas", &model.vmeas);
    scalar_param(out, "Vref", &model.vref);
    scalar_param(out, "Cref", &model.cref);
    scalar_param(out, "Rref", &model.rref);

    writeln!(out, "C_comp {}", triple(&model.resolved.c_comp)).expect("string write");
    out.push('\n');

    if !model.resolved.temp_range.is_empty() {
        writeln!(out, "[Temperature Range] {}", triple(&model.resolved.temp_range))
            .expect("string write");
    }
    if !model.resolved.voltage_range.is_empty() {
        writeln!(out, "[Voltage Range]     {}", triple(&model.resolved.voltage_range))
            .expect("string write");
    }
    reference(out, "[Pullup Reference]", &model.overrides.pullup_ref);
    reference(out, "[Pulldown Reference]", &model.overrides.pulldown_ref);
    reference(out, "[POWER Clamp Reference]", &model.overrides.power_clamp_ref);
    reference(out, "[GND Clamp Reference]", &model.overrides.gnd_clamp_ref);
    out.push('\n');

    vi_table(out, "[Pulldown]", model.pulldown.as_ref());
    vi_table(out, "[Pullup]", model.pullup.as_ref());
    vi_table(out, "[GND Clamp]", model.gnd_clamp.as_ref());
    vi_table(out, "[POWER Clamp]", model.power_clamp.as_ref());

    if model.ramp.has_rise() || model.ramp.has_fall() {
        ramp_section(out, &model.ramp);
    }

    for wave in &model.rising_waves {
        waveform(out, "[Rising Waveform]", wave);
    }
    for wave in &model.falling_waves {
        waveform(out, "[Falling Waveform]", wave);
    }

    if let Some(series) = &model.series {
        if !series.r_series_off.is_empty() {
            writeln!(out, "[R Series] {}", triple(&series.r_series_off)).expect("string write");
            out.push('\n');
        }
    }
    for (vds, table) in &model.series_tables {
        out.push_str("[Series MOSFET]\n");
        writeln!(out, "Vds = {}", fmt_e(*vds)).expect("string write");
        table_rows(out, table);
        out.push('\n');
    }

    writeln!(out, "| End of Model {}\n", model.name).expect("string write");
}

fn scalar_param(out: &mut String, name: &str, value: &Corners<f64>) {
    if let Some(typ) = value.typ {
        writeln!(out, "{name} = {}", fmt_e(typ)).expect("string write");
    }
}

fn reference(out: &mut String, kw: &str, value: &Corners<f64>) {
    if !value.is_empty() {
        writeln!(out, "{kw:<23} {}", triple(value)).expect("string write");
    }
}

fn vi_table(out: &mut String, kw: &str, table: Option<&ViTable>) {
    let Some(table) = table else {
        return;
    };
    if table.is_empty() {
        return;
    }
    writeln!(out, "{kw}").expect("string write");
    out.push_str("|  Voltage       I(typ)        I(min)        I(max)\n");
    table_rows(out, table);
    out.push('\n');
}

fn table_rows(out: &mut String, table: &ViTable) {
    for p in &table.points {
        writeln!(
            out,
            "{:>13} {:>13} {:>13} {:>13}",
            fmt_e(p.v),
            fmt_opt(p.i.typ),
            fmt_opt(p.i.min),
            fmt_opt(p.i.max)
        )
        .expect("string write");
    }
}

fn ramp_section(out: &mut String, ramp: &Ramp) {
    out.push_str("[Ramp]\n");
    out.push_str("| variable      typ           min           max\n");
    let rate_row = |corners: [Option<f64>; 3]| {
        format!(
            "{:>13} {:>13} {:>13}",
            fmt_opt(corners[0]),
            fmt_opt(corners[1]),
            fmt_opt(corners[2])
        )
    };
    use lib_types::Corner;
    writeln!(
        out,
        "dV/dt_r {}",
        rate_row([
            ramp.rise_rate(Corner::Typ),
            ramp.rise_rate(Corner::Min),
            ramp.rise_rate(Corner::Max)
        ])
    )
    .expect("string write");
    writeln!(
        out,
        "dV/dt_f {}",
        rate_row([
            ramp.fall_rate(Corner::Typ),
            ramp.fall_rate(Corner::Min),
            ramp.fall_rate(Corner::Max)
        ])
    )
    .expect("string write");
    writeln!(out, "R_load = {}", fmt_e(ramp.r_load)).expect("string write");
    out.push('\n');
}

fn waveform(out: &mut String, kw: &str, wave: &WaveTable) {
    if wave.is_empty() {
        return;
    }
    writeln!(out, "{kw}").expect("string write");
    let f = &wave.fixture;
    writeln!(out, "R_fixture = {}", fmt_e(f.r_fixture)).expect("string write");
    if let Some(v) = f.v_fixture.typ {
        writeln!(out, "V_fixture = {}", fmt_e(v)).expect("string write");
    }
    if let Some(v) = f.v_fixture.min {
        writeln!(out, "V_fixture_min = {}", fmt_e(v)).expect("string write");
    }
    if let Some(v) = f.v_fixture.max {
        writeln!(out, "V_fixture_max = {}", fmt_e(v)).expect("string write");
    }
    let mut opt = |name: &str, v: Option<f64>| {
        if let Some(v) = v {
            writeln!(out, "{name} = {}", fmt_e(v)).expect("string write");
        }
    };
    opt("L_fixture", f.l_fixture);
    opt("C_fixture", f.c_fixture);
    opt("R_dut", f.r_dut);
    opt("L_dut", f.l_dut);
    opt("C_dut", f.c_dut);
    out.push_str("|    Time         V(typ)        V(min)        V(max)\n");
    for p in &wave.points {
        writeln!(
            out,
            "{:>13} {:>13} {:>13} {:>13}",
            fmt_e(p.t),
            fmt_opt(p.v.typ),
            fmt_opt(p.v.min),
            fmt_opt(p.v.max)
        )
        .expect("string write");
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::{Corners, Header, ModelType, WavePoint};

    fn sample_doc() -> Document {
        let mut doc = Document {
            header: Header {
                ibis_ver: "3.2".into(),
                file_name: "buf.ibs".into(),
                file_rev: "1.0".into(),
                date: "July 2026".into(),
                source: "acme silicon".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut model = Model {
            name: "driver".into(),
            model_type: ModelType::Output,
            vinl: Corners::from_typ(0.8),
            vinh: Corners::from_typ(2.0),
            ..Default::default()
        };
        model.resolved.voltage_range = Corners::new(3.3, 3.0, 3.6);
        model.resolved.temp_range = Corners::new(27.0, 100.0, 0.0);
        model.resolved.c_comp = Corners::from_typ(5.0e-12);

        let mut pullup = ViTable::default();
        pullup.push(-3.3, Corners::new(1.0e-2, 0.9e-2, 1.1e-2));
        pullup.push(0.0, Corners::new(0.0, 0.0, 0.0));
        pullup.push(3.3, Corners::new(-1.0e-2, -0.9e-2, -1.1e-2));
        model.pullup = Some(pullup.clone());
        model.pulldown = Some(pullup);

        model.ramp.dv_rise = Corners::from_typ(1.98);
        model.ramp.dt_rise = Corners::from_typ(1.0e-9);
        model.ramp.dv_fall = Corners::from_typ(1.98);
        model.ramp.dt_fall = Corners::from_typ(1.2e-9);
        model.ramp.r_load = 50.0;

        model.rising_waves.push(WaveTable {
            fixture: Default::default(),
            points: vec![
                WavePoint {
                    t: 0.0,
                    v: Corners::from_typ(0.0),
                },
                WavePoint {
                    t: 1.0e-9,
                    v: Corners::from_typ(3.3),
                },
            ],
        });

        doc.models.push(model);
        doc.components.push(Component {
            name: "chip".into(),
            manufacturer: "acme".into(),
            pins: vec![Pin {
                name: "pad".into(),
                signal: "sig".into(),
                model_name: "driver".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        doc
    }

    #[test]
    fn test_fmt_e_is_c_style() {
        assert_eq!(fmt_e(3.3), "3.3000e+00");
        assert_eq!(fmt_e(-1.25e-2), "-1.2500e-02");
        assert_eq!(fmt_e(0.0), "0.0000e+00");
        assert_eq!(fmt_e(2.5e10), "2.5000e+10");
    }

    #[test]
    fn test_section_order() {
        let text = render_ibis(&sample_doc());
        let pos = |needle: &str| text.find(needle).unwrap_or_else(|| panic!("missing {needle}"));
        assert!(pos("[IBIS Ver]") < pos("[File Name]"));
        assert!(pos("[File Name]") < pos("[Component]"));
        assert!(pos("[Component]") < pos("[Pin]"));
        assert!(pos("[Pin]") < pos("[Model]"));
        assert!(pos("[Model]") < pos("[Pulldown]"));
        assert!(pos("[Pulldown]") < pos("[Pullup]"));
        assert!(pos("[Pullup]") < pos("[Ramp]"));
        assert!(pos("[Ramp]") < pos("[Rising Waveform]"));
        assert!(pos("[Rising Waveform]") < pos("[End]"));
    }

    #[test]
    fn test_na_for_unavailable_corners() {
        let mut doc = sample_doc();
        doc.models[0].pullup.as_mut().unwrap().points[0].i.max = None;
        let text = render_ibis(&doc);
        let pullup_block = text.split("[Pullup]").nth(1).unwrap();
        assert!(pullup_block.lines().take(3).any(|l| l.trim_end().ends_with("NA")));
    }

    #[test]
    fn test_nomodel_model_suppressed_but_pin_commented() {
        let mut doc = sample_doc();
        doc.models.push(Model {
            name: "spare".into(),
            no_model: true,
            ..Default::default()
        });
        doc.components[0].pins.push(Pin {
            name: "x1".into(),
            signal: "spare_sig".into(),
            model_name: "spare".into(),
            ..Default::default()
        });
        let text = render_ibis(&doc);
        assert!(!text.contains("Model spare"));
        assert!(text.lines().any(|l| l.starts_with("| x1")));
    }

    #[test]
    fn test_ramp_rates_are_ratios() {
        let text = render_ibis(&sample_doc());
        // 1.98 V / 1 ns = 1.98e9
        assert!(text.contains("dV/dt_r    1.9800e+09"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let doc = sample_doc();
        assert_eq!(render_ibis(&doc), render_ibis(&doc));
    }

    #[test]
    fn test_emitted_tables_respect_row_cap() {
        let doc = sample_doc();
        let text = render_ibis(&doc);
        let pullup_rows = text
            .split("[Pullup]")
            .nth(1)
            .unwrap()
            .lines()
            .take_while(|l| !l.starts_with('['))
            .filter(|l| l.trim_start().starts_with('-') || l.trim_start().starts_with(char::is_numeric))
            .count();
        assert!(pullup_rows <= lib_types::MAX_TABLE_SIZE);
    }
}
