//! Re-emission of a document in either configuration form.
//!
//! Both writers produce text the corresponding parser accepts, and the two
//! forms round-trip: flat -> structured -> flat preserves the in-memory
//! document field for field.

use crate::error::ConfigError;
use crate::structured::Config;
use lib_types::{Corners, Defaults, Document, EnablePolarity, Fixture, Model, Pin, Polarity};
use std::fmt::Write;

/// Serialize the document as the structured TOML form.
pub fn to_structured_toml(doc: &Document) -> Result<String, ConfigError> {
    toml::to_string(&Config::from_document(doc)).map_err(|e| ConfigError::InvalidFormat {
        format: "TOML",
        message: e.to_string(),
    })
}

/// Serialize the document as the structured JSON form.
pub fn to_structured_json(doc: &Document) -> Result<String, ConfigError> {
    serde_json::to_string_pretty(&Config::from_document(doc)).map_err(|e| {
        ConfigError::InvalidFormat {
            format: "JSON",
            message: e.to_string(),
        }
    })
}

/// Serialize the document in the flat keyword form.
pub fn to_flat(doc: &Document) -> String {
    let mut out = String::new();
    let header = &doc.header;
    kw(&mut out, "IBIS Ver", &header.ibis_ver);
    kw(&mut out, "File Name", &header.file_name);
    kw(&mut out, "File Rev", &header.file_rev);
    kw(&mut out, "Date", &header.date);
    kw_text(&mut out, "Source", &header.source);
    kw_text(&mut out, "Notes", &header.notes);
    kw_text(&mut out, "Disclaimer", &header.disclaimer);
    kw_text(&mut out, "Copyright", &header.copyright);
    kw(&mut out, "Spice Type", doc.spice_type.name());
    write_defaults(&mut out, &doc.defaults);
    out.push('\n');

    for model in &doc.models {
        write_model(&mut out, model);
    }
    for comp in &doc.components {
        write_component(&mut out, comp);
    }
    out.push_str("[End]\n");
    out
}

fn kw(out: &mut String, keyword: &str, value: &str) {
    if !value.is_empty() {
        writeln!(out, "[{keyword}] {value}").expect("string write");
    }
}

fn kw_text(out: &mut String, keyword: &str, value: &str) {
    let mut lines = value.lines();
    if let Some(first) = lines.next() {
        writeln!(out, "[{keyword}] {first}").expect("string write");
        for line in lines {
            writeln!(out, "{line}").expect("string write");
        }
    }
}

fn num(v: f64) -> String {
    format!("{v}")
}

fn corners_str(c: &Corners<f64>) -> Option<String> {
    if c.is_empty() {
        return None;
    }
    if let (Some(typ), None, None) = (c.typ, c.min, c.max) {
        return Some(num(typ));
    }
    let part = |v: Option<f64>| v.map(num).unwrap_or_else(|| "NA".to_string());
    Some(format!("{} {} {}", part(c.typ), part(c.min), part(c.max)))
}

fn write_defaults(out: &mut String, d: &Defaults) {
    let mut corner = |keyword: &str, c: &Corners<f64>| {
        if let Some(s) = corners_str(c) {
            kw(out, keyword, &s);
        }
    };
    corner("Temperature Range", &d.temp_range);
    corner("Voltage Range", &d.voltage_range);
    corner("Pullup Reference", &d.pullup_ref);
    corner("Pulldown Reference", &d.pulldown_ref);
    corner("POWER Clamp Reference", &d.power_clamp_ref);
    corner("GND Clamp Reference", &d.gnd_clamp_ref);
    corner("Vil", &d.vil);
    corner("Vih", &d.vih);
    corner("Tr", &d.tr);
    corner("Tf", &d.tf);
    corner("C_comp", &d.c_comp);
    corner("R_pkg", &d.package.r);
    corner("L_pkg", &d.package.l);
    corner("C_pkg", &d.package.c);
    let mut scalar = |keyword: &str, v: Option<f64>| {
        if let Some(v) = v {
            kw(out, keyword, &num(v));
        }
    };
    scalar("Rload", d.r_load);
    scalar("Sim Time", d.sim_time);
    scalar("Clamp Tolerance", d.clamp_tol);
    scalar("Derate VI Pct", d.derate_vi_pct);
    scalar("Derate Ramp Pct", d.derate_ramp_pct);
}

fn write_model(out: &mut String, m: &Model) {
    kw(out, "Model", &m.name);
    kw(out, "Model Type", m.model_type.as_ibis_str());
    if m.no_model {
        out.push_str("[NoModel]\n");
    }
    if m.polarity == Polarity::Inverting {
        kw(out, "Polarity", "Inverting");
    }
    if m.enable == EnablePolarity::ActiveLow {
        kw(out, "Enable", "Active-Low");
    }
    let mut corner = |keyword: &str, c: &Corners<f64>| {
        if let Some(s) = corners_str(c) {
            kw(out, keyword, &s);
        }
    };
    corner("Vinl", &m.vinl);
    corner("Vinh", &m.vinh);
    corner("Vmeas", &m.vmeas);
    corner("Vref", &m.vref);
    corner("Cref", &m.cref);
    corner("Rref", &m.rref);
    if let Some(p) = &m.model_file {
        kw(out, "Model File", &p.display().to_string());
    }
    if let Some(p) = &m.model_file_min {
        kw(out, "Model File Min", &p.display().to_string());
    }
    if let Some(p) = &m.model_file_max {
        kw(out, "Model File Max", &p.display().to_string());
    }
    if let Some(p) = &m.ext_cmd_file {
        kw(out, "Ext Spice Cmd File", &p.display().to_string());
    }
    for fixture in &m.rising_fixtures {
        kw(out, "Rising Waveform", &fixture_str(fixture));
    }
    for fixture in &m.falling_fixtures {
        kw(out, "Falling Waveform", &fixture_str(fixture));
    }
    if let Some(series) = &m.series {
        if !series.vds_list.is_empty() {
            let list: Vec<String> = series.vds_list.iter().map(|v| num(*v)).collect();
            kw(out, "Series Vds List", &list.join(" "));
        }
        if let Some(s) = corners_str(&series.r_series_off) {
            kw(out, "R Series Off", &s);
        }
    }
    write_defaults(out, &m.overrides);
    out.push('\n');
}

fn fixture_str(f: &Fixture) -> String {
    let mut parts = vec![format!("R_fixture={}", num(f.r_fixture))];
    if let Some(v) = f.v_fixture.typ {
        parts.push(format!("V_fixture={}", num(v)));
    }
    if let Some(v) = f.v_fixture.min {
        parts.push(format!("V_fixture_min={}", num(v)));
    }
    if let Some(v) = f.v_fixture.max {
        parts.push(format!("V_fixture_max={}", num(v)));
    }
    let mut opt = |name: &str, v: Option<f64>| {
        if let Some(v) = v {
            parts.push(format!("{name}={}", num(v)));
        }
    };
    opt("L_fixture", f.l_fixture);
    opt("C_fixture", f.c_fixture);
    opt("R_dut", f.r_dut);
    opt("L_dut", f.l_dut);
    opt("C_dut", f.c_dut);
    parts.join(" ")
}

fn write_component(out: &mut String, c: &lib_types::Component) {
    kw(out, "Component", &c.name);
    kw(out, "Manufacturer", &c.manufacturer);
    if let Some(p) = &c.spice_file {
        kw(out, "Spice File", &p.display().to_string());
    }
    if let Some(p) = &c.series_spice_file {
        kw(out, "Series Spice File", &p.display().to_string());
    }
    if let Some(p) = &c.package_model {
        kw(out, "Package Model", p);
    }
    write_defaults(out, &c.overrides);

    if !c.pins.is_empty() {
        out.push_str("[Pin]\n");
        for pin in &c.pins {
            writeln!(out, "{}", pin_row(pin, c.has_pin_mapping)).expect("string write");
        }
    }
    if c.has_pin_mapping {
        out.push_str("[Pin Mapping]\n");
        for pin in &c.pins {
            let any = pin.pullup_ref.is_some()
                || pin.pulldown_ref.is_some()
                || pin.gnd_clamp_ref.is_some()
                || pin.power_clamp_ref.is_some();
            if any {
                let label = |l: &Option<String>| l.clone().unwrap_or_else(|| "NC".to_string());
                writeln!(
                    out,
                    "{} {} {} {} {}",
                    pin.name,
                    label(&pin.pulldown_ref),
                    label(&pin.pullup_ref),
                    label(&pin.gnd_clamp_ref),
                    label(&pin.power_clamp_ref),
                )
                .expect("string write");
            }
        }
    }
    if !c.diff_pins.is_empty() {
        out.push_str("[Diff Pin]\n");
        for d in &c.diff_pins {
            let val = |v: Option<f64>| v.map(num).unwrap_or_else(|| "NA".to_string());
            writeln!(
                out,
                "{} {} {} {} {} {}",
                d.pin,
                d.inv_pin,
                val(d.vdiff.typ),
                val(d.tdelay.typ),
                val(d.tdelay.min),
                val(d.tdelay.max),
            )
            .expect("string write");
        }
    }
    if !c.series_pin_mappings.is_empty() {
        out.push_str("[Series Pin Mapping]\n");
        for s in &c.series_pin_mappings {
            match &s.function_group {
                Some(g) => writeln!(out, "{} {} {} {}", s.pin1, s.pin2, s.model_name, g),
                None => writeln!(out, "{} {} {}", s.pin1, s.pin2, s.model_name),
            }
            .expect("string write");
        }
    }
    if !c.series_switch_groups.is_empty() {
        out.push_str("[Series Switch Groups]\n");
        for g in &c.series_switch_groups {
            writeln!(out, "{} {} /", g.state, g.pins.join(" ")).expect("string write");
        }
    }
    out.push('\n');
}

fn pin_row(pin: &Pin, mapping_emitted_separately: bool) -> String {
    let mut row = format!("{} {} {}", pin.name, pin.signal, pin.model_name);
    let mut opt = |key: &str, v: &Option<String>| {
        if let Some(v) = v {
            row.push_str(&format!(" {key}={v}"));
        }
    };
    opt("node", &pin.spice_node);
    opt("enable_pin", &pin.enable_pin);
    opt("input_pin", &pin.input_pin);
    opt("series_pin", &pin.series_pin);
    if !mapping_emitted_separately {
        opt("pullup_ref", &pin.pullup_ref);
        opt("pulldown_ref", &pin.pulldown_ref);
        opt("power_clamp_ref", &pin.power_clamp_ref);
        opt("gnd_clamp_ref", &pin.gnd_clamp_ref);
    }
    if let Some(p) = &pin.parasitics {
        let mut scalar = |key: &str, v: Option<f64>| {
            if let Some(v) = v {
                row.push_str(&format!(" {key}={}", num(v)));
            }
        };
        scalar("r_pin", p.r.typ);
        scalar("l_pin", p.l.typ);
        scalar("c_pin", p.c.typ);
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat::parse_flat;
    use crate::resolve::resolve_document;
    use crate::structured;

    const SAMPLE: &str = r#"
[IBIS Ver] 3.2
[File Name] buf.ibs
[File Rev] 1.0
[Voltage Range] 3.3 3.0 3.6
[Temperature Range] 27 100 0

[Model] driver
[Model Type] 3-state
[Vinl] 0.8
[Vinh] 2.0
[Rising Waveform] R_fixture=50 V_fixture=0

[Component] chip
[Manufacturer] acme
[Spice File] tri.sp
[Pin]
pad sig driver node=net7 input_pin=in enable_pin=oe
in  din DUMMY
oe  oe  DUMMY
vdd vdd POWER
vss vss GND
"#;

    /// Flat -> structured -> flat must preserve the document exactly.
    #[test]
    fn test_cross_form_round_trip() {
        let mut doc = parse_flat(SAMPLE, None).unwrap();
        resolve_document(&mut doc).unwrap();

        let toml_text = to_structured_toml(&doc).unwrap();
        let mut doc2 = structured::parse_toml(&toml_text).unwrap();
        resolve_document(&mut doc2).unwrap();
        assert_eq!(doc, doc2);

        let flat_text = to_flat(&doc2);
        let mut doc3 = parse_flat(&flat_text, None).unwrap();
        resolve_document(&mut doc3).unwrap();
        assert_eq!(doc, doc3);
    }

    #[test]
    fn test_flat_writer_emits_na_corners() {
        let mut doc = parse_flat("[Voltage Range] 3.3 NA 3.6\n", None).unwrap();
        resolve_document(&mut doc).unwrap();
        let text = to_flat(&doc);
        assert!(text.contains("[Voltage Range] 3.3 NA 3.6"));
    }
}
