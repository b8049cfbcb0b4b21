//! The legacy flat keyword configuration form.
//!
//! Grammar, shared with the structured form semantically:
//! - `[Keyword]` headers, matched case-insensitively, with the value on the
//!   same line and/or on following lines;
//! - continuation lines start with `+`;
//! - inline comments start with `!`;
//! - `[Include] file` splices another file at parse time;
//! - `NA` marks an unset corner, `NC` a no-connect reference;
//! - a multi-line block closes at the next bracketed keyword.

use crate::error::{ConfigError, ResourceError};
use lib_types::si::parse_spice_number;
use lib_types::{
    Component, Corners, Defaults, DiffPin, Document, EnablePolarity, Fixture, Model, ModelType,
    Parasitics, Pin, Polarity, ReservedKind, SeriesPinMapping, SeriesSwitchGroup, SpiceType,
};
use std::path::Path;

const MAX_INCLUDE_DEPTH: usize = 8;

/// One keyword with its joined value and any data rows that followed it.
#[derive(Debug)]
struct Entry {
    line: usize,
    keyword: String,
    value: String,
    rows: Vec<String>,
}

/// Parse the flat keyword form into a document. `base_dir` anchors relative
/// include paths.
pub fn parse_flat(content: &str, base_dir: Option<&Path>) -> Result<Document, ConfigError> {
    let lines = splice_includes(content, base_dir, 0)?;
    let entries = collect_entries(&lines)?;
    interpret(entries)
}

fn splice_includes(
    content: &str,
    base_dir: Option<&Path>,
    depth: usize,
) -> Result<Vec<(usize, String)>, ConfigError> {
    let mut out = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let stripped = strip_comment(raw);
        let lowered = stripped.trim().to_ascii_lowercase();
        if lowered.starts_with("[include]") {
            if depth >= MAX_INCLUDE_DEPTH {
                return Err(ConfigError::syntax(line_no, "include nesting too deep"));
            }
            let name = stripped.trim()["[include]".len()..].trim();
            let path = match base_dir {
                Some(dir) => dir.join(name),
                None => Path::new(name).to_path_buf(),
            };
            let included = std::fs::read_to_string(&path)
                .map_err(|_| ResourceError::MissingInclude(path.clone()))?;
            out.extend(splice_includes(&included, path.parent(), depth + 1)?);
        } else {
            out.push((line_no, stripped.to_string()));
        }
    }
    Ok(out)
}

fn strip_comment(line: &str) -> &str {
    match line.find('!') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn collect_entries(lines: &[(usize, String)]) -> Result<Vec<Entry>, ConfigError> {
    let mut entries: Vec<Entry> = Vec::new();
    for (line_no, line) in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('[') {
            let close = rest
                .find(']')
                .ok_or_else(|| ConfigError::syntax(*line_no, "unterminated '[' keyword"))?;
            let keyword = normalize_keyword(&rest[..close]);
            let value = rest[close + 1..].trim().to_string();
            entries.push(Entry {
                line: *line_no,
                keyword,
                value,
                rows: Vec::new(),
            });
        } else if let Some(cont) = trimmed.strip_prefix('+') {
            match entries.last_mut() {
                Some(entry) => {
                    if !entry.value.is_empty() {
                        entry.value.push(' ');
                    }
                    entry.value.push_str(cont.trim());
                }
                None => return Err(ConfigError::syntax(*line_no, "continuation before any keyword")),
            }
        } else {
            match entries.last_mut() {
                Some(entry) => entry.rows.push(trimmed.to_string()),
                None => return Err(ConfigError::syntax(*line_no, "data before any keyword")),
            }
        }
    }
    Ok(entries)
}

fn normalize_keyword(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .split(|c: char| c == ' ' || c == '_' || c == '\t')
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scope {
    Top,
    Component,
    Model,
}

fn interpret(entries: Vec<Entry>) -> Result<Document, ConfigError> {
    let mut doc = Document::default();
    doc.header.ibis_ver = "3.2".to_string();
    doc.header.file_rev = "1.0".to_string();
    let mut scope = Scope::Top;

    for entry in entries {
        let kw = entry.keyword.as_str();
        match kw {
            "component" => {
                doc.components.push(Component {
                    name: entry.value.clone(),
                    ..Default::default()
                });
                scope = Scope::Component;
                continue;
            }
            "model" => {
                doc.models.push(Model {
                    name: entry.value.clone(),
                    ..Default::default()
                });
                scope = Scope::Model;
                continue;
            }
            "end" => break,
            _ => {}
        }

        match scope {
            Scope::Top => interpret_top(&mut doc, &entry)?,
            Scope::Component => {
                let comp = doc.components.last_mut().expect("component scope");
                interpret_component(comp, &entry)?;
            }
            Scope::Model => {
                let model = doc.models.last_mut().expect("model scope");
                interpret_model(model, &entry)?;
            }
        }
    }
    Ok(doc)
}

fn interpret_top(doc: &mut Document, entry: &Entry) -> Result<(), ConfigError> {
    let text = || join_text(entry);
    match entry.keyword.as_str() {
        "ibis ver" => doc.header.ibis_ver = entry.value.clone(),
        "file name" => doc.header.file_name = entry.value.clone(),
        "file rev" => doc.header.file_rev = entry.value.clone(),
        "date" => doc.header.date = entry.value.clone(),
        "source" => doc.header.source = text(),
        "notes" => doc.header.notes = text(),
        "disclaimer" => doc.header.disclaimer = text(),
        "copyright" => doc.header.copyright = text(),
        "spice type" => {
            doc.spice_type = SpiceType::parse(&entry.value)
                .ok_or_else(|| ConfigError::syntax(entry.line, format!("unknown spice type '{}'", entry.value)))?
        }
        _ => {
            if !apply_defaults_keyword(&mut doc.defaults, entry)? {
                tracing::warn!(line = entry.line, keyword = %entry.keyword, "ignoring unknown keyword");
            }
        }
    }
    Ok(())
}

fn interpret_component(comp: &mut Component, entry: &Entry) -> Result<(), ConfigError> {
    match entry.keyword.as_str() {
        "manufacturer" => comp.manufacturer = entry.value.clone(),
        "spice file" => comp.spice_file = Some(entry.value.clone().into()),
        "series spice file" => comp.series_spice_file = Some(entry.value.clone().into()),
        "package model" => comp.package_model = Some(entry.value.clone()),
        "pin" => {
            for row in &entry.rows {
                comp.pins.push(parse_pin_row(row, entry.line)?);
            }
        }
        "pin mapping" => {
            comp.has_pin_mapping = true;
            for row in &entry.rows {
                apply_pin_mapping_row(comp, row, entry.line)?;
            }
        }
        "diff pin" => {
            for row in &entry.rows {
                comp.diff_pins.push(parse_diff_pin_row(row, entry.line)?);
            }
        }
        "series pin mapping" => {
            for row in &entry.rows {
                let tok: Vec<&str> = row.split_whitespace().collect();
                if tok.len() < 3 {
                    return Err(ConfigError::syntax(entry.line, "series pin mapping needs pin1 pin2 model"));
                }
                comp.series_pin_mappings.push(SeriesPinMapping {
                    pin1: tok[0].to_string(),
                    pin2: tok[1].to_string(),
                    model_name: tok[2].to_string(),
                    function_group: tok.get(3).map(|s| s.to_string()),
                });
            }
        }
        "series switch groups" => {
            for row in &entry.rows {
                let mut tok = row.split_whitespace();
                let state = tok.next().unwrap_or("On").to_string();
                let pins = tok.filter(|t| *t != "/").map(str::to_string).collect();
                comp.series_switch_groups.push(SeriesSwitchGroup { state, pins });
            }
        }
        _ => {
            if !apply_defaults_keyword(&mut comp.overrides, entry)? {
                tracing::warn!(line = entry.line, keyword = %entry.keyword, "ignoring unknown component keyword");
            }
        }
    }
    Ok(())
}

fn interpret_model(model: &mut Model, entry: &Entry) -> Result<(), ConfigError> {
    match entry.keyword.as_str() {
        "model type" => {
            model.model_type = ModelType::parse(&entry.value)
                .ok_or_else(|| ConfigError::UnknownModelType(entry.value.clone()))?
        }
        "nomodel" => model.no_model = true,
        "polarity" => {
            model.polarity = if entry.value.to_ascii_lowercase().starts_with("invert") {
                Polarity::Inverting
            } else {
                Polarity::NonInverting
            }
        }
        "enable" => {
            model.enable = if entry.value.to_ascii_lowercase().replace('-', "_") == "active_low" {
                EnablePolarity::ActiveLow
            } else {
                EnablePolarity::ActiveHigh
            }
        }
        "vinl" => model.vinl = parse_corners_value(&entry.value, entry.line)?,
        "vinh" => model.vinh = parse_corners_value(&entry.value, entry.line)?,
        "vmeas" => model.vmeas = parse_corners_value(&entry.value, entry.line)?,
        "vref" => model.vref = parse_corners_value(&entry.value, entry.line)?,
        "cref" => model.cref = parse_corners_value(&entry.value, entry.line)?,
        "rref" => model.rref = parse_corners_value(&entry.value, entry.line)?,
        "model file" => model.model_file = Some(entry.value.clone().into()),
        "model file min" => model.model_file_min = Some(entry.value.clone().into()),
        "model file max" => model.model_file_max = Some(entry.value.clone().into()),
        "ext spice cmd file" => model.ext_cmd_file = Some(entry.value.clone().into()),
        "rising waveform" => model.rising_fixtures.push(parse_fixture(&entry.value, entry.line)?),
        "falling waveform" => model.falling_fixtures.push(parse_fixture(&entry.value, entry.line)?),
        "series vds list" => {
            let vds_list = entry
                .value
                .split_whitespace()
                .map(|t| {
                    parse_spice_number(t).ok_or_else(|| ConfigError::InvalidNumber {
                        field: "series vds list".into(),
                        value: t.into(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            model.series.get_or_insert_with(Default::default).vds_list = vds_list;
        }
        "r series off" => {
            let off = parse_corners_value(&entry.value, entry.line)?;
            model.series.get_or_insert_with(Default::default).r_series_off = off;
        }
        _ => {
            if !apply_defaults_keyword(&mut model.overrides, entry)? {
                tracing::warn!(line = entry.line, keyword = %entry.keyword, "ignoring unknown model keyword");
            }
        }
    }
    Ok(())
}

/// Defaults keywords legal at every scope. Returns false for keywords this
/// layer does not know.
fn apply_defaults_keyword(defaults: &mut Defaults, entry: &Entry) -> Result<bool, ConfigError> {
    let corners = |d: &mut Corners<f64>| -> Result<(), ConfigError> {
        *d = parse_corners_value(&entry.value, entry.line)?;
        Ok(())
    };
    match entry.keyword.as_str() {
        "temperature range" => corners(&mut defaults.temp_range)?,
        "voltage range" => corners(&mut defaults.voltage_range)?,
        "pullup reference" => corners(&mut defaults.pullup_ref)?,
        "pulldown reference" => corners(&mut defaults.pulldown_ref)?,
        "power clamp reference" => corners(&mut defaults.power_clamp_ref)?,
        "gnd clamp reference" => corners(&mut defaults.gnd_clamp_ref)?,
        "vil" => corners(&mut defaults.vil)?,
        "vih" => corners(&mut defaults.vih)?,
        "tr" | "rise time" => corners(&mut defaults.tr)?,
        "tf" | "fall time" => corners(&mut defaults.tf)?,
        "c comp" => corners(&mut defaults.c_comp)?,
        "r pkg" => corners(&mut defaults.package.r)?,
        "l pkg" => corners(&mut defaults.package.l)?,
        "c pkg" => corners(&mut defaults.package.c)?,
        "rload" | "r load" => defaults.r_load = Some(parse_scalar(&entry.value, "rload")?),
        "sim time" => defaults.sim_time = Some(parse_scalar(&entry.value, "sim time")?),
        "clamp tolerance" => defaults.clamp_tol = Some(parse_scalar(&entry.value, "clamp tolerance")?),
        "derate vi pct" => defaults.derate_vi_pct = Some(parse_scalar(&entry.value, "derate vi pct")?),
        "derate ramp pct" => {
            defaults.derate_ramp_pct = Some(parse_scalar(&entry.value, "derate ramp pct")?)
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn join_text(entry: &Entry) -> String {
    let mut text = entry.value.clone();
    for row in &entry.rows {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(row);
    }
    text
}

/// `3.3`, `3.3 3.0 3.6`, or any mix with `NA` for unset corners.
fn parse_corners_value(value: &str, line: usize) -> Result<Corners<f64>, ConfigError> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let one = |t: &str| -> Result<Option<f64>, ConfigError> {
        if t.eq_ignore_ascii_case("na") {
            return Ok(None);
        }
        parse_spice_number(t)
            .map(Some)
            .ok_or_else(|| ConfigError::syntax(line, format!("invalid numeric '{t}'")))
    };
    match tokens.as_slice() {
        [] => Ok(Corners::default()),
        [typ] => Ok(Corners {
            typ: one(typ)?,
            min: None,
            max: None,
        }),
        [typ, min, max] => Ok(Corners {
            typ: one(typ)?,
            min: one(min)?,
            max: one(max)?,
        }),
        _ => Err(ConfigError::syntax(
            line,
            format!("expected 1 or 3 corner values, got {}", tokens.len()),
        )),
    }
}

fn parse_scalar(value: &str, field: &str) -> Result<f64, ConfigError> {
    parse_spice_number(value.trim()).ok_or_else(|| ConfigError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Pin row: `pin signal model` positional columns, then `key=value` options
/// (node, enable_pin, input_pin, series_pin, r_pin, l_pin, c_pin, and the
/// pin-mapping bus labels).
fn parse_pin_row(row: &str, line: usize) -> Result<Pin, ConfigError> {
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(ConfigError::syntax(line, "pin row needs: name signal model"));
    }
    let mut pin = Pin {
        name: tokens[0].to_string(),
        signal: tokens[1].to_string(),
        model_name: tokens[2].to_string(),
        reserved: ReservedKind::from_name(tokens[2]),
        ..Default::default()
    };
    let mut parasitics = Parasitics::default();
    for opt in &tokens[3..] {
        let (key, val) = opt
            .split_once('=')
            .ok_or_else(|| ConfigError::syntax(line, format!("expected key=value, got '{opt}'")))?;
        let num = || {
            parse_spice_number(val).ok_or_else(|| ConfigError::InvalidNumber {
                field: key.to_string(),
                value: val.to_string(),
            })
        };
        match key.to_ascii_lowercase().as_str() {
            "node" => pin.spice_node = Some(val.to_string()),
            "enable_pin" => pin.enable_pin = Some(val.to_string()),
            "input_pin" => pin.input_pin = Some(val.to_string()),
            "series_pin" => pin.series_pin = Some(val.to_string()),
            "r_pin" => parasitics.r = Corners::from_typ(num()?),
            "l_pin" => parasitics.l = Corners::from_typ(num()?),
            "c_pin" => parasitics.c = Corners::from_typ(num()?),
            "pullup_ref" => pin.pullup_ref = Some(val.to_string()),
            "pulldown_ref" => pin.pulldown_ref = Some(val.to_string()),
            "power_clamp_ref" => pin.power_clamp_ref = Some(val.to_string()),
            "gnd_clamp_ref" => pin.gnd_clamp_ref = Some(val.to_string()),
            other => return Err(ConfigError::syntax(line, format!("unknown pin option '{other}'"))),
        }
    }
    if !parasitics.is_empty() {
        pin.parasitics = Some(parasitics);
    }
    Ok(pin)
}

/// `pin pulldown_ref pullup_ref [gnd_clamp_ref [power_clamp_ref]]`, NC for
/// no-connect.
fn apply_pin_mapping_row(comp: &mut Component, row: &str, line: usize) -> Result<(), ConfigError> {
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(ConfigError::syntax(line, "pin mapping row needs: pin pulldown_ref pullup_ref"));
    }
    let name = tokens[0];
    let label = |idx: usize| {
        tokens
            .get(idx)
            .filter(|t| !t.eq_ignore_ascii_case("nc"))
            .map(|t| t.to_string())
    };
    let pin = comp
        .pins
        .iter_mut()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigError::syntax(line, format!("pin mapping for unknown pin '{name}'")))?;
    pin.pulldown_ref = label(1);
    pin.pullup_ref = label(2);
    pin.gnd_clamp_ref = label(3);
    pin.power_clamp_ref = label(4);
    Ok(())
}

fn parse_diff_pin_row(row: &str, line: usize) -> Result<DiffPin, ConfigError> {
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(ConfigError::syntax(line, "diff pin row needs: pin inv_pin"));
    }
    let val = |idx: usize| tokens.get(idx).and_then(|t| parse_spice_number(t));
    Ok(DiffPin {
        pin: tokens[0].to_string(),
        inv_pin: tokens[1].to_string(),
        vdiff: val(2).map(Corners::from_typ).unwrap_or_default(),
        tdelay: Corners {
            typ: val(3),
            min: val(4),
            max: val(5),
        },
    })
}

/// Fixture description as `key=value` tokens, e.g.
/// `R_fixture=50 V_fixture=0 C_fixture=5p`.
fn parse_fixture(value: &str, line: usize) -> Result<Fixture, ConfigError> {
    let mut fixture = Fixture::default();
    let mut v_fixture = Corners::from_typ(0.0);
    for opt in value.split_whitespace() {
        let (key, val) = opt
            .split_once('=')
            .ok_or_else(|| ConfigError::syntax(line, format!("expected key=value, got '{opt}'")))?;
        let num = parse_spice_number(val).ok_or_else(|| ConfigError::InvalidNumber {
            field: key.to_string(),
            value: val.to_string(),
        })?;
        match key.to_ascii_lowercase().as_str() {
            "r_fixture" => fixture.r_fixture = num,
            "v_fixture" => v_fixture.typ = Some(num),
            "v_fixture_min" => v_fixture.min = Some(num),
            "v_fixture_max" => v_fixture.max = Some(num),
            "l_fixture" => fixture.l_fixture = Some(num),
            "c_fixture" => fixture.c_fixture = Some(num),
            "r_dut" => fixture.r_dut = Some(num),
            "l_dut" => fixture.l_dut = Some(num),
            "c_dut" => fixture.c_dut = Some(num),
            other => {
                return Err(ConfigError::syntax(line, format!("unknown fixture option '{other}'")))
            }
        }
    }
    fixture.v_fixture = v_fixture;
    Ok(fixture)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
! simple output buffer
[IBIS Ver]   3.2
[File Name]  buf.ibs
[Date]       July 2026
[Source]     acme silicon
[Voltage Range] 3.3 3.0 3.6
[Temperature Range] 27 100 0
[Sim Time] 10n

[Model] driver
[Model Type] Output
[Vinl] 0.8
[Vinh] 2.0
[Rising Waveform] R_fixture=50 V_fixture=0
[Falling Waveform] R_fixture=50 V_fixture=3.3

[Component] chip
[Manufacturer] acme
[Spice File] buf.sp
[Pin]
pad  sig   driver  node=net7 input_pin=in
in   din   DUMMY
vdd  vdd   POWER
vss  vss   GND
"#;

    #[test]
    fn test_parse_sample() {
        let doc = parse_flat(SAMPLE, None).unwrap();
        assert_eq!(doc.header.file_name, "buf.ibs");
        assert_eq!(doc.defaults.voltage_range, Corners::new(3.3, 3.0, 3.6));
        // slow/fast process corners appear numerically reversed; preserved.
        assert_eq!(doc.defaults.temp_range, Corners::new(27.0, 100.0, 0.0));
        assert_eq!(doc.models.len(), 1);
        assert_eq!(doc.models[0].model_type, ModelType::Output);
        assert_eq!(doc.models[0].rising_fixtures.len(), 1);
        let comp = &doc.components[0];
        assert_eq!(comp.pins.len(), 4);
        assert_eq!(comp.pins[0].node(), "net7");
        assert_eq!(comp.pins[0].input_pin.as_deref(), Some("in"));
        assert_eq!(comp.pins[2].reserved, Some(ReservedKind::Power));
    }

    #[test]
    fn test_continuation_and_comment() {
        let src = "[Notes] first part ! trailing comment\n+ second part\n";
        let doc = parse_flat(src, None).unwrap();
        assert_eq!(doc.header.notes, "first part second part");
    }

    #[test]
    fn test_na_corners() {
        let doc = parse_flat("[Voltage Range] 3.3 NA NA\n", None).unwrap();
        assert_eq!(doc.defaults.voltage_range.typ, Some(3.3));
        assert_eq!(doc.defaults.voltage_range.min, None);
    }

    #[test]
    fn test_bad_keyword_row_is_error() {
        let err = parse_flat("stray data\n", None).unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }));
    }

    #[test]
    fn test_unknown_model_type() {
        let err = parse_flat("[Model] m\n[Model Type] widget\n", None).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModelType(_)));
    }
}
