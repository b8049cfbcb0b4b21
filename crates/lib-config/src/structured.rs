//! The structured (TOML / JSON) configuration form.
//!
//! Numeric values accept SI-style suffixes (`5p`, `2n`) or scientific
//! notation; corner-valued fields accept a bare scalar (typ only) or a
//! `{ typ, min, max }` group.

use crate::error::ConfigError;
use lib_types::si::parse_spice_number;
use lib_types::{
    Component, Corners, Defaults, DiffPin, Document, EnablePolarity, Fixture, Header, Model,
    ModelType, Parasitics, Pin, Polarity, ReservedKind, SeriesParams, SeriesPinMapping,
    SeriesSwitchGroup, SpiceType,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A numeric literal: plain number, scientific notation, or a string with an
/// SI suffix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Num(pub f64);

impl Serialize for Num {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Num {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Float(f64),
            Int(i64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Float(f) => Ok(Num(f)),
            Raw::Int(i) => Ok(Num(i as f64)),
            Raw::Text(s) => parse_spice_number(&s)
                .map(Num)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid numeric value '{s}'"))),
        }
    }
}

/// Corner-valued field: a bare scalar sets `typ` only.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CornerSpec {
    Scalar(Num),
    Triple {
        #[serde(skip_serializing_if = "Option::is_none")]
        typ: Option<Num>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<Num>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<Num>,
    },
}

impl CornerSpec {
    pub fn to_corners(self) -> Corners<f64> {
        match self {
            CornerSpec::Scalar(n) => Corners::from_typ(n.0),
            CornerSpec::Triple { typ, min, max } => Corners {
                typ: typ.map(|n| n.0),
                min: min.map(|n| n.0),
                max: max.map(|n| n.0),
            },
        }
    }

    pub fn from_corners(c: &Corners<f64>) -> Option<Self> {
        if c.is_empty() {
            return None;
        }
        if let (Some(typ), None, None) = (c.typ, c.min, c.max) {
            return Some(CornerSpec::Scalar(Num(typ)));
        }
        Some(CornerSpec::Triple {
            typ: c.typ.map(Num),
            min: c.min.map(Num),
            max: c.max.map(Num),
        })
    }
}

/// Defaults block, reused at document, component, and model scope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_range: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_range: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pullup_ref: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulldown_ref: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_clamp_ref: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gnd_clamp_ref: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vil: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vih: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tr: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tf: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_comp: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_pkg: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_pkg: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_pkg: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_load: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_time: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clamp_tol: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derate_vi_pct: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derate_ramp_pct: Option<Num>,
}

impl DefaultsConfig {
    pub fn to_defaults(&self) -> Defaults {
        let spec = |s: &Option<CornerSpec>| s.map(CornerSpec::to_corners).unwrap_or_default();
        Defaults {
            temp_range: spec(&self.temp_range),
            voltage_range: spec(&self.voltage_range),
            pullup_ref: spec(&self.pullup_ref),
            pulldown_ref: spec(&self.pulldown_ref),
            power_clamp_ref: spec(&self.power_clamp_ref),
            gnd_clamp_ref: spec(&self.gnd_clamp_ref),
            vil: spec(&self.vil),
            vih: spec(&self.vih),
            tr: spec(&self.tr),
            tf: spec(&self.tf),
            c_comp: spec(&self.c_comp),
            package: Parasitics {
                r: spec(&self.r_pkg),
                l: spec(&self.l_pkg),
                c: spec(&self.c_pkg),
            },
            r_load: self.r_load.map(|n| n.0),
            sim_time: self.sim_time.map(|n| n.0),
            clamp_tol: self.clamp_tol.map(|n| n.0),
            derate_vi_pct: self.derate_vi_pct.map(|n| n.0),
            derate_ramp_pct: self.derate_ramp_pct.map(|n| n.0),
        }
    }

    pub fn from_defaults(d: &Defaults) -> Self {
        Self {
            temp_range: CornerSpec::from_corners(&d.temp_range),
            voltage_range: CornerSpec::from_corners(&d.voltage_range),
            pullup_ref: CornerSpec::from_corners(&d.pullup_ref),
            pulldown_ref: CornerSpec::from_corners(&d.pulldown_ref),
            power_clamp_ref: CornerSpec::from_corners(&d.power_clamp_ref),
            gnd_clamp_ref: CornerSpec::from_corners(&d.gnd_clamp_ref),
            vil: CornerSpec::from_corners(&d.vil),
            vih: CornerSpec::from_corners(&d.vih),
            tr: CornerSpec::from_corners(&d.tr),
            tf: CornerSpec::from_corners(&d.tf),
            c_comp: CornerSpec::from_corners(&d.c_comp),
            r_pkg: CornerSpec::from_corners(&d.package.r),
            l_pkg: CornerSpec::from_corners(&d.package.l),
            c_pkg: CornerSpec::from_corners(&d.package.c),
            r_load: d.r_load.map(Num),
            sim_time: d.sim_time.map(Num),
            clamp_tol: d.clamp_tol.map(Num),
            derate_vi_pct: d.derate_vi_pct.map(Num),
            derate_ramp_pct: d.derate_ramp_pct.map(Num),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_fixture: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_fixture: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_fixture: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_fixture: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_dut: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_dut: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_dut: Option<Num>,
}

impl FixtureConfig {
    pub fn to_fixture(&self) -> Fixture {
        Fixture {
            r_fixture: self.r_fixture.map(|n| n.0).unwrap_or(lib_types::RLOAD_DEFAULT),
            v_fixture: self
                .v_fixture
                .map(CornerSpec::to_corners)
                .unwrap_or_else(|| Corners::from_typ(0.0)),
            l_fixture: self.l_fixture.map(|n| n.0),
            c_fixture: self.c_fixture.map(|n| n.0),
            r_dut: self.r_dut.map(|n| n.0),
            l_dut: self.l_dut.map(|n| n.0),
            c_dut: self.c_dut.map(|n| n.0),
        }
    }

    pub fn from_fixture(f: &Fixture) -> Self {
        Self {
            r_fixture: Some(Num(f.r_fixture)),
            v_fixture: CornerSpec::from_corners(&f.v_fixture),
            l_fixture: f.l_fixture.map(Num),
            c_fixture: f.c_fixture.map(Num),
            r_dut: f.r_dut.map(Num),
            l_dut: f.l_dut.map(Num),
            c_dut: f.c_dut.map(Num),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nomodel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polarity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_polarity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vinl: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vinh: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmeas: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vref: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cref: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rref: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_file_min: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_file_max: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext_cmd_file: Option<PathBuf>,
    #[serde(flatten)]
    pub overrides: DefaultsConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rising_waveforms: Vec<FixtureConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub falling_waveforms: Vec<FixtureConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vds_list: Vec<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_series_off: Option<CornerSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PinConfig {
    #[serde(rename = "pinName")]
    pub pin_name: String,
    #[serde(rename = "spiceNode", skip_serializing_if = "Option::is_none")]
    pub spice_node: Option<String>,
    #[serde(rename = "signalName")]
    pub signal_name: String,
    #[serde(rename = "modelName")]
    pub model_name: String,
    #[serde(rename = "enablePin", skip_serializing_if = "Option::is_none")]
    pub enable_pin: Option<String>,
    #[serde(rename = "inputPin", skip_serializing_if = "Option::is_none")]
    pub input_pin: Option<String>,
    #[serde(rename = "seriesPin", skip_serializing_if = "Option::is_none")]
    pub series_pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_pin: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_pin: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_pin: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pullup_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulldown_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_clamp_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gnd_clamp_ref: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffPinConfig {
    pub pin: String,
    pub inv_pin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vdiff: Option<CornerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tdelay: Option<CornerSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesPinConfig {
    pub pin1: String,
    pub pin2: String,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_group: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchGroupConfig {
    pub state: String,
    pub pins: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub component: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spice_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_spice_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_model: Option<String>,
    #[serde(flatten)]
    pub overrides: DefaultsConfig,
    #[serde(rename = "pList", default, skip_serializing_if = "Vec::is_empty")]
    pub p_list: Vec<PinConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diff_pins: Vec<DiffPinConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series_pin_mappings: Vec<SeriesPinConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series_switch_groups: Vec<SwitchGroupConfig>,
}

/// Top-level structured configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ibis_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_rev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spice_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_defaults: Option<DefaultsConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentConfig>,
}

pub fn parse_toml(content: &str) -> Result<Document, ConfigError> {
    let config: Config = toml::from_str(content).map_err(|e| ConfigError::InvalidFormat {
        format: "TOML",
        message: e.to_string(),
    })?;
    config.into_document()
}

pub fn parse_json(content: &str) -> Result<Document, ConfigError> {
    let config: Config = serde_json::from_str(content).map_err(|e| ConfigError::InvalidFormat {
        format: "JSON",
        message: e.to_string(),
    })?;
    config.into_document()
}

impl Config {
    pub fn into_document(self) -> Result<Document, ConfigError> {
        let mut doc = Document {
            header: Header {
                ibis_ver: self.ibis_version.unwrap_or_else(|| "3.2".to_string()),
                file_name: self.file_name.unwrap_or_default(),
                file_rev: self.file_rev.unwrap_or_else(|| "1.0".to_string()),
                date: self.date.unwrap_or_default(),
                source: self.source.unwrap_or_default(),
                notes: self.notes.unwrap_or_default(),
                disclaimer: self.disclaimer.unwrap_or_default(),
                copyright: self.copyright.unwrap_or_default(),
            },
            defaults: self
                .global_defaults
                .as_ref()
                .map(DefaultsConfig::to_defaults)
                .unwrap_or_default(),
            spice_type: match &self.spice_type {
                Some(s) => SpiceType::parse(s)
                    .ok_or_else(|| ConfigError::missing("spice type", s.clone()))?,
                None => SpiceType::default(),
            },
            ..Default::default()
        };

        for m in self.models {
            doc.models.push(model_from_config(m)?);
        }
        for c in self.components {
            doc.components.push(component_from_config(c));
        }
        Ok(doc)
    }

    pub fn from_document(doc: &Document) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let global = DefaultsConfig::from_defaults(&doc.defaults);
        Config {
            ibis_version: Some(doc.header.ibis_ver.clone()),
            file_name: non_empty(&doc.header.file_name),
            file_rev: non_empty(&doc.header.file_rev),
            date: non_empty(&doc.header.date),
            source: non_empty(&doc.header.source),
            notes: non_empty(&doc.header.notes),
            disclaimer: non_empty(&doc.header.disclaimer),
            copyright: non_empty(&doc.header.copyright),
            spice_type: Some(doc.spice_type.name().to_string()),
            global_defaults: (global != DefaultsConfig::default()).then_some(global),
            models: doc.models.iter().map(model_to_config).collect(),
            components: doc.components.iter().map(component_to_config).collect(),
        }
    }
}

fn model_from_config(m: ModelConfig) -> Result<Model, ConfigError> {
    let model_type = ModelType::parse(&m.model_type)
        .ok_or_else(|| ConfigError::UnknownModelType(m.model_type.clone()))?;
    let spec = |s: &Option<CornerSpec>| s.map(CornerSpec::to_corners).unwrap_or_default();
    Ok(Model {
        name: m.name,
        model_type,
        no_model: m.nomodel,
        polarity: parse_polarity(m.polarity.as_deref()),
        enable: parse_enable(m.enable_polarity.as_deref()),
        vinl: spec(&m.vinl),
        vinh: spec(&m.vinh),
        vmeas: spec(&m.vmeas),
        vref: spec(&m.vref),
        cref: spec(&m.cref),
        rref: spec(&m.rref),
        model_file: m.model_file,
        model_file_min: m.model_file_min,
        model_file_max: m.model_file_max,
        ext_cmd_file: m.ext_cmd_file,
        overrides: m.overrides.to_defaults(),
        rising_fixtures: m.rising_waveforms.iter().map(FixtureConfig::to_fixture).collect(),
        falling_fixtures: m.falling_waveforms.iter().map(FixtureConfig::to_fixture).collect(),
        series: (!m.vds_list.is_empty() || m.r_series_off.is_some()).then(|| SeriesParams {
            vds_list: m.vds_list.iter().map(|n| n.0).collect(),
            r_series_off: spec(&m.r_series_off),
        }),
        ..Default::default()
    })
}

fn model_to_config(m: &Model) -> ModelConfig {
    ModelConfig {
        name: m.name.clone(),
        model_type: m.model_type.as_ibis_str().to_string(),
        nomodel: m.no_model,
        polarity: (m.polarity == Polarity::Inverting).then(|| "Inverting".to_string()),
        enable_polarity: (m.enable == EnablePolarity::ActiveLow).then(|| "Active-Low".to_string()),
        vinl: CornerSpec::from_corners(&m.vinl),
        vinh: CornerSpec::from_corners(&m.vinh),
        vmeas: CornerSpec::from_corners(&m.vmeas),
        vref: CornerSpec::from_corners(&m.vref),
        cref: CornerSpec::from_corners(&m.cref),
        rref: CornerSpec::from_corners(&m.rref),
        model_file: m.model_file.clone(),
        model_file_min: m.model_file_min.clone(),
        model_file_max: m.model_file_max.clone(),
        ext_cmd_file: m.ext_cmd_file.clone(),
        overrides: DefaultsConfig::from_defaults(&m.overrides),
        rising_waveforms: m.rising_fixtures.iter().map(FixtureConfig::from_fixture).collect(),
        falling_waveforms: m.falling_fixtures.iter().map(FixtureConfig::from_fixture).collect(),
        vds_list: m
            .series
            .as_ref()
            .map(|s| s.vds_list.iter().copied().map(Num).collect())
            .unwrap_or_default(),
        r_series_off: m
            .series
            .as_ref()
            .and_then(|s| CornerSpec::from_corners(&s.r_series_off)),
    }
}

fn component_from_config(c: ComponentConfig) -> Component {
    let has_pin_mapping = c.p_list_has_mapping();
    let pins = c
        .p_list
        .into_iter()
        .map(|p| Pin {
            reserved: ReservedKind::from_name(&p.model_name),
            name: p.pin_name,
            spice_node: p.spice_node,
            signal: p.signal_name,
            model_name: p.model_name,
            parasitics: (p.r_pin.is_some() || p.l_pin.is_some() || p.c_pin.is_some()).then(|| {
                Parasitics {
                    r: p.r_pin.map(|n| Corners::from_typ(n.0)).unwrap_or_default(),
                    l: p.l_pin.map(|n| Corners::from_typ(n.0)).unwrap_or_default(),
                    c: p.c_pin.map(|n| Corners::from_typ(n.0)).unwrap_or_default(),
                }
            }),
            enable_pin: p.enable_pin,
            input_pin: p.input_pin,
            series_pin: p.series_pin,
            pullup_ref: p.pullup_ref,
            pulldown_ref: p.pulldown_ref,
            power_clamp_ref: p.power_clamp_ref,
            gnd_clamp_ref: p.gnd_clamp_ref,
        })
        .collect();

    Component {
        name: c.component,
        manufacturer: c.manufacturer,
        spice_file: c.spice_file,
        series_spice_file: c.series_spice_file,
        package_model: c.package_model,
        overrides: c.overrides.to_defaults(),
        pins,
        has_pin_mapping,
        diff_pins: c
            .diff_pins
            .into_iter()
            .map(|d| DiffPin {
                pin: d.pin,
                inv_pin: d.inv_pin,
                vdiff: d.vdiff.map(CornerSpec::to_corners).unwrap_or_default(),
                tdelay: d.tdelay.map(CornerSpec::to_corners).unwrap_or_default(),
            })
            .collect(),
        series_pin_mappings: c
            .series_pin_mappings
            .into_iter()
            .map(|s| SeriesPinMapping {
                pin1: s.pin1,
                pin2: s.pin2,
                model_name: s.model_name,
                function_group: s.function_group,
            })
            .collect(),
        series_switch_groups: c
            .series_switch_groups
            .into_iter()
            .map(|g| SeriesSwitchGroup {
                state: g.state,
                pins: g.pins,
            })
            .collect(),
    }
}

impl ComponentConfig {
    fn p_list_has_mapping(&self) -> bool {
        self.p_list.iter().any(|p| {
            p.pullup_ref.is_some()
                || p.pulldown_ref.is_some()
                || p.power_clamp_ref.is_some()
                || p.gnd_clamp_ref.is_some()
        })
    }
}

fn component_to_config(c: &Component) -> ComponentConfig {
    ComponentConfig {
        component: c.name.clone(),
        manufacturer: c.manufacturer.clone(),
        spice_file: c.spice_file.clone(),
        series_spice_file: c.series_spice_file.clone(),
        package_model: c.package_model.clone(),
        overrides: DefaultsConfig::from_defaults(&c.overrides),
        p_list: c
            .pins
            .iter()
            .map(|p| PinConfig {
                pin_name: p.name.clone(),
                spice_node: p.spice_node.clone(),
                signal_name: p.signal.clone(),
                model_name: p.model_name.clone(),
                enable_pin: p.enable_pin.clone(),
                input_pin: p.input_pin.clone(),
                series_pin: p.series_pin.clone(),
                r_pin: p.parasitics.as_ref().and_then(|q| q.r.typ).map(Num),
                l_pin: p.parasitics.as_ref().and_then(|q| q.l.typ).map(Num),
                c_pin: p.parasitics.as_ref().and_then(|q| q.c.typ).map(Num),
                pullup_ref: p.pullup_ref.clone(),
                pulldown_ref: p.pulldown_ref.clone(),
                power_clamp_ref: p.power_clamp_ref.clone(),
                gnd_clamp_ref: p.gnd_clamp_ref.clone(),
            })
            .collect(),
        diff_pins: c
            .diff_pins
            .iter()
            .map(|d| DiffPinConfig {
                pin: d.pin.clone(),
                inv_pin: d.inv_pin.clone(),
                vdiff: CornerSpec::from_corners(&d.vdiff),
                tdelay: CornerSpec::from_corners(&d.tdelay),
            })
            .collect(),
        series_pin_mappings: c
            .series_pin_mappings
            .iter()
            .map(|s| SeriesPinConfig {
                pin1: s.pin1.clone(),
                pin2: s.pin2.clone(),
                model_name: s.model_name.clone(),
                function_group: s.function_group.clone(),
            })
            .collect(),
        series_switch_groups: c
            .series_switch_groups
            .iter()
            .map(|g| SwitchGroupConfig {
                state: g.state.clone(),
                pins: g.pins.clone(),
            })
            .collect(),
    }
}

fn parse_polarity(s: Option<&str>) -> Polarity {
    match s.map(|s| s.to_ascii_lowercase()) {
        Some(ref s) if s.starts_with("invert") => Polarity::Inverting,
        _ => Polarity::NonInverting,
    }
}

fn parse_enable(s: Option<&str>) -> EnablePolarity {
    match s.map(|s| s.to_ascii_lowercase().replace('-', "_")) {
        Some(ref s) if s == "active_low" => EnablePolarity::ActiveLow,
        _ => EnablePolarity::ActiveHigh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_accepts_suffix_strings() {
        let n: Num = serde_json::from_str("\"5p\"").unwrap();
        assert!((n.0 - 5e-12).abs() < 1e-24);
        let n: Num = serde_json::from_str("3.3").unwrap();
        assert_eq!(n.0, 3.3);
    }

    #[test]
    fn test_corner_spec_scalar_sets_typ() {
        let spec: CornerSpec = serde_json::from_str("\"100n\"").unwrap();
        let c = spec.to_corners();
        assert!((c.typ.unwrap() - 100e-9).abs() < 1e-18);
        assert!(c.min.is_none());
    }

    #[test]
    fn test_unknown_model_type_rejected() {
        let cfg = Config {
            models: vec![ModelConfig {
                name: "m".into(),
                model_type: "gizmo".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            cfg.into_document(),
            Err(ConfigError::UnknownModelType(_))
        ));
    }

    #[test]
    fn test_document_config_round_trip() {
        let toml_src = r#"
ibis_version = "3.2"
file_name = "buf.ibs"
spice_type = "hspice"

[global_defaults]
voltage_range = { typ = 3.3, min = 3.0, max = 3.6 }
sim_time = "10n"

[[models]]
name = "driver"
type = "Output"
vinl = 0.8
vinh = 2.0

[[models.rising_waveforms]]
r_fixture = 50
v_fixture = 0.0

[[components]]
component = "chip"
manufacturer = "acme"
spice_file = "buf.sp"

[[components.pList]]
pinName = "1"
signalName = "sig"
modelName = "driver"
"#;
        let doc = parse_toml(toml_src).unwrap();
        let emitted = toml::to_string(&Config::from_document(&doc)).unwrap();
        let doc2 = parse_toml(&emitted).unwrap();
        assert_eq!(doc, doc2);
    }
}
