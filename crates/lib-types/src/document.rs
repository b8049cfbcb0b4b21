//! The IBIS document tree.
//!
//! A [`Document`] is produced by the configuration loader, enriched in place
//! by the planner and curve deriver, and finally serialized by the emitter.
//! Pins reference models by name; the document owns both lists.

use crate::corners::Corners;
use crate::tables::{Fixture, Ramp, ViTable, WaveTable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which external simulator renders and runs the decks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpiceType {
    #[default]
    Hspice,
    Spectre,
    Eldo,
}

impl SpiceType {
    pub fn name(&self) -> &'static str {
        match self {
            SpiceType::Hspice => "hspice",
            SpiceType::Spectre => "spectre",
            SpiceType::Eldo => "eldo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hspice" => Some(SpiceType::Hspice),
            "spectre" => Some(SpiceType::Spectre),
            "eldo" => Some(SpiceType::Eldo),
            _ => None,
        }
    }
}

/// IBIS model types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Input,
    #[default]
    Output,
    Io,
    ThreeState,
    OpenDrain,
    OpenSink,
    OpenSource,
    IoOpenDrain,
    IoOpenSink,
    IoOpenSource,
    InputEcl,
    OutputEcl,
    IoEcl,
    Terminator,
    Series,
    SeriesSwitch,
}

impl ModelType {
    /// Parse the configuration spelling (`I/O`, `3-state`, `Open_drain`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            "i/o" | "io" => Some(Self::Io),
            "3-state" | "three-state" | "3_state" => Some(Self::ThreeState),
            "open_drain" => Some(Self::OpenDrain),
            "open_sink" => Some(Self::OpenSink),
            "open_source" => Some(Self::OpenSource),
            "i/o_open_drain" | "io_open_drain" => Some(Self::IoOpenDrain),
            "i/o_open_sink" | "io_open_sink" => Some(Self::IoOpenSink),
            "i/o_open_source" | "io_open_source" => Some(Self::IoOpenSource),
            "input_ecl" => Some(Self::InputEcl),
            "output_ecl" | "ecl" => Some(Self::OutputEcl),
            "i/o_ecl" | "io_ecl" => Some(Self::IoEcl),
            "terminator" => Some(Self::Terminator),
            "series" => Some(Self::Series),
            "series_switch" => Some(Self::SeriesSwitch),
            _ => None,
        }
    }

    /// The exact keyword spelling the IBIS grammar expects.
    pub fn as_ibis_str(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::Io => "I/O",
            Self::ThreeState => "3-state",
            Self::OpenDrain => "Open_drain",
            Self::OpenSink => "Open_sink",
            Self::OpenSource => "Open_source",
            Self::IoOpenDrain => "I/O_Open_drain",
            Self::IoOpenSink => "I/O_Open_sink",
            Self::IoOpenSource => "I/O_Open_source",
            Self::InputEcl => "Input_ECL",
            Self::OutputEcl => "Output_ECL",
            Self::IoEcl => "I/O_ECL",
            Self::Terminator => "Terminator",
            Self::Series => "Series",
            Self::SeriesSwitch => "Series_switch",
        }
    }

    pub fn is_ecl(&self) -> bool {
        matches!(self, Self::InputEcl | Self::OutputEcl | Self::IoEcl)
    }

    pub fn is_open_drain_family(&self) -> bool {
        matches!(
            self,
            Self::OpenDrain | Self::OpenSink | Self::IoOpenDrain | Self::IoOpenSink
        )
    }

    pub fn is_open_source_family(&self) -> bool {
        matches!(self, Self::OpenSource | Self::IoOpenSource)
    }

    /// Whether the type owns an active pullup structure to characterize.
    pub fn needs_pullup(&self) -> bool {
        matches!(
            self,
            Self::Output
                | Self::Io
                | Self::ThreeState
                | Self::OpenSource
                | Self::IoOpenSource
                | Self::OutputEcl
                | Self::IoEcl
        )
    }

    /// Whether the type owns an active pulldown structure to characterize.
    pub fn needs_pulldown(&self) -> bool {
        matches!(
            self,
            Self::Output
                | Self::Io
                | Self::ThreeState
                | Self::OpenDrain
                | Self::OpenSink
                | Self::IoOpenDrain
                | Self::IoOpenSink
                | Self::OutputEcl
                | Self::IoEcl
        )
    }

    pub fn needs_power_clamp(&self) -> bool {
        matches!(
            self,
            Self::Input
                | Self::Io
                | Self::ThreeState
                | Self::IoOpenSource
                | Self::InputEcl
                | Self::IoEcl
                | Self::Terminator
        )
    }

    pub fn needs_gnd_clamp(&self) -> bool {
        matches!(
            self,
            Self::Input
                | Self::Io
                | Self::ThreeState
                | Self::OpenDrain
                | Self::OpenSink
                | Self::IoOpenDrain
                | Self::IoOpenSink
                | Self::InputEcl
                | Self::IoEcl
                | Self::Terminator
        )
    }

    /// Whether ramps and switching waveforms apply.
    pub fn needs_transient(&self) -> bool {
        self.needs_pullup() || self.needs_pulldown()
    }

    pub fn needs_series_vi(&self) -> bool {
        matches!(self, Self::Series | Self::SeriesSwitch)
    }
}

/// Output polarity relative to the logical input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    NonInverting,
    Inverting,
}

/// Sense of the output-enable control.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnablePolarity {
    #[default]
    ActiveHigh,
    ActiveLow,
}

/// Reserved model-name tokens. A pin carrying one of these is never
/// simulated; POWER/GND pins additionally identify the supply rails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReservedKind {
    Power,
    Gnd,
    Nc,
    Dummy,
    NoModel,
}

impl ReservedKind {
    /// Case-insensitive match against the reserved token set.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "POWER" => Some(Self::Power),
            "GND" => Some(Self::Gnd),
            "NC" => Some(Self::Nc),
            "DUMMY" => Some(Self::Dummy),
            "NOMODEL" => Some(Self::NoModel),
            _ => None,
        }
    }
}

/// Package / pin parasitics as a corner-valued R/L/C triple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parasitics {
    pub r: Corners<f64>,
    pub l: Corners<f64>,
    pub c: Corners<f64>,
}

impl Parasitics {
    pub fn is_empty(&self) -> bool {
        self.r.is_empty() && self.l.is_empty() && self.c.is_empty()
    }

    pub fn inherit(&mut self, parent: &Parasitics) {
        self.r.inherit(&parent.r);
        self.l.inherit(&parent.l);
        self.c.inherit(&parent.c);
    }
}

/// The bag of corner-valued defaults applied hierarchically
/// Document -> Component -> Model. Each layer overrides only the fields it
/// sets; `resolve` in lib-config walks the three layers explicitly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    pub temp_range: Corners<f64>,
    pub voltage_range: Corners<f64>,
    pub pullup_ref: Corners<f64>,
    pub pulldown_ref: Corners<f64>,
    pub power_clamp_ref: Corners<f64>,
    pub gnd_clamp_ref: Corners<f64>,
    pub vil: Corners<f64>,
    pub vih: Corners<f64>,
    pub tr: Corners<f64>,
    pub tf: Corners<f64>,
    pub c_comp: Corners<f64>,
    pub package: Parasitics,
    pub r_load: Option<f64>,
    pub sim_time: Option<f64>,
    pub clamp_tol: Option<f64>,
    pub derate_vi_pct: Option<f64>,
    pub derate_ramp_pct: Option<f64>,
}

impl Defaults {
    /// Fill every unset field from `parent`. One layer of the hierarchical
    /// walk; applying the same parent twice is a no-op.
    pub fn inherit(&mut self, parent: &Defaults) {
        self.temp_range.inherit(&parent.temp_range);
        self.voltage_range.inherit(&parent.voltage_range);
        self.pullup_ref.inherit(&parent.pullup_ref);
        self.pulldown_ref.inherit(&parent.pulldown_ref);
        self.power_clamp_ref.inherit(&parent.power_clamp_ref);
        self.gnd_clamp_ref.inherit(&parent.gnd_clamp_ref);
        self.vil.inherit(&parent.vil);
        self.vih.inherit(&parent.vih);
        self.tr.inherit(&parent.tr);
        self.tf.inherit(&parent.tf);
        self.c_comp.inherit(&parent.c_comp);
        self.package.inherit(&parent.package);
        if self.r_load.is_none() {
            self.r_load = parent.r_load;
        }
        if self.sim_time.is_none() {
            self.sim_time = parent.sim_time;
        }
        if self.clamp_tol.is_none() {
            self.clamp_tol = parent.clamp_tol;
        }
        if self.derate_vi_pct.is_none() {
            self.derate_vi_pct = parent.derate_vi_pct;
        }
        if self.derate_ramp_pct.is_none() {
            self.derate_ramp_pct = parent.derate_ramp_pct;
        }
    }
}

/// One pin of a component.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub name: String,
    /// Node name inside the SPICE netlist; falls back to `name` when unset.
    pub spice_node: Option<String>,
    pub signal: String,
    pub model_name: String,
    /// Set when `model_name` is one of the reserved tokens.
    pub reserved: Option<ReservedKind>,
    pub parasitics: Option<Parasitics>,
    /// Pin driving the output enable, for 3-state and I/O buffers.
    pub enable_pin: Option<String>,
    /// Pin whose model provides receiver behavior for bidirectional pins.
    pub input_pin: Option<String>,
    /// Second terminal for series elements.
    pub series_pin: Option<String>,
    /// Optional [Pin Mapping] bus labels for multi-rail parts.
    pub pullup_ref: Option<String>,
    pub pulldown_ref: Option<String>,
    pub power_clamp_ref: Option<String>,
    pub gnd_clamp_ref: Option<String>,
}

impl Pin {
    /// The SPICE node this pin connects to in generated decks.
    pub fn node(&self) -> &str {
        self.spice_node.as_deref().unwrap_or(&self.name)
    }

    /// Reserved pins and pins with no usable model are skipped by the
    /// planner.
    pub fn needs_analysis(&self) -> bool {
        self.reserved.is_none()
    }
}

/// Series element parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesParams {
    /// Drain-source offsets at which the series V/I is characterized.
    pub vds_list: Vec<f64>,
    pub r_series_off: Corners<f64>,
}

/// A named behavioral model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub model_type: ModelType,
    /// Structurally present but excluded from simulation and emission.
    pub no_model: bool,
    pub polarity: Polarity,
    pub enable: EnablePolarity,

    pub vinl: Corners<f64>,
    pub vinh: Corners<f64>,
    pub vmeas: Corners<f64>,
    pub vref: Corners<f64>,
    pub cref: Corners<f64>,
    pub rref: Corners<f64>,

    /// Corner-specific SPICE subcircuit files (min/max fall back to typ).
    pub model_file: Option<PathBuf>,
    pub model_file_min: Option<PathBuf>,
    pub model_file_max: Option<PathBuf>,
    /// Extra simulator cards appended verbatim to every deck.
    pub ext_cmd_file: Option<PathBuf>,

    /// Model-scope overrides of the hierarchical defaults.
    pub overrides: Defaults,
    /// Effective values after the Document -> Component -> Model walk.
    /// Populated by the configuration resolver.
    pub resolved: Defaults,

    /// Requested waveform fixtures (the deriver fills in the samples).
    pub rising_fixtures: Vec<Fixture>,
    pub falling_fixtures: Vec<Fixture>,
    pub series: Option<SeriesParams>,

    // Derived, emission-ready results.
    pub pullup: Option<ViTable>,
    pub pulldown: Option<ViTable>,
    pub power_clamp: Option<ViTable>,
    pub gnd_clamp: Option<ViTable>,
    pub ramp: Ramp,
    pub rising_waves: Vec<WaveTable>,
    pub falling_waves: Vec<WaveTable>,
    pub series_tables: Vec<(f64, ViTable)>,
}

/// A named physical part with its pin list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub manufacturer: String,
    /// The transistor-level netlist of the buffer under test.
    pub spice_file: Option<PathBuf>,
    pub series_spice_file: Option<PathBuf>,
    pub package_model: Option<String>,
    /// Component-scope overrides of the hierarchical defaults.
    pub overrides: Defaults,
    pub pins: Vec<Pin>,
    pub has_pin_mapping: bool,
    pub diff_pins: Vec<DiffPin>,
    pub series_pin_mappings: Vec<SeriesPinMapping>,
    pub series_switch_groups: Vec<SeriesSwitchGroup>,
}

impl Component {
    pub fn find_pin(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// First pin tagged POWER, used as the pullup/power-clamp rail when no
    /// pin mapping narrows the choice.
    pub fn power_pin(&self) -> Option<&Pin> {
        self.pins
            .iter()
            .find(|p| p.reserved == Some(ReservedKind::Power))
    }

    /// First pin tagged GND.
    pub fn gnd_pin(&self) -> Option<&Pin> {
        self.pins
            .iter()
            .find(|p| p.reserved == Some(ReservedKind::Gnd))
    }

    /// Supply pin whose bus label matches `label`, restricted to POWER/GND
    /// pins. Used when the component declares a pin mapping.
    pub fn supply_pin_by_label(&self, label: &str, pick: impl Fn(&Pin) -> Option<&str>) -> Option<&Pin> {
        self.pins.iter().find(|p| {
            matches!(p.reserved, Some(ReservedKind::Power) | Some(ReservedKind::Gnd))
                && pick(p).is_some_and(|l| l.eq_ignore_ascii_case(label))
        })
    }
}

/// Differential pair declaration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffPin {
    pub pin: String,
    pub inv_pin: String,
    pub vdiff: Corners<f64>,
    pub tdelay: Corners<f64>,
}

/// `[Series Pin Mapping]` row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesPinMapping {
    pub pin1: String,
    pub pin2: String,
    pub model_name: String,
    pub function_group: Option<String>,
}

/// `[Series Switch Groups]` row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesSwitchGroup {
    pub state: String,
    pub pins: Vec<String>,
}

/// File-header bookkeeping emitted at the top of the `.ibs` file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub ibis_ver: String,
    pub file_name: String,
    pub file_rev: String,
    pub date: String,
    pub source: String,
    pub notes: String,
    pub disclaimer: String,
    pub copyright: String,
}

impl Header {
    /// Numeric IBIS version; malformed strings fall back to 3.2.
    pub fn version(&self) -> f64 {
        self.ibis_ver
            .split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3.2)
    }

    /// Waveform tables carry 100 points below IBIS 4.0, up to 1000 from 4.0.
    pub fn wave_points(&self) -> usize {
        if self.version() >= 4.0 {
            crate::constants::WAVE_POINTS_EXTENDED
        } else {
            crate::constants::WAVE_POINTS_LEGACY
        }
    }
}

/// Top-level container for one conversion run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub header: Header,
    pub defaults: Defaults,
    pub components: Vec<Component>,
    pub models: Vec<Model>,
    pub spice_type: SpiceType,
}

impl Document {
    pub fn find_model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn find_model_mut(&mut self, name: &str) -> Option<&mut Model> {
        self.models
            .iter_mut()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_parse_spellings() {
        assert_eq!(ModelType::parse("I/O"), Some(ModelType::Io));
        assert_eq!(ModelType::parse("3-STATE"), Some(ModelType::ThreeState));
        assert_eq!(ModelType::parse("open_drain"), Some(ModelType::OpenDrain));
        assert_eq!(ModelType::parse("bogus"), None);
    }

    #[test]
    fn test_curve_gates_by_type() {
        assert!(!ModelType::OpenDrain.needs_pullup());
        assert!(ModelType::OpenDrain.needs_pulldown());
        assert!(!ModelType::OpenSource.needs_pulldown());
        assert!(ModelType::Terminator.needs_power_clamp());
        assert!(!ModelType::Terminator.needs_transient());
        assert!(ModelType::Series.needs_series_vi());
        assert!(!ModelType::Series.needs_transient());
        assert!(ModelType::Input.needs_gnd_clamp());
        assert!(!ModelType::Input.needs_transient());
    }

    #[test]
    fn test_reserved_names_case_insensitive() {
        for name in ["POWER", "gnd", "Nc", "dummy", "NoModel"] {
            assert!(ReservedKind::from_name(name).is_some(), "{name}");
        }
        assert!(ReservedKind::from_name("driver").is_none());
    }

    #[test]
    fn test_header_wave_points_by_version() {
        let mut h = Header {
            ibis_ver: "3.2".into(),
            ..Default::default()
        };
        assert_eq!(h.wave_points(), 100);
        h.ibis_ver = "4.0".into();
        assert_eq!(h.wave_points(), 1000);
        h.ibis_ver = "7.2".into();
        assert_eq!(h.wave_points(), 1000);
    }
}
