//! Curve types, reserved names, filename prefixes, and numeric limits.

use crate::corners::Corner;
use serde::{Deserialize, Serialize};

/// Hard cap on V/I table rows (IBIS 1.x grammar restriction).
pub const MAX_TABLE_SIZE: usize = 100;

/// Waveform sample count for IBIS versions below 4.0.
pub const WAVE_POINTS_LEGACY: usize = 100;

/// Waveform sample count allowed from IBIS 4.0 on.
pub const WAVE_POINTS_EXTENDED: usize = 1000;

/// DC sweeps never step finer than 10 mV.
pub const SWEEP_STEP_FLOOR: f64 = 0.01;

/// Target point count a DC sweep is sized against before the cap applies.
pub const SWEEP_TARGET_POINTS: f64 = 80.0;

/// Sweep half-span for ECL model characterizations, in volts.
pub const ECL_SWEEP_SPAN: f64 = 2.0;

/// Termination voltage for ECL ramp fixtures.
pub const ECL_TERMINATION_VOLTAGE: f64 = -2.0;

/// Default load resistor for ramp characterization.
pub const RLOAD_DEFAULT: f64 = 50.0;

/// Default die capacitance when the configuration leaves C_comp unset.
pub const C_COMP_DEFAULT: f64 = 5.0e-12;

/// Default transient window.
pub const SIM_TIME_DEFAULT: f64 = 10.0e-9;

/// Off-state resistance reported for series switches.
pub const R_SERIES_OFF_DEFAULT: f64 = 1.0e6;

/// Weak resistor tying an undriven input to its ground reference during
/// clamp and disabled sweeps, so the node does not float.
pub const WEAK_TIE_OHMS: f64 = 1.0e10;

/// Upper bound on waveform fixtures characterized per edge direction.
pub const MAX_WAVEFORM_TABLES: usize = 100;

/// Upper bound on per-Vds series V/I tables.
pub const MAX_SERIES_TABLES: usize = 100;

/// The characterization curves the planner can schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    Pullup,
    Pulldown,
    PowerClamp,
    GndClamp,
    DisabledPullup,
    DisabledPulldown,
    RisingRamp,
    FallingRamp,
    RisingWave,
    FallingWave,
    SeriesVi,
}

impl CurveType {
    /// Human-readable name used in logs and deck title cards.
    pub fn name(&self) -> &'static str {
        match self {
            CurveType::Pullup => "pullup",
            CurveType::Pulldown => "pulldown",
            CurveType::PowerClamp => "power_clamp",
            CurveType::GndClamp => "gnd_clamp",
            CurveType::DisabledPullup => "disabled_pullup",
            CurveType::DisabledPulldown => "disabled_pulldown",
            CurveType::RisingRamp => "rising_ramp",
            CurveType::FallingRamp => "falling_ramp",
            CurveType::RisingWave => "rising_wave",
            CurveType::FallingWave => "falling_wave",
            CurveType::SeriesVi => "series_vi",
        }
    }

    /// True for curves produced by a transient run rather than a DC sweep.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CurveType::RisingRamp
                | CurveType::FallingRamp
                | CurveType::RisingWave
                | CurveType::FallingWave
        )
    }
}

/// Deck/result filename prefix, keyed by curve type and corner.
///
/// The prefixes are stable across runs so that `--iterate` can match a deck
/// to its previous results by name alone.
pub fn deck_prefix(curve: CurveType, corner: Corner) -> &'static str {
    use Corner::*;
    use CurveType::*;
    match (curve, corner) {
        (Pullup, Typ) => "put",
        (Pullup, Min) => "pun",
        (Pullup, Max) => "pux",
        (Pulldown, Typ) => "pdt",
        (Pulldown, Min) => "pdn",
        (Pulldown, Max) => "pdx",
        (PowerClamp, Typ) => "pct",
        (PowerClamp, Min) => "pcn",
        (PowerClamp, Max) => "pcx",
        (GndClamp, Typ) => "gct",
        (GndClamp, Min) => "gcn",
        (GndClamp, Max) => "gcx",
        (DisabledPullup, Typ) => "dut",
        (DisabledPullup, Min) => "dun",
        (DisabledPullup, Max) => "dux",
        (DisabledPulldown, Typ) => "ddt",
        (DisabledPulldown, Min) => "ddn",
        (DisabledPulldown, Max) => "ddx",
        (RisingRamp, Typ) => "rut",
        (RisingRamp, Min) => "run",
        (RisingRamp, Max) => "rux",
        (FallingRamp, Typ) => "rdt",
        (FallingRamp, Min) => "rdn",
        (FallingRamp, Max) => "rdx",
        (RisingWave, Typ) => "rwt",
        (RisingWave, Min) => "rwn",
        (RisingWave, Max) => "rwx",
        (FallingWave, Typ) => "fwt",
        (FallingWave, Min) => "fwn",
        (FallingWave, Max) => "fwx",
        (SeriesVi, Typ) => "svt",
        (SeriesVi, Min) => "svn",
        (SeriesVi, Max) => "svx",
    }
}

/// Base name (no extension) for the deck and result files of one
/// characterization run: `{prefix}_{pin}_{corner}`, with an optional index
/// for curves that repeat per fixture or per Vds value.
pub fn file_stem(curve: CurveType, pin: &str, corner: Corner, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{}{:02}_{}_{}", deck_prefix(curve, corner), i, pin, corner),
        None => format!("{}_{}_{}", deck_prefix(curve, corner), pin, corner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_is_deterministic() {
        assert_eq!(file_stem(CurveType::Pullup, "pad", Corner::Typ, None), "put_pad_typ");
        assert_eq!(
            file_stem(CurveType::RisingWave, "pad", Corner::Max, Some(1)),
            "rwx01_pad_max"
        );
    }

    #[test]
    fn test_prefixes_unique_per_curve_and_corner() {
        use std::collections::HashSet;
        let curves = [
            CurveType::Pullup,
            CurveType::Pulldown,
            CurveType::PowerClamp,
            CurveType::GndClamp,
            CurveType::DisabledPullup,
            CurveType::DisabledPulldown,
            CurveType::RisingRamp,
            CurveType::FallingRamp,
            CurveType::RisingWave,
            CurveType::FallingWave,
            CurveType::SeriesVi,
        ];
        let mut seen = HashSet::new();
        for curve in curves {
            for corner in Corner::ALL {
                assert!(seen.insert(deck_prefix(curve, corner)));
            }
        }
    }
}
