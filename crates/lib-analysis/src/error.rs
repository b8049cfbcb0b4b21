//! Error types for planning and derivation.

use lib_types::CurveType;
use thiserror::Error;

/// The requested characterization cannot be scheduled. Fatal at detection
/// time; no simulation is attempted.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("model '{model}': {kind} requires an enable pin on pin '{pin}'")]
    MissingEnablePin {
        model: String,
        kind: &'static str,
        pin: String,
    },

    #[error("component '{component}' has no POWER pin")]
    MissingPowerPin { component: String },

    #[error("component '{component}' has no GND pin")]
    MissingGndPin { component: String },

    #[error("model '{model}' has no typical voltage range")]
    MissingVoltageRange { model: String },

    #[error("series pin '{pin}' has no second terminal declared")]
    MissingSeriesPin { pin: String },

    #[error("component '{component}' declares no SPICE netlist")]
    MissingNetlist { component: String },
}

/// Curve derivation produced a pathological result. Captured per plan item;
/// the affected table is reported as NA and the pipeline continues.
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("{curve:?} table is not monotonic in V")]
    NonMonotonic { curve: CurveType },

    #[error("transient never crossed {pct}% of its swing")]
    RampNotCrossed { pct: u8 },

    #[error("simulation returned no usable samples")]
    EmptyResult,
}
