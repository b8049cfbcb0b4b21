//! # lib-analysis
//!
//! The characterization brain of ibisgen: the planner decides which curves
//! each pin's model needs and in which corners; the executor materializes
//! each plan item through lib-spice; the deriver turns raw sweep and
//! transient data into emission-ready IBIS tables.

pub mod analyze;
pub mod derive;
pub mod error;
pub mod planner;

pub use analyze::{analyze_document, AnalysisOptions, AnalysisReport, AnalyzeError, ItemFailure};
pub use error::{DeriveError, PlanError};
pub use planner::{plan_document, PinPlan, PlanItem, Recipe, Sweep, Termination};
