//! # lib-types
//!
//! Core type definitions for the ibisgen SPICE-to-IBIS pipeline.
//!
//! This crate provides the foundational types used throughout the workspace:
//! - Corner-valued scalars (`typ` / `min` / `max`)
//! - V/I tables, V/T waveform tables, and ramp records
//! - The IBIS document tree (components, pins, models, defaults)
//! - Curve-type enumeration, reserved model names, and filename prefixes

pub mod constants;
pub mod corners;
pub mod document;
pub mod si;
pub mod tables;

pub use constants::*;
pub use corners::*;
pub use document::*;
pub use tables::*;
