//! # lib-spice
//!
//! Everything that touches the external SPICE simulator: dialect-specific
//! deck rendering (HSPICE / Spectre / Eldo), the subprocess driver with its
//! iterate / cleanup / cancellation policies, and the result readers that
//! turn simulator-native output into canonical (V, I) and (t, V[, I]) data.

pub mod deck;
pub mod dialect;
pub mod driver;
pub mod eldo;
pub mod error;
pub mod hspice;
pub mod reader;
pub mod spectre;

pub use deck::{Analysis, DeckRequest, Element, Stimulus, SupplyBias};
pub use dialect::{dialect_for, Dialect};
pub use driver::{Driver, RunOutcome, RunPolicy};
pub use error::SimError;
pub use reader::{DcPoint, TranPoint};
