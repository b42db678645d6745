//! Shared utilities: identifiers, clock, and telemetry.

pub mod clock;
pub mod serde;
pub mod telemetry;

pub use clock::*;
pub use serde::*;
pub use telemetry::*;
