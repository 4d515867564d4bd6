//! Helper utilities for integration tests.

pub mod assertions;
pub mod intervals;

pub use assertions::*;
pub use intervals::*;
