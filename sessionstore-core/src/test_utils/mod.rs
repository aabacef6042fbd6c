//! Test utilities shared by the unit test modules

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
