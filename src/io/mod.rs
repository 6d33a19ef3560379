//! Input helpers.
//!
//! - accuracy report reading + parsing (`report`)
//! - parameters document loading (`params`)

pub mod params;
pub mod report;

pub use params::*;
pub use report::*;
