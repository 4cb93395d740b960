//! Core data types and enums shared by the reader, source, and publisher crates.

pub mod enums;
pub mod observation;

pub use enums::*;
pub use observation::*;
