// Geometry and measurement types shared by the dimscope crates.

mod types;

pub use types::*;
