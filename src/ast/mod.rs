//! Abstract Syntax Tree for the CMake language.

pub mod types;

pub use types::*;
