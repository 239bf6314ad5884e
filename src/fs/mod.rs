//! File System Module
//!
//! Provides the virtual file system abstraction used by `file()`
//! and by `include()`/`add_subdirectory()` re-entry. Two
//! backends are provided:
//! - `InMemoryFs`: in-memory, used by tests.
//! - `RealFs`: `std::fs`-backed, used by the CLI binary.

pub mod in_memory_fs;
pub mod real_fs;
pub mod types;

pub use in_memory_fs::InMemoryFs;
pub use real_fs::RealFs;
pub use types::*;
