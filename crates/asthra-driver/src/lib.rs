//! # asthra-driver
//!
//! Glue that sequences the Asthra compile pipeline end-to-end: the LLVM
//! tool orchestrator, relocation manager, and ELF writer from
//! `asthra-codegen`, reporting each stage's elapsed time into
//! `asthra-runtime`'s statistics registry.

pub mod error;
pub mod pipeline;

pub use error::{Error, Result};
pub use pipeline::{cleanup_temp_files, CompileUnitOutcome, CompileUnitRequest, Driver};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
