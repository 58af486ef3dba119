//! # asthra-codegen
//!
//! The LLVM-facing half of the Asthra compiler: driving `opt`/`llc`/`clang`
//! as child processes, writing the relocated ELF object, and the IR-level
//! optimizer and const-lowering helpers that feed it.
//!
//! ## Architecture
//!
//! AST (external) -> [`optimize`]/[`const_lowering`] IR producers -> textual
//! IR file -> [`orchestrator`] optimize -> [`orchestrator`] codegen ->
//! object file annotated by [`relocation`] -> [`elf`] finalizes the object
//! -> [`orchestrator`] link.

pub mod const_lowering;
pub mod elf;
pub mod error;
pub mod optimize;
pub mod orchestrator;
pub mod relocation;

pub use error::{Error, Result};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
