//! Error taxonomy for the driver crate. Wraps the stage crates' errors so a
//! caller sees one error type regardless of which stage failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("codegen stage failed: {0}")]
    Codegen(#[from] asthra_codegen::Error),

    #[error("runtime error: {0}")]
    Runtime(#[from] asthra_runtime::Error),

    #[error("relocation table failed validation: {0}")]
    InvalidRelocationTable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
