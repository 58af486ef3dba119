//! Error taxonomy for the codegen crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("tool {0} not found in search path")]
    ToolNotFound(String),

    #[error("child process {tool} exited with status {code}: {stderr}")]
    ChildExitedNonZero { tool: String, code: i32, stderr: String },

    #[error("child process {tool} was killed by signal")]
    ChildKilled { tool: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("overflow: {0}")]
    Overflow(String),
}

pub type Result<T> = std::result::Result<T, Error>;
