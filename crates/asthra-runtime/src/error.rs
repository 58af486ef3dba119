//! Error taxonomy for the runtime bridge and safety subsystem.
//!
//! Safety violations are *not* represented here — they never unwind or
//! propagate as `Err`. They are reported through
//! [`crate::safety::report_violation`] and recorded in the violation log.
//! This enum covers the resource- and configuration-level failures that are
//! fatal or recoverable per spec §7.

use thiserror::Error;

/// Errors produced by `asthra-runtime`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("mutex poisoned: {0}")]
    Poisoned(String),
}

pub type Result<T> = std::result::Result<T, Error>;
