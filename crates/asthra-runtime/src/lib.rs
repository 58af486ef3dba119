//! # asthra-runtime
//!
//! Runtime support linked into every compiled Asthra program: atomic
//! primitives with explicit memory ordering, a monotonic clock, a process
//! statistics registry, the hybrid task/thread concurrency bridge, and the
//! configurable safety subsystem (bounds, FFI ownership, pattern
//! exhaustiveness, constant-time and secure-zero verification, stack
//! canaries, fault injection).
//!
//! ## Quick Start
//!
//! ```no_run
//! use asthra_runtime::safety::{SafetyConfig, SafetySubsystem};
//! use asthra_runtime::stats::StatisticsRegistry;
//!
//! let subsystem = SafetySubsystem::new(SafetyConfig::release());
//! let stats = StatisticsRegistry::new();
//! stats.init();
//! ```
//!
//! ## Architecture
//!
//! Generated code -> [`atomics`] (clock, counters, lock-free stack) ->
//! [`concurrency`] (tasks, callbacks, threads) and [`safety`] (checkers) ->
//! [`stats`] (process-wide counters, JSON export).
//!
//! None of the safety checkers return `Err`; violations are reported through
//! [`safety::reporting::ViolationLog`] instead, since a safety violation is
//! a diagnostic, not a recoverable operation failure.

pub mod atomics;
pub mod concurrency;
pub mod error;
pub mod safety;
pub mod stats;

pub use error::{Error, Result};
pub use safety::{SafetyConfig, SafetySubsystem};
pub use stats::StatisticsRegistry;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
