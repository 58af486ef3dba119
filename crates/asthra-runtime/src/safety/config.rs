//! Safety subsystem configuration: a settings record toggling each checker
//! independently, plus four standard presets.

use serde::{Deserialize, Serialize};

/// Overall safety level. Individual checker flags can still be overridden
/// independently of this — it mainly picks sane defaults for the presets
/// below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyLevel {
    None,
    Basic,
    Standard,
    Enhanced,
    Paranoid,
}

/// Per-checker toggles plus the overall level. Every field defaults to the
/// `standard` preset's value via [`SafetyConfig::standard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub level: SafetyLevel,
    pub boundary_checks: bool,
    pub layout_checks: bool,
    pub ffi_ownership_checks: bool,
    pub variadic_checks: bool,
    pub result_tracking: bool,
    pub pattern_exhaustiveness: bool,
    pub constant_time_checks: bool,
    pub secure_zero_checks: bool,
    pub stack_canary: bool,
    pub fault_injection: bool,
    pub performance_monitor: bool,
}

impl SafetyConfig {
    /// Everything off. Used for release builds that trust the compiler's
    /// static guarantees entirely.
    pub fn none() -> Self {
        Self {
            level: SafetyLevel::None,
            boundary_checks: false,
            layout_checks: false,
            ffi_ownership_checks: false,
            variadic_checks: false,
            result_tracking: false,
            pattern_exhaustiveness: false,
            constant_time_checks: false,
            secure_zero_checks: false,
            stack_canary: false,
            fault_injection: false,
            performance_monitor: false,
        }
    }

    /// Fast-path checks only: bounds and FFI ownership. No instrumentation
    /// that measures timing or touches the stack.
    pub fn basic() -> Self {
        Self {
            level: SafetyLevel::Basic,
            boundary_checks: true,
            layout_checks: false,
            ffi_ownership_checks: true,
            variadic_checks: true,
            result_tracking: false,
            pattern_exhaustiveness: true,
            constant_time_checks: false,
            secure_zero_checks: false,
            stack_canary: false,
            fault_injection: false,
            performance_monitor: false,
        }
    }

    /// The default release profile: every structural and ownership check,
    /// no fault injection and no constant-time instrumentation (too slow
    /// for hot loops in a shipped binary).
    pub fn release() -> Self {
        Self {
            level: SafetyLevel::Standard,
            boundary_checks: true,
            layout_checks: true,
            ffi_ownership_checks: true,
            variadic_checks: true,
            result_tracking: true,
            pattern_exhaustiveness: true,
            constant_time_checks: false,
            secure_zero_checks: true,
            stack_canary: true,
            fault_injection: false,
            performance_monitor: true,
        }
    }

    /// The debug build default: everything `release` has, plus
    /// constant-time verification (debug builds can afford the overhead).
    pub fn debug() -> Self {
        Self {
            level: SafetyLevel::Enhanced,
            constant_time_checks: true,
            ..Self::release()
        }
    }

    /// CI/test profile: same checks as `debug` plus fault injection, so
    /// tests can exercise the error paths deliberately.
    pub fn testing() -> Self {
        Self {
            level: SafetyLevel::Enhanced,
            fault_injection: true,
            ..Self::debug()
        }
    }

    /// Every checker enabled, maximal level. Intended for fuzzing and
    /// security audits, not for production throughput.
    pub fn paranoid() -> Self {
        Self {
            level: SafetyLevel::Paranoid,
            boundary_checks: true,
            layout_checks: true,
            ffi_ownership_checks: true,
            variadic_checks: true,
            result_tracking: true,
            pattern_exhaustiveness: true,
            constant_time_checks: true,
            secure_zero_checks: true,
            stack_canary: true,
            fault_injection: true,
            performance_monitor: true,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self::release()
    }
}
