//! Runtime safety subsystem: an orthogonal, configurable layer validating
//! FFI transfer semantics, slice bounds, memory layout, pattern-match
//! exhaustiveness, Result-handling, constant-time execution, secure zeroing,
//! and stack integrity.
//!
//! Every sub-module is independently toggled by [`config::SafetyConfig`];
//! [`SafetySubsystem`] is the façade that gates calls on those flags and
//! funnels every finding through the shared [`reporting::ViolationLog`].

pub mod boundary;
pub mod config;
pub mod ffi;
pub mod pattern;
pub mod reporting;
pub mod result_tracker;
pub mod security;

pub use boundary::{enhanced_boundary_check, slice_bounds_check, validate_slice_header, BoundaryCheckResult, SliceHeader};
pub use config::{SafetyConfig, SafetyLevel};
pub use ffi::{FfiArg, FfiPointerTracker, OwnershipHint, TransferMode, VariadicType};
pub use pattern::{verify_match_exhaustiveness, Completeness, ExhaustivenessReport, MatchArm, ResultTypeShape};
pub use reporting::{Severity, Violation, ViolationKind, ViolationLog};
pub use result_tracker::ResultTracker;
pub use security::{FaultInjector, FaultType, PerformanceMonitor};

/// Aggregates every checker plus the shared configuration and violation
/// sink. Construct one instance per compiled program / test run.
pub struct SafetySubsystem {
    pub config: SafetyConfig,
    pub ffi_tracker: FfiPointerTracker,
    pub result_tracker: ResultTracker,
    pub fault_injector: FaultInjector,
    pub performance_monitor: PerformanceMonitor,
    pub violations: ViolationLog,
}

impl SafetySubsystem {
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            config,
            ffi_tracker: FfiPointerTracker::new(),
            result_tracker: ResultTracker::new(),
            fault_injector: FaultInjector::default(),
            performance_monitor: PerformanceMonitor::new(),
            violations: ViolationLog::new(),
        }
    }

    /// Runs the boundary check if enabled; reports a violation and returns
    /// `false` on failure. Returns `true` (without checking) when the
    /// checker is disabled, matching the "check gates on config" contract.
    pub fn check_bounds(&self, slice: &SliceHeader, index: usize, file: &str, line: u32, function: &str) -> bool {
        if !self.config.boundary_checks {
            return true;
        }
        let result = enhanced_boundary_check(slice, index);
        if !result.valid {
            self.violations.report(
                ViolationKind::Bounds,
                Severity::Standard,
                result.message.clone(),
                file,
                line,
                function,
                format!("attempted_index={} slice_length={}", result.attempted_index, result.slice_length),
                slice.element_size,
            );
        }
        result.valid
    }

    pub fn check_layout(&self, slice: &SliceHeader, file: &str, line: u32, function: &str) -> bool {
        if !self.config.layout_checks {
            return true;
        }
        let result = validate_slice_header(slice);
        if !result.valid {
            self.violations.report(
                ViolationKind::Bounds,
                Severity::Standard,
                result.message.clone(),
                file,
                line,
                function,
                "layout",
                slice.element_size,
            );
        }
        result.valid
    }

    pub fn check_ffi_annotation(
        &self,
        func_is_null: bool,
        args: &[FfiArg],
        expected_transfers: &[TransferMode],
        file: &str,
        line: u32,
        function: &str,
    ) -> bool {
        if !self.config.ffi_ownership_checks {
            return true;
        }
        let result = ffi::verify_ffi_annotation(func_is_null, args, expected_transfers);
        if !result.valid {
            self.violations.report(
                ViolationKind::Annotation,
                Severity::Critical,
                result.message.clone(),
                file,
                line,
                function,
                "ffi annotation",
                0,
            );
        }
        result.valid
    }

    pub fn unregister_ffi_pointer(&self, address: usize, file: &str, line: u32, function: &str) -> bool {
        match self.ffi_tracker.unregister(address) {
            Ok(()) => true,
            Err(message) => {
                self.violations.report(
                    ViolationKind::Ownership,
                    Severity::Critical,
                    message,
                    file,
                    line,
                    function,
                    "ffi unregister",
                    0,
                );
                false
            }
        }
    }

    pub fn check_exhaustiveness(
        &self,
        arms: &[MatchArm],
        scrutinee: &ResultTypeShape,
        file: &str,
        line: u32,
        function: &str,
    ) -> ExhaustivenessReport {
        let report = verify_match_exhaustiveness(arms, scrutinee);
        if self.config.pattern_exhaustiveness && report.result != Completeness::Complete {
            self.violations.report(
                ViolationKind::Exhaustiveness,
                Severity::Critical,
                format!("{:?}: missing {:?}", report.result, report.missing_patterns),
                file,
                line,
                function,
                "pattern match",
                arms.len(),
            );
        }
        report
    }

    /// Periodic sweep for unhandled `Result`s. No-op when result tracking is
    /// disabled.
    pub fn sweep_unhandled_results(&self, file: &str, function: &str) {
        if !self.config.result_tracking {
            return;
        }
        for message in self.result_tracker.check_unhandled() {
            self.violations.report(
                ViolationKind::UnhandledResult,
                Severity::Critical,
                message,
                file,
                0,
                function,
                "result tracker sweep",
                0,
            );
        }
    }

    pub fn check_constant_time(
        &self,
        name: &str,
        op: impl FnMut(),
        file: &str,
        line: u32,
    ) -> Option<security::ConstantTimeReport> {
        if !self.config.constant_time_checks {
            return None;
        }
        let report = security::verify_constant_time_operation(op);
        if !report.is_constant_time {
            self.violations.report(
                ViolationKind::ConstantTime,
                Severity::Warning,
                format!("{name}: variance ratio {:.3} exceeds threshold", report.variance_ratio),
                file,
                line,
                name,
                "constant-time check",
                0,
            );
        }
        Some(report)
    }

    pub fn check_secure_zero(&self, buf: &[u8], file: &str, line: u32, function: &str) -> bool {
        if !self.config.secure_zero_checks {
            return true;
        }
        let residual = security::validate_secure_zeroing(buf);
        if residual > 0 {
            self.violations.report(
                ViolationKind::SecureZero,
                Severity::Critical,
                format!("{residual} non-zero bytes remain after secure zeroing"),
                file,
                line,
                function,
                "secure zero",
                buf.len(),
            );
        }
        residual == 0
    }

    pub fn check_stack_canary(&self, file: &str, line: u32, function: &str) -> bool {
        if !self.config.stack_canary {
            return true;
        }
        let ok = security::check_stack_canary();
        if !ok {
            self.violations.report(
                ViolationKind::StackCanary,
                Severity::Critical,
                "stack canary missing or corrupted",
                file,
                line,
                function,
                "stack canary",
                0,
            );
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_checker_skips_violation_reporting() {
        let subsystem = SafetySubsystem::new(SafetyConfig::none());
        let slice = SliceHeader::new(std::ptr::null(), 0, 0, 1);
        assert!(subsystem.check_bounds(&slice, 5, "f.rs", 1, "g"));
        assert_eq!(subsystem.violations.count(), 0);
    }

    #[test]
    fn enabled_checker_reports_bounds_violation() {
        let subsystem = SafetySubsystem::new(SafetyConfig::paranoid());
        let slice = SliceHeader::new(std::ptr::NonNull::<u8>::dangling().as_ptr(), 3, 3, 4);
        assert!(!subsystem.check_bounds(&slice, 5, "f.rs", 1, "g"));
        assert_eq!(subsystem.violations.count(), 1);
        assert_eq!(subsystem.violations.all()[0].kind, ViolationKind::Bounds);
    }

    #[test]
    fn unregister_ffi_pointer_reports_on_untracked_address() {
        let subsystem = SafetySubsystem::new(SafetyConfig::paranoid());
        assert!(!subsystem.unregister_ffi_pointer(0xdead, "f.rs", 1, "g"));
        assert_eq!(subsystem.violations.count(), 1);
    }
}
