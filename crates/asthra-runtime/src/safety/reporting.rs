//! The common violation sink every safety checker reports through. Safety
//! violations never unwind — they're recorded here and, above a severity
//! threshold, logged.

use std::sync::Mutex;

use crate::atomics::monotonic_now_ns;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Standard,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Bounds,
    Ownership,
    Transfer,
    Annotation,
    TypeSafety,
    Exhaustiveness,
    ConstantTime,
    StackCanary,
    UnhandledResult,
    SecureZero,
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub function: String,
    pub context: String,
    pub size: usize,
    pub timestamp_ns: u64,
}

/// Accumulates every reported violation for later inspection (tests,
/// reporting tools). Violations at `Standard` severity or above are also
/// logged immediately.
#[derive(Default)]
pub struct ViolationLog {
    entries: Mutex<Vec<Violation>>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn report(
        &self,
        kind: ViolationKind,
        severity: Severity,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        function: impl Into<String>,
        context: impl Into<String>,
        size: usize,
    ) {
        let violation = Violation {
            kind,
            severity,
            message: message.into(),
            file: file.into(),
            line,
            function: function.into(),
            context: context.into(),
            size,
            timestamp_ns: monotonic_now_ns(),
        };
        if violation.severity >= Severity::Standard {
            match violation.severity {
                Severity::Critical => log::error!(
                    "[{:?}] {} ({}:{} in {})",
                    violation.kind,
                    violation.message,
                    violation.file,
                    violation.line,
                    violation.function
                ),
                _ => log::warn!(
                    "[{:?}] {} ({}:{} in {})",
                    violation.kind,
                    violation.message,
                    violation.file,
                    violation.line,
                    violation.function
                ),
            }
        }
        self.entries.lock().expect("violation log mutex poisoned").push(violation);
    }

    pub fn all(&self) -> Vec<Violation> {
        self.entries.lock().expect("violation log mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().expect("violation log mutex poisoned").len()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("violation log mutex poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_accumulates_and_orders_by_call() {
        let log = ViolationLog::new();
        log.report(
            ViolationKind::Bounds,
            Severity::Warning,
            "index out of range",
            "slice.rs",
            10,
            "index",
            "",
            0,
        );
        log.report(
            ViolationKind::UnhandledResult,
            Severity::Critical,
            "result never handled",
            "result.rs",
            20,
            "check",
            "",
            0,
        );
        let all = log.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, ViolationKind::Bounds);
        assert_eq!(all[1].severity, Severity::Critical);
    }
}
