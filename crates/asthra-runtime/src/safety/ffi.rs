//! FFI ownership tracking and variadic/annotation verification.
//!
//! The tracker is a flat growable array keyed by raw address, per the
//! design notes — a hash map would be a strict improvement but the spec's
//! contract is explicitly O(n) lookup, so we keep the straightforward
//! `Vec` + linear scan rather than reaching for a faster structure the spec
//! doesn't ask for.

use std::sync::Mutex;

use crate::atomics::monotonic_now_ns;

/// FFI ownership transfer mode at a call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Full,
    None,
    Borrowed,
}

/// Hint about which allocator/owner is responsible for a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipHint {
    Gc,
    C,
    Pinned,
}

#[derive(Debug, Clone)]
pub struct FfiPointerRecord {
    pub address: usize,
    pub size: usize,
    pub transfer: TransferMode,
    pub ownership: OwnershipHint,
    pub is_borrowed: bool,
    pub creation_time_ns: u64,
    pub last_access_time_ns: u64,
    pub source_label: String,
    pub source_line: u32,
    pub owning_thread: std::thread::ThreadId,
    pub refcount: u32,
}

/// Flat table of tracked FFI pointers, guarded by a single mutex.
#[derive(Default)]
pub struct FfiPointerTracker {
    entries: Mutex<Vec<FfiPointerRecord>>,
}

impl FfiPointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &self,
        address: usize,
        size: usize,
        transfer: TransferMode,
        ownership: OwnershipHint,
        is_borrowed: bool,
        source_label: impl Into<String>,
        source_line: u32,
    ) {
        let now = monotonic_now_ns();
        let record = FfiPointerRecord {
            address,
            size,
            transfer,
            ownership,
            is_borrowed,
            creation_time_ns: now,
            last_access_time_ns: now,
            source_label: source_label.into(),
            source_line,
            owning_thread: std::thread::current().id(),
            refcount: 1,
        };
        self.entries.lock().expect("ffi tracker mutex poisoned").push(record);
    }

    /// Fetch-subs the refcount; removes the entry once it drops to zero.
    /// Returns an error if `address` is not tracked.
    pub fn unregister(&self, address: usize) -> Result<(), String> {
        let mut entries = self.entries.lock().expect("ffi tracker mutex poisoned");
        match entries.iter().position(|e| e.address == address) {
            Some(pos) => {
                let prior = entries[pos].refcount;
                if prior <= 1 {
                    entries.remove(pos);
                } else {
                    entries[pos].refcount -= 1;
                }
                Ok(())
            }
            None => Err(format!("untracked pointer 0x{address:x} unregistered")),
        }
    }

    /// Returns a copy of the tracked record, updating its last-access-time.
    /// Per design notes §9, we resolve the "race on get_ffi_pointer_info"
    /// open question by returning an owned copy rather than a reference
    /// held past the mutex guard.
    pub fn get_info(&self, address: usize) -> Option<FfiPointerRecord> {
        let mut entries = self.entries.lock().expect("ffi tracker mutex poisoned");
        let entry = entries.iter_mut().find(|e| e.address == address)?;
        entry.last_access_time_ns = monotonic_now_ns();
        Some(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("ffi tracker mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One FFI call argument, as seen by `verify_ffi_annotation`.
#[derive(Debug, Clone, Copy)]
pub struct FfiArg {
    pub is_null: bool,
    pub transfer: TransferMode,
    pub is_borrowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationCheckResult {
    pub valid: bool,
    pub message: String,
}

fn ok_annotation() -> AnnotationCheckResult {
    AnnotationCheckResult {
        valid: true,
        message: String::new(),
    }
}

fn fail_annotation(message: impl Into<String>) -> AnnotationCheckResult {
    AnnotationCheckResult {
        valid: false,
        message: message.into(),
    }
}

/// Checks: function non-null, each arg's nullness matches its transfer
/// requirement, and no `transfer_full` on a borrowed pointer.
pub fn verify_ffi_annotation(
    func_is_null: bool,
    args: &[FfiArg],
    expected_transfers: &[TransferMode],
) -> AnnotationCheckResult {
    if func_is_null {
        return fail_annotation("function pointer is null");
    }
    if args.len() != expected_transfers.len() {
        return fail_annotation(format!(
            "argument count {} does not match expected transfer count {}",
            args.len(),
            expected_transfers.len()
        ));
    }
    for (i, (arg, expected)) in args.iter().zip(expected_transfers).enumerate() {
        if *expected != TransferMode::None && arg.is_null {
            return fail_annotation(format!(
                "argument {i} is null but declares transfer mode {expected:?}"
            ));
        }
        if arg.transfer == TransferMode::Full && arg.is_borrowed {
            return fail_annotation(format!(
                "argument {i} declares transfer_full on a borrowed pointer"
            ));
        }
    }
    ok_annotation()
}

/// One variadic argument's runtime type tag, as seen by
/// `validate_variadic_call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariadicType {
    Int,
    Float,
    Bool,
    Pointer { is_null: bool },
    Str,
}

/// Arity match and pairwise type-tag equality; pointer-typed values must not
/// be null.
pub fn validate_variadic_call(
    args: &[VariadicType],
    expected_types: &[VariadicType],
) -> AnnotationCheckResult {
    if args.len() != expected_types.len() {
        return fail_annotation(format!(
            "arity mismatch: got {} args, expected {}",
            args.len(),
            expected_types.len()
        ));
    }
    for (i, (arg, expected)) in args.iter().zip(expected_types).enumerate() {
        let same_tag = std::mem::discriminant(arg) == std::mem::discriminant(expected);
        if !same_tag {
            return fail_annotation(format!("argument {i} type tag mismatch: {arg:?} vs {expected:?}"));
        }
        if let VariadicType::Pointer { is_null: true } = arg {
            return fail_annotation(format!("argument {i} is a null pointer"));
        }
    }
    ok_annotation()
}
