//! Target-triple derivation for the architectures the driver is expected to
//! target. Native targets return `None`, letting LLVM pick the host triple.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArch {
    Native,
    X86_64,
    Arm64,
    Wasm32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostOs {
    Darwin,
    Linux,
    Windows,
}

fn host_os() -> HostOs {
    if cfg!(target_os = "macos") {
        HostOs::Darwin
    } else if cfg!(target_os = "windows") {
        HostOs::Windows
    } else {
        HostOs::Linux
    }
}

/// Returns `None` for `Native` (caller omits `-mtriple`, letting LLVM infer
/// the host triple); returns a concrete triple for the named architectures,
/// distinguishing host OS where the vendor/environment components differ.
pub fn derive_target_triple(arch: TargetArch) -> Option<String> {
    match arch {
        TargetArch::Native => None,
        TargetArch::X86_64 => Some(match host_os() {
            HostOs::Darwin => "x86_64-apple-darwin".to_string(),
            HostOs::Linux => "x86_64-unknown-linux-gnu".to_string(),
            HostOs::Windows => "x86_64-pc-windows-msvc".to_string(),
        }),
        TargetArch::Arm64 => Some(match host_os() {
            HostOs::Darwin => "arm64-apple-darwin".to_string(),
            HostOs::Linux => "aarch64-unknown-linux-gnu".to_string(),
            HostOs::Windows => "aarch64-pc-windows-msvc".to_string(),
        }),
        TargetArch::Wasm32 => Some("wasm32-unknown-unknown".to_string()),
    }
}
