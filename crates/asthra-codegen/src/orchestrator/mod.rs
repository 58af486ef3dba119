//! LLVM tool orchestration: locating `opt`/`llc`/`clang` in the search
//! path, spawning them with the right flags, and gluing IR -> opt -> codegen
//! -> link into one pipeline.

mod filenames;
mod target;

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

pub use filenames::output_filename;
pub use target::{derive_target_triple, TargetArch};

use crate::error::{Error, Result};

/// Optimization level, mapping bijectively onto LLVM's `-O0`..`-O3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptLevel {
    None,
    Basic,
    Standard,
    Aggressive,
}

impl OptLevel {
    pub fn as_flag(self) -> &'static str {
        match self {
            OptLevel::None => "-O0",
            OptLevel::Basic => "-O1",
            OptLevel::Standard => "-O2",
            OptLevel::Aggressive => "-O3",
        }
    }
}

/// Desired artifact shape, used both for filename derivation and to pick
/// which tools a `compile_pipeline` run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    LlvmIrText,
    LlvmIrBitcode,
    Assembly,
    Object,
    Executable,
}

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub opt_level: OptLevel,
    pub target_arch: Option<TargetArch>,
    pub target_triple: Option<String>,
    pub debug_info: bool,
    pub verbose: bool,
    pub output_format: OutputFormat,
    pub cpu: Option<String>,
    pub features: Option<String>,
    pub pass_pipeline: Option<String>,
    pub libs: Vec<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::Standard,
            target_arch: None,
            target_triple: None,
            debug_info: false,
            verbose: false,
            output_format: OutputFormat::Executable,
            cpu: None,
            features: None,
            pass_pipeline: None,
            libs: Vec::new(),
        }
    }
}

/// Outcome of spawning a single child tool.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed_ms: u64,
}

const LLVM_TOOLS: [&str; 3] = ["llc", "opt", "clang"];

/// Resolves tools by linearly walking `PATH`, the way `which`/`command_exists`
/// helpers do it elsewhere in this codebase, just without shelling out.
pub struct LlvmOrchestrator {
    search_path: Vec<PathBuf>,
}

impl LlvmOrchestrator {
    pub fn new() -> Self {
        let search_path = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        Self { search_path }
    }

    pub fn with_search_path(search_path: Vec<PathBuf>) -> Self {
        Self { search_path }
    }

    /// Resolved absolute path of `name`, searching each `PATH` entry in
    /// order. Checks the bare name and, on Windows, the `.exe` suffix.
    pub fn tool_path(&self, name: &str) -> Option<PathBuf> {
        for dir in &self.search_path {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            let exe_candidate = dir.join(format!("{name}.exe"));
            if exe_candidate.is_file() {
                return Some(exe_candidate);
            }
        }
        None
    }

    /// True iff `llc`, `opt`, and `clang` are all found in the search path.
    pub fn tools_available(&self) -> bool {
        LLVM_TOOLS.iter().all(|tool| self.tool_path(tool).is_some())
    }

    /// Runs `llc --version` and extracts the token following "LLVM version".
    pub fn version(&self) -> Result<String> {
        let llc = self.tool_path("llc").ok_or_else(|| Error::ToolNotFound("llc".into()))?;
        let result = spawn_capturing(&llc, &["--version"], true)?;
        let stdout = String::from_utf8_lossy(&result.stdout);
        stdout
            .split("LLVM version")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
            .ok_or_else(|| Error::Resource("could not parse LLVM version from llc output".into()))
    }

    /// Spawns `opt` with flags derived from `options`.
    pub fn optimize(&self, input: &Path, output: &Path, options: &CompilerOptions) -> Result<ToolResult> {
        let opt = self.tool_path("opt").ok_or_else(|| Error::ToolNotFound("opt".into()))?;
        let mut args: Vec<String> = vec![
            input.display().to_string(),
            "-o".into(),
            output.display().to_string(),
            options.opt_level.as_flag().into(),
        ];
        if options.debug_info {
            args.push("-debugify".into());
        }
        if let Some(pipeline) = &options.pass_pipeline {
            args.push("-passes".into());
            args.push(pipeline.clone());
        }
        if matches!(options.output_format, OutputFormat::LlvmIrText) {
            args.push("-S".into());
        }
        spawn_capturing(&opt, &args, options.verbose)
    }

    /// `opt`, forcing text-IR emit and an explicit pass pipeline.
    pub fn run_passes(&self, input: &Path, passes: &str, output: &Path) -> Result<ToolResult> {
        let opt = self.tool_path("opt").ok_or_else(|| Error::ToolNotFound("opt".into()))?;
        let args = [
            input.display().to_string(),
            "-o".into(),
            output.display().to_string(),
            "-passes".into(),
            passes.to_string(),
            "-S".into(),
        ];
        spawn_capturing(&opt, &args, false)
    }

    /// Spawns `llc`, producing assembly or an object file per
    /// `options.output_format`.
    pub fn compile(&self, input: &Path, output: &Path, options: &CompilerOptions) -> Result<ToolResult> {
        let llc = self.tool_path("llc").ok_or_else(|| Error::ToolNotFound("llc".into()))?;
        let filetype = match options.output_format {
            OutputFormat::Assembly => "asm",
            _ => "obj",
        };
        let mut args: Vec<String> = vec![
            input.display().to_string(),
            "-o".into(),
            output.display().to_string(),
            options.opt_level.as_flag().into(),
            "-filetype".into(),
            filetype.into(),
        ];
        let triple = options
            .target_triple
            .clone()
            .or_else(|| options.target_arch.map(derive_target_triple).flatten());
        if let Some(triple) = triple {
            args.push("-mtriple".into());
            args.push(triple);
        }
        if let Some(cpu) = &options.cpu {
            args.push("-mcpu".into());
            args.push(cpu.clone());
        }
        if let Some(features) = &options.features {
            args.push("-mattr".into());
            args.push(features.clone());
        }
        spawn_capturing(&llc, &args, options.verbose)
    }

    /// Spawns `clang` to link `objects` into `output`.
    pub fn link(&self, objects: &[PathBuf], output: &Path, options: &CompilerOptions) -> Result<ToolResult> {
        let clang = self.tool_path("clang").ok_or_else(|| Error::ToolNotFound("clang".into()))?;
        let mut args: Vec<String> = objects.iter().map(|o| o.display().to_string()).collect();
        args.push("-o".into());
        args.push(output.display().to_string());
        args.push(options.opt_level.as_flag().into());
        if let Some(triple) = &options.target_triple {
            args.push("-target".into());
            args.push(triple.clone());
        }
        for lib in &options.libs {
            args.push(format!("-l{lib}"));
        }
        spawn_capturing(&clang, &args, options.verbose)
    }

    /// Glue routine: IR in, artifact matching `format` out.
    ///
    /// - `format = LlvmIrText` and `opt = None` just copies the input.
    /// - Otherwise optimizes into a temp bitcode file (`<input>.bc`), then
    ///   renames (IR), compiles (asm/obj), or compiles-then-links (exe).
    /// - Every temp file created along the way is removed before returning,
    ///   on both the success and failure paths.
    pub fn compile_pipeline(
        &self,
        ir_file: &Path,
        output_file: &Path,
        format: OutputFormat,
        options: &CompilerOptions,
    ) -> Result<ToolResult> {
        let start = Instant::now();
        if matches!(format, OutputFormat::LlvmIrText) && matches!(options.opt_level, OptLevel::None) {
            std::fs::copy(ir_file, output_file)?;
            return Ok(ToolResult {
                success: true,
                exit_code: Some(0),
                stdout: Vec::new(),
                stderr: Vec::new(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }

        let bc_path = ir_file.with_extension("bc");
        let cleanup = |path: &Path| {
            let _ = std::fs::remove_file(path);
        };

        let opt_result = self.optimize(ir_file, &bc_path, options);
        let opt_result = match opt_result {
            Ok(r) if r.success => r,
            Ok(r) => {
                cleanup(&bc_path);
                return Ok(r);
            }
            Err(e) => {
                cleanup(&bc_path);
                return Err(e);
            }
        };

        let result = match format {
            OutputFormat::LlvmIrText | OutputFormat::LlvmIrBitcode => {
                std::fs::rename(&bc_path, output_file)?;
                Ok(opt_result)
            }
            OutputFormat::Assembly | OutputFormat::Object => {
                self.compile(&bc_path, output_file, options)
            }
            OutputFormat::Executable => {
                let obj_path = ir_file.with_extension("o");
                let obj_options = CompilerOptions {
                    output_format: OutputFormat::Object,
                    ..options.clone()
                };
                let compile_result = self.compile(&bc_path, &obj_path, &obj_options);
                let link_result = match compile_result {
                    Ok(r) if r.success => self.link(&[obj_path.clone()], output_file, options),
                    other => other,
                };
                cleanup(&obj_path);
                link_result
            }
        };
        cleanup(&bc_path);
        result
    }
}

impl Default for LlvmOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns `program` with `args`, capturing stdout/stderr only when
/// `capture` is requested (avoiding pipe-buffer deadlock for invocations
/// that produce little output and don't need it captured at all).
fn spawn_capturing(program: &Path, args: &[impl AsRef<std::ffi::OsStr>], capture: bool) -> Result<ToolResult> {
    log::debug!("spawning {}", program.display());
    let start = Instant::now();
    let mut command = Command::new(program);
    command.args(args);
    if capture {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }
    let child = command.spawn()?;
    // `wait_with_output` drains stdout and stderr concurrently, so a child
    // that fills one pipe's buffer while the parent is still reading the
    // other can't deadlock.
    let output = child.wait_with_output()?;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    if !output.status.success() {
        log::warn!("{} exited with {:?} after {elapsed_ms}ms", program.display(), output.status.code());
    }
    Ok(ToolResult {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: output.stdout,
        stderr: output.stderr,
        elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_path_finds_bare_executable_on_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("opt");
        std::fs::write(&tool, b"#!/bin/sh\n").unwrap();
        let orchestrator = LlvmOrchestrator::with_search_path(vec![dir.path().to_path_buf()]);
        assert_eq!(orchestrator.tool_path("opt"), Some(tool));
    }

    #[test]
    fn tools_available_false_when_missing_from_empty_path() {
        let orchestrator = LlvmOrchestrator::with_search_path(vec![]);
        assert!(!orchestrator.tools_available());
    }

    #[test]
    fn opt_level_flags_are_bijective() {
        let pairs = [
            (OptLevel::None, "-O0"),
            (OptLevel::Basic, "-O1"),
            (OptLevel::Standard, "-O2"),
            (OptLevel::Aggressive, "-O3"),
        ];
        for (level, flag) in pairs {
            assert_eq!(level.as_flag(), flag);
        }
    }
}
