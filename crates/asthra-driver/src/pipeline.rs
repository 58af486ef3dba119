//! Driver pipeline: sequences the LLVM orchestrator, relocation manager,
//! and ELF writer end-to-end for one compile unit, recording each stage's
//! elapsed time into the statistics registry and deleting temporary files
//! after use.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use asthra_codegen::elf::ElfWriter;
use asthra_codegen::orchestrator::{CompilerOptions, LlvmOrchestrator, OutputFormat, ToolResult};
use asthra_codegen::relocation::RelocationManager;
use asthra_runtime::stats::StatisticsRegistry;

use crate::error::{Error, Result};

/// One compile unit's inputs: the textual/bitcode IR produced by the
/// front end, the desired output, and how many source lines it represents
/// (recorded into the statistics registry alongside the timing).
pub struct CompileUnitRequest {
    pub ir_file: PathBuf,
    pub output_file: PathBuf,
    pub format: OutputFormat,
    pub options: CompilerOptions,
    pub lines_compiled: u64,
}

pub struct CompileUnitOutcome {
    pub tool_result: ToolResult,
    pub relocation_section: Vec<u8>,
}

/// Sequences C5 (LLVM orchestrator) -> C6 (relocation manager) -> C7 (ELF
/// writer) and reports timings to C2 (statistics registry).
pub struct Driver {
    orchestrator: LlvmOrchestrator,
    stats: Arc<StatisticsRegistry>,
}

impl Driver {
    pub fn new(stats: Arc<StatisticsRegistry>) -> Self {
        Self {
            orchestrator: LlvmOrchestrator::new(),
            stats,
        }
    }

    /// Runs one compile unit through the full pipeline:
    ///
    /// 1. Validates the relocation table against the ELF writer's symbol
    ///    count (C6).
    /// 2. Serializes the relocation section and grows it into the ELF
    ///    writer's owned relocation section data (C6 -> C7).
    /// 3. Drives `opt`/`llc`/`clang` through the compile pipeline (C5).
    /// 4. Records the wall-clock elapsed time into the statistics registry.
    pub fn compile_unit(
        &self,
        request: &CompileUnitRequest,
        reloc: &RelocationManager,
        writer: &mut ElfWriter,
        reloc_section: u16,
    ) -> Result<CompileUnitOutcome> {
        reloc
            .validate_relocation_table(writer.symbol_count() as u32)
            .map_err(|e| Error::InvalidRelocationTable(e.to_string()))?;

        let relocation_section = reloc.generate_relocation_section_data(reloc_section);
        writer.grow_section(reloc_section, &relocation_section);

        log::debug!(
            "compiling {} -> {} ({} relocations)",
            request.ir_file.display(),
            request.output_file.display(),
            reloc.len()
        );
        let start = Instant::now();
        let tool_result = self
            .orchestrator
            .compile_pipeline(&request.ir_file, &request.output_file, request.format, &request.options)?;
        let elapsed_ns = start.elapsed().as_nanos() as u64;

        self.stats.update_compilation(elapsed_ns, 1, request.lines_compiled);
        if !tool_result.success {
            log::warn!("compile unit {} failed: exit code {:?}", request.ir_file.display(), tool_result.exit_code);
        }

        Ok(CompileUnitOutcome { tool_result, relocation_section })
    }

    pub fn tools_available(&self) -> bool {
        self.orchestrator.tools_available()
    }

    pub fn tool_path(&self, name: &str) -> Option<PathBuf> {
        self.orchestrator.tool_path(name)
    }
}

/// Deletes a batch of temporary files, ignoring individual failures — used
/// by callers that assembled a set of intermediate artifacts outside the
/// orchestrator's own pipeline cleanup (which already handles its own
/// `.bc`/`.o` temporaries).
pub fn cleanup_temp_files(paths: &[PathBuf]) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asthra_codegen::elf::SectionType;

    #[test]
    fn compile_unit_rejects_invalid_relocation_table() {
        let stats = Arc::new(StatisticsRegistry::new());
        stats.init();
        let driver = Driver::new(stats);
        let mut writer = ElfWriter::new();
        let data = writer.add_section(".data", SectionType::ProgBits, 0x3, 8);
        let mut reloc = RelocationManager::new();
        reloc.add_absolute(data, 0, 99, 0); // symbol 99 does not exist

        let request = CompileUnitRequest {
            ir_file: PathBuf::from("unused.ll"),
            output_file: PathBuf::from("unused"),
            format: OutputFormat::Object,
            options: CompilerOptions::default(),
            lines_compiled: 10,
        };
        let result = driver.compile_unit(&request, &reloc, &mut writer, data);
        assert!(result.is_err());
    }

    #[test]
    fn cleanup_temp_files_ignores_missing_paths() {
        cleanup_temp_files(&[PathBuf::from("/nonexistent/path/should/not/panic")]);
    }
}
