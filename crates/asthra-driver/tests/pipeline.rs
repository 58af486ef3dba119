//! Integration tests for the driver pipeline.
//!
//! These exercise the stage-sequencing contract (relocation validation
//! gates the LLVM invocation, timings land in the statistics registry)
//! without requiring a real `llc`/`opt`/`clang` toolchain on the test host.

use std::sync::Arc;

use asthra_codegen::elf::{ElfWriter, SectionType};
use asthra_codegen::orchestrator::{CompilerOptions, OutputFormat};
use asthra_codegen::relocation::RelocationManager;
use asthra_driver::{CompileUnitRequest, Driver};
use asthra_runtime::stats::StatisticsRegistry;

#[test]
fn driver_reports_tool_availability_without_a_real_toolchain() {
    let stats = Arc::new(StatisticsRegistry::new());
    stats.init();
    let driver = Driver::new(stats);
    // No assumption about whether LLVM is actually installed on the test
    // host — this just exercises that the call doesn't panic and agrees
    // with itself.
    let available = driver.tools_available();
    assert_eq!(available, driver.tool_path("llc").is_some() && driver.tool_path("opt").is_some() && driver.tool_path("clang").is_some());
}

#[test]
fn invalid_relocation_table_blocks_the_pipeline_before_spawning_tools() {
    let stats = Arc::new(StatisticsRegistry::new());
    stats.init();
    let driver = Driver::new(stats.clone());

    let mut writer = ElfWriter::new();
    let data_section = writer.add_section(".data", SectionType::ProgBits, 0x3, 8);
    let mut reloc = RelocationManager::new();
    reloc.add_absolute(data_section, 0, 42, 0); // no symbol 42 registered

    let request = CompileUnitRequest {
        ir_file: "does-not-exist.ll".into(),
        output_file: "does-not-exist".into(),
        format: OutputFormat::Object,
        options: CompilerOptions::default(),
        lines_compiled: 5,
    };

    let result = driver.compile_unit(&request, &reloc, &mut writer, data_section);
    assert!(result.is_err());
    assert_eq!(stats.snapshot().performance.compilation_count, 0);
}

#[test]
fn valid_empty_relocation_table_grows_the_relocation_section() {
    let stats = Arc::new(StatisticsRegistry::new());
    stats.init();
    let driver = Driver::new(stats);

    let mut writer = ElfWriter::new();
    let reloc_section = writer.add_section(".rela.text", SectionType::Rela, 0, 8);
    let reloc = RelocationManager::new();

    // Empty table validates trivially; we only check that the relocation
    // section ends up present (zero bytes) and tool invocation is what
    // fails (no LLVM on most test hosts), not validation.
    let request = CompileUnitRequest {
        ir_file: "unused.ll".into(),
        output_file: "unused".into(),
        format: OutputFormat::Object,
        options: CompilerOptions::default(),
        lines_compiled: 1,
    };
    let result = driver.compile_unit(&request, &reloc, &mut writer, reloc_section);
    // Either the toolchain is missing (ToolNotFound-style failure) or the
    // input file is missing — both are acceptable on a host with no LLVM;
    // the point of this test is that relocation validation itself did not
    // reject an empty, trivially-valid table.
    if result.is_err() {
        assert!(writer.section(reloc_section).unwrap().data.is_empty());
    }
}
