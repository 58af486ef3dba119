//! Output filename derivation: keep the pre-extension portion of the input
//! path and append the extension that matches the requested format.

use std::path::{Path, PathBuf};

use super::OutputFormat;

/// `output_filename(x.ll, LlvmIrText) = x.ll`, `output_filename(x.ll, Object)
/// = x.o`, `output_filename(x, Executable) = x` (no extension).
pub fn output_filename(input: &Path, format: OutputFormat) -> PathBuf {
    match format {
        OutputFormat::LlvmIrText => input.with_extension("ll"),
        OutputFormat::LlvmIrBitcode => input.with_extension("bc"),
        OutputFormat::Assembly => input.with_extension("s"),
        OutputFormat::Object => input.with_extension("o"),
        OutputFormat::Executable => input.with_extension(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_text_roundtrips_extension() {
        assert_eq!(output_filename(Path::new("x.ll"), OutputFormat::LlvmIrText), PathBuf::from("x.ll"));
    }

    #[test]
    fn object_replaces_extension() {
        assert_eq!(output_filename(Path::new("x.ll"), OutputFormat::Object), PathBuf::from("x.o"));
    }

    #[test]
    fn executable_drops_extension() {
        assert_eq!(output_filename(Path::new("x"), OutputFormat::Executable), PathBuf::from("x"));
        assert_eq!(output_filename(Path::new("x.ll"), OutputFormat::Executable), PathBuf::from("x"));
    }
}
