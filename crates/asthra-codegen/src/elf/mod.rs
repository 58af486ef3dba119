//! ELF object emission: string/symbol/section tables and the heuristic
//! debug-section size accessors.
//!
//! Not a general-purpose ELF library — only the surface the relocation
//! manager and driver need to finalize one compile unit's object file.

mod debug;
mod section;
mod strtab;
mod symtab;

pub use debug::DebugSizeEstimate;
pub use section::{Section, SectionType};
pub use symtab::{Symbol, SymbolBinding, SymbolType};

use strtab::StringTable;
use symtab::SymbolTable;

/// Owns the string, symbol, and section tables for one object file under
/// construction. Not thread-safe — used from a single driver thread.
pub struct ElfWriter {
    strings: StringTable,
    symbols: SymbolTable,
    sections: Vec<Section>,
}

impl ElfWriter {
    /// Section zero and symbol zero are the reserved null entries; the
    /// string table starts with its single leading null byte.
    pub fn new() -> Self {
        let mut sections = Vec::new();
        sections.push(Section::null());
        Self {
            strings: StringTable::new(),
            symbols: SymbolTable::new(),
            sections,
        }
    }

    /// Appends `s` to the string table, returning its byte offset.
    pub fn add_string(&mut self, s: &str) -> u32 {
        self.strings.add(s)
    }

    pub fn add_section(&mut self, name: &str, section_type: SectionType, flags: u64, align: u64) -> u16 {
        let name_index = self.add_string(name);
        let index = self.sections.len() as u16;
        self.sections.push(Section {
            name_index,
            section_type,
            flags,
            virtual_address: 0,
            file_offset: 0,
            size: 0,
            link: 0,
            info: 0,
            align,
            entry_size: 0,
            data: Vec::new(),
        });
        index
    }

    pub fn section(&self, index: u16) -> Option<&Section> {
        self.sections.get(index as usize)
    }

    pub fn section_mut(&mut self, index: u16) -> Option<&mut Section> {
        self.sections.get_mut(index as usize)
    }

    pub fn find_section_by_name(&self, name: &str) -> Option<u16> {
        self.sections
            .iter()
            .enumerate()
            .find(|(_, s)| self.strings.get(s.name_index) == Some(name))
            .map(|(i, _)| i as u16)
    }

    /// Appends `bytes` to a section's owned data buffer, growing it.
    pub fn grow_section(&mut self, index: u16, bytes: &[u8]) {
        if let Some(section) = self.sections.get_mut(index as usize) {
            section.data.extend_from_slice(bytes);
            section.size = section.data.len() as u64;
        }
    }

    pub fn add_symbol(
        &mut self,
        name: &str,
        value: u64,
        size: u64,
        binding: SymbolBinding,
        sym_type: SymbolType,
        section_index: u16,
    ) -> u32 {
        let name_index = self.add_string(name);
        self.symbols.add(Symbol {
            name_index,
            value,
            size,
            binding,
            sym_type,
            section_index,
            visibility: None,
        })
    }

    pub fn symbol(&self, index: u32) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    pub fn find_symbol_by_name(&self, name: &str) -> Option<u32> {
        self.symbols.find_by_name(&self.strings, name)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Heuristic sub-section size estimates, as fractions of the total
    /// debug-info section size. These are upper-bound approximations, not
    /// an actual DWARF compile-unit/DIE parse — see design notes.
    pub fn debug_size_estimate(&self, debug_info_section: u16) -> Option<DebugSizeEstimate> {
        let section = self.section(debug_info_section)?;
        Some(debug::estimate(section.size))
    }
}

impl Default for ElfWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_writer_has_reserved_null_section() {
        let writer = ElfWriter::new();
        assert_eq!(writer.section_count(), 1);
        assert_eq!(writer.section(0).unwrap().section_type, SectionType::Null);
    }

    #[test]
    fn add_and_find_section_by_name() {
        let mut writer = ElfWriter::new();
        let index = writer.add_section(".text", SectionType::ProgBits, 0x6, 16);
        assert_eq!(writer.find_section_by_name(".text"), Some(index));
    }

    #[test]
    fn grow_section_accumulates_bytes_and_updates_size() {
        let mut writer = ElfWriter::new();
        let index = writer.add_section(".data", SectionType::ProgBits, 0x3, 8);
        writer.grow_section(index, &[1, 2, 3]);
        writer.grow_section(index, &[4, 5]);
        assert_eq!(writer.section(index).unwrap().data, vec![1, 2, 3, 4, 5]);
        assert_eq!(writer.section(index).unwrap().size, 5);
    }

    #[test]
    fn add_and_find_symbol_by_name() {
        let mut writer = ElfWriter::new();
        let text = writer.add_section(".text", SectionType::ProgBits, 0x6, 16);
        let sym = writer.add_symbol("main", 0, 64, SymbolBinding::Global, SymbolType::Func, text);
        assert_eq!(writer.find_symbol_by_name("main"), Some(sym));
    }
}
