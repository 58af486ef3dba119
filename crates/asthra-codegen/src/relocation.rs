//! Relocation manager: typed relocation entries, section grouping, and
//! serialization to the wire layout consumed by the ELF writer.

use crate::error::{Error, Result};

/// Relocation type tag. Ordinal order is the tie-break used when serializing
/// (sorted by offset, ties broken by type ordinal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelocationType {
    Absolute64,
    PcRelative32,
    RelativeCall,
    GotEntry,
    PltEntry,
    FfiCall,
    PatternMatchJump,
    StringOpCall,
    SliceBoundsCheck,
    SpawnCall,
}

/// Optional Asthra-specific metadata identifying which source construct
/// produced a relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsthraMetadata {
    pub construct: String,
    pub source_line: u32,
}

#[derive(Debug, Clone)]
pub struct Relocation {
    pub offset: u64,
    pub reloc_type: RelocationType,
    pub symbol_index: u32,
    pub addend: i64,
    pub section: u16,
    pub metadata: Option<AsthraMetadata>,
}

/// Owns the growable relocation table for one object file under
/// construction. Not thread-safe by design — the driver uses it from a
/// single thread, per the concurrency contract.
#[derive(Default)]
pub struct RelocationManager {
    entries: Vec<Relocation>,
}

impl RelocationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_relocation(
        &mut self,
        section: u16,
        offset: u64,
        reloc_type: RelocationType,
        symbol_index: u32,
        addend: i64,
    ) -> usize {
        self.entries.push(Relocation {
            offset,
            reloc_type,
            symbol_index,
            addend,
            section,
            metadata: None,
        });
        self.entries.len() - 1
    }

    fn add_with_metadata(
        &mut self,
        section: u16,
        offset: u64,
        reloc_type: RelocationType,
        symbol_index: u32,
        addend: i64,
        construct: &str,
        source_line: u32,
    ) -> usize {
        let index = self.add_relocation(section, offset, reloc_type, symbol_index, addend);
        self.entries[index].metadata = Some(AsthraMetadata {
            construct: construct.to_string(),
            source_line,
        });
        index
    }

    pub fn add_ffi_call(&mut self, section: u16, offset: u64, symbol_index: u32, source_line: u32) -> usize {
        self.add_with_metadata(section, offset, RelocationType::FfiCall, symbol_index, 0, "ffi_call", source_line)
    }

    pub fn add_pattern_match(&mut self, section: u16, offset: u64, symbol_index: u32, source_line: u32) -> usize {
        self.add_with_metadata(
            section,
            offset,
            RelocationType::PatternMatchJump,
            symbol_index,
            0,
            "pattern_match",
            source_line,
        )
    }

    pub fn add_string_op(&mut self, section: u16, offset: u64, symbol_index: u32, source_line: u32) -> usize {
        self.add_with_metadata(section, offset, RelocationType::StringOpCall, symbol_index, 0, "string_op", source_line)
    }

    pub fn add_slice_bounds(&mut self, section: u16, offset: u64, symbol_index: u32, source_line: u32) -> usize {
        self.add_with_metadata(
            section,
            offset,
            RelocationType::SliceBoundsCheck,
            symbol_index,
            0,
            "slice_bounds",
            source_line,
        )
    }

    pub fn add_spawn(&mut self, section: u16, offset: u64, symbol_index: u32, source_line: u32) -> usize {
        self.add_with_metadata(section, offset, RelocationType::SpawnCall, symbol_index, 0, "spawn", source_line)
    }

    pub fn add_relative_call(&mut self, section: u16, offset: u64, symbol_index: u32, addend: i64) -> usize {
        self.add_relocation(section, offset, RelocationType::RelativeCall, symbol_index, addend)
    }

    pub fn add_absolute(&mut self, section: u16, offset: u64, symbol_index: u32, addend: i64) -> usize {
        self.add_relocation(section, offset, RelocationType::Absolute64, symbol_index, addend)
    }

    pub fn add_pc_relative(&mut self, section: u16, offset: u64, symbol_index: u32, addend: i64) -> usize {
        self.add_relocation(section, offset, RelocationType::PcRelative32, symbol_index, addend)
    }

    pub fn add_got(&mut self, section: u16, offset: u64, symbol_index: u32) -> usize {
        self.add_relocation(section, offset, RelocationType::GotEntry, symbol_index, 0)
    }

    pub fn add_plt(&mut self, section: u16, offset: u64, symbol_index: u32) -> usize {
        self.add_relocation(section, offset, RelocationType::PltEntry, symbol_index, 0)
    }

    pub fn find_relocation_by_offset(&self, section: u16, offset: u64) -> Option<&Relocation> {
        self.entries.iter().find(|r| r.section == section && r.offset == offset)
    }

    pub fn find_relocations_by_symbol(&self, symbol_index: u32) -> Vec<&Relocation> {
        self.entries.iter().filter(|r| r.symbol_index == symbol_index).collect()
    }

    pub fn update_relocation_addend(&mut self, section: u16, offset: u64, addend: i64) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|r| r.section == section && r.offset == offset)
            .ok_or_else(|| Error::NotFound(format!("no relocation at section {section} offset {offset}")))?;
        entry.addend = addend;
        Ok(())
    }

    pub fn get_relocations_by_type(&self, reloc_type: RelocationType) -> Vec<&Relocation> {
        self.entries.iter().filter(|r| r.reloc_type == reloc_type).collect()
    }

    pub fn count_relocations_for_section(&self, section: u16) -> usize {
        self.entries.iter().filter(|r| r.section == section).count()
    }

    /// Every relocation must reference a valid symbol index (< `symbol_count`)
    /// and a valid section offset; each (offset, type) pair must be unique
    /// per section.
    pub fn validate_relocation_table(&self, symbol_count: u32) -> Result<()> {
        let mut seen: Vec<(u16, u64, RelocationType)> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.symbol_index >= symbol_count {
                return Err(Error::NotFound(format!(
                    "relocation at section {} offset {} references out-of-range symbol {}",
                    entry.section, entry.offset, entry.symbol_index
                )));
            }
            let key = (entry.section, entry.offset, entry.reloc_type);
            if seen.contains(&key) {
                return Err(Error::Configuration(format!(
                    "duplicate relocation (section={}, offset={}, type={:?})",
                    entry.section, entry.offset, entry.reloc_type
                )));
            }
            seen.push(key);
        }
        Ok(())
    }

    pub fn sort_by_offset(&mut self) {
        self.entries.sort_by(|a, b| a.offset.cmp(&b.offset).then(a.reloc_type.cmp(&b.reloc_type)));
    }

    pub fn sort_by_type(&mut self) {
        self.entries.sort_by(|a, b| a.reloc_type.cmp(&b.reloc_type).then(a.offset.cmp(&b.offset)));
    }

    /// Writes patched bytes into `section_data`, for test use per design
    /// notes §9 — production emission goes through
    /// `generate_relocation_section_data` and the linker, not this method.
    pub fn apply_relocations(&self, section: u16, section_data: &mut [u8], symbol_values: &[u64]) -> Result<()> {
        for entry in self.entries.iter().filter(|r| r.section == section) {
            let value = symbol_values
                .get(entry.symbol_index as usize)
                .copied()
                .ok_or_else(|| Error::NotFound(format!("symbol index {} has no value", entry.symbol_index)))?;
            let patched = (value as i64).wrapping_add(entry.addend) as u64;
            let offset = entry.offset as usize;
            let width = match entry.reloc_type {
                RelocationType::PcRelative32 => 4,
                _ => 8,
            };
            if offset + width > section_data.len() {
                return Err(Error::Overflow(format!(
                    "relocation at offset {offset} overruns section of length {}",
                    section_data.len()
                )));
            }
            let bytes = patched.to_le_bytes();
            section_data[offset..offset + width].copy_from_slice(&bytes[..width]);
        }
        Ok(())
    }

    /// Serializes the table to the wire layout consumed by the ELF writer:
    /// sorted by offset (ties broken by type ordinal), each entry as
    /// offset(u64) | type(u32) | symbol_index(u32) | addend(i64).
    pub fn generate_relocation_section_data(&self, section: u16) -> Vec<u8> {
        let mut entries: Vec<&Relocation> = self.entries.iter().filter(|r| r.section == section).collect();
        entries.sort_by(|a, b| a.offset.cmp(&b.offset).then(a.reloc_type.cmp(&b.reloc_type)));
        let mut buf = Vec::with_capacity(entries.len() * 24);
        for entry in entries {
            buf.extend_from_slice(&entry.offset.to_le_bytes());
            buf.extend_from_slice(&(entry.reloc_type as u32).to_le_bytes());
            buf.extend_from_slice(&entry.symbol_index.to_le_bytes());
            buf.extend_from_slice(&entry.addend.to_le_bytes());
        }
        buf
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_helpers_tag_ffi_and_pattern_relocations() {
        let mut mgr = RelocationManager::new();
        mgr.add_ffi_call(0, 16, 3, 10);
        mgr.add_pattern_match(0, 32, 4, 11);
        assert_eq!(mgr.get_relocations_by_type(RelocationType::FfiCall).len(), 1);
        assert_eq!(mgr.get_relocations_by_type(RelocationType::PatternMatchJump).len(), 1);
    }

    #[test]
    fn find_by_offset_and_symbol() {
        let mut mgr = RelocationManager::new();
        mgr.add_absolute(0, 8, 5, 0);
        mgr.add_absolute(0, 16, 5, 4);
        assert!(mgr.find_relocation_by_offset(0, 8).is_some());
        assert_eq!(mgr.find_relocations_by_symbol(5).len(), 2);
    }

    #[test]
    fn validate_rejects_out_of_range_symbol() {
        let mut mgr = RelocationManager::new();
        mgr.add_absolute(0, 8, 9, 0);
        assert!(mgr.validate_relocation_table(3).is_err());
    }

    #[test]
    fn validate_rejects_duplicate_offset_type_pair() {
        let mut mgr = RelocationManager::new();
        mgr.add_absolute(0, 8, 0, 0);
        mgr.add_absolute(0, 8, 1, 4);
        assert!(mgr.validate_relocation_table(2).is_err());
    }

    #[test]
    fn sort_by_offset_breaks_ties_by_type_ordinal() {
        let mut mgr = RelocationManager::new();
        mgr.add_plt(0, 8, 0);
        mgr.add_absolute(0, 8, 1, 0);
        mgr.sort_by_offset();
        let serialized = mgr.generate_relocation_section_data(0);
        assert_eq!(u32::from_le_bytes(serialized[8..12].try_into().unwrap()), RelocationType::Absolute64 as u32);
    }

    #[test]
    fn apply_relocations_patches_section_bytes() {
        let mut mgr = RelocationManager::new();
        mgr.add_absolute(0, 0, 0, 5);
        let mut data = vec![0u8; 8];
        mgr.apply_relocations(0, &mut data, &[100]).unwrap();
        assert_eq!(u64::from_le_bytes(data.clone().try_into().unwrap()), 105);
    }

    #[test]
    fn apply_relocations_rejects_overrun() {
        let mut mgr = RelocationManager::new();
        mgr.add_absolute(0, 4, 0, 0);
        let mut data = vec![0u8; 8];
        assert!(mgr.apply_relocations(0, &mut data, &[1]).is_err());
    }
}
