//! Section records. Section zero is the reserved null section.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    Null,
    ProgBits,
    SymTab,
    StrTab,
    Rela,
    NoBits,
    Debug,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub name_index: u32,
    pub section_type: SectionType,
    pub flags: u64,
    pub virtual_address: u64,
    pub file_offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub align: u64,
    pub entry_size: u64,
    pub data: Vec<u8>,
}

impl Section {
    pub fn null() -> Self {
        Self {
            name_index: 0,
            section_type: SectionType::Null,
            flags: 0,
            virtual_address: 0,
            file_offset: 0,
            size: 0,
            link: 0,
            info: 0,
            align: 0,
            entry_size: 0,
            data: Vec::new(),
        }
    }
}
