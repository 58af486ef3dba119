//! Append-only string table. Starts with a single null byte per the ELF
//! convention that offset 0 is the empty string.

pub struct StringTable {
    data: Vec<u8>,
}

impl StringTable {
    pub fn new() -> Self {
        Self { data: vec![0u8] }
    }

    /// Appends `s` (null-terminated) and returns the byte offset of its
    /// first character.
    pub fn add(&mut self, s: &str) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        offset
    }

    /// Reads the null-terminated string starting at `offset`, if any.
    pub fn get(&self, offset: u32) -> Option<&str> {
        let start = offset as usize;
        let slice = self.data.get(start..)?;
        let end = slice.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&slice[..end]).ok()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_starts_with_a_single_null_byte() {
        let table = StringTable::new();
        assert_eq!(table.as_bytes(), &[0u8]);
    }

    #[test]
    fn add_then_get_roundtrips() {
        let mut table = StringTable::new();
        let offset = table.add(".text");
        assert_eq!(table.get(offset), Some(".text"));
    }

    #[test]
    fn distinct_strings_get_distinct_offsets() {
        let mut table = StringTable::new();
        let a = table.add("foo");
        let b = table.add("bar");
        assert_ne!(a, b);
        assert_eq!(table.get(a), Some("foo"));
        assert_eq!(table.get(b), Some("bar"));
    }
}
