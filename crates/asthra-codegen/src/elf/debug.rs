//! Heuristic DWARF-like debug-section size estimates.
//!
//! These are fractions of the total debug-info section size, not an actual
//! parse of the compile-unit header or DIE tree — see design notes. The
//! fractions (compile-unit 40%, function-debug 35%, abbreviation-table 10%,
//! type-debug 15%) are a fixed, documented approximation and sum to 100% of
//! `total_debug_info_size`.

const COMPILE_UNIT_FRACTION: f64 = 0.40;
const FUNCTION_DEBUG_FRACTION: f64 = 0.35;
const ABBREV_TABLE_FRACTION: f64 = 0.10;
const TYPE_DEBUG_FRACTION: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugSizeEstimate {
    pub compile_unit_size: u64,
    pub function_debug_size: u64,
    pub abbrev_table_size: u64,
    pub type_debug_size: u64,
}

pub fn estimate(total_debug_info_size: u64) -> DebugSizeEstimate {
    let total = total_debug_info_size as f64;
    DebugSizeEstimate {
        compile_unit_size: (total * COMPILE_UNIT_FRACTION) as u64,
        function_debug_size: (total * FUNCTION_DEBUG_FRACTION) as u64,
        abbrev_table_size: (total * ABBREV_TABLE_FRACTION) as u64,
        type_debug_size: (total * TYPE_DEBUG_FRACTION) as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_fractions_sum_within_rounding_of_total() {
        let e = estimate(1000);
        let sum = e.compile_unit_size + e.function_debug_size + e.abbrev_table_size + e.type_debug_size;
        assert!(sum <= 1000);
        assert!(sum >= 990);
    }

    #[test]
    fn zero_total_yields_zero_estimates() {
        let e = estimate(0);
        assert_eq!(e.compile_unit_size, 0);
        assert_eq!(e.function_debug_size, 0);
    }
}
