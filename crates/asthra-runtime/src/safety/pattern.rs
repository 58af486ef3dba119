//! Pattern-match exhaustiveness and reachability checking.

/// A single match arm, as seen from the safety subsystem: just the variant
/// tags it covers (a wildcard arm covers every remaining tag).
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub covers: Vec<String>,
    pub is_wildcard: bool,
}

/// The scrutinee's full variant set, keyed by name.
#[derive(Debug, Clone)]
pub struct ResultTypeShape {
    pub variants: Vec<String>,
}

/// Outcome categories from spec §4.4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Incomplete,
    Unreachable,
    Redundant,
}

#[derive(Debug, Clone)]
pub struct ExhaustivenessReport {
    pub result: Completeness,
    pub missing_patterns: Vec<String>,
    pub unreachable_arm_indices: Vec<usize>,
}

/// Checks that `arms` exhaustively and non-redundantly covers every variant
/// in `scrutinee`.
///
/// - An arm after a wildcard is unreachable.
/// - A non-wildcard arm whose covered variants were already fully covered by
///   earlier arms is redundant (folded into `Redundant` since both indicate
///   dead code, distinguished by `unreachable_arm_indices` being non-empty
///   only for the literal after-wildcard case).
/// - Any variant touched by no arm and no wildcard makes the match
///   `Incomplete`, listing the missing variants.
pub fn verify_match_exhaustiveness(arms: &[MatchArm], scrutinee: &ResultTypeShape) -> ExhaustivenessReport {
    let mut covered: Vec<&str> = Vec::new();
    let mut unreachable_arm_indices = Vec::new();
    let mut seen_wildcard = false;
    let mut redundant = false;

    for (i, arm) in arms.iter().enumerate() {
        if seen_wildcard {
            unreachable_arm_indices.push(i);
            continue;
        }
        if arm.is_wildcard {
            seen_wildcard = true;
            continue;
        }
        let mut any_new = false;
        for variant in &arm.covers {
            if !covered.contains(&variant.as_str()) {
                covered.push(variant.as_str());
                any_new = true;
            }
        }
        if !any_new {
            redundant = true;
        }
    }

    if !unreachable_arm_indices.is_empty() {
        return ExhaustivenessReport {
            result: Completeness::Unreachable,
            missing_patterns: Vec::new(),
            unreachable_arm_indices,
        };
    }

    if seen_wildcard {
        return ExhaustivenessReport {
            result: if redundant { Completeness::Redundant } else { Completeness::Complete },
            missing_patterns: Vec::new(),
            unreachable_arm_indices: Vec::new(),
        };
    }

    let missing: Vec<String> = scrutinee
        .variants
        .iter()
        .filter(|v| !covered.contains(&v.as_str()))
        .cloned()
        .collect();

    if missing.is_empty() {
        ExhaustivenessReport {
            result: if redundant { Completeness::Redundant } else { Completeness::Complete },
            missing_patterns: Vec::new(),
            unreachable_arm_indices: Vec::new(),
        }
    } else {
        ExhaustivenessReport {
            result: Completeness::Incomplete,
            missing_patterns: missing,
            unreachable_arm_indices: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(variants: &[&str]) -> ResultTypeShape {
        ResultTypeShape {
            variants: variants.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn arm(covers: &[&str]) -> MatchArm {
        MatchArm {
            covers: covers.iter().map(|s| s.to_string()).collect(),
            is_wildcard: false,
        }
    }

    #[test]
    fn two_variant_enum_with_one_arm_is_incomplete() {
        let scrutinee = shape(&["Ok", "Err"]);
        let arms = vec![arm(&["Ok"])];
        let report = verify_match_exhaustiveness(&arms, &scrutinee);
        assert_eq!(report.result, Completeness::Incomplete);
        assert_eq!(report.missing_patterns, vec!["Err".to_string()]);
    }

    #[test]
    fn wildcard_after_all_variants_is_complete() {
        let scrutinee = shape(&["Ok", "Err"]);
        let arms = vec![
            arm(&["Ok"]),
            arm(&["Err"]),
            MatchArm { covers: vec![], is_wildcard: true },
        ];
        let report = verify_match_exhaustiveness(&arms, &scrutinee);
        assert_eq!(report.result, Completeness::Complete);
    }

    #[test]
    fn arm_after_wildcard_is_unreachable() {
        let scrutinee = shape(&["Ok", "Err"]);
        let arms = vec![
            MatchArm { covers: vec![], is_wildcard: true },
            arm(&["Err"]),
        ];
        let report = verify_match_exhaustiveness(&arms, &scrutinee);
        assert_eq!(report.result, Completeness::Unreachable);
        assert_eq!(report.unreachable_arm_indices, vec![1]);
    }

    #[test]
    fn repeated_arm_is_redundant() {
        let scrutinee = shape(&["Ok", "Err"]);
        let arms = vec![arm(&["Ok"]), arm(&["Ok"]), arm(&["Err"])];
        let report = verify_match_exhaustiveness(&arms, &scrutinee);
        assert_eq!(report.result, Completeness::Redundant);
    }
}
