//! Comparison report types for diffing two analysis runs.

use serde::{Deserialize, Serialize};

use super::core::{Capability, PathStep};

/// A single (identity key, capability) pair that appears in one run but not
/// the other, with a witness path taken from the run it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDelta {
    /// Identity under the active granularity: a function name or a package
    /// directory.
    pub key: String,
    pub capability: Capability,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub witness: Vec<PathStep>,
}

/// Result of comparing a current analysis run against a baseline.
///
/// `gained` is ordered for presentation: keys for capabilities never seen in
/// the baseline come first, then new uses of capabilities the baseline
/// already had; within each group capabilities are in enum order and keys
/// lexicographic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub gained: Vec<CapabilityDelta>,
    pub dropped: Vec<CapabilityDelta>,
    /// Capabilities appearing in `gained` that the baseline had no use of at
    /// all, in enum order.
    pub new_capabilities: Vec<Capability>,
    /// Capabilities appearing in `gained` that the baseline already used
    /// elsewhere, in enum order.
    pub new_uses_of_existing: Vec<Capability>,
    /// Total gained keys whose capability the baseline already used.
    pub new_use_count: usize,
    pub different: bool,
}

impl ComparisonReport {
    pub fn identical() -> Self {
        Self {
            gained: Vec::new(),
            dropped: Vec::new(),
            new_capabilities: Vec::new(),
            new_uses_of_existing: Vec::new(),
            new_use_count: 0,
            different: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_report() {
        let r = ComparisonReport::identical();
        assert!(!r.different);
        assert!(r.gained.is_empty() && r.dropped.is_empty());
    }

    #[test]
    fn test_delta_serialization_skips_empty_witness() {
        let d = CapabilityDelta {
            key: "example.com/pkgb".to_string(),
            capability: Capability::Exec,
            witness: vec![],
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("witness"));
        let back: CapabilityDelta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
