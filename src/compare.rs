//! Comparison of two analysis runs, for supply-chain review.
//!
//! Findings from the baseline and current runs are bucketed by
//! (identity key, capability) under the active granularity. Keys present
//! only in the current run are gained capabilities; keys present only in the
//! baseline are dropped. The summary distinguishes capabilities the baseline
//! never used anywhere (new capabilities) from additional uses of
//! capabilities it already had.

use crate::error::Error;
use crate::types::{
    AnalysisReport, Capability, CapabilityDelta, ComparisonReport, Finding, Granularity,
};
use std::collections::{BTreeMap, BTreeSet};

/// Parse a baseline report previously produced with JSON output.
pub fn parse_baseline(text: &str) -> Result<AnalysisReport, Error> {
    serde_json::from_str(text).map_err(|e| Error::comparison_parse(e.to_string()))
}

/// Identity of a finding under a granularity: the queried function's name,
/// or the package directory.
fn identity_key(finding: &Finding, granularity: Granularity) -> Option<String> {
    match granularity {
        Granularity::Function => finding.function_name().map(str::to_string),
        Granularity::Package | Granularity::Intermediate => {
            (!finding.package_dir.is_empty()).then(|| finding.package_dir.clone())
        }
    }
}

fn bucket(
    findings: &[Finding],
    granularity: Granularity,
) -> BTreeMap<(Capability, String), &Finding> {
    let mut m = BTreeMap::new();
    for f in findings {
        if let Some(key) = identity_key(f, granularity) {
            m.entry((f.capability, key)).or_insert(f);
        }
    }
    m
}

/// Diff two finding lists under a granularity.
pub fn compare_findings(
    baseline: &[Finding],
    current: &[Finding],
    granularity: Granularity,
) -> ComparisonReport {
    let baseline_map = bucket(baseline, granularity);
    let current_map = bucket(current, granularity);

    let mut gained_raw: Vec<CapabilityDelta> = Vec::new();
    let mut dropped: Vec<CapabilityDelta> = Vec::new();
    for (key, finding) in &current_map {
        if !baseline_map.contains_key(key) {
            gained_raw.push(CapabilityDelta {
                key: key.1.clone(),
                capability: key.0,
                witness: finding.path.clone(),
            });
        }
    }
    for (key, finding) in &baseline_map {
        if !current_map.contains_key(key) {
            dropped.push(CapabilityDelta {
                key: key.1.clone(),
                capability: key.0,
                witness: finding.path.clone(),
            });
        }
    }

    // Capabilities the baseline used anywhere, under any key.
    let baseline_caps: BTreeSet<Capability> =
        baseline_map.keys().map(|(c, _)| *c).collect();
    let mut new_capabilities = BTreeSet::new();
    let mut new_uses_of_existing = BTreeSet::new();
    let mut new_use_count = 0usize;
    for delta in &gained_raw {
        if baseline_caps.contains(&delta.capability) {
            new_uses_of_existing.insert(delta.capability);
            new_use_count += 1;
        } else {
            new_capabilities.insert(delta.capability);
        }
    }

    // Present gains for never-before-seen capabilities first; BTreeMap
    // iteration already ordered everything by (capability, key).
    let (first, second): (Vec<CapabilityDelta>, Vec<CapabilityDelta>) = gained_raw
        .into_iter()
        .partition(|d| new_capabilities.contains(&d.capability));
    let mut gained = first;
    gained.extend(second);

    let different = !gained.is_empty() || !dropped.is_empty();
    ComparisonReport {
        gained,
        dropped,
        new_capabilities: new_capabilities.into_iter().collect(),
        new_uses_of_existing: new_uses_of_existing.into_iter().collect(),
        new_use_count,
        different,
    }
}
