//! Granularity and filter layer.
//!
//! Raw findings arrive one per (queried function, capability) pair. This
//! layer applies the capability filter and then re-keys findings to the
//! requested reporting granularity, deduplicating per identity key. Ordering
//! is preserved: findings stay capability-major and keep the first witness
//! seen for each key.

use crate::types::{CapabilityFilter, Finding, Granularity};
use std::collections::{BTreeMap, BTreeSet};

use crate::analyzer::last_path_segment;

/// Shape raw function-level findings for reporting.
pub fn shape_findings(
    findings: Vec<Finding>,
    granularity: Granularity,
    filter: Option<&CapabilityFilter>,
    package_names: &BTreeMap<String, String>,
) -> Vec<Finding> {
    let findings: Vec<Finding> = match filter {
        Some(f) => findings
            .into_iter()
            .filter(|finding| f.admits(finding.capability))
            .collect(),
        None => findings,
    };
    match granularity {
        Granularity::Function => dedup_by_key(findings, |f| {
            f.function_name().unwrap_or_default().to_string()
        }),
        Granularity::Package => dedup_by_key(findings, |f| f.package_dir.clone()),
        Granularity::Intermediate => intermediate(findings, package_names),
    }
}

fn dedup_by_key(findings: Vec<Finding>, key: impl Fn(&Finding) -> String) -> Vec<Finding> {
    let mut seen = BTreeSet::new();
    findings
        .into_iter()
        .filter(|f| seen.insert((f.capability, key(f))))
        .collect()
}

/// One finding per (package appearing on a witness path, capability): the
/// view that answers "which intermediate packages introduce this
/// capability". The witness is the path the package was first seen on.
fn intermediate(
    findings: Vec<Finding>,
    package_names: &BTreeMap<String, String>,
) -> Vec<Finding> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for finding in findings {
        let step_packages: Vec<String> = finding
            .path
            .iter()
            .filter_map(|s| s.package.clone())
            .filter(|p| !p.is_empty())
            .collect();
        for pkg in step_packages {
            if !seen.insert((finding.capability, pkg.clone())) {
                continue;
            }
            let package_name = package_names
                .get(&pkg)
                .cloned()
                .unwrap_or_else(|| last_path_segment(&pkg).to_string());
            out.push(Finding {
                package_name,
                package_dir: pkg,
                capability: finding.capability,
                capability_type: finding.capability_type,
                path: finding.path.clone(),
                dep_path: finding.dep_path.clone(),
            });
        }
    }
    out
}
