//! Core data model: capabilities, findings, reports, comparison results.

mod core;
mod diff;

pub use self::core::{
    AnalysisReport, Capability, CapabilityFilter, CapabilityType, Finding, Granularity,
    ModuleInfo, PackageInfo, PathStep, Site, SCHEMA_VERSION,
};
pub use self::diff::{CapabilityDelta, ComparisonReport};
