//! capscope - static capability analysis over whole-program call graphs.
//!
//! Given a front-end's view of a program (typed syntax trees, IR summaries,
//! and the package graph), capscope reports, for each function in the
//! queried packages, the set of capabilities (file I/O, network access,
//! process execution, reflection, unsafe memory access, ...) the function
//! may exercise directly or through any transitive call, with one witness
//! call path per finding. Two runs can be compared to surface capability
//! deltas across versions for supply-chain review.
//!
//! # Example
//!
//! ```no_run
//! use capscope::{analyze, AnalysisConfig, Classifier};
//! use capscope::frontend::BundleFrontend;
//!
//! let frontend = BundleFrontend::new("program.bundle.json");
//! let config = AnalysisConfig {
//!     classifier: Classifier::builtin(),
//!     ..Default::default()
//! };
//! let report = analyze(&frontend, &config).unwrap();
//! for finding in &report.findings {
//!     println!("{} {}", finding.capability, finding.dep_path);
//! }
//! ```

pub mod analyzer;
pub mod classifier;
pub mod cli;
pub mod commands;
pub mod compare;
pub mod error;
pub mod frontend;
pub mod graph;
pub mod ir;
pub mod output;
pub mod report;
pub mod rewrite;
pub mod scanner;
pub mod syntax;
pub mod types;

pub use classifier::Classifier;
pub use error::{Error, Result};
pub use frontend::{BuiltProgram, Frontend, LoadOptions, ProgramSources};
pub use types::{
    AnalysisReport, Capability, CapabilityFilter, CapabilityType, ComparisonReport, Finding,
    Granularity,
};

use std::collections::BTreeSet;
use tracing::info;

/// Configuration for one analysis run.
#[derive(Debug, Default)]
pub struct AnalysisConfig {
    /// Package patterns to query; empty means the front-end's own roots.
    pub packages: Vec<String>,
    pub load: LoadOptions,
    pub classifier: Classifier,
    pub granularity: Granularity,
    pub filter: Option<CapabilityFilter>,
}

/// Run the full pipeline: load, rewrite, build, scan, label, search, shape.
pub fn analyze(frontend: &dyn Frontend, config: &AnalysisConfig) -> Result<AnalysisReport> {
    let (sources, built) = load_and_build(frontend, config)?;
    let scan = scanner::scan(&sources, &built.graph);
    let labels = analyzer::assign_labels(&built.graph, &config.classifier, &scan);
    let queried: BTreeSet<String> = sources.roots.iter().cloned().collect();
    let findings = analyzer::get_capability_info(
        &built.graph,
        &labels,
        &queried,
        &config.classifier,
        &built.package_names,
    );
    let findings = report::shape_findings(
        findings,
        config.granularity,
        config.filter.as_ref(),
        &built.package_names,
    );
    info!(findings = findings.len(), "analysis complete");
    Ok(AnalysisReport::new(
        findings,
        frontend::collect_module_info(&sources),
        frontend::collect_package_info(&sources),
    ))
}

/// Run the pipeline up to graph search and render the capability subgraph
/// as DOT.
pub fn capability_subgraph(frontend: &dyn Frontend, config: &AnalysisConfig) -> Result<String> {
    let (sources, built) = load_and_build(frontend, config)?;
    let scan = scanner::scan(&sources, &built.graph);
    let labels = analyzer::assign_labels(&built.graph, &config.classifier, &scan);
    let queried: BTreeSet<String> = sources.roots.iter().cloned().collect();
    Ok(output::render_dot(
        &built.graph,
        &labels,
        &queried,
        &config.classifier,
        config.filter.as_ref(),
    ))
}

/// Load sources, rewrite them in place, and have the front-end build the
/// call graph over the rewritten program. Rewriting MUST complete before
/// the build; it is the sole mutator in the pipeline.
fn load_and_build(
    frontend: &dyn Frontend,
    config: &AnalysisConfig,
) -> Result<(ProgramSources, BuiltProgram)> {
    let mut sources = frontend.load(&config.packages, &config.load)?;
    rewrite::rewrite_sources(&mut sources);
    let built = frontend.build(&sources)?;
    info!(
        packages = sources.packages.len(),
        nodes = built.graph.node_count(),
        edges = built.graph.edge_count(),
        "program built"
    );
    Ok((sources, built))
}
