//! The graph command: emit the capability subgraph as DOT.

use crate::cli::{split_patterns, Args};
use crate::frontend::BundleFrontend;
use crate::AnalysisConfig;
use anyhow::Result;

pub fn run(args: &Args, bundle: &str, packages: Option<&str>) -> Result<String> {
    let frontend = BundleFrontend::new(bundle);
    let config = AnalysisConfig {
        packages: split_patterns(packages),
        load: super::load_options(args),
        classifier: super::build_classifier(args)?,
        granularity: args.granularity.into(),
        filter: super::build_filter(args)?,
    };
    Ok(crate::capability_subgraph(&frontend, &config)?)
}
