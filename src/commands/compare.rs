//! The compare command: analyze the current bundle, diff against a baseline
//! report, and render the differences.

use crate::cli::{split_patterns, Args};
use crate::error::Error;
use crate::frontend::BundleFrontend;
use crate::{compare, output, AnalysisConfig};
use anyhow::{Context, Result};

/// Returns the rendered comparison and whether any difference was found.
pub fn run(
    args: &Args,
    baseline_path: &str,
    bundle: &str,
    packages: Option<&str>,
) -> Result<(String, bool)> {
    let baseline_text = std::fs::read_to_string(baseline_path)
        .map_err(|e| Error::comparison_parse(format!("reading {baseline_path}: {e}")))
        .context("the baseline should be the output of `capscope analyze --format json`")?;
    let baseline = compare::parse_baseline(&baseline_text)?;

    let frontend = BundleFrontend::new(bundle);
    let config = AnalysisConfig {
        packages: split_patterns(packages),
        load: super::load_options(args),
        classifier: super::build_classifier(args)?,
        granularity: args.granularity.into(),
        filter: super::build_filter(args)?,
    };
    let current = crate::analyze(&frontend, &config)?;

    let report = compare::compare_findings(
        &baseline.findings,
        &current.findings,
        args.granularity.into(),
    );
    let rendered = output::format_comparison(&report);
    Ok((rendered, report.different))
}
