//! The analyze command: run the pipeline over a bundle and render the
//! findings.

use crate::cli::{split_patterns, Args, OutputFormat};
use crate::frontend::BundleFrontend;
use crate::{output, AnalysisConfig};
use anyhow::Result;

pub fn run(
    args: &Args,
    bundle: &str,
    packages: Option<&str>,
    format: OutputFormat,
) -> Result<String> {
    let frontend = BundleFrontend::new(bundle);
    let config = AnalysisConfig {
        packages: split_patterns(packages),
        load: super::load_options(args),
        classifier: super::build_classifier(args)?,
        granularity: args.granularity.into(),
        filter: super::build_filter(args)?,
    };
    let report = crate::analyze(&frontend, &config)?;
    let rendered = match format {
        OutputFormat::Json => output::format_json(&report)?,
        OutputFormat::Terminal => output::format_terminal(&report),
        OutputFormat::Summary => output::format_summary(&report),
    };
    Ok(rendered)
}
