//! Subcommand implementations. Each returns the rendered output string;
//! exit-code mapping stays in `main`.

pub mod analyze;
pub mod compare;
pub mod graph;
pub mod map;

use crate::classifier::Classifier;
use crate::cli::Args;
use crate::frontend::LoadOptions;
use crate::types::CapabilityFilter;
use anyhow::{Context, Result};

/// Build the classifier from the global flags: user map merged over the
/// builtin (unless disabled), with the unanalyzed category optionally
/// emptied.
pub fn build_classifier(args: &Args) -> Result<Classifier> {
    let classifier = match &args.capability_map {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading capability map {path}"))?;
            Classifier::load(path, &text, args.disable_builtin)?
        }
        None => {
            if args.disable_builtin {
                anyhow::bail!("--disable-builtin requires --capability-map");
            }
            Classifier::builtin()
        }
    };
    Ok(if args.omit_unanalyzed {
        classifier.without_unanalyzed()
    } else {
        classifier
    })
}

pub fn build_filter(args: &Args) -> Result<Option<CapabilityFilter>> {
    Ok(CapabilityFilter::parse(&args.capabilities)?)
}

pub fn load_options(args: &Args) -> LoadOptions {
    LoadOptions {
        build_tags: args.build_tags.clone(),
        target_os: args.target_os.clone(),
        target_arch: args.target_arch.clone(),
    }
}
