//! The map command: validate the effective capability map and print it in
//! the map file format.

use crate::cli::Args;
use anyhow::Result;

pub fn run(args: &Args) -> Result<String> {
    let classifier = super::build_classifier(args)?;
    Ok(classifier.emit())
}
