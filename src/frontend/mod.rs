//! Front-end contract.
//!
//! Parsing, type checking, IR construction, and initial call-graph
//! construction belong to a language front-end. The core consumes the
//! front-end's output through [`Frontend`]: `load` produces the program
//! sources (typed syntax, IR summaries, external function declarations), the
//! rewriter mutates the syntax in place, and `build` then produces the call
//! graph over the rewritten program.

pub mod bundle;

use crate::error::Error;
use crate::graph::{CallGraph, Origin};
use crate::ir::IrProgram;
use crate::syntax::{Package, TypeTable};
use crate::types::{ModuleInfo, PackageInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use bundle::BundleFrontend;

/// Build configuration forwarded to the front-end. Empty fields mean "host
/// default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    #[serde(default)]
    pub build_tags: String,
    #[serde(default)]
    pub target_os: String,
    #[serde(default)]
    pub target_arch: String,
}

/// A function the front-end knows about but has no source body for:
/// assembly, foreign imports, compiler-synthesized wrappers, and generic
/// instantiations declared out of line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternFunction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub origin: Option<Origin>,
    #[serde(default)]
    pub has_body: bool,
    #[serde(default)]
    pub synthetic: bool,
}

/// A closed package graph plus everything the analysis needs alongside it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramSources {
    pub types: TypeTable,
    pub packages: Vec<Package>,
    #[serde(default)]
    pub externs: Vec<ExternFunction>,
    #[serde(default)]
    pub ir: IrProgram,
    /// Paths of the queried packages: findings are reported for functions in
    /// these.
    #[serde(default)]
    pub roots: Vec<String>,
}

impl ProgramSources {
    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.path == path)
    }
}

/// The program as built by the front-end after rewriting.
#[derive(Debug, Clone, Default)]
pub struct BuiltProgram {
    pub graph: CallGraph,
    /// Short package names by path, for report fields.
    pub package_names: BTreeMap<String, String>,
}

pub trait Frontend {
    /// Load the packages matching `patterns` and their transitive
    /// dependencies. Analysis MUST NOT proceed on partially-loaded input;
    /// any failure is an [`Error::Load`].
    fn load(&self, patterns: &[String], options: &LoadOptions) -> Result<ProgramSources, Error>;

    /// Build the call graph over (possibly rewritten) sources.
    fn build(&self, sources: &ProgramSources) -> Result<BuiltProgram, Error>;
}

/// Modules that contributed packages, sorted by path, deduplicated.
pub fn collect_module_info(sources: &ProgramSources) -> Vec<ModuleInfo> {
    let mut by_path: BTreeMap<&str, &str> = BTreeMap::new();
    for pkg in &sources.packages {
        if let Some(m) = &pkg.module {
            if !m.path.is_empty() && !m.version.is_empty() {
                by_path.entry(m.path.as_str()).or_insert(m.version.as_str());
            }
        }
    }
    by_path
        .into_iter()
        .map(|(path, version)| ModuleInfo {
            path: path.to_string(),
            version: version.to_string(),
        })
        .collect()
}

/// Non-standard-library packages, sorted by path, with the basenames of
/// files excluded by build constraints.
pub fn collect_package_info(sources: &ProgramSources) -> Vec<PackageInfo> {
    let mut out: Vec<PackageInfo> = sources
        .packages
        .iter()
        .filter(|p| !crate::graph::is_std_lib(&p.path))
        .map(|p| PackageInfo {
            path: p.path.clone(),
            ignored_files: p
                .ignored_files
                .iter()
                .map(|f| basename(f).to_string())
                .collect(),
        })
        .collect();
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ModuleRef;

    fn package(path: &str, name: &str, module: Option<(&str, &str)>) -> Package {
        Package {
            path: path.to_string(),
            name: name.to_string(),
            files: vec![],
            module: module.map(|(p, v)| ModuleRef {
                path: p.to_string(),
                version: v.to_string(),
            }),
            ignored_files: vec![],
        }
    }

    #[test]
    fn test_collect_module_info_sorted_dedup() {
        let sources = ProgramSources {
            packages: vec![
                package("example.com/b/x", "x", Some(("example.com/b", "v1.2.0"))),
                package("example.com/a/y", "y", Some(("example.com/a", "v0.1.0"))),
                package("example.com/b/z", "z", Some(("example.com/b", "v1.2.0"))),
                package("os", "os", None),
            ],
            ..Default::default()
        };
        let modules = collect_module_info(&sources);
        assert_eq!(
            modules,
            vec![
                ModuleInfo {
                    path: "example.com/a".to_string(),
                    version: "v0.1.0".to_string()
                },
                ModuleInfo {
                    path: "example.com/b".to_string(),
                    version: "v1.2.0".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_collect_package_info_omits_std_lib() {
        let mut third_party = package("example.com/a", "a", None);
        third_party.ignored_files = vec!["dir/sub/skipped_arm.x".to_string()];
        let sources = ProgramSources {
            packages: vec![package("os", "os", None), third_party],
            ..Default::default()
        };
        let info = collect_package_info(&sources);
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].path, "example.com/a");
        assert_eq!(info[0].ignored_files, vec!["skipped_arm.x"]);
    }
}
