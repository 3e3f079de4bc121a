//! Capability classification.
//!
//! The classifier answers two questions during graph search: what capability,
//! if any, does a function or package imply at a leaf, and should a given
//! call edge be followed. Its state comes from a declarative capability map:
//! the builtin map embedded in the binary, optionally overlaid with a
//! user-supplied map whose entries win.
//!
//! There is no process-wide classifier; callers construct one per run and
//! pass it explicitly.

mod parsing;

use crate::error::Error;
use crate::types::Capability;
use std::collections::{BTreeMap, BTreeSet};

const BUILTIN_MAP: &str = include_str!("builtin.cm");
const BUILTIN_SOURCE_NAME: &str = "builtin";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classifier {
    function_category: BTreeMap<String, Capability>,
    unanalyzed_category: BTreeSet<String>,
    package_category: BTreeMap<String, Capability>,
    ignored_edges: BTreeSet<(String, String)>,
    cgo_suffixes: Vec<String>,
}

impl Classifier {
    /// A classifier with no entries. Nothing is categorized, every edge is
    /// followed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The builtin classifier, parsed fresh from the embedded map.
    pub fn builtin() -> Self {
        let c = parsing::parse_capability_map(BUILTIN_SOURCE_NAME, BUILTIN_MAP)
            .expect("embedded capability map must parse");
        assert!(
            !c.function_category.is_empty(),
            "embedded capability map has no function entries"
        );
        c
    }

    /// Parse a capability map on its own, without the builtin entries.
    /// `source_name` is used only for error context.
    pub fn parse(source_name: &str, text: &str) -> Result<Self, Error> {
        parsing::parse_capability_map(source_name, text)
    }

    /// Load a user capability map. Unless `exclude_builtin` is set, the user
    /// map is merged over the builtin map, with user entries overriding
    /// builtin entries and cgo suffixes deduplicated.
    pub fn load(source_name: &str, text: &str, exclude_builtin: bool) -> Result<Self, Error> {
        let user = Self::parse(source_name, text)?;
        if exclude_builtin {
            return Ok(user);
        }
        let mut merged = Self::builtin();
        merged.merge_from(user);
        Ok(merged)
    }

    fn merge_from(&mut self, other: Classifier) {
        self.function_category.extend(other.function_category);
        self.unanalyzed_category.extend(other.unanalyzed_category);
        self.package_category.extend(other.package_category);
        self.ignored_edges.extend(other.ignored_edges);
        self.cgo_suffixes.extend(other.cgo_suffixes);
        self.cgo_suffixes.sort();
        self.cgo_suffixes.dedup();
    }

    /// A copy that never classifies anything as `Unanalyzed`, for suppressing
    /// tool-limitation noise.
    pub fn without_unanalyzed(&self) -> Self {
        let mut c = self.clone();
        c.unanalyzed_category.clear();
        c
    }

    /// Category for a function. Precedence: foreign-call trampoline suffix,
    /// then the function's own entry (which may be an explicit `Unspecified`
    /// opting back into transitive analysis), then the unanalyzed set, then
    /// the package entry. `Unspecified` means the function's callees decide.
    pub fn classify(&self, package: &str, function: &str) -> Capability {
        for suffix in &self.cgo_suffixes {
            if function.ends_with(suffix.as_str()) {
                return Capability::Cgo;
            }
        }
        if let Some(&cap) = self.function_category.get(function) {
            return cap;
        }
        if self.unanalyzed_category.contains(function) {
            return Capability::Unanalyzed;
        }
        self.package_category
            .get(package)
            .copied()
            .unwrap_or(Capability::Unspecified)
    }

    /// Whether a call edge should be considered during search. False only
    /// for explicitly ignored (caller, callee) pairs.
    pub fn include_edge(&self, caller: &str, callee: &str) -> bool {
        !self
            .ignored_edges
            .contains(&(caller.to_string(), callee.to_string()))
    }

    /// Re-serialize to the capability map format. Parsing the result yields
    /// an equivalent classifier.
    pub fn emit(&self) -> String {
        let mut out = String::new();
        for s in &self.cgo_suffixes {
            out.push_str(&format!("cgo_suffix {s}\n"));
        }
        for (name, cap) in &self.function_category {
            out.push_str(&format!("func {name} {}\n", cap.name()));
        }
        for name in &self.unanalyzed_category {
            out.push_str(&format!("unanalyzed {name}\n"));
        }
        for (path, cap) in &self.package_category {
            out.push_str(&format!("package {path} {}\n", cap.name()));
        }
        for (caller, callee) in &self.ignored_edges {
            out.push_str(&format!("ignore_edge {caller} {callee}\n"));
        }
        out
    }
}
