//! Report rendering: JSON, human-readable terminal output, capability-count
//! summaries, comparison text, and DOT graphs.
//!
//! Results go to stdout; anything colored degrades gracefully when stdout is
//! not a terminal (the `colored` crate handles detection).

use crate::analyzer::{subgraph, NodeLabels};
use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::graph::CallGraph;
use crate::types::{
    AnalysisReport, Capability, CapabilityFilter, CapabilityType, ComparisonReport, PathStep,
};
use colored::Colorize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Write as _;

pub fn format_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| Error::internal(format!("serializing report: {e}")))
}

/// Color a capability name by how alarming it is.
fn colored_capability(c: Capability) -> colored::ColoredString {
    match c {
        Capability::Safe => c.name().green(),
        Capability::ArbitraryExecution
        | Capability::Cgo
        | Capability::UnsafePointer
        | Capability::Exec => c.name().bright_red(),
        _ => c.name().yellow(),
    }
}

/// Aggregate counts per capability, the default output mode.
pub fn format_summary(report: &AnalysisReport) -> String {
    let mut counts: BTreeMap<Capability, usize> = BTreeMap::new();
    for f in &report.findings {
        *counts.entry(f.capability).or_default() += 1;
    }
    let mut out = String::new();
    if counts.is_empty() {
        out.push_str("No capabilities identified.\n");
        return out;
    }
    for (cap, count) in counts {
        let _ = writeln!(
            out,
            "{:<22} {:>5}   {}",
            colored_capability(cap),
            count,
            cap.describe()
        );
    }
    out
}

/// Full findings with witness paths.
pub fn format_terminal(report: &AnalysisReport) -> String {
    let mut out = String::new();
    for finding in &report.findings {
        let kind = match finding.capability_type {
            CapabilityType::Direct => "direct",
            CapabilityType::Transitive => "transitive",
        };
        let _ = writeln!(
            out,
            "{} ({kind}) {}",
            colored_capability(finding.capability),
            finding.function_name().unwrap_or(&finding.package_dir).bold()
        );
        out.push_str(&format_call_path(&finding.path));
        out.push('\n');
    }
    if report.findings.is_empty() {
        out.push_str("No capabilities identified.\n");
    }
    out
}

fn format_call_path(path: &[PathStep]) -> String {
    let mut out = String::new();
    for step in path {
        let site = step
            .site
            .as_ref()
            .map(|s| format!("{}:{}:{}", s.filename, s.line, s.column))
            .unwrap_or_default();
        let _ = writeln!(out, "  {site:<28} {}", step.name);
    }
    out
}

/// Human-readable comparison output, ending with the gained/dropped detail
/// for each changed key.
pub fn format_comparison(report: &ComparisonReport) -> String {
    let mut out = String::new();
    match report.new_capabilities.len() {
        0 => {}
        1 => out.push_str("Added 1 new capability:\n"),
        n => {
            let _ = writeln!(out, "Added {n} new capabilities:");
        }
    }
    for c in &report.new_capabilities {
        let _ = writeln!(out, "  {:<22} {}", colored_capability(*c), c.describe());
    }
    match report.new_use_count {
        0 => {}
        1 => out.push_str("Added 1 new use of an existing capability:\n"),
        n => {
            let _ = writeln!(out, "Added {n} new uses of existing capabilities:");
        }
    }
    for c in &report.new_uses_of_existing {
        let _ = writeln!(out, "  {:<22} {}", colored_capability(*c), c.describe());
    }
    if report.gained.is_empty() && report.dropped.is_empty() {
        out.push_str("No capability differences found.\n");
        return out;
    }
    for delta in &report.gained {
        let _ = writeln!(
            out,
            "\n{} has new capability {} compared to the baseline:",
            delta.key.bold(),
            colored_capability(delta.capability)
        );
        out.push_str(&format_call_path(&delta.witness));
    }
    for delta in &report.dropped {
        let _ = writeln!(
            out,
            "\n{} no longer has capability {} which was in the baseline:",
            delta.key.bold(),
            colored_capability(delta.capability)
        );
        out.push_str(&format_call_path(&delta.witness));
    }
    out
}

/// Render the capability subgraph as a DOT digraph: call edges between
/// functions, plus an edge from each capability-bearing function to its
/// capability.
pub fn render_dot(
    graph: &CallGraph,
    labels: &NodeLabels,
    queried: &BTreeSet<String>,
    classifier: &Classifier,
    filter: Option<&CapabilityFilter>,
) -> String {
    let out = std::cell::RefCell::new(String::new());
    out.borrow_mut().push_str("digraph {\n");
    subgraph::capability_graph(
        graph,
        labels,
        queried,
        classifier,
        filter,
        &mut |from, to| {
            let _ = writeln!(
                out.borrow_mut(),
                "\t\"{}\" -> \"{}\"",
                escape_dot(&graph.node(from).name),
                escape_dot(&graph.node(to).name)
            );
        },
        &mut |node, cap| {
            let _ = writeln!(
                out.borrow_mut(),
                "\t\"{}\" -> \"{}\"",
                escape_dot(&graph.node(node).name),
                cap.name()
            );
        },
    );
    let mut out = out.into_inner();
    out.push_str("}\n");
    out
}

fn escape_dot(s: &str) -> String {
    s.replace('"', "\\\"")
}
