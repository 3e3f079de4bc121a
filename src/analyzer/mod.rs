//! Capability assignment and graph search.
//!
//! `assign_labels` combines the declarative classifier with the scanner's
//! syntactic findings into three node sets; `get_capability_info` runs a
//! backward breadth-first search per capability and produces one finding per
//! (queried function, capability) pair, each with the shortest witness call
//! path the BFS discovered.
//!
//! Determinism: capabilities iterate in enum order, roots are sorted by the
//! node total order before anything is emitted, and incoming edges are
//! sorted by (caller, call site) before traversal. Two runs over identical
//! inputs produce identical findings in identical order.

pub mod subgraph;

use crate::classifier::Classifier;
use crate::graph::{CallGraph, EdgeId, NodeId};
use crate::scanner::ScanResults;
use crate::types::{Capability, CapabilityType, Finding, PathStep};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Node sets driving the search.
#[derive(Debug, Default)]
pub struct NodeLabels {
    /// Nodes classified `Safe`: never traversed, never reported.
    pub safe: FxHashSet<NodeId>,
    /// Nodes with some capability, explicit or scanner-found.
    pub by_capability: BTreeMap<Capability, FxHashSet<NodeId>>,
    /// Nodes whose capability was asserted by the classifier. The search
    /// does not descend through these to report other capabilities.
    pub explicit: FxHashSet<NodeId>,
}

/// Classify every node and merge in the scanner's extra findings.
///
/// Generic instantiations whose own package is unknown classify by their
/// origin's package and name. Extra findings never attach to a node the
/// classifier already categorized.
pub fn assign_labels(
    graph: &CallGraph,
    classifier: &Classifier,
    scan: &ScanResults,
) -> NodeLabels {
    let mut labels = NodeLabels::default();
    for id in graph.node_ids() {
        let meta = graph.node(id);
        let category = if let Some(pkg) = &meta.package {
            classifier.classify(pkg, &meta.name)
        } else if let Some(origin) = &meta.origin {
            let Some(pkg) = &origin.package else { continue };
            classifier.classify(pkg, &origin.name)
        } else {
            continue;
        };
        match category {
            Capability::Safe => {
                labels.safe.insert(id);
            }
            Capability::Unspecified => {}
            cap => {
                labels.by_capability.entry(cap).or_default().insert(id);
            }
        }
    }
    for nodes in labels.by_capability.values() {
        labels.explicit.extend(nodes.iter().copied());
    }
    for (&cap, nodes) in &scan.extra {
        for &node in nodes {
            if !labels.explicit.contains(&node) {
                labels.by_capability.entry(cap).or_default().insert(node);
            }
        }
    }
    debug!(
        safe = labels.safe.len(),
        explicit = labels.explicit.len(),
        capabilities = labels.by_capability.len(),
        "assigned node labels"
    );
    labels
}

/// The per-node BFS record: the edge leading one step closer to a
/// capability leaf, or None for the leaf itself. The first edge that
/// discovers a node is also its shortest witness.
pub type Predecessors = FxHashMap<NodeId, Option<EdgeId>>;

/// Enumerate findings: for each capability, every function in a queried
/// package with a call path to a leaf carrying that capability, plus the
/// leaves themselves when they are in a queried package.
pub fn get_capability_info(
    graph: &CallGraph,
    labels: &NodeLabels,
    queried: &BTreeSet<String>,
    classifier: &Classifier,
    package_names: &BTreeMap<String, String>,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for_each_path(graph, labels, queried, classifier, &mut |cap, visited, node| {
        findings.push(build_finding(graph, visited, node, cap, package_names));
    });
    findings
}

/// Run the backward BFS per capability, calling `emit` for every queried
/// function discovered. `emit` receives the BFS state and can reconstruct
/// the witness path.
pub fn for_each_path(
    graph: &CallGraph,
    labels: &NodeLabels,
    queried: &BTreeSet<String>,
    classifier: &Classifier,
    emit: &mut impl FnMut(Capability, &Predecessors, NodeId),
) {
    for (&cap, nodes) in &labels.by_capability {
        let mut visited: Predecessors = FxHashMap::default();

        // Roots: capability leaves, minus anything explicitly safe, in the
        // node total order so emission order is reproducible.
        let mut roots: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|n| !labels.safe.contains(n))
            .collect();
        graph.sort_nodes(&mut roots);

        for &root in &roots {
            visited.insert(root, None);
        }
        // A leaf in a queried package is itself a finding; the BFS below
        // only reaches its callers.
        for &root in &roots {
            if in_queried_package(graph, root, queried) {
                emit(cap, &visited, root);
            }
        }

        let mut queue: VecDeque<NodeId> = roots.into();
        while let Some(v) = queue.pop_front() {
            let callee_name = &graph.node(v).name;
            let mut incoming: Vec<EdgeId> = graph
                .incoming(v)
                .iter()
                .copied()
                .filter(|&e| {
                    let caller_name = &graph.node(graph.edge(e).caller).name;
                    classifier.include_edge(caller_name, callee_name)
                })
                .collect();
            incoming.sort_by(|&a, &b| graph.compare_edges_by_caller(a, b));

            for edge in incoming {
                let w = graph.edge(edge).caller;
                if labels.safe.contains(&w) || visited.contains_key(&w) {
                    continue;
                }
                if labels.explicit.contains(&w) {
                    // w has its own category; paths through it are reported
                    // under that category only.
                    continue;
                }
                visited.insert(w, Some(edge));
                queue.push_back(w);
                if in_queried_package(graph, w, queried) {
                    emit(cap, &visited, w);
                }
            }
        }
    }
}

fn in_queried_package(graph: &CallGraph, node: NodeId, queried: &BTreeSet<String>) -> bool {
    graph
        .node(node)
        .package
        .as_ref()
        .is_some_and(|p| queried.contains(p))
}

/// Reconstruct the witness path for `node` from the BFS state and package it
/// as a finding. The path starts at the queried function and ends at the
/// capability leaf; step *i* carries the call site of the call made by step
/// *i−1*.
fn build_finding(
    graph: &CallGraph,
    visited: &Predecessors,
    node: NodeId,
    capability: Capability,
    package_names: &BTreeMap<String, String>,
) -> Finding {
    let package_dir = graph
        .node(node)
        .package
        .clone()
        .unwrap_or_default();
    let package_name = package_names
        .get(&package_dir)
        .cloned()
        .unwrap_or_else(|| last_path_segment(&package_dir).to_string());

    let mut path = Vec::new();
    let mut capability_type = CapabilityType::Direct;
    let mut incoming: Option<EdgeId> = None;
    let mut current = Some(node);
    while let Some(v) = current {
        let meta = graph.node(v);
        path.push(PathStep {
            name: meta.name.clone(),
            package: meta.effective_package().map(str::to_string),
            site: incoming.and_then(|e| graph.edge(e).site.clone()),
        });
        let step_pkg = meta.effective_package().unwrap_or("");
        if step_pkg != package_dir && !crate::graph::is_std_lib(step_pkg) {
            capability_type = CapabilityType::Transitive;
        }
        let next_edge = visited.get(&v).copied().flatten();
        incoming = next_edge;
        current = next_edge.map(|e| graph.edge(e).callee);
    }

    let dep_path = path
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Finding {
        package_name,
        package_dir,
        capability,
        capability_type,
        path,
        dep_path,
    }
}

pub(crate) fn last_path_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
