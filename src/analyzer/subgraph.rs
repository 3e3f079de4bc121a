//! Subgraph output: every node and edge on some path from a queried
//! function to a capability leaf.
//!
//! Three passes: a backward BFS from the capability leaves computes the set
//! of nodes that can reach a capability at all; intersecting with the
//! queried packages gives the forward roots; a forward BFS restricted to the
//! reach set then emits every traversed edge and every node-to-capability
//! incidence. Explicitly categorized nodes are terminal. When a capability
//! filter is supplied, the backward pass starts only from admitted
//! capabilities, which both suppresses filtered incidences and prunes nodes
//! whose only reachable capabilities are filtered out.

use crate::classifier::Classifier;
use crate::graph::{CallGraph, NodeId};
use crate::types::{Capability, CapabilityFilter};
use rustc_hash::FxHashSet;
use std::collections::{BTreeSet, VecDeque};

use super::NodeLabels;

/// Walk the capability subgraph, calling `output_call` for each edge between
/// two retained nodes and `output_capability` for each retained node with a
/// capability.
pub fn capability_graph(
    graph: &CallGraph,
    labels: &NodeLabels,
    queried: &BTreeSet<String>,
    classifier: &Classifier,
    filter: Option<&CapabilityFilter>,
    output_call: &mut impl FnMut(NodeId, NodeId),
    output_capability: &mut impl FnMut(NodeId, Capability),
) {
    let admits = |c: Capability| filter.map_or(true, |f| f.admits(c));

    let reach = backward_reach(graph, labels, classifier, &admits);

    // Forward roots: reachable-from-capability nodes in queried packages.
    let mut roots: Vec<NodeId> = reach
        .iter()
        .copied()
        .filter(|&n| super::in_queried_package(graph, n, queried))
        .collect();
    graph.sort_nodes(&mut roots);

    let mut visited: FxHashSet<NodeId> = roots.iter().copied().collect();
    let mut queue: VecDeque<NodeId> = roots.into();
    while let Some(v) = queue.pop_front() {
        for (&cap, nodes) in &labels.by_capability {
            if admits(cap) && nodes.contains(&v) {
                output_capability(v, cap);
            }
        }
        if labels.explicit.contains(&v) {
            // Terminal: this node's own category is the story; do not expand
            // outward.
            continue;
        }
        let caller_name = &graph.node(v).name;
        let mut out: Vec<NodeId> = graph
            .outgoing(v)
            .iter()
            .filter_map(|&e| {
                let edge = graph.edge(e);
                let callee_name = &graph.node(edge.callee).name;
                if !classifier.include_edge(caller_name, callee_name) {
                    return None;
                }
                reach.contains(&edge.callee).then_some(edge.callee)
            })
            .collect();
        out.sort_by(|&a, &b| graph.compare_nodes(a, b));
        out.dedup();
        for w in out {
            output_call(v, w);
            if visited.insert(w) {
                queue.push_back(w);
            }
        }
    }
}

/// All nodes with a path to a capability leaf, walking incoming edges from
/// the (admitted) capability nodes. Safe nodes neither seed nor extend the
/// search.
fn backward_reach(
    graph: &CallGraph,
    labels: &NodeLabels,
    classifier: &Classifier,
    admits: &impl Fn(Capability) -> bool,
) -> FxHashSet<NodeId> {
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    let mut seeds: Vec<NodeId> = labels
        .by_capability
        .iter()
        .filter(|(&c, _)| admits(c))
        .flat_map(|(_, nodes)| nodes.iter().copied())
        .filter(|n| !labels.safe.contains(n))
        .collect();
    graph.sort_nodes(&mut seeds);
    seeds.dedup();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    for seed in seeds {
        if visited.insert(seed) {
            queue.push_back(seed);
        }
    }
    while let Some(v) = queue.pop_front() {
        let callee_name = &graph.node(v).name;
        for &e in graph.incoming(v) {
            let edge = graph.edge(e);
            let caller_name = &graph.node(edge.caller).name;
            if !classifier.include_edge(caller_name, callee_name) {
                continue;
            }
            if labels.safe.contains(&edge.caller) {
                continue;
            }
            if visited.insert(edge.caller) {
                queue.push_back(edge.caller);
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::assign_labels;
    use crate::graph::FunctionMeta;
    use crate::scanner::ScanResults;
    use std::collections::BTreeMap;

    fn graph_with(names: &[(&str, &str)], edges: &[(&str, &str)]) -> CallGraph {
        let mut g = CallGraph::new();
        for (name, pkg) in names {
            g.add_node(FunctionMeta {
                name: name.to_string(),
                package: Some(pkg.to_string()),
                origin: None,
                has_body: true,
                synthetic: false,
            });
        }
        for (caller, callee) in edges {
            let c = g.lookup(caller).unwrap();
            let e = g.lookup(callee).unwrap();
            g.add_edge(c, e, None);
        }
        g
    }

    fn collect(
        g: &CallGraph,
        classifier: &Classifier,
        queried: &[&str],
        filter: Option<&CapabilityFilter>,
    ) -> (BTreeSet<(String, String)>, BTreeMap<String, Vec<Capability>>) {
        let labels = assign_labels(g, classifier, &ScanResults::default());
        let queried: BTreeSet<String> = queried.iter().map(|s| s.to_string()).collect();
        let mut calls = BTreeSet::new();
        let mut caps: BTreeMap<String, Vec<Capability>> = BTreeMap::new();
        capability_graph(
            g,
            &labels,
            &queried,
            classifier,
            filter,
            &mut |from, to| {
                calls.insert((g.node(from).name.clone(), g.node(to).name.clone()));
            },
            &mut |node, c| caps.entry(g.node(node).name.clone()).or_default().push(c),
        );
        (calls, caps)
    }

    #[test]
    fn test_subgraph_contains_only_capability_paths() {
        let g = graph_with(
            &[
                ("app.Main", "example.com/app"),
                ("app.Pure", "example.com/app"),
                ("lib.Helper", "example.com/lib"),
                ("os.Getpid", "os"),
                ("strings.Join", "strings"),
            ],
            &[
                ("app.Main", "lib.Helper"),
                ("lib.Helper", "os.Getpid"),
                ("app.Pure", "strings.Join"),
            ],
        );
        let classifier = Classifier::builtin();
        let (calls, caps) = collect(&g, &classifier, &["example.com/app"], None);
        let expected_calls: BTreeSet<(String, String)> = [
            ("app.Main".to_string(), "lib.Helper".to_string()),
            ("lib.Helper".to_string(), "os.Getpid".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(calls, expected_calls);
        assert_eq!(
            caps.get("os.Getpid"),
            Some(&vec![Capability::ReadSystemState])
        );
        // The capability-free branch is absent entirely.
        assert!(!caps.contains_key("strings.Join"));
    }

    #[test]
    fn test_explicit_nodes_are_terminal() {
        let g = graph_with(
            &[
                ("app.Main", "example.com/app"),
                ("lib.Read", "example.com/lib"),
                ("syscall.Syscall", "syscall"),
            ],
            &[
                ("app.Main", "lib.Read"),
                ("lib.Read", "syscall.Syscall"),
            ],
        );
        let classifier = Classifier::load("t", "func lib.Read FILES\n", false).unwrap();
        let (calls, caps) = collect(&g, &classifier, &["example.com/app"], None);
        assert!(calls.contains(&("app.Main".to_string(), "lib.Read".to_string())));
        // No expansion beyond the explicitly categorized node.
        assert!(!calls.contains(&("lib.Read".to_string(), "syscall.Syscall".to_string())));
        assert_eq!(caps.get("lib.Read"), Some(&vec![Capability::Files]));
    }

    #[test]
    fn test_filter_prunes_branches() {
        let g = graph_with(
            &[
                ("app.Main", "example.com/app"),
                ("os.Getpid", "os"),
                ("net.Dial", "net"),
            ],
            &[
                ("app.Main", "os.Getpid"),
                ("app.Main", "net.Dial"),
            ],
        );
        let classifier = Classifier::builtin();
        let filter = CapabilityFilter::inclusive([Capability::Network]);
        let (calls, caps) = collect(&g, &classifier, &["example.com/app"], Some(&filter));
        assert!(calls.contains(&("app.Main".to_string(), "net.Dial".to_string())));
        assert!(!calls.contains(&("app.Main".to_string(), "os.Getpid".to_string())));
        assert!(!caps.contains_key("os.Getpid"));
    }
}
