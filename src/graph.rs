//! Call-graph data model.
//!
//! A directed multigraph over function nodes with constant-time access to
//! incoming and outgoing edges, traversable in both directions. Nodes and
//! edges live in dense arenas; adjacency lists hold edge indexes. The graph
//! may contain cycles.
//!
//! Two total orders defined here make every traversal deterministic:
//! - nodes order by (package path, receiver-bearing after plain functions,
//!   full name);
//! - edges order by caller node order, then call-site position with missing
//!   positions last.

use crate::types::Site;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub u32);

/// Identity of a generic function template, for instantiations whose own
/// package information is incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub name: String,
    pub package: Option<String>,
}

/// Identity and markers for one function node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMeta {
    /// Fully qualified name, e.g. `example.com/store.Put` or
    /// `(*sync.Cond).Signal`. Receiver-bearing names start with `(`.
    pub name: String,
    /// Owning package path. Empty for compiler-synthetic wrappers.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub package: Option<String>,
    /// For instantiations of a generic function, the generic template.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub origin: Option<Origin>,
    pub has_body: bool,
    #[serde(default)]
    pub synthetic: bool,
}

impl FunctionMeta {
    pub fn is_method(&self) -> bool {
        self.name.starts_with('(')
    }

    /// Package path used for ordering and Direct/Transitive classification:
    /// instantiations fall back to their origin's package.
    pub fn effective_package(&self) -> Option<&str> {
        match (&self.package, &self.origin) {
            (Some(p), _) => Some(p.as_str()),
            (None, Some(o)) => o.package.as_deref(),
            (None, None) => None,
        }
    }
}

/// A standard-library package path contains no dot; anything fetched from a
/// host carries a domain in its first segment.
pub fn is_std_lib(package: &str) -> bool {
    !package.contains('.')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub caller: NodeId,
    pub callee: NodeId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub site: Option<Site>,
}

#[derive(Debug, Default, Clone)]
pub struct CallGraph {
    nodes: Vec<FunctionMeta>,
    edges: Vec<Edge>,
    incoming: Vec<Vec<EdgeId>>,
    outgoing: Vec<Vec<EdgeId>>,
    by_name: FxHashMap<String, NodeId>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, deduplicating by fully qualified name. A later insert
    /// with the same name keeps the first node but upgrades `has_body` if the
    /// new metadata has a body (a declaration followed by a definition).
    pub fn add_node(&mut self, meta: FunctionMeta) -> NodeId {
        if let Some(&id) = self.by_name.get(&meta.name) {
            if meta.has_body && !self.nodes[id.0 as usize].has_body {
                self.nodes[id.0 as usize].has_body = true;
            }
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.by_name.insert(meta.name.clone(), id);
        self.nodes.push(meta);
        self.incoming.push(Vec::new());
        self.outgoing.push(Vec::new());
        id
    }

    pub fn add_edge(&mut self, caller: NodeId, callee: NodeId, site: Option<Site>) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            caller,
            callee,
            site,
        });
        self.outgoing[caller.0 as usize].push(id);
        self.incoming[callee.0 as usize].push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &FunctionMeta {
        &self.nodes[id.0 as usize]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn incoming(&self, id: NodeId) -> &[EdgeId] {
        &self.incoming[id.0 as usize]
    }

    pub fn outgoing(&self, id: NodeId) -> &[EdgeId] {
        &self.outgoing[id.0 as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId(i as u32))
    }

    /// Total order on nodes: package path, then plain functions before
    /// methods, then full name. Nodes without a package sort last.
    pub fn compare_nodes(&self, a: NodeId, b: NodeId) -> Ordering {
        let (na, nb) = (self.node(a), self.node(b));
        let pa = na.effective_package();
        let pb = nb.effective_package();
        match (pa, pb) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| na.is_method().cmp(&nb.is_method()))
        .then_with(|| na.name.cmp(&nb.name))
    }

    /// Total order on edges: caller node order, then call-site position with
    /// missing positions last, then callee order as a final tiebreak.
    pub fn compare_edges_by_caller(&self, a: EdgeId, b: EdgeId) -> Ordering {
        let (ea, eb) = (self.edge(a), self.edge(b));
        self.compare_nodes(ea.caller, eb.caller)
            .then_with(|| compare_sites(ea.site.as_ref(), eb.site.as_ref()))
            .then_with(|| self.compare_nodes(ea.callee, eb.callee))
    }

    pub fn sort_nodes(&self, ids: &mut [NodeId]) {
        ids.sort_by(|&a, &b| self.compare_nodes(a, b));
    }
}

/// Order positions by filename, then line, then column; missing positions
/// sort last.
pub fn compare_sites(a: Option<&Site>, b: Option<&Site>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
