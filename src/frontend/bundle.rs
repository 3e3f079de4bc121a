//! Bundle front-end: a serialized program description on disk.
//!
//! A bundle is the JSON form of [`ProgramSources`], exported by a language
//! front-end after parsing, type checking, and escape analysis. Build
//! constraints were applied when the bundle was produced, so `load` validates
//! the requested patterns against the bundle's package set rather than
//! re-running constraint logic.
//!
//! `build` derives the inter-procedural call graph from the (possibly
//! rewritten) syntax trees:
//!
//! - statically resolved calls produce a single edge;
//! - method calls on a concrete receiver type resolve to that type's method
//!   (the variable-type refinement);
//! - method calls on an interface-typed receiver produce one edge per
//!   implementing type in the whole program (the class-hierarchy
//!   over-approximation the rewriter exists to narrow);
//! - immediately invoked function literals produce a direct edge;
//! - dynamic calls with no static resolution produce no edge at all, which
//!   is also how dispatch through a nil interface is (silently) pruned;
//! - package-scope variable initializers contribute edges from the package's
//!   implicit `<pkg>.init` function.

use crate::error::Error;
use crate::graph::{CallGraph, FunctionMeta, NodeId};
use crate::syntax::{walk_block_exprs, Block, Callee, Expr, ExprKind, Package};
use crate::types::Site;
use std::path::Path;
use tracing::debug;

use super::{BuiltProgram, Frontend, LoadOptions, ProgramSources};

#[derive(Debug, Clone)]
pub struct BundleFrontend {
    path: std::path::PathBuf,
}

impl BundleFrontend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Frontend for BundleFrontend {
    fn load(&self, patterns: &[String], _options: &LoadOptions) -> Result<ProgramSources, Error> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::load_from_messages(&[format!("reading bundle {}: {e}", self.path.display())])
        })?;
        let mut sources: ProgramSources = serde_json::from_str(&text).map_err(|e| {
            Error::load_from_messages(&[format!("parsing bundle {}: {e}", self.path.display())])
        })?;
        if sources.packages.is_empty() {
            return Err(Error::load_from_messages(&["bundle contains no packages".to_string()]));
        }
        if !patterns.is_empty() {
            sources.roots = resolve_patterns(&sources, patterns)?;
        }
        if sources.roots.is_empty() {
            return Err(Error::load_from_messages(&["no packages requested".to_string()]));
        }
        debug!(
            packages = sources.packages.len(),
            roots = sources.roots.len(),
            "loaded bundle"
        );
        Ok(sources)
    }

    fn build(&self, sources: &ProgramSources) -> Result<BuiltProgram, Error> {
        build_program(sources)
    }
}

/// Match package patterns against the bundle's package set. A trailing
/// `/...` matches the package and everything below it.
fn resolve_patterns(sources: &ProgramSources, patterns: &[String]) -> Result<Vec<String>, Error> {
    let mut roots = Vec::new();
    let mut errors = Vec::new();
    for pattern in patterns {
        let mut matched = false;
        for pkg in &sources.packages {
            let hit = match pattern.strip_suffix("/...") {
                Some(prefix) => {
                    pkg.path == prefix || pkg.path.starts_with(&format!("{prefix}/"))
                }
                None => pkg.path == *pattern,
            };
            if hit {
                matched = true;
                if !roots.contains(&pkg.path) {
                    roots.push(pkg.path.clone());
                }
            }
        }
        if !matched {
            errors.push(format!("no packages matching {pattern:?}"));
        }
    }
    if !errors.is_empty() {
        return Err(Error::load_from_messages(&errors));
    }
    Ok(roots)
}

/// Derive the call graph from program sources. Exposed for tests and for
/// front-ends that hold sources in memory.
pub fn build_program(sources: &ProgramSources) -> Result<BuiltProgram, Error> {
    let mut graph = CallGraph::new();

    // Declared functions first, so later auto-created callee nodes cannot
    // shadow a real declaration.
    for pkg in &sources.packages {
        for file in &pkg.files {
            for decl in &file.functions {
                add_declared(&mut graph, &decl.name, pkg);
                for (lit_name, _) in nested_literals(&decl.body) {
                    add_declared(&mut graph, &lit_name, pkg);
                }
            }
            for init in &file.var_inits {
                add_declared(&mut graph, &pkg.init_function(), pkg);
                collect_literal_names_expr(init, &mut |name| {
                    add_declared(&mut graph, name, pkg);
                });
            }
        }
    }
    for ext in &sources.externs {
        graph.add_node(FunctionMeta {
            name: ext.name.clone(),
            package: ext.package.clone(),
            origin: ext.origin.clone(),
            has_body: ext.has_body,
            synthetic: ext.synthetic,
        });
    }

    // Edges from every function body, including function literal bodies and
    // package-scope variable initializers.
    for pkg in &sources.packages {
        for file in &pkg.files {
            for decl in &file.functions {
                let caller = graph
                    .lookup(&decl.name)
                    .ok_or_else(|| Error::internal(format!("missing node for {}", decl.name)))?;
                add_edges_for_body(&mut graph, sources, caller, &decl.body);
            }
            for init in &file.var_inits {
                let init_name = pkg.init_function();
                let caller = graph
                    .lookup(&init_name)
                    .ok_or_else(|| Error::internal(format!("missing node for {init_name}")))?;
                add_edges_for_expr(&mut graph, sources, caller, init);
            }
        }
    }

    let package_names = sources
        .packages
        .iter()
        .map(|p| (p.path.clone(), p.name.clone()))
        .collect();

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built call graph"
    );
    Ok(BuiltProgram {
        graph,
        package_names,
    })
}

fn add_declared(graph: &mut CallGraph, name: &str, pkg: &Package) {
    graph.add_node(FunctionMeta {
        name: name.to_string(),
        package: Some(pkg.path.clone()),
        origin: None,
        has_body: true,
        synthetic: false,
    });
}

/// Names and bodies of all function literals in a block, including literals
/// nested inside other literals.
fn nested_literals(block: &Block) -> Vec<(String, &Block)> {
    let mut out: Vec<(String, &Block)> = crate::syntax::collect_func_lits(block)
        .into_iter()
        .map(|(name, body)| (name.to_string(), body))
        .collect();
    // collect_func_lits reports only directly contained literals; walk the
    // newly found bodies too.
    let mut i = 0;
    while i < out.len() {
        let body = out[i].1;
        for (name, inner) in crate::syntax::collect_func_lits(body) {
            out.push((name.to_string(), inner));
        }
        i += 1;
    }
    out
}

fn collect_literal_names_expr(e: &Expr, f: &mut impl FnMut(&str)) {
    crate::syntax::walk_expr(e, &mut |sub| {
        if let ExprKind::FuncLit { name, body } = &sub.kind {
            f(name);
            for (nested, _) in nested_literals(body) {
                f(&nested);
            }
        }
    });
}

fn add_edges_for_body(
    graph: &mut CallGraph,
    sources: &ProgramSources,
    caller: NodeId,
    body: &Block,
) {
    let mut calls: Vec<(&Callee, Option<Site>)> = Vec::new();
    walk_block_exprs(body, &mut |e| {
        if let ExprKind::Call { callee, site, .. } = &e.kind {
            calls.push((callee, site.clone()));
        }
    });
    for (callee, site) in calls {
        add_call_edges(graph, sources, caller, callee, site);
    }
    // Function literal bodies belong to the literal's own node.
    for (lit_name, lit_body) in crate::syntax::collect_func_lits(body) {
        if let Some(lit_node) = graph.lookup(lit_name) {
            add_edges_for_body(graph, sources, lit_node, lit_body);
        }
    }
}

fn add_edges_for_expr(
    graph: &mut CallGraph,
    sources: &ProgramSources,
    caller: NodeId,
    expr: &Expr,
) {
    let mut calls: Vec<(&Callee, Option<Site>)> = Vec::new();
    crate::syntax::walk_expr(expr, &mut |e| {
        if let ExprKind::Call { callee, site, .. } = &e.kind {
            calls.push((callee, site.clone()));
        }
    });
    for (callee, site) in calls {
        add_call_edges(graph, sources, caller, callee, site);
    }
    crate::syntax::walk_expr(expr, &mut |e| {
        if let ExprKind::FuncLit { name, body } = &e.kind {
            if let Some(lit_node) = graph.lookup(name) {
                add_edges_for_body(graph, sources, lit_node, body);
            }
        }
    });
}

fn add_call_edges(
    graph: &mut CallGraph,
    sources: &ProgramSources,
    caller: NodeId,
    callee: &Callee,
    site: Option<Site>,
) {
    let expr = match callee {
        // A call whose callee is a type is a conversion, not a call.
        Callee::Type(_) => return,
        Callee::Expr(e) => e,
    };
    for target in resolve_targets(sources, expr) {
        let callee_node = intern_callee(graph, &target);
        graph.add_edge(caller, callee_node, site.clone());
    }
}

/// The possible static targets of a call through `expr`.
fn resolve_targets(sources: &ProgramSources, expr: &Expr) -> Vec<String> {
    match &expr.kind {
        ExprKind::Ident { resolved: Some(f), .. } => vec![f.clone()],
        ExprKind::Selector {
            resolved: Some(f), ..
        } => vec![f.clone()],
        ExprKind::FuncLit { name, .. } => vec![name.clone()],
        ExprKind::Selector { base, name, .. } => {
            // A selection over a package alias is a package-scope function.
            if let ExprKind::Ident {
                package: Some(pkg), ..
            } = &base.kind
            {
                return vec![format!("{pkg}.{name}")];
            }
            let Some(recv_ty) = base.ty else {
                return Vec::new();
            };
            if sources.types.interface_methods(recv_ty).is_some() {
                // Interface dispatch: every implementing type in the program.
                sources
                    .types
                    .implementations(recv_ty)
                    .into_iter()
                    .filter_map(|t| sources.types.method(t, name))
                    .map(|m| m.func.clone())
                    .collect()
            } else {
                sources
                    .types
                    .method(recv_ty, name)
                    .map(|m| vec![m.func.clone()])
                    .unwrap_or_default()
            }
        }
        ExprKind::Paren { inner } => resolve_targets(sources, inner),
        _ => Vec::new(),
    }
}

/// Get or create the node for a call target. Targets with no declaration and
/// no extern entry become bodyless, non-synthetic nodes; the scanner will
/// give them `ArbitraryExecution` unless the classifier categorizes them.
fn intern_callee(graph: &mut CallGraph, name: &str) -> NodeId {
    if let Some(id) = graph.lookup(name) {
        return id;
    }
    graph.add_node(FunctionMeta {
        name: name.to_string(),
        package: infer_package(name),
        origin: None,
        has_body: false,
        synthetic: false,
    })
}

/// Infer the owning package from a fully qualified function name:
/// `net/http.Get` -> `net/http`, `(*os.File).Read` -> `os`.
pub(crate) fn infer_package(name: &str) -> Option<String> {
    let qualified = if let Some(rest) = name.strip_prefix('(') {
        let inner = rest.trim_start_matches('*');
        inner.split(')').next().unwrap_or(inner)
    } else {
        name
    };
    qualified.rsplit_once('.').map(|(pkg, _)| pkg.to_string())
}
