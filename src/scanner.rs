//! Syntax- and IR-level detection of capabilities the classifier cannot see.
//!
//! Three findings feed the *extra* capability map:
//!
//! - **Unsafe-pointer conversions.** A conversion (call expression whose
//!   callee is a type) whose sole argument has the raw-pointer type as its
//!   underlying type, converting to anything other than the machine-word
//!   integer type, is the general escape from the language's type safety.
//!   The innermost enclosing function definition is flagged; a conversion in
//!   a package-scope variable initializer flags the package's implicit
//!   initializer function.
//! - **Reflection-value aliasing.** A store of a reflection-value (or of a
//!   value structurally containing one) to a location that is not a local,
//!   non-escaping allocation can be raced to produce torn values that
//!   type-confuse function pointers. Locality is closed under element- and
//!   field-address derivation.
//! - **Bodyless functions.** A function with no body that is not
//!   compiler-synthesized is assembly or an external import; callers inherit
//!   `ArbitraryExecution` unless the classifier categorizes the function
//!   explicitly.
//!
//! Extra findings merge only into nodes without an explicit classifier
//! category (see `analyzer::assign_labels`).

use crate::frontend::ProgramSources;
use crate::graph::{CallGraph, NodeId};
use crate::ir::{IrFunction, IrInstr};
use crate::syntax::{walk_block_exprs, Block, Callee, Expr, ExprKind, Package};
use crate::types::Capability;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use tracing::debug;

/// Additional capabilities per call-graph node, found by source inspection.
#[derive(Debug, Default)]
pub struct ScanResults {
    pub extra: BTreeMap<Capability, FxHashSet<NodeId>>,
}

impl ScanResults {
    fn add(&mut self, cap: Capability, node: NodeId) {
        self.extra.entry(cap).or_default().insert(node);
    }
}

pub fn scan(sources: &ProgramSources, graph: &CallGraph) -> ScanResults {
    let mut results = ScanResults::default();
    scan_unsafe_conversions(sources, graph, &mut results);
    scan_reflect_aliasing(sources, graph, &mut results);
    scan_bodyless(graph, &mut results);
    debug!(
        unsafe_pointer = results
            .extra
            .get(&Capability::UnsafePointer)
            .map_or(0, |s| s.len()),
        reflect = results.extra.get(&Capability::Reflect).map_or(0, |s| s.len()),
        arbitrary_execution = results
            .extra
            .get(&Capability::ArbitraryExecution)
            .map_or(0, |s| s.len()),
        "syntactic scan complete"
    );
    results
}

// ---------------------------------------------------------------------------
// Unsafe-pointer conversions
// ---------------------------------------------------------------------------

fn scan_unsafe_conversions(sources: &ProgramSources, graph: &CallGraph, out: &mut ScanResults) {
    for pkg in &sources.packages {
        for file in &pkg.files {
            for decl in &file.functions {
                scan_function_conversions(sources, graph, &decl.name, &decl.body, out);
            }
            for init in &file.var_inits {
                scan_init_conversions(sources, graph, pkg, init, out);
            }
        }
    }
}

fn scan_function_conversions(
    sources: &ProgramSources,
    graph: &CallGraph,
    function: &str,
    body: &Block,
    out: &mut ScanResults,
) {
    let mut found = false;
    walk_block_exprs(body, &mut |e| {
        if is_unsafe_conversion(sources, e) {
            found = true;
        }
    });
    if found {
        flag(graph, function, Capability::UnsafePointer, out);
    }
    // Function literals are their own definitions; a conversion inside one
    // flags the literal, not the enclosing function.
    for (lit_name, lit_body) in crate::syntax::collect_func_lits(body) {
        scan_function_conversions(sources, graph, lit_name, lit_body, out);
    }
}

fn scan_init_conversions(
    sources: &ProgramSources,
    graph: &CallGraph,
    pkg: &Package,
    init: &Expr,
    out: &mut ScanResults,
) {
    let mut found = false;
    let mut literals: Vec<(&str, &Block)> = Vec::new();
    crate::syntax::walk_expr(init, &mut |e| {
        if is_unsafe_conversion(sources, e) {
            found = true;
        }
        if let ExprKind::FuncLit { name, body } = &e.kind {
            literals.push((name.as_str(), body));
        }
    });
    if found {
        flag(graph, &pkg.init_function(), Capability::UnsafePointer, out);
    }
    for (lit_name, lit_body) in literals {
        scan_function_conversions(sources, graph, lit_name, lit_body, out);
    }
}

/// A conversion of a raw pointer to anything but the machine-word integer
/// type.
fn is_unsafe_conversion(sources: &ProgramSources, e: &Expr) -> bool {
    let ExprKind::Call { callee, args, .. } = &e.kind else {
        return false;
    };
    let Callee::Type(target) = callee else {
        return false;
    };
    if sources
        .types
        .is_basic(*target, crate::syntax::BasicKind::Uintptr)
    {
        // Converting a raw pointer to the pointer-sized integer is safe on
        // its own.
        return false;
    }
    let [arg] = args.as_slice() else {
        return false;
    };
    let Some(arg_ty) = arg.ty else {
        return false;
    };
    sources
        .types
        .is_basic(arg_ty, crate::syntax::BasicKind::RawPointer)
}

// ---------------------------------------------------------------------------
// Reflection-value aliasing
// ---------------------------------------------------------------------------

fn scan_reflect_aliasing(sources: &ProgramSources, graph: &CallGraph, out: &mut ScanResults) {
    for function in &sources.ir.functions {
        if function_aliases_reflect_value(sources, function) {
            flag(graph, &function.name, Capability::Reflect, out);
        }
    }
}

fn function_aliases_reflect_value(sources: &ProgramSources, function: &IrFunction) -> bool {
    // Local, non-escaping storage, closed under element- and field-address
    // derivation.
    let mut locals: FxHashSet<_> = function
        .locals
        .iter()
        .filter(|l| !l.escapes)
        .map(|l| l.value)
        .collect();
    for instr in &function.instrs {
        match instr {
            IrInstr::IndexAddr { dest, base } | IrInstr::FieldAddr { dest, base } => {
                if locals.contains(base) {
                    locals.insert(*dest);
                }
            }
            IrInstr::Store { dest, stored } => {
                if !locals.contains(dest) && sources.types.contains_reflect_value(*stored) {
                    return true;
                }
            }
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Bodyless functions
// ---------------------------------------------------------------------------

fn scan_bodyless(graph: &CallGraph, out: &mut ScanResults) {
    for id in graph.node_ids() {
        let meta = graph.node(id);
        if !meta.has_body && !meta.synthetic {
            out.add(Capability::ArbitraryExecution, id);
        }
    }
}

fn flag(graph: &CallGraph, function: &str, cap: Capability, out: &mut ScanResults) {
    match graph.lookup(function) {
        Some(node) => out.add(cap, node),
        None => debug!(function, "scan flagged a function missing from the graph"),
    }
}
