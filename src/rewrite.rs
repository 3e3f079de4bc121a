//! Syntax rewriting for higher-order standard-library calls.
//!
//! Call-graph construction over-approximates interface-dispatch call sites
//! inside functions like `sort.Sort` with every implementing type in the
//! program, attributing other values' methods to every caller of the sort
//! machinery. Rewriting statement-level calls to these functions into direct
//! calls of the locally visible argument collapses those synthetic edges to
//! the one dynamic type that actually flows in.
//!
//! Two pattern families are recognized:
//!
//! - `sort.Sort(x)` / `sort.Stable(x)` / `sort.IsSorted(x)` become a block
//!   calling the interface methods directly: `x.Less(0,0); x.Swap(0,0);
//!   x.Len()`. Literal argument values are irrelevant since the analysis
//!   does not interpret values.
//! - `once.Do(fn)`, `sort.Slice(xs, fn)`, `sort.SliceStable(xs, fn)` become
//!   a direct call of the function-typed argument with zero-valued
//!   arguments matching its parameter count.
//!
//! A statement is only replaced by a block where a block is admitted: inside
//! a block, a case clause, a labeled statement, or a non-default
//! communication clause. Method receivers must be side-effect-free, so the
//! analysis still sees subordinate calls like `foo().Do(bar)`. Everything
//! that does not match is left exactly as the front-end produced it.
//!
//! This runs before the front-end builds the IR and call graph; it is the
//! sole mutator in the pipeline.

use crate::frontend::ProgramSources;
use crate::syntax::{
    may_have_side_effects, BasicKind, Block, Callee, CommClause, Expr, ExprKind, Stmt, TypeId,
    TypeKind, TypeTable,
};
use tracing::debug;

const SORT_PACKAGE: &str = "sort";
const SORT_FUNCTIONS: [&str; 3] = ["Sort", "Stable", "IsSorted"];
const SORT_METHODS: [(&str, usize); 3] = [("Less", 2), ("Swap", 2), ("Len", 0)];

/// A package-scope function with a function-typed parameter to call directly.
struct PackageFunctionTarget {
    package: &'static str,
    function: &'static str,
    fn_param_index: usize,
}

/// A method with a function-typed parameter to call directly.
struct MethodTarget {
    type_name: &'static str,
    method: &'static str,
    fn_param_index: usize,
}

const PACKAGE_FUNCTION_TARGETS: [PackageFunctionTarget; 2] = [
    PackageFunctionTarget {
        package: "sort",
        function: "Slice",
        fn_param_index: 1,
    },
    PackageFunctionTarget {
        package: "sort",
        function: "SliceStable",
        fn_param_index: 1,
    },
];

const METHOD_TARGETS: [MethodTarget; 1] = [MethodTarget {
    type_name: "sync.Once",
    method: "Do",
    fn_param_index: 0,
}];

/// Rewrite every file of every package in place.
pub fn rewrite_sources(sources: &mut ProgramSources) {
    let int_ty = sources.types.ensure_basic(BasicKind::Int);
    let mut rewriter = Rewriter {
        types: &sources.types,
        int_ty,
        rewritten: 0,
    };
    for pkg in &mut sources.packages {
        for file in &mut pkg.files {
            for decl in &mut file.functions {
                rewriter.rewrite_block(&mut decl.body);
            }
            for init in &mut file.var_inits {
                rewriter.rewrite_expr_literals(init);
            }
        }
    }
    if rewriter.rewritten > 0 {
        debug!(call_sites = rewriter.rewritten, "rewrote higher-order calls");
    }
}

struct Rewriter<'a> {
    types: &'a TypeTable,
    int_ty: TypeId,
    rewritten: usize,
}

impl Rewriter<'_> {
    fn rewrite_block(&mut self, block: &mut Block) {
        self.rewrite_stmt_list(&mut block.stmts);
    }

    /// Rewrite a list of statements. List positions admit block
    /// substitution, so both pattern families apply here.
    fn rewrite_stmt_list(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.rewrite_list_position_stmt(stmt);
        }
    }

    fn rewrite_list_position_stmt(&mut self, stmt: &mut Stmt) {
        self.rewrite_stmt_children(stmt);
        // A labeled statement's inner statement is itself in a rewritable
        // position.
        if let Stmt::Labeled { stmt: inner, .. } = stmt {
            self.try_rewrite_in_place(inner, true);
            return;
        }
        self.try_rewrite_in_place(stmt, true);
    }

    /// Attempt both rewrites on one statement. `admits_block` is true in
    /// statement-list positions; elsewhere (a `for` post-statement, a
    /// default communication clause) only the single-statement direct-call
    /// substitution is allowed.
    fn try_rewrite_in_place(&mut self, stmt: &mut Stmt, admits_block: bool) {
        if admits_block {
            if let Some(replacement) = self.match_sort_statement(stmt) {
                *stmt = replacement;
                self.rewritten += 1;
                return;
            }
        }
        if let Some(replacement) = self.match_function_argument_call(stmt) {
            *stmt = replacement;
            self.rewritten += 1;
        }
    }

    /// Recurse into nested statements and into function literal bodies
    /// appearing in expressions.
    fn rewrite_stmt_children(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Expr(e) => self.rewrite_expr_literals(e),
            Stmt::Block(b) => self.rewrite_block(b),
            Stmt::Labeled { stmt, .. } => self.rewrite_stmt_children(stmt),
            Stmt::If { cond, then, els } => {
                self.rewrite_expr_literals(cond);
                self.rewrite_block(then);
                if let Some(e) = els {
                    self.rewrite_list_position_stmt(e);
                }
            }
            Stmt::For { post, body } => {
                if let Some(p) = post {
                    self.rewrite_stmt_children(p);
                    // The post-statement position cannot hold a block.
                    self.try_rewrite_in_place(p, false);
                }
                self.rewrite_block(body);
            }
            Stmt::Switch { cases } => {
                for c in cases {
                    self.rewrite_stmt_list(&mut c.body);
                }
            }
            Stmt::Select { clauses } => {
                for c in clauses {
                    self.rewrite_comm_clause(c);
                }
            }
            Stmt::Assign { lhs, rhs } => {
                for e in lhs.iter_mut().chain(rhs) {
                    self.rewrite_expr_literals(e);
                }
            }
            Stmt::Return { results } => {
                for e in results {
                    self.rewrite_expr_literals(e);
                }
            }
        }
    }

    fn rewrite_comm_clause(&mut self, clause: &mut CommClause) {
        if clause.is_default {
            // Default clauses do not admit block substitution; only the
            // direct-call rewrite applies.
            for stmt in &mut clause.body {
                self.rewrite_stmt_children(stmt);
                self.try_rewrite_in_place(stmt, false);
            }
        } else {
            self.rewrite_stmt_list(&mut clause.body);
        }
    }

    /// Rewrite statements inside function literal bodies found in an
    /// expression tree.
    fn rewrite_expr_literals(&mut self, e: &mut Expr) {
        let mut bodies: Vec<&mut Block> = Vec::new();
        collect_literal_bodies_mut(e, &mut bodies);
        for body in bodies {
            self.rewrite_block(body);
        }
    }

    /// `sort.Sort(x)` (and Stable/IsSorted) as a statement, with all three
    /// interface methods resolvable on the argument's static type.
    fn match_sort_statement(&mut self, stmt: &Stmt) -> Option<Stmt> {
        let (callee, args, site) = statement_call_parts(stmt)?;
        let (base, name) = selector_parts(callee)?;
        let pkg = package_alias(base)?;
        if pkg != SORT_PACKAGE || !SORT_FUNCTIONS.contains(&name) || args.len() != 1 {
            return None;
        }
        let receiver = &args[0];
        let recv_ty = receiver.ty?;
        // All three methods must resolve; an untyped nil receiver resolves
        // nothing and the statement stays as it is.
        for (method, _) in SORT_METHODS {
            if !self.method_resolves(recv_ty, method) {
                return None;
            }
        }
        let stmts = SORT_METHODS
            .iter()
            .map(|&(method, argc)| {
                self.statement_calling_method(receiver.clone(), method, argc, site.clone())
            })
            .collect();
        Some(Stmt::Block(Block { stmts }))
    }

    fn method_resolves(&self, recv_ty: TypeId, method: &str) -> bool {
        if let Some(methods) = self.types.interface_methods(recv_ty) {
            return methods.iter().any(|m| m == method);
        }
        self.types.method(recv_ty, method).is_some()
    }

    fn statement_calling_method(
        &self,
        receiver: Expr,
        method: &str,
        arg_count: usize,
        site: Option<crate::types::Site>,
    ) -> Stmt {
        let args = (0..arg_count).map(|_| Expr::int_lit(0, self.int_ty)).collect();
        Stmt::Expr(Expr {
            kind: ExprKind::Call {
                callee: Callee::Expr(Box::new(Expr {
                    kind: ExprKind::Selector {
                        base: Box::new(receiver),
                        name: method.to_string(),
                        resolved: None,
                    },
                    ty: None,
                })),
                args,
                site,
            },
            ty: None,
        })
    }

    /// `once.Do(fn)`, `sort.Slice(xs, fn)`, `sort.SliceStable(xs, fn)` as a
    /// statement: replace with a direct call of the function-typed argument.
    fn match_function_argument_call(&mut self, stmt: &Stmt) -> Option<Stmt> {
        let (callee, args, site) = statement_call_parts(stmt)?;
        let fn_arg = self
            .match_package_function(callee, args)
            .or_else(|| self.match_method(callee, args))?;
        let params = self.function_param_count(fn_arg)?;
        let zeros = (0..params).map(|_| Expr::int_lit(0, self.int_ty)).collect();
        Some(Stmt::Expr(Expr {
            kind: ExprKind::Call {
                callee: Callee::Expr(Box::new(fn_arg.clone())),
                args: zeros,
                site: site.clone(),
            },
            ty: None,
        }))
    }

    fn match_package_function<'e>(&self, callee: &Expr, args: &'e [Expr]) -> Option<&'e Expr> {
        let (base, name) = selector_parts(callee)?;
        let pkg = package_alias(base)?;
        for target in &PACKAGE_FUNCTION_TARGETS {
            if pkg == target.package
                && name == target.function
                && args.len() > target.fn_param_index
            {
                return Some(&args[target.fn_param_index]);
            }
        }
        None
    }

    fn match_method<'e>(&self, callee: &Expr, args: &'e [Expr]) -> Option<&'e Expr> {
        let (base, name) = selector_parts(callee)?;
        // Something like foo().Do(bar) cannot be rewritten to bar(): the
        // analysis would no longer see the call to foo.
        if may_have_side_effects(base) {
            return None;
        }
        let recv_ty = base.ty?;
        let named = self.types.get(self.types.strip_pointer(recv_ty));
        for target in &METHOD_TARGETS {
            if named.name.as_deref() == Some(target.type_name)
                && name == target.method
                && args.len() > target.fn_param_index
            {
                return Some(&args[target.fn_param_index]);
            }
        }
        None
    }

    fn function_param_count(&self, fn_arg: &Expr) -> Option<usize> {
        let ty = fn_arg.ty?;
        match &self.types.get(self.types.underlying(ty)).kind {
            TypeKind::Func { params } => Some(params.len()),
            _ => None,
        }
    }
}

/// Destructure a statement that is just a call expression.
fn statement_call_parts(stmt: &Stmt) -> Option<(&Expr, &[Expr], Option<crate::types::Site>)> {
    let Stmt::Expr(Expr {
        kind: ExprKind::Call { callee, args, site },
        ..
    }) = stmt
    else {
        return None;
    };
    let Callee::Expr(callee) = callee else {
        return None;
    };
    Some((callee.as_ref(), args.as_slice(), site.clone()))
}

fn selector_parts(e: &Expr) -> Option<(&Expr, &str)> {
    match &e.kind {
        ExprKind::Selector { base, name, .. } => Some((base.as_ref(), name.as_str())),
        _ => None,
    }
}

fn package_alias(e: &Expr) -> Option<&str> {
    match &e.kind {
        ExprKind::Ident {
            package: Some(p), ..
        } => Some(p.as_str()),
        _ => None,
    }
}

fn collect_literal_bodies_mut<'e>(e: &'e mut Expr, out: &mut Vec<&'e mut Block>) {
    match &mut e.kind {
        ExprKind::FuncLit { body, .. } => out.push(body),
        ExprKind::Ident { .. } | ExprKind::IntLit(_) | ExprKind::StrLit(_) => {}
        ExprKind::Selector { base, .. } => collect_literal_bodies_mut(base, out),
        ExprKind::Call { callee, args, .. } => {
            if let Callee::Expr(c) = callee {
                collect_literal_bodies_mut(c, out);
            }
            for a in args {
                collect_literal_bodies_mut(a, out);
            }
        }
        ExprKind::Composite { elems } => {
            for e in elems {
                collect_literal_bodies_mut(e, out);
            }
        }
        ExprKind::Index { base, index } => {
            collect_literal_bodies_mut(base, out);
            collect_literal_bodies_mut(index, out);
        }
        ExprKind::Slice {
            base,
            low,
            high,
            max,
        } => {
            collect_literal_bodies_mut(base, out);
            for e in [low, high, max].into_iter().flatten() {
                collect_literal_bodies_mut(e, out);
            }
        }
        ExprKind::Unary { operand } | ExprKind::Deref { operand } => {
            collect_literal_bodies_mut(operand, out)
        }
        ExprKind::Binary { left, right } => {
            collect_literal_bodies_mut(left, out);
            collect_literal_bodies_mut(right, out);
        }
        ExprKind::Paren { inner } => collect_literal_bodies_mut(inner, out),
        ExprKind::KeyValue { key, value } => {
            collect_literal_bodies_mut(key, out);
            collect_literal_bodies_mut(value, out);
        }
        ExprKind::TypeAssert { base } => collect_literal_bodies_mut(base, out),
    }
}
