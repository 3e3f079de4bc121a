//! Typed syntax model supplied by the language front-end.
//!
//! The analyzer does not parse or type-check source; it consumes a
//! front-end's view of the program. This module defines that view: a type
//! table (with named-type method sets, sufficient to answer underlying-type
//! and method-resolution questions), packages with their files, and function
//! bodies down to the expression level. Types are intrinsic to expression
//! nodes, so code that constructs new nodes (the rewriter) keeps type
//! information consistent by construction.
//!
//! Everything here serializes with serde; a program description produced by a
//! front-end round-trips through JSON (see `frontend::bundle`).

use crate::types::Site;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fully qualified name of the reflection-value type.
pub const REFLECT_VALUE_TYPE: &str = "reflect.Value";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasicKind {
    Bool,
    Int,
    /// The machine-word integer type that may hold a pointer value. A
    /// conversion from a raw pointer to this type is not an escape from type
    /// safety on its own.
    Uintptr,
    Float,
    Str,
    /// The language's raw-pointer type.
    RawPointer,
}

/// A method in a named type's method set, mapping the method name to the
/// fully qualified function implementing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub func: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Basic(BasicKind),
    Named { underlying: TypeId },
    Pointer { elem: TypeId },
    Struct { fields: Vec<TypeId> },
    Array { elem: TypeId },
    Slice { elem: TypeId },
    Interface { methods: Vec<String> },
    Func { params: Vec<TypeId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Fully qualified name for named types, e.g. `sync.Once`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTable {
    types: Vec<TypeDef>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(def);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Return the id of a basic type, adding it if the table has none.
    pub fn ensure_basic(&mut self, kind: BasicKind) -> TypeId {
        for (i, def) in self.types.iter().enumerate() {
            if def.kind == TypeKind::Basic(kind) {
                return TypeId(i as u32);
            }
        }
        self.add(TypeDef {
            name: None,
            kind: TypeKind::Basic(kind),
            methods: Vec::new(),
        })
    }

    /// Follow named-type chains to the underlying type.
    pub fn underlying(&self, mut id: TypeId) -> TypeId {
        let mut hops = 0;
        while let TypeKind::Named { underlying } = self.get(id).kind {
            id = underlying;
            hops += 1;
            if hops > self.types.len() {
                break; // malformed cycle in the table; stop rather than spin
            }
        }
        id
    }

    pub fn is_basic(&self, id: TypeId, kind: BasicKind) -> bool {
        self.get(self.underlying(id)).kind == TypeKind::Basic(kind)
    }

    /// Look through one level of pointer.
    pub fn strip_pointer(&self, id: TypeId) -> TypeId {
        match self.get(id).kind {
            TypeKind::Pointer { elem } => elem,
            _ => id,
        }
    }

    /// Resolve a method on a receiver type, looking through a pointer.
    /// Returns the implementing function for named receivers; interface
    /// receivers have no single implementation and return None.
    pub fn method(&self, receiver: TypeId, name: &str) -> Option<&Method> {
        let id = self.strip_pointer(receiver);
        self.get(id).methods.iter().find(|m| m.name == name)
    }

    /// The method names an interface type requires, if `id` is an interface.
    pub fn interface_methods(&self, id: TypeId) -> Option<&[String]> {
        match &self.get(self.underlying(id)).kind {
            TypeKind::Interface { methods } => Some(methods),
            _ => None,
        }
    }

    /// All named types whose method sets satisfy the given interface.
    /// This is the class-hierarchy over-approximation used for dispatch
    /// edges at interface-typed call sites.
    pub fn implementations(&self, interface: TypeId) -> Vec<TypeId> {
        let Some(required) = self.interface_methods(interface) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (i, def) in self.types.iter().enumerate() {
            if !matches!(def.kind, TypeKind::Named { .. }) || def.methods.is_empty() {
                continue;
            }
            if required
                .iter()
                .all(|r| def.methods.iter().any(|m| &m.name == r))
            {
                out.push(TypeId(i as u32));
            }
        }
        out
    }

    /// Whether `id` is, or structurally contains, the reflection-value type.
    /// Containment recurses through named underlyings, struct fields, and
    /// array elements, with a visited set guarding recursive types.
    pub fn contains_reflect_value(&self, id: TypeId) -> bool {
        let mut seen = BTreeSet::new();
        self.contains_reflect_value_rec(id, &mut seen)
    }

    fn contains_reflect_value_rec(&self, id: TypeId, seen: &mut BTreeSet<TypeId>) -> bool {
        if !seen.insert(id) {
            return false;
        }
        let def = self.get(id);
        if def.name.as_deref() == Some(REFLECT_VALUE_TYPE) {
            return true;
        }
        match &def.kind {
            TypeKind::Named { underlying } => self.contains_reflect_value_rec(*underlying, seen),
            TypeKind::Struct { fields } => fields
                .iter()
                .any(|&f| self.contains_reflect_value_rec(f, seen)),
            TypeKind::Array { elem } => self.contains_reflect_value_rec(*elem, seen),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Packages and files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    pub path: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Import path, e.g. `example.com/store`.
    pub path: String,
    /// Short package name, e.g. `store`.
    pub name: String,
    #[serde(default)]
    pub files: Vec<SourceFile>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub module: Option<ModuleRef>,
    /// Files excluded by build constraints, reported per package.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ignored_files: Vec<String>,
}

impl Package {
    /// Name of the package's implicit initializer function.
    pub fn init_function(&self) -> String {
        format!("{}.init", self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<FuncDecl>,
    /// Initializer expressions of package-scope variables declared in this
    /// file. These run from the package's implicit initializer function.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub var_inits: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncDecl {
    /// Fully qualified name. Receiver-bearing names start with `(`.
    pub name: String,
    pub body: Block,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Block(Block),
    Labeled { label: String, stmt: Box<Stmt> },
    If { cond: Expr, then: Block, els: Option<Box<Stmt>> },
    /// `post` runs between iterations; it is a statement position that does
    /// not admit replacement by a block.
    For { post: Option<Box<Stmt>>, body: Block },
    Switch { cases: Vec<CaseClause> },
    Select { clauses: Vec<CommClause> },
    Assign { lhs: Vec<Expr>, rhs: Vec<Expr> },
    Return { results: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseClause {
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommClause {
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    /// Static type, when the front-end knows it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ty: Option<TypeId>,
}

/// The callee of a call expression. A call whose callee is a type is a type
/// conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Callee {
    Expr(Box<Expr>),
    Type(TypeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprKind {
    Ident {
        name: String,
        /// Import path when this identifier is a package alias.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        package: Option<String>,
        /// Fully qualified function this identifier statically resolves to,
        /// when the front-end's value analysis determined one.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        resolved: Option<String>,
    },
    IntLit(i64),
    StrLit(String),
    Selector {
        base: Box<Expr>,
        name: String,
        /// Fully qualified function this selector statically resolves to
        /// (package-scope functions; methods resolve through the type table).
        #[serde(skip_serializing_if = "Option::is_none", default)]
        resolved: Option<String>,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        site: Option<Site>,
    },
    FuncLit {
        /// Front-end-assigned name of the anonymous function, e.g. `p.F$1`.
        name: String,
        body: Block,
    },
    Composite {
        elems: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        base: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    Unary {
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Paren {
        inner: Box<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    TypeAssert {
        base: Box<Expr>,
    },
    Deref {
        operand: Box<Expr>,
    },
}

impl Expr {
    pub fn int_lit(value: i64, ty: TypeId) -> Expr {
        Expr {
            kind: ExprKind::IntLit(value),
            ty: Some(ty),
        }
    }
}

/// Whether evaluating an expression might write to a variable or call a
/// function. Conservative with false positives; panicking is not considered
/// a side effect, so index and slice expressions are clean unless a component
/// is not. Used to decide whether an expression can be duplicated or deleted
/// by the rewriter.
pub fn may_have_side_effects(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Ident { .. } | ExprKind::IntLit(_) | ExprKind::StrLit(_) => false,
        // A function literal does nothing on its own.
        ExprKind::FuncLit { .. } => false,
        ExprKind::Call { .. } => true,
        ExprKind::Composite { elems } => elems.iter().any(may_have_side_effects),
        ExprKind::Paren { inner } => may_have_side_effects(inner),
        ExprKind::Selector { base, .. } => may_have_side_effects(base),
        ExprKind::Index { base, index } => {
            may_have_side_effects(base) || may_have_side_effects(index)
        }
        ExprKind::Slice {
            base,
            low,
            high,
            max,
        } => {
            may_have_side_effects(base)
                || [low, high, max]
                    .into_iter()
                    .flatten()
                    .any(|e| may_have_side_effects(e))
        }
        ExprKind::TypeAssert { base } => may_have_side_effects(base),
        ExprKind::Deref { operand } | ExprKind::Unary { operand } => may_have_side_effects(operand),
        ExprKind::Binary { left, right } => {
            may_have_side_effects(left) || may_have_side_effects(right)
        }
        ExprKind::KeyValue { key, value } => {
            may_have_side_effects(key) || may_have_side_effects(value)
        }
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Visit every expression in a block, in syntax order, without descending
/// into function literal bodies (a literal is a distinct function; callers
/// that care about literal bodies walk them separately). The literal
/// expression itself is visited.
pub fn walk_block_exprs<'a>(block: &'a Block, f: &mut impl FnMut(&'a Expr)) {
    for stmt in &block.stmts {
        walk_stmt_exprs(stmt, f);
    }
}

fn walk_stmt_exprs<'a>(stmt: &'a Stmt, f: &mut impl FnMut(&'a Expr)) {
    match stmt {
        Stmt::Expr(e) => walk_expr(e, f),
        Stmt::Block(b) => walk_block_exprs(b, f),
        Stmt::Labeled { stmt, .. } => walk_stmt_exprs(stmt, f),
        Stmt::If { cond, then, els } => {
            walk_expr(cond, f);
            walk_block_exprs(then, f);
            if let Some(e) = els {
                walk_stmt_exprs(e, f);
            }
        }
        Stmt::For { post, body } => {
            if let Some(p) = post {
                walk_stmt_exprs(p, f);
            }
            walk_block_exprs(body, f);
        }
        Stmt::Switch { cases } => {
            for c in cases {
                for s in &c.body {
                    walk_stmt_exprs(s, f);
                }
            }
        }
        Stmt::Select { clauses } => {
            for c in clauses {
                for s in &c.body {
                    walk_stmt_exprs(s, f);
                }
            }
        }
        Stmt::Assign { lhs, rhs } => {
            for e in lhs.iter().chain(rhs) {
                walk_expr(e, f);
            }
        }
        Stmt::Return { results } => {
            for e in results {
                walk_expr(e, f);
            }
        }
    }
}

/// Visit an expression and its subexpressions, not descending into function
/// literal bodies.
pub fn walk_expr<'a>(e: &'a Expr, f: &mut impl FnMut(&'a Expr)) {
    f(e);
    match &e.kind {
        ExprKind::Ident { .. }
        | ExprKind::IntLit(_)
        | ExprKind::StrLit(_)
        | ExprKind::FuncLit { .. } => {}
        ExprKind::Selector { base, .. } => walk_expr(base, f),
        ExprKind::Call { callee, args, .. } => {
            if let Callee::Expr(c) = callee {
                walk_expr(c, f);
            }
            for a in args {
                walk_expr(a, f);
            }
        }
        ExprKind::Composite { elems } => {
            for e in elems {
                walk_expr(e, f);
            }
        }
        ExprKind::Index { base, index } => {
            walk_expr(base, f);
            walk_expr(index, f);
        }
        ExprKind::Slice {
            base,
            low,
            high,
            max,
        } => {
            walk_expr(base, f);
            for e in [low, high, max].into_iter().flatten() {
                walk_expr(e, f);
            }
        }
        ExprKind::Unary { operand } | ExprKind::Deref { operand } => walk_expr(operand, f),
        ExprKind::Binary { left, right } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        ExprKind::Paren { inner } => walk_expr(inner, f),
        ExprKind::KeyValue { key, value } => {
            walk_expr(key, f);
            walk_expr(value, f);
        }
        ExprKind::TypeAssert { base } => walk_expr(base, f),
    }
}

/// Collect the function literals appearing directly in a block (not those
/// nested inside other literals).
pub fn collect_func_lits(block: &Block) -> Vec<(&str, &Block)> {
    let mut out = Vec::new();
    walk_block_exprs(block, &mut |e| {
        if let ExprKind::FuncLit { name, body } = &e.kind {
            out.push((name.as_str(), body));
        }
    });
    out
}
