//! Structural tests of the wrapper module produced for small semantic modules.

use shimgen_types::ast::{
    Attribute, ClassDef, FunctionArgument, FunctionDef, FunctionKind, FunctionResult, Interface,
    Literal, MethodRole, Module, ScalarKind, StorageOrder, ValueType, Variable,
};
use shimgen_types::bind_c::{
    count_conditionals, leaf_blocks, ArgumentAbi, BindCFunction, BindCModule, BindCVariable,
    CallArgument, Expr, IndexExpr, MemberKey, Origin, ParamDirection, ResultAbi, ReturnSlot, Stmt,
};
use shimgen_types::{DiagnosticCode, Diagnostics, Severity};
use shimgen_wrapper::{wrap_module, Target, WrappedModule};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn f64_() -> ValueType {
    ValueType::Scalar(ScalarKind::Float64)
}

fn i64_() -> ValueType {
    ValueType::Scalar(ScalarKind::Int64)
}

fn array(rank: usize, order: StorageOrder) -> ValueType {
    ValueType::array(ScalarKind::Float64, rank, order)
}

fn arg(name: &str, ty: ValueType) -> FunctionArgument {
    FunctionArgument::new(name, ty)
}

fn res(name: &str, ty: ValueType) -> FunctionResult {
    FunctionResult::new(name, ty)
}

fn func(name: &str, args: Vec<FunctionArgument>, results: Vec<FunctionResult>) -> FunctionDef {
    FunctionDef::new(name, args, results)
}

fn module_with(name: &str, functions: Vec<FunctionDef>) -> Module {
    let mut m = Module::new(name);
    m.functions = functions;
    m
}

fn wrap(module: &Module, target: Target) -> (WrappedModule, Diagnostics) {
    let mut diags = Diagnostics::new();
    let wrapped = wrap_module(module, target, &mut diags)
        .unwrap_or_else(|e| panic!("module wrap failed: {e}"));
    (wrapped, diags)
}

fn only_function(m: &BindCModule) -> &BindCFunction {
    assert_eq!(m.functions.len(), 1, "expected exactly one wrapped function");
    &m.functions[0]
}

fn call_of(stmts: &[Stmt]) -> Option<(&str, &[CallArgument])> {
    stmts.iter().find_map(|s| match s {
        Stmt::Assign { rhs, .. } | Stmt::AliasAssign { rhs, .. } | Stmt::Expr(rhs) => match rhs {
            Expr::Call { function, args } => Some((function.as_str(), args.as_slice())),
            _ => None,
        },
        _ => None,
    })
}

/// Every root-to-leaf path of the presence tree: checked pointers, leaf block.
fn paths<'a>(stmts: &'a [Stmt], prefix: Vec<String>, out: &mut Vec<(Vec<String>, &'a [Stmt])>) {
    match stmts.iter().find(|s| s.is_conditional()) {
        Some(Stmt::If {
            condition,
            body,
            orelse,
        }) => {
            let ptr = match condition {
                Expr::IsNotNull(inner) => match inner.as_ref() {
                    Expr::Var(name) => name.clone(),
                    other => panic!("unexpected presence check {other:?}"),
                },
                other => panic!("unexpected condition {other:?}"),
            };
            let mut with = prefix.clone();
            with.push(ptr);
            paths(body, with.clone(), out);
            paths(orelse, with, out);
        }
        _ => out.push((prefix, stmts)),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Scalars & arrays
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_scalar_function_is_direct() {
    let m = module_with(
        "geometry",
        vec![func(
            "area",
            vec![arg("r", f64_())],
            vec![res("a", f64_())],
        )],
    );
    let (wrapped, diags) = wrap(&m, Target::Fortran);
    assert!(diags.is_empty());
    let f = only_function(&wrapped.module);
    assert_eq!(f.name, "bind_c_area");
    assert_eq!(f.origin, Origin::Function("area".into()));
    assert_eq!(f.arguments[0].abi, ArgumentAbi::Direct);
    assert_eq!(
        f.body,
        vec![Stmt::Assign {
            lhs: Expr::var("a"),
            rhs: Expr::Call {
                function: "area".into(),
                args: vec![CallArgument {
                    keyword: Some("r".into()),
                    value: Expr::var("r"),
                }],
            },
        }]
    );
    let sig = f.abi_signature();
    assert_eq!(sig.direct_returns(), 1);
    assert_eq!(sig.to_string(), "float64 bind_c_area(float64 r)");
}

#[test]
fn test_row_major_array_reversed_for_column_major_target() {
    let m = module_with(
        "linalg",
        vec![func(
            "scale",
            vec![arg("a", array(2, StorageOrder::RowMajor)), arg("factor", f64_())],
            vec![res("scaled", array(2, StorageOrder::RowMajor))],
        )],
    );
    let (wrapped, _) = wrap(&m, Target::Fortran);
    let f = only_function(&wrapped.module);

    let a = &f.arguments[0];
    assert_eq!(
        a.abi,
        ArgumentAbi::Pointer {
            ptr: "bound_a".into(),
            shape: vec!["a_shape_1".into(), "a_shape_2".into()],
            strides: vec!["a_stride_1".into(), "a_stride_2".into()],
        }
    );
    let mul = |sh: &str, st: &str| Expr::mul(Expr::var(sh), Expr::var(st));
    assert_eq!(
        f.body[0],
        Stmt::CFPointer {
            ptr: "bound_a".into(),
            target: "a".into(),
            sizes: vec![mul("a_shape_2", "a_stride_2"), mul("a_shape_1", "a_stride_1")],
        }
    );
    let slice = |st: &str| IndexExpr::Slice {
        start: Expr::Int(1),
        stop: None,
        step: Expr::var(st),
    };
    assert_eq!(
        a.call_value,
        Expr::Index {
            base: "a".into(),
            indices: vec![slice("a_stride_2"), slice("a_stride_1")],
        }
    );

    // Result: shapes reported in declared order from the transposed native array.
    assert_eq!(
        f.results[0].abi,
        ResultAbi::Pointer {
            ptr: "bound_scaled".into(),
            shape: vec!["scaled_shape_1".into(), "scaled_shape_2".into()],
        }
    );
    let tail = &f.body[2..];
    assert_eq!(
        tail[0],
        Stmt::Assign {
            lhs: Expr::var("scaled_shape_1"),
            rhs: Expr::Shape {
                var: "scaled".into(),
                dim: 1
            },
        }
    );
    assert_eq!(
        tail[2],
        Stmt::Allocate {
            var: "scaled_ptr".into(),
            shape: vec![Expr::var("scaled_shape_2"), Expr::var("scaled_shape_1")],
        }
    );
    assert_eq!(
        tail[3],
        Stmt::Assign {
            lhs: Expr::var("scaled_ptr"),
            rhs: Expr::var("scaled"),
        }
    );
    assert_eq!(
        tail[4],
        Stmt::CLoc {
            source: "scaled_ptr".into(),
            ptr: "bound_scaled".into(),
        }
    );

    let sig = f.abi_signature();
    let inputs: Vec<_> = sig.inputs().map(|p| p.name.as_str()).collect();
    assert_eq!(
        inputs,
        vec!["bound_a", "a_shape_1", "a_shape_2", "a_stride_1", "a_stride_2", "factor"]
    );
    assert_eq!(sig.outputs().count(), 2);
}

#[test]
fn test_matching_order_is_not_reversed() {
    let m = module_with(
        "linalg",
        vec![func("norm", vec![arg("a", array(2, StorageOrder::RowMajor))], vec![])],
    );
    let (wrapped, _) = wrap(&m, Target::Cuda);
    let f = only_function(&wrapped.module);
    match &f.body[0] {
        Stmt::CFPointer { sizes, .. } => assert_eq!(
            sizes[0],
            Expr::mul(Expr::var("a_shape_1"), Expr::var("a_stride_1"))
        ),
        other => panic!("expected reinterpretation, got {other:?}"),
    }
    // Zero-based slicing on the CUDA target.
    match &f.arguments[0].call_value {
        Expr::Index { indices, .. } => assert!(matches!(
            &indices[0],
            IndexExpr::Slice { start: Expr::Int(0), .. }
        )),
        other => panic!("expected strided view, got {other:?}"),
    }
}

#[test]
fn test_contiguous_argument_gets_view_alias() {
    let m = module_with(
        "linalg",
        vec![func(
            "trace",
            vec![arg("a", array(1, StorageOrder::ColumnMajor)).contiguous()],
            vec![res("t", f64_())],
        )],
    );
    let (wrapped, _) = wrap(&m, Target::Fortran);
    let f = only_function(&wrapped.module);
    assert!(matches!(&f.body[1], Stmt::AliasAssign { lhs: Expr::Var(v), rhs } if v == "a_0001" && rhs.is_strided_view()));
    let (_, args) = call_of(&f.body).expect("call");
    assert_eq!(args[0].value, Expr::var("a_0001"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Optional arguments
// ══════════════════════════════════════════════════════════════════════════════

fn optional_module(k: usize) -> Module {
    let names = ["x", "y", "z", "w"];
    let mut args = vec![arg("n", i64_())];
    for name in names.iter().take(k) {
        args.push(arg(name, f64_()).optional(Literal::None));
    }
    module_with("opts", vec![func("combine", args, vec![res("total", f64_())])])
}

#[test]
fn test_optional_combinatorics() {
    for k in 0..=3 {
        let (wrapped, _) = wrap(&optional_module(k), Target::Fortran);
        let f = only_function(&wrapped.module);

        assert_eq!(leaf_blocks(&f.body).len(), 1 << k, "leaves for k={k}");
        assert_eq!(count_conditionals(&f.body), (1 << k) - 1, "conditionals for k={k}");

        let mut all = Vec::new();
        paths(&f.body, Vec::new(), &mut all);
        assert_eq!(all.len(), 1 << k);
        let expected_order: Vec<String> = ["x", "y", "z"]
            .iter()
            .take(k)
            .map(|n| format!("bound_{n}"))
            .collect();
        for (checked, leaf) in &all {
            // k checks per path, in declaration order, none repeated.
            assert_eq!(checked, &expected_order);
            assert!(leaf.iter().all(|s| !s.is_conditional()));
        }
    }
}

#[test]
fn test_absent_optionals_are_not_passed() {
    let (wrapped, _) = wrap(&optional_module(2), Target::Fortran);
    let f = only_function(&wrapped.module);
    let mut all = Vec::new();
    paths(&f.body, Vec::new(), &mut all);

    let keywords: Vec<Vec<String>> = all
        .iter()
        .map(|(_, leaf)| {
            let (_, args) = call_of(leaf).expect("every leaf calls the callee");
            args.iter().filter_map(|a| a.keyword.clone()).collect()
        })
        .collect();
    assert_eq!(
        keywords,
        vec![
            vec!["n".to_string(), "x".into(), "y".into()],
            vec!["n".to_string(), "x".into()],
            vec!["n".to_string(), "y".into()],
            vec!["n".to_string()],
        ]
    );

    // The absent branch never reinterprets the absent pointer.
    let (_, last) = &all[3];
    assert!(!last.iter().any(|s| matches!(s, Stmt::CFPointer { .. })));
    let (_, first) = &all[0];
    assert_eq!(
        first.iter().filter(|s| matches!(s, Stmt::CFPointer { .. })).count(),
        2
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Results
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_result_arity_switch() {
    let one = module_with("m", vec![func("f", vec![], vec![res("a", f64_())])]);
    let two = module_with(
        "m",
        vec![func("f", vec![], vec![res("a", f64_()), res("b", f64_())])],
    );

    let (w1, _) = wrap(&one, Target::Fortran);
    let sig1 = only_function(&w1.module).abi_signature();
    assert_eq!(sig1.direct_returns(), 1);
    assert_eq!(sig1.outputs().count(), 0);

    let (w2, _) = wrap(&two, Target::Fortran);
    let f2 = only_function(&w2.module);
    let sig2 = f2.abi_signature();
    assert_eq!(sig2.direct_returns(), 0);
    assert_eq!(sig2.returns, ReturnSlot::Status);
    assert_eq!(sig2.outputs().count(), 2);
    assert!(sig2.params.iter().all(|p| p.direction == ParamDirection::Out));
    assert!(matches!(
        &f2.body[0],
        Stmt::Assign { lhs: Expr::Tuple(targets), .. } if targets.len() == 2
    ));
}

#[test]
fn test_set_result_uses_running_index() {
    let m = module_with(
        "coll",
        vec![func("unique", vec![], vec![res("s", ValueType::Set(Box::new(i64_())))])],
    );
    let (wrapped, diags) = wrap(&m, Target::Fortran);
    assert!(diags.is_empty());
    let f = only_function(&wrapped.module);
    let fill = f
        .body
        .iter()
        .find_map(|s| match s {
            Stmt::For {
                counter, body, iterable, ..
            } => Some((counter, body, iterable)),
            _ => None,
        })
        .expect("fill loop");
    assert_eq!(fill.0, &None);
    assert_eq!(fill.2, "s");
    assert_eq!(fill.1.len(), 2);
    assert_eq!(
        fill.1[1],
        Stmt::Assign {
            lhs: Expr::var("idx"),
            rhs: Expr::add(Expr::var("idx"), Expr::Int(1)),
        }
    );
    assert!(f.body.contains(&Stmt::Assign {
        lhs: Expr::var("idx"),
        rhs: Expr::Int(0),
    }));
    assert!(matches!(f.body.last(), Some(Stmt::CLoc { source, .. }) if source == "s_ptr"));
}

#[test]
fn test_list_result_uses_loop_counter() {
    let m = module_with(
        "coll",
        vec![func("items", vec![], vec![res("l", ValueType::List(Box::new(i64_())))])],
    );
    let (wrapped, _) = wrap(&m, Target::Cuda);
    let f = only_function(&wrapped.module);
    let (counter, body) = f
        .body
        .iter()
        .find_map(|s| match s {
            Stmt::For { counter, body, .. } => Some((counter.clone(), body.clone())),
            _ => None,
        })
        .expect("fill loop");
    assert_eq!(counter.as_deref(), Some("idx"));
    assert_eq!(
        body,
        vec![Stmt::Assign {
            lhs: Expr::Index {
                base: "l_ptr".into(),
                indices: vec![IndexExpr::Element(Expr::var("idx"))],
            },
            rhs: Expr::var("elem"),
        }]
    );
}

#[test]
fn test_unsupported_result_is_fatal_for_that_function_only() {
    let m = module_with(
        "m",
        vec![
            func(
                "pair",
                vec![],
                vec![res("p", ValueType::Tuple(vec![i64_(), f64_()]))],
            ),
            func("ok", vec![], vec![]),
        ],
    );
    let (wrapped, diags) = wrap(&m, Target::Fortran);
    assert_eq!(diags.total_fatal, 1);
    assert_eq!(diags.fatal[0].code, DiagnosticCode::UNSUPPORTED_RESULT);
    assert_eq!(diags.fatal[0].location.symbol.as_deref(), Some("pair"));
    assert_eq!(wrapped.module.functions.len(), 1);
    assert_eq!(wrapped.module.removed_functions, vec!["pair".to_string()]);
}

#[test]
fn test_in_place_and_alias_results_are_not_copied() {
    let m = module_with(
        "m",
        vec![
            func(
                "fill",
                vec![arg("a", array(1, StorageOrder::ColumnMajor))],
                vec![res("a", array(1, StorageOrder::ColumnMajor)).in_place()],
            ),
            func(
                "view",
                vec![],
                vec![res("v", array(1, StorageOrder::ColumnMajor)).alias()],
            ),
        ],
    );
    let (wrapped, _) = wrap(&m, Target::Fortran);
    let fill = &wrapped.module.functions[0];
    assert!(!fill.body.iter().any(|s| matches!(s, Stmt::Allocate { .. })));
    assert!(fill.body.iter().any(|s| matches!(s, Stmt::Expr(Expr::Call { .. }))));
    assert!(matches!(fill.body.last(), Some(Stmt::CLoc { source, .. }) if source == "a"));

    let view = &wrapped.module.functions[1];
    assert!(matches!(&view.body[0], Stmt::AliasAssign { .. }));
    assert!(!view.body.iter().any(|s| matches!(s, Stmt::Allocate { .. })));
}

// ══════════════════════════════════════════════════════════════════════════════
// Module assembly
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_drop_not_abort() {
    let mut functions: Vec<FunctionDef> = (0..9)
        .map(|i| func(&format!("f{i}"), vec![arg("x", f64_())], vec![res("y", f64_())]))
        .collect();
    functions.insert(
        4,
        func("apply", vec![arg("cb", ValueType::FunctionRef)], vec![]),
    );
    let (wrapped, diags) = wrap(&module_with("m", functions), Target::Fortran);
    assert_eq!(wrapped.module.functions.len(), 9);
    assert_eq!(diags.total_warnings, 1);
    assert_eq!(diags.total_fatal, 0);
    assert_eq!(diags.warnings[0].code, DiagnosticCode::UNSUPPORTED_ARGUMENT);
    assert_eq!(wrapped.module.removed_functions, vec!["apply".to_string()]);
}

#[test]
fn test_filtered_functions_are_silent() {
    let mut inline = func("helper", vec![], vec![]);
    inline.is_inline = true;
    let mut private = func("hidden", vec![], vec![]);
    private.is_private = true;
    let mut kernel = func("saxpy", vec![], vec![]);
    kernel.kind = FunctionKind::Kernel;
    let mut device = func("dev", vec![], vec![]);
    device.kind = FunctionKind::Device;
    let m = module_with(
        "k",
        vec![inline, private, kernel, device, func("host", vec![], vec![])],
    );
    let (wrapped, diags) = wrap(&m, Target::Cuda);
    assert!(diags.is_empty());
    assert_eq!(wrapped.module.functions.len(), 1);
    assert!(wrapped.module.removed_functions.is_empty());
}

#[test]
fn test_interfaces_keep_only_wrapped_overloads() {
    let mut m = module_with(
        "m",
        vec![
            func("f_int", vec![arg("x", i64_())], vec![]),
            func("f_float", vec![arg("x", f64_())], vec![]),
            func("f_bad", vec![arg("x", ValueType::FunctionRef)], vec![]),
        ],
    );
    m.interfaces = vec![
        Interface {
            name: "f".into(),
            functions: vec!["f_int".into(), "f_float".into(), "f_bad".into()],
            is_inline: false,
        },
        Interface {
            name: "g".into(),
            functions: vec!["f_bad".into()],
            is_inline: false,
        },
    ];
    let (wrapped, _) = wrap(&m, Target::Fortran);
    assert_eq!(wrapped.module.interfaces.len(), 1);
    assert_eq!(wrapped.module.interfaces[0].name, "f");
    assert_eq!(
        wrapped.module.interfaces[0].functions,
        vec!["bind_c_f_int".to_string(), "bind_c_f_float".into()]
    );
}

#[test]
fn test_init_and_free_designation() {
    let mut m = module_with(
        "state",
        vec![func("setup", vec![], vec![]), func("teardown", vec![], vec![])],
    );
    m.init_func = Some("setup".into());
    m.free_func = Some("teardown".into());
    let (wrapped, _) = wrap(&m, Target::Fortran);
    assert_eq!(wrapped.module.init_func.as_deref(), Some("bind_c_setup"));
    assert_eq!(wrapped.module.free_func.as_deref(), Some("bind_c_teardown"));
    assert_eq!(wrapped.module.name, "bind_c_state");
}

#[test]
fn test_module_variables() {
    let mut m = Module::new("globals");
    m.variables = vec![
        Variable::new("count", i64_()),
        Variable::new("grid", array(2, StorageOrder::RowMajor)),
        Variable::new("origin", ValueType::Class("Point".into())),
    ];
    let (wrapped, diags) = wrap(&m, Target::Fortran);
    assert_eq!(wrapped.module.variables.len(), 2);
    assert!(matches!(
        &wrapped.module.variables[0],
        BindCVariable::Scalar { name, kind: ScalarKind::Int64 } if name == "count"
    ));
    let accessor = wrapped.module.variables[1].accessor().expect("array accessor");
    assert_eq!(accessor.name, "bind_c_grid");
    assert!(accessor.arguments.is_empty());
    assert_eq!(
        accessor.body,
        vec![
            Stmt::Assign {
                lhs: Expr::var("grid_shape_1"),
                rhs: Expr::Shape {
                    var: "grid".into(),
                    dim: 1
                },
            },
            Stmt::Assign {
                lhs: Expr::var("grid_shape_2"),
                rhs: Expr::Shape {
                    var: "grid".into(),
                    dim: 0
                },
            },
            Stmt::CLoc {
                source: "grid".into(),
                ptr: "bound_grid".into(),
            },
        ]
    );
    assert_eq!(diags.total_warnings, 1);
    assert_eq!(diags.warnings[0].code, DiagnosticCode::UNSUPPORTED_VARIABLE);
}

#[test]
fn test_cuda_reports_unsupported_sections_once() {
    let mut m = module_with("kern", vec![func("host", vec![], vec![])]);
    m.interfaces = vec![
        Interface {
            name: "a".into(),
            functions: vec!["host".into()],
            is_inline: false,
        },
        Interface {
            name: "b".into(),
            functions: vec!["host".into()],
            is_inline: false,
        },
    ];
    m.classes = vec![ClassDef::new("A"), ClassDef::new("B")];
    let (wrapped, diags) = wrap(&m, Target::Cuda);
    assert_eq!(diags.total_warnings, 2);
    assert!(diags
        .warnings
        .iter()
        .all(|d| d.code == DiagnosticCode::UNSUPPORTED_FEATURE && d.severity == Severity::Warning));
    assert!(wrapped.module.interfaces.is_empty());
    assert!(wrapped.module.classes.is_empty());
    assert_eq!(wrapped.module.functions.len(), 1);
}

// ══════════════════════════════════════════════════════════════════════════════
// Classes
// ══════════════════════════════════════════════════════════════════════════════

fn point_class(attributes: Vec<Attribute>) -> Module {
    let mut class = ClassDef::new("Point");
    class.attributes = attributes;
    let mut m = Module::new("shapes");
    m.classes = vec![class];
    m
}

#[test]
fn test_property_pairing() {
    let (wrapped, diags) = wrap(&point_class(vec![Attribute::new("x", f64_())]), Target::Fortran);
    assert!(diags.is_empty());
    let class = &wrapped.module.classes[0];
    assert_eq!(class.allocator.name, "point_bind_c_alloc");
    assert_eq!(class.properties.len(), 1);
    let p = &class.properties[0];
    assert_eq!(p.key, MemberKey::new("Point", "x"));
    assert_eq!(p.getter.name, "point_x_getter");
    assert_eq!(p.setter.as_ref().map(|s| s.name.as_str()), Some("point_x_setter"));
    assert_eq!(p.getter.origin, Origin::Getter(MemberKey::new("Point", "x")));
}

#[test]
fn test_private_attribute_is_hidden() {
    let (wrapped, _) = wrap(
        &point_class(vec![Attribute::new("x", f64_()).private()]),
        Target::Fortran,
    );
    let class = &wrapped.module.classes[0];
    assert!(class.properties.is_empty());
    assert!(wrapped.module.all_functions().all(|f| !matches!(
        &f.origin,
        Origin::Getter(k) | Origin::Setter(k) if k.member == "x"
    )));
}

#[test]
fn test_tuple_attribute_warns() {
    let (wrapped, diags) = wrap(
        &point_class(vec![
            Attribute::new("pair", ValueType::Tuple(vec![i64_(), i64_()])),
            Attribute::new("y", f64_()),
        ]),
        Target::Fortran,
    );
    assert_eq!(diags.total_warnings, 1);
    assert_eq!(diags.warnings[0].code, DiagnosticCode::UNSUPPORTED_ATTRIBUTE);
    assert_eq!(wrapped.module.classes[0].properties.len(), 1);
}

#[test]
fn test_methods_destructor_and_property_methods() {
    let this = || arg("self", ValueType::Class("Point".into())).bound();
    let mut norm = func("norm", vec![this()], vec![res("n", f64_())]);
    norm.role = MethodRole::Property;
    let mut del = func("__del__", vec![this()], vec![]);
    del.role = MethodRole::Destructor;
    let shift = func("shift", vec![this(), arg("dx", f64_())], vec![]);

    let mut m = point_class(vec![Attribute::new("norm", f64_()), Attribute::new("x", f64_())]);
    m.classes[0].methods = vec![norm, del, shift];
    let (wrapped, diags) = wrap(&m, Target::Fortran);
    assert!(diags.is_empty());
    let class = &wrapped.module.classes[0];

    let names: Vec<_> = class.methods.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["bind_c_point___del__", "bind_c_point_shift"]);

    // The property method replaces the synthesized accessor of `norm`.
    assert_eq!(class.properties.len(), 2);
    let norm = class.property("norm").expect("norm property");
    assert!(norm.setter.is_none());
    assert_eq!(norm.getter.name, "bind_c_point_norm");
    assert!(class.property("x").and_then(|p| p.setter.as_ref()).is_some());

    let del = &class.methods[0];
    assert_eq!(
        del.body.last(),
        Some(&Stmt::Deallocate {
            var: "self".into()
        })
    );
    // The receiver is reinterpreted before the call.
    assert!(matches!(&class.methods[1].body[0], Stmt::CFPointer { ptr, .. } if ptr == "bound_self"));
}

#[test]
fn test_interface_routed_methods() {
    let this = || arg("self", ValueType::Class("Point".into())).bound();
    let mut m = point_class(vec![]);
    m.classes[0].methods = vec![
        func("scale_int", vec![this(), arg("k", i64_())], vec![]),
        func("scale_float", vec![this(), arg("k", f64_())], vec![]),
    ];
    m.classes[0].interfaces = vec![Interface {
        name: "scale".into(),
        functions: vec!["scale_int".into(), "scale_float".into()],
        is_inline: false,
    }];
    let (wrapped, _) = wrap(&m, Target::Fortran);
    let class = &wrapped.module.classes[0];
    assert_eq!(class.interfaces.len(), 1);
    assert_eq!(class.interfaces[0].functions.len(), 2);
    for method in &class.methods {
        let (callee, _) = call_of(&method.body).expect("call");
        assert_eq!(callee, "scale");
    }
}

#[test]
fn test_array_attribute_getter_binds_by_address() {
    let (wrapped, _) = wrap(
        &point_class(vec![Attribute::new("coords", array(1, StorageOrder::ColumnMajor))]),
        Target::Fortran,
    );
    let getter = &wrapped.module.classes[0].properties[0].getter;
    assert!(matches!(&getter.body[1], Stmt::AliasAssign { rhs: Expr::Attribute { name, .. }, .. } if name == "coords"));
    assert!(!getter.body.iter().any(|s| matches!(s, Stmt::Allocate { .. })));
    assert!(matches!(getter.results[0].abi, ResultAbi::Pointer { ref shape, .. } if shape.len() == 1));
}

// ══════════════════════════════════════════════════════════════════════════════
// Determinism
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_wrap_is_deterministic() {
    let mut m = optional_module(3);
    m.functions.push(func(
        "scale",
        vec![arg("a", array(2, StorageOrder::RowMajor))],
        vec![res("b", array(2, StorageOrder::RowMajor))],
    ));
    m.classes = point_class(vec![Attribute::new("x", f64_())]).classes;
    let (first, _) = wrap(&m, Target::Fortran);
    for _ in 0..100 {
        let (again, _) = wrap(&m, Target::Fortran);
        assert_eq!(again, first);
    }
}

#[test]
fn test_wrapped_module_serializes() {
    let m = module_with("geometry", vec![func("area", vec![arg("r", f64_())], vec![res("a", f64_())])]);
    let (wrapped, _) = wrap(&m, Target::Cuda);
    let json = serde_json::to_value(&wrapped).unwrap();
    assert_eq!(json["module"]["name"], "bind_c_geometry");
    assert_eq!(json["module"]["original"], "geometry");
    assert_eq!(json["module"]["target"], "cuda");
    assert_eq!(json["module"]["functions"][0]["name"], "bind_c_area");
    assert!(json["module"]["functions"][0].get("docstring").is_none());
}
