mod common;

use charon::{Codegen, CodegenConfig, CompileError, IrType, MethodKind, NodeKind, ParamValue, Template};
use common::{class_method, init_tracing, point, render};

// ===== Locals =====

#[test]
fn locals_are_declared_before_the_body() {
    init_tracing();
    let mut cg = Codegen::default();
    let class = cg.declare_class("Main").unwrap();
    let method = cg
        .declare_method(class, "run", MethodKind::Class, &[("a", IrType::I32)], IrType::I32)
        .unwrap();
    cg.int_literal(method, 1, IrType::I32).unwrap();
    cg.declare_local(method, "tmp", IrType::I64).unwrap();

    let kinds: Vec<_> = cg.tree().children(method).iter().map(|c| cg.tree().node(*c).kind).collect();
    assert_eq!(kinds, vec![NodeKind::Param, NodeKind::Result, NodeKind::Local, NodeKind::Const]);

    let descriptor = cg.registry().method("Main", "run", MethodKind::Class).unwrap();
    assert_eq!(descriptor.locals.len(), 1);
    assert_eq!(descriptor.variable("a").map(|v| v.ty.clone()), Some(IrType::I32));
}

#[test]
fn redeclaring_a_local() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);
    cg.declare_local(method, "n", IrType::I32).unwrap();
    cg.declare_local(method, "n", IrType::I32).unwrap();
    assert_eq!(cg.tree().children_of_kind(method, NodeKind::Local).len(), 1);
    assert!(cg.declare_local(method, "n", IrType::F32).is_err());
}

#[test]
fn first_assignment_declares_the_local() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);
    let value = cg.int_literal(method, 9, IrType::I64).unwrap();
    let set = cg.local_set(method, "total", value).unwrap();

    assert_eq!(render(&cg, set), "(local.set $total\n  (i64.const 9))");
    let local = cg.tree().children_of_kind(method, NodeKind::Local)[0];
    assert_eq!(render(&cg, local), "(local $total i64)");
}

#[test]
fn assignment_casts_to_the_declared_type() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);
    cg.declare_local(method, "wide", IrType::I64).unwrap();
    cg.declare_local(method, "narrow", IrType::I32).unwrap();
    let narrow = cg.local_get(method, "narrow").unwrap();
    let set = cg.local_set(method, "wide", narrow).unwrap();
    assert_eq!(render(&cg, set), "(local.set $wide\n  (i64.extend_i32_s\n    (local.get $narrow)))");
}

#[test]
fn reading_an_unknown_local_fails() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);
    let err = cg.local_get(method, "ghost").unwrap_err();
    assert_eq!(err.to_string(), "Codegen error: unknown local variable `ghost`");
}

#[test]
fn locals_outside_a_method_fail() {
    let mut cg = Codegen::default();
    let class = cg.declare_class("Main").unwrap();
    let err = cg.declare_local(class, "x", IrType::I32).unwrap_err();
    assert!(matches!(err, CompileError::Structure { .. }));
}

// ===== Receiver =====

#[test]
fn self_is_typed_as_the_enclosing_class() {
    let (mut cg, class) = point();
    let method = cg.declare_method(class, "me", MethodKind::Instance, &[], IrType::class("Point")).unwrap();
    let receiver = cg.self_ref(method).unwrap();
    assert_eq!(cg.tree().node(receiver).ty, IrType::class("Point"));
    assert_eq!(cg.tree().node(receiver).name(), Some("_self_"));
}

#[test]
fn self_in_a_class_method_fails() {
    let (mut cg, class) = point();
    let method = cg.declare_method(class, "make", MethodKind::Class, &[], IrType::None).unwrap();
    let err = cg.self_ref(method).unwrap_err();
    assert_eq!(err.to_string(), "Structure error: `self` used in class method `make`");
}

// ===== Instance variables =====

#[test]
fn instance_variable_reads_call_the_getter() {
    let (mut cg, class) = point();
    cg.compile_attributes(class).unwrap();
    let method = cg.declare_method(class, "sum", MethodKind::Instance, &[], IrType::I64).unwrap();
    let receiver = cg.self_ref(method).unwrap();
    let read = cg.ivar_get(method, receiver, "x").unwrap();

    assert_eq!(cg.tree().node(read).ty, IrType::I32);
    assert_eq!(render(&cg, read), "(call $Point#x\n  (local.get $_self_))");
}

#[test]
fn instance_variable_writes_call_the_setter() {
    let (mut cg, class) = point();
    cg.compile_attributes(class).unwrap();
    let method = cg.declare_method(class, "reset", MethodKind::Instance, &[], IrType::None).unwrap();
    let receiver = cg.self_ref(method).unwrap();
    let zero = cg.int_literal(method, 0, IrType::I32).unwrap();
    let write = cg.ivar_set(method, receiver, "y", zero).unwrap();

    assert_eq!(cg.tree().node(write).ty, IrType::I64);
    assert_eq!(render(&cg, write), "(call $Point#y=\n  (local.get $_self_)\n  (i64.const 0))");
}

#[test]
fn accessor_calls_before_accessors_exist_use_the_attribute_type() {
    init_tracing();
    let mut cg = Codegen::default();
    let class = cg.declare_class("Acc").unwrap();
    cg.declare_attribute(class, "total", IrType::I64).unwrap();

    let method = cg.declare_method(class, "sum", MethodKind::Instance, &[], IrType::I64).unwrap();
    let receiver = cg.self_ref(method).unwrap();
    let read = cg.ivar_get(method, receiver, "total").unwrap();
    assert_eq!(cg.tree().node(read).ty, IrType::I64);
    let ret = cg.build_return(method, Some(read)).unwrap();

    let receiver = cg.self_ref(method).unwrap();
    let zero = cg.int_literal(method, 0, IrType::I32).unwrap();
    let write = cg.ivar_set(method, receiver, "total", zero).unwrap();
    assert_eq!(cg.tree().node(write).ty, IrType::I64);

    cg.compile_attributes(class).unwrap();
    cg.finalize().unwrap();
    assert_eq!(render(&cg, ret), "(return\n  (call $Acc#total\n    (local.get $_self_)))");
}

#[test]
fn unknown_instance_variable_fails() {
    let (mut cg, class) = point();
    let method = cg.declare_method(class, "bad", MethodKind::Instance, &[], IrType::None).unwrap();
    let receiver = cg.self_ref(method).unwrap();
    let err = cg.ivar_get(method, receiver, "z").unwrap_err();
    assert_eq!(err.to_string(), "Codegen error: class Point has no attribute `z`");
}

#[test]
fn instance_variable_on_a_number_fails() {
    let (mut cg, _) = point();
    let method = class_method(&mut cg, IrType::None);
    let n = cg.int_literal(method, 1, IrType::I32).unwrap();
    assert!(cg.ivar_get(method, n, "x").is_err());
}

// ===== Calls =====

#[test]
fn forward_calls_default_their_result() {
    let (mut cg, class) = point();
    let method = cg.declare_method(class, "twice", MethodKind::Instance, &[], IrType::I32).unwrap();
    let receiver = cg.self_ref(method).unwrap();
    let call = cg.resolve_call(method, "Point", "norm", MethodKind::Instance, &[receiver]).unwrap();

    assert_eq!(cg.tree().node(call).ty, IrType::DEFAULT);
    let descriptor = cg.registry().method("Point", "norm", MethodKind::Instance).unwrap();
    assert!(!descriptor.has_body());
}

#[test]
fn calls_to_declared_methods_are_checked() {
    let (mut cg, class) = point();
    cg.declare_method(class, "scale", MethodKind::Instance, &[("k", IrType::I64)], IrType::I64)
        .unwrap();
    let method = cg.declare_method(class, "go", MethodKind::Instance, &[], IrType::I64).unwrap();

    let receiver = cg.self_ref(method).unwrap();
    let err = cg
        .resolve_call(method, "Point", "scale", MethodKind::Instance, &[receiver])
        .unwrap_err();
    assert_eq!(err.to_string(), "Codegen error: $Point#scale expects 2 argument(s), got 1");

    let k = cg.int_literal(method, 3, IrType::I32).unwrap();
    let call = cg
        .resolve_call(method, "Point", "scale", MethodKind::Instance, &[receiver, k])
        .unwrap();
    assert_eq!(cg.tree().node(call).ty, IrType::I64);
    assert_eq!(render(&cg, call), "(call $Point#scale\n  (local.get $_self_)\n  (i64.const 3))");
}

#[test]
fn class_method_calls_have_no_receiver() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);
    let call = cg.resolve_call(method, "Main", "helper", MethodKind::Class, &[]).unwrap();
    assert_eq!(render(&cg, call), "(call $Main::helper)");
}

// ===== Globals =====

#[test]
fn globals_are_read_and_written() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);
    cg.declare_global("ticks", IrType::I64, true).unwrap();

    let one = cg.int_literal(method, 1, IrType::I32).unwrap();
    let set = cg.global_set(method, "ticks", one).unwrap();
    assert_eq!(render(&cg, set), "(global.set $ticks\n  (i64.const 1))");

    let get = cg.global_get(method, "ticks").unwrap();
    assert_eq!(cg.tree().node(get).ty, IrType::I64);
    assert!(cg.global_get(method, "missing").is_err());
}

#[test]
fn immutable_globals_reject_writes() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);
    cg.declare_global("limit", IrType::I32, false).unwrap();
    let v = cg.int_literal(method, 1, IrType::I32).unwrap();
    assert!(cg.global_set(method, "limit", v).is_err());
    assert!(cg.declare_global("limit", IrType::I64, false).is_err());
}

// ===== Class variables and constants =====

#[test]
fn class_variables_live_in_the_data_segment() {
    let (mut cg, class) = point();
    let address = cg.declare_class_var(class, "count", IrType::I32).unwrap();
    assert_eq!(address, 1024);
    assert_eq!(cg.declare_class_var(class, "count", IrType::I32).unwrap(), address);

    let method = class_method(&mut cg, IrType::None);
    let get = cg.class_var_get(method, "Point", "count").unwrap();
    assert_eq!(render(&cg, get), "(i32.load offset=0\n  (i32.const 1024))");

    let v = cg.int_literal(method, 2, IrType::I32).unwrap();
    let set = cg.class_var_set(method, "Point", "count", v).unwrap();
    assert_eq!(cg.tree().node(set).template, Template::Store);
    assert_eq!(cg.data().block("Point::count").map(|b| b.bytes.len()), Some(4));
}

#[test]
fn static_storage_past_the_address_space_fails() {
    init_tracing();
    let config = CodegenConfig { data_base: u32::MAX - 3, ..CodegenConfig::default() };
    let mut cg = Codegen::new(config);
    let class = cg.declare_class("Edge").unwrap();

    assert_eq!(cg.declare_class_var(class, "lo", IrType::I32).unwrap(), u32::MAX - 3);
    let err = cg.declare_class_var(class, "hi", IrType::I32).unwrap_err();
    assert!(matches!(err, CompileError::Codegen { .. }));
    assert!(err.to_string().contains("`Edge::hi` (4 bytes) does not fit in the data segment"));
    assert!(cg.declare_constant("Edge", "K", IrType::I64).is_err());
    assert!(cg.registry().class("Edge").unwrap().class_vars.get("hi").is_none());
}

#[test]
fn constants_are_written_once() {
    let (mut cg, _) = point();
    let method = class_method(&mut cg, IrType::None);
    cg.declare_constant("Point", "ORIGIN", IrType::I64).unwrap();

    let first = cg.int_literal(method, 7, IrType::I64).unwrap();
    let store = cg.constant_set(method, "Point", "ORIGIN", first).unwrap();
    assert_eq!(cg.tree().node(store).param("offset"), Some(&ParamValue::Int(0)));

    let second = cg.int_literal(method, 8, IrType::I64).unwrap();
    let err = cg.constant_set(method, "Point", "ORIGIN", second).unwrap_err();
    assert_eq!(err.to_string(), "Codegen error: constant Point::ORIGIN is already initialized");

    let read = cg.constant_get(method, "Point", "ORIGIN").unwrap();
    assert_eq!(cg.tree().node(read).ty, IrType::I64);
}
