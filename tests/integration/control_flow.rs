mod common;

use charon::{Codegen, CompileError, IrType, NodeId, NodeKind, WhileLoop};
use common::{class_method, init_tracing, render};

fn setup(result: IrType) -> (Codegen, NodeId) {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, result);
    cg.declare_local(method, "i", IrType::I32).unwrap();
    (cg, method)
}

/// `i < limit`, built under `parent`.
fn below(cg: &mut Codegen, parent: NodeId, limit: i64) -> NodeId {
    let op = cg.build_operator(parent, "<").unwrap();
    let i = cg.local_get(parent, "i").unwrap();
    let bound = cg.int_literal(parent, limit, IrType::I32).unwrap();
    cg.attach_operands(op, i, &[bound]).unwrap()
}

/// `i = i + 1`, appended to `parent`.
fn increment(cg: &mut Codegen, parent: NodeId) -> NodeId {
    let op = cg.build_operator(parent, "+").unwrap();
    let i = cg.local_get(parent, "i").unwrap();
    let one = cg.int_literal(parent, 1, IrType::I32).unwrap();
    cg.attach_operands(op, i, &[one]).unwrap();
    cg.local_set(parent, "i", op).unwrap()
}

// ===== while =====

#[test]
fn while_loop_skeleton() {
    let (mut cg, method) = setup(IrType::None);
    let w = cg.build_while(method).unwrap();
    let cond = below(&mut cg, w.lp, 10);
    cg.attach_while_condition(&w, cond).unwrap();
    increment(&mut cg, w.lp);
    cg.finish_while(&w).unwrap();
    cg.finalize().unwrap();

    insta::assert_snapshot!(render(&cg, w.block), @r"
    (block $block_0
      (loop $loop_0
        (br_if $block_0
          (i32.eqz
            (i32.lt_s
              (local.get $i)
              (i32.const 10))))
        (local.set $i
          (i32.add
            (local.get $i)
            (i32.const 1)))
        (br $loop_0)))
    ");
}

#[test]
fn condition_can_be_built_anywhere_before_attaching() {
    let (mut cg, method) = setup(IrType::None);
    let w = cg.build_while(method).unwrap();
    // Condition built under the method, then moved into place.
    let cond = below(&mut cg, method, 3);
    let negated = cg.attach_while_condition(&w, cond).unwrap();

    assert_eq!(cg.tree().parent(cond), Some(negated));
    assert_eq!(cg.tree().parent(negated), Some(w.exit));
    assert_eq!(cg.tree().children(w.lp).first().copied(), Some(w.exit));
}

#[test]
fn while_condition_is_attached_once() {
    let (mut cg, method) = setup(IrType::None);
    let w = cg.build_while(method).unwrap();
    let first = below(&mut cg, w.lp, 1);
    cg.attach_while_condition(&w, first).unwrap();
    let second = below(&mut cg, w.lp, 2);
    let err = cg.attach_while_condition(&w, second).unwrap_err();
    assert!(matches!(err, CompileError::Structure { .. }));
}

#[test]
fn while_condition_must_be_an_integer() {
    let (mut cg, method) = setup(IrType::None);
    let w = cg.build_while(method).unwrap();
    let f = cg.float_literal(w.lp, 1.0, IrType::F64).unwrap();
    assert!(cg.attach_while_condition(&w, f).is_err());
}

#[test]
fn unfinished_while_is_reported() {
    let (mut cg, method) = setup(IrType::None);
    let w = cg.build_while(method).unwrap();
    assert!(cg.finish_while(&w).is_err());
    let err = cg.finalize().unwrap_err();
    assert!(matches!(err, CompileError::Structure { .. }));
    assert!(err.to_string().contains("has no condition"));
}

#[test]
fn loops_get_distinct_labels() {
    let (mut cg, method) = setup(IrType::None);
    let outer = cg.build_while(method).unwrap();
    let inner = cg.build_while(outer.lp).unwrap();

    let label = |cg: &Codegen, w: &WhileLoop| cg.tree().node(w.block).label().map(str::to_string);
    assert_eq!(label(&cg, &outer).as_deref(), Some("$block_0"));
    assert_eq!(label(&cg, &inner).as_deref(), Some("$block_1"));
    assert_eq!(cg.tree().node(inner.lp).label(), Some("$loop_1"));
}

// ===== break / next =====

#[test]
fn break_and_next_target_the_innermost_loop() {
    let (mut cg, method) = setup(IrType::None);
    let outer = cg.build_while(method).unwrap();
    let inner = cg.build_while(outer.lp).unwrap();

    let if_node = cg.build_if(inner.lp, IrType::None).unwrap();
    let then = cg.build_then(if_node).unwrap();
    let brk = cg.build_break(then).unwrap();
    let next = cg.build_next(then).unwrap();
    assert_eq!(render(&cg, brk), "(br $block_1)");
    assert_eq!(render(&cg, next), "(br $loop_1)");

    let outer_next = cg.build_next(outer.lp).unwrap();
    assert_eq!(render(&cg, outer_next), "(br $loop_0)");
}

#[test]
fn break_outside_a_loop_fails() {
    let (mut cg, method) = setup(IrType::None);
    let err = cg.build_break(method).unwrap_err();
    assert_eq!(err.to_string(), "Structure error: `break` used outside of a block");
    let err = cg.build_next(method).unwrap_err();
    assert_eq!(err.to_string(), "Structure error: `next` used outside of a loop");
}

// ===== if =====

#[test]
fn if_condition_arrives_after_the_branches() {
    let (mut cg, method) = setup(IrType::I32);
    let if_node = cg.build_if(method, IrType::I32).unwrap();
    let then = cg.build_then(if_node).unwrap();
    cg.int_literal(then, 1, IrType::I32).unwrap();
    let otherwise = cg.build_else(if_node).unwrap();
    cg.int_literal(otherwise, 2, IrType::I32).unwrap();

    let cond = below(&mut cg, method, 5);
    cg.attach_if_condition(if_node, cond).unwrap();

    insta::assert_snapshot!(render(&cg, if_node), @r"
    (if (result i32)
      (i32.lt_s
        (local.get $i)
        (i32.const 5))
      (then
        (i32.const 1))
      (else
        (i32.const 2)))
    ");
}

#[test]
fn if_branches_are_unique_and_ordered() {
    let (mut cg, method) = setup(IrType::None);
    let if_node = cg.build_if(method, IrType::None).unwrap();
    assert!(cg.build_else(if_node).is_err());
    cg.build_then(if_node).unwrap();
    assert!(cg.build_then(if_node).is_err());
    cg.build_else(if_node).unwrap();
    assert!(cg.build_else(if_node).is_err());

    let cond = below(&mut cg, method, 1);
    cg.attach_if_condition(if_node, cond).unwrap();
    let again = below(&mut cg, method, 2);
    assert!(cg.attach_if_condition(if_node, again).is_err());
}

#[test]
fn branches_attach_to_if_nodes_only() {
    let (mut cg, method) = setup(IrType::None);
    let err = cg.build_then(method).unwrap_err();
    assert!(matches!(err, CompileError::Structure { .. }));
}

// ===== return / drop =====

#[test]
fn return_casts_to_the_method_result() {
    let (mut cg, method) = setup(IrType::I64);
    let value = cg.int_literal(method, 5, IrType::I32).unwrap();
    let ret = cg.build_return(method, Some(value)).unwrap();
    assert_eq!(render(&cg, ret), "(return\n  (i64.const 5))");
}

#[test]
fn return_value_must_match_the_result() {
    let (mut cg, method) = setup(IrType::I32);
    assert!(cg.build_return(method, None).is_err());

    let (mut cg, method) = setup(IrType::None);
    let value = cg.int_literal(method, 5, IrType::I32).unwrap();
    assert!(cg.build_return(method, Some(value)).is_err());
    let bare = cg.build_return(method, None).unwrap();
    assert_eq!(render(&cg, bare), "(return)");
}

#[test]
fn drop_discards_a_value() {
    let (mut cg, method) = setup(IrType::None);
    let value = cg.int_literal(method, 5, IrType::I32).unwrap();
    let drop = cg.build_drop(method, value).unwrap();
    assert_eq!(render(&cg, drop), "(drop\n  (i32.const 5))");
    assert_eq!(cg.tree().node(drop).kind, NodeKind::Instruction);
}
