#![allow(dead_code)]

use charon::{Codegen, IrType, MethodKind, NodeId};

/// Route `tracing` output through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// A generator holding class `Point { x: i32, y: i64 }`.
pub fn point() -> (Codegen, NodeId) {
    init_tracing();
    let mut cg = Codegen::default();
    let class = cg.declare_class("Point").unwrap();
    cg.declare_attribute(class, "x", IrType::I32).unwrap();
    cg.declare_attribute(class, "y", IrType::I64).unwrap();
    (cg, class)
}

/// Declare a class method `Main::run` returning `result`, inside a fresh class.
pub fn class_method(cg: &mut Codegen, result: IrType) -> NodeId {
    let class = cg.declare_class("Main").unwrap();
    cg.declare_method(class, "run", MethodKind::Class, &[], result).unwrap()
}

/// Render the subtree at `id`.
pub fn render(cg: &Codegen, id: NodeId) -> String {
    charon::pretty::render_node(cg.tree(), id)
}
