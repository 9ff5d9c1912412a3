//! Error reporting: messages, locations and terminal rendering.

mod common;

use charon::diagnostics::render_error;
use charon::{Codegen, CompileError, IrType, Span};
use common::{class_method, init_tracing};

#[test]
fn errors_carry_the_current_span() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);

    cg.set_span(Span::new(10, 14));
    let err = cg.build_operator(method, "<=>").unwrap_err();
    assert_eq!(err.span(), Some(Span::new(10, 14)));

    cg.clear_span();
    let err = cg.build_break(method).unwrap_err();
    assert_eq!(err.span(), None);
}

#[test]
fn tree_errors_pick_up_the_span() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);
    cg.set_span(Span::new(0, 4));
    let err = cg.build_next(method).unwrap_err();
    assert!(matches!(err, CompileError::Structure { span: Some(_), .. }));
}

#[test]
fn error_messages() {
    let cases = [
        CompileError::cast(IrType::F64, IrType::class("Point")),
        CompileError::arity("+", 1, 2),
        CompileError::unknown_operator("=>"),
        CompileError::structure("`break` used outside of a block"),
        CompileError::codegen("unknown class Ghost"),
    ];
    let text: Vec<String> = cases.iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(text.join("\n"), @r"
    Cast error: cannot cast f64 to Point
    Arity error: operator `+` expects 1 argument(s), got 2
    Operator error: unsupported operator `=>`
    Structure error: `break` used outside of a block
    Codegen error: unknown class Ghost
    ");
}

#[test]
fn unknown_class_size_fails_at_finalize() {
    init_tracing();
    let mut cg = Codegen::default();
    let method = class_method(&mut cg, IrType::None);
    // A forward reference to a class that is never declared.
    let err = cg.static_allocate(method, "Ghost").unwrap_err();
    assert_eq!(err.to_string(), "Codegen error: unknown class Ghost");
}

#[test]
fn rendering_does_not_panic() {
    let source = "class Point\n  x = 1 <=> 2\nend\n";
    let located = CompileError::unknown_operator("<=>").at(Some(Span::new(20, 23)));
    render_error(source, "point.rb", &located);

    let unlocated = CompileError::codegen("no location");
    render_error(source, "point.rb", &unlocated);

    let config = CompileError::config("bad key", "charon.toml".into());
    render_error(source, "charon.toml", &config);
}
