use crate::span::Span;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Cast error: cannot cast {from} to {to}")]
    Cast { from: String, to: String, span: Option<Span> },

    #[error("Arity error: operator `{op}` expects {expected} argument(s), got {got}")]
    Arity { op: String, expected: usize, got: usize, span: Option<Span> },

    #[error("Operator error: unsupported operator `{symbol}`")]
    UnknownOperator { symbol: String, span: Option<Span> },

    #[error("Operator error: `{op}` cannot be applied to class {class} (allowed: {allowed})")]
    ClassOperator { op: String, class: String, allowed: String, span: Option<Span> },

    #[error("Structure error: {msg}")]
    Structure { msg: String, span: Option<Span> },

    #[error("Codegen error: {msg}")]
    Codegen { msg: String, span: Option<Span> },

    #[error("Config error: {msg}")]
    Config { msg: String, path: PathBuf },
}

impl CompileError {
    pub fn cast(from: impl ToString, to: impl ToString) -> Self {
        Self::Cast { from: from.to_string(), to: to.to_string(), span: None }
    }

    pub fn arity(op: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::Arity { op: op.into(), expected, got, span: None }
    }

    pub fn unknown_operator(symbol: impl Into<String>) -> Self {
        Self::UnknownOperator { symbol: symbol.into(), span: None }
    }

    pub fn class_operator(op: impl Into<String>, class: impl Into<String>, allowed: impl Into<String>) -> Self {
        Self::ClassOperator { op: op.into(), class: class.into(), allowed: allowed.into(), span: None }
    }

    pub fn structure(msg: impl Into<String>) -> Self {
        Self::Structure { msg: msg.into(), span: None }
    }

    pub fn codegen(msg: impl Into<String>) -> Self {
        Self::Codegen { msg: msg.into(), span: None }
    }

    pub fn config(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Config { msg: msg.into(), path }
    }

    /// Attach a source location unless the error already carries one.
    pub fn at(mut self, location: Option<Span>) -> Self {
        match &mut self {
            CompileError::Cast { span, .. }
            | CompileError::Arity { span, .. }
            | CompileError::UnknownOperator { span, .. }
            | CompileError::ClassOperator { span, .. }
            | CompileError::Structure { span, .. }
            | CompileError::Codegen { span, .. } => {
                if span.is_none() {
                    *span = location;
                }
            }
            CompileError::Config { .. } => {}
        }
        self
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Cast { span, .. }
            | CompileError::Arity { span, .. }
            | CompileError::UnknownOperator { span, .. }
            | CompileError::ClassOperator { span, .. }
            | CompileError::Structure { span, .. }
            | CompileError::Codegen { span, .. } => *span,
            CompileError::Config { .. } => None,
        }
    }
}

/// Render a CompileError with ariadne for nice terminal output.
pub fn render_error(source: &str, _filename: &str, err: &CompileError) {
    use ariadne::{Label, Report, ReportKind, Source};

    match (err, err.span()) {
        (CompileError::Config { msg, path }, _) => {
            eprintln!("error[config]: {msg}");
            eprintln!("  --> {}", path.display());
        }
        (_, Some(span)) => {
            let kind_str = match err {
                CompileError::Cast { .. } => "cast",
                CompileError::Arity { .. } => "arity",
                CompileError::UnknownOperator { .. } | CompileError::ClassOperator { .. } => "operator",
                CompileError::Structure { .. } => "structure",
                _ => "codegen",
            };
            let printed = Report::build(ReportKind::Error, (), span.start)
                .with_message(format!("{kind_str} error"))
                .with_label(Label::new(span.start..span.end).with_message(err.to_string()))
                .finish()
                .eprint(Source::from(source));
            if printed.is_err() {
                eprintln!("error: {err}");
            }
        }
        (_, None) => {
            eprintln!("error: {err}");
        }
    }
}
