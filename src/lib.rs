pub mod span;
pub mod diagnostics;
pub mod config;
pub mod types;
pub mod ops;
pub mod ir;
pub mod registry;
pub mod data;
pub mod codegen;
pub mod pretty;

pub use codegen::{Codegen, WhileLoop};
pub use config::CodegenConfig;
pub use diagnostics::CompileError;
pub use ir::{IrTree, NodeId, NodeKind, ParamValue, Template};
pub use registry::MethodKind;
pub use span::Span;
pub use types::IrType;

use std::path::Path;

/// Create a code generator, reading settings from `config_path` when given.
pub fn codegen_from_config(config_path: Option<&Path>) -> Result<Codegen, CompileError> {
    let config = match config_path {
        Some(path) => CodegenConfig::load(path)?,
        None => CodegenConfig::default(),
    };
    Ok(Codegen::new(config))
}
