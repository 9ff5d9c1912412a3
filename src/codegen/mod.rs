//! IR generation driven by parser events.
//!
//! The external parser walks the AST and, for each construct, calls one of the
//! `Codegen` operations with the node to attach to. Every operation returns
//! fully built nodes: kind, template, parameters and type are final when it
//! returns, except `ParamValue::SizeOf` references which `finalize` resolves
//! once all classes are laid out.

mod calls;
mod classes;
mod control;
mod expr;
mod finalize;

pub use control::WhileLoop;

use tracing::debug;

use crate::config::CodegenConfig;
use crate::data::DataSegment;
use crate::diagnostics::CompileError;
use crate::ir::{IrTree, NodeId, NodeKind, ParamValue, Template};
use crate::registry::{MethodKind, Registry};
use crate::span::Span;
use crate::types::IrType;

/// A class size that was baked into the tree before finalisation.
#[derive(Debug, Clone)]
struct FixedSize {
    class_name: String,
    size: u32,
    what: String,
}

pub struct Codegen {
    config: CodegenConfig,
    tree: IrTree,
    registry: Registry,
    data: DataSegment,
    span: Option<Span>,
    next_label: u32,
    next_static: u32,
    fixed_sizes: Vec<FixedSize>,
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new(CodegenConfig::default())
    }
}

impl Codegen {
    pub fn new(config: CodegenConfig) -> Self {
        let registry = Registry::new(config.receiver_name.clone());
        let data = DataSegment::new(config.data_base, config.data_align);
        debug!(data_base = config.data_base, "codegen initialised");
        Self {
            config,
            tree: IrTree::new(),
            registry,
            data,
            span: None,
            next_label: 0,
            next_static: 0,
            fixed_sizes: Vec::new(),
        }
    }

    pub fn config(&self) -> &CodegenConfig {
        &self.config
    }

    pub fn tree(&self) -> &IrTree {
        &self.tree
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn data(&self) -> &DataSegment {
        &self.data
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Record where the construct currently being compiled lives; errors raised
    /// from now on carry this location.
    pub fn set_span(&mut self, span: Span) {
        self.span = Some(span);
    }

    pub fn clear_span(&mut self) {
        self.span = None;
    }

    /// Attach the current location to an error produced outside `Codegen`.
    fn locate(&self, err: CompileError) -> CompileError {
        err.at(self.span)
    }

    fn structure(&self, msg: impl Into<String>) -> CompileError {
        CompileError::structure(msg).at(self.span)
    }

    fn error(&self, msg: impl Into<String>) -> CompileError {
        CompileError::codegen(msg).at(self.span)
    }

    /// Create a node and attach it as the last child of `parent`.
    fn emit(&mut self, parent: NodeId, kind: NodeKind, template: Template, ty: IrType) -> Result<NodeId, CompileError> {
        let id = self.tree.alloc(kind, template, ty);
        self.tree.append_child(parent, id).map_err(|e| self.locate(e))?;
        Ok(id)
    }

    fn instr(&mut self, parent: NodeId, template: Template, ty: IrType) -> Result<NodeId, CompileError> {
        self.emit(parent, NodeKind::Instruction, template, ty)
    }

    fn reparent(&mut self, node: NodeId, parent: NodeId) -> Result<(), CompileError> {
        self.tree.reparent(node, parent).map_err(|e| self.locate(e))
    }

    /// Remember that `what` depends on `class_name` keeping `size` bytes.
    fn fix_size(&mut self, class_name: &str, size: u32, what: String) {
        self.fixed_sizes.push(FixedSize { class_name: class_name.to_string(), size, what });
    }

    fn fresh_label(&mut self) -> u32 {
        let n = self.next_label;
        self.next_label += 1;
        n
    }

    /// Name of the class a class node declares.
    fn class_name_of(&self, class_node: NodeId) -> Result<String, CompileError> {
        let node = self.tree.node(class_node);
        match (node.kind, node.name()) {
            (NodeKind::Class, Some(name)) => Ok(name.to_string()),
            _ => Err(self.error(format!("node {class_node} is not a class"))),
        }
    }

    /// (class, method, kind) of the method node enclosing `from`.
    fn method_of(&self, from: NodeId) -> Result<(String, String, MethodKind), CompileError> {
        let method = self.tree.enclosing_method(from).map_err(|e| self.locate(e))?;
        let node = self.tree.node(method);
        let (Some(ParamValue::Name(class)), Some(ParamValue::Name(name))) =
            (node.param("class"), node.param("method"))
        else {
            return Err(self.error(format!("method node {method} lacks its descriptor key")));
        };
        let kind = match node.param("kind") {
            Some(ParamValue::Name(k)) if k == "class" => MethodKind::Class,
            _ => MethodKind::Instance,
        };
        Ok((class.clone(), name.clone(), kind))
    }
}
