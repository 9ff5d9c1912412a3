use crate::diagnostics::CompileError;
use crate::ir::{NodeId, NodeKind, ParamValue, Template};
use crate::ops::Opcode;
use crate::types::IrType;

use super::Codegen;

/// Nodes of a `while` skeleton.
///
/// `block` is the `break` target, `lp` the `next` target and `exit` the
/// conditional branch out of `block`, the first child of `lp`. The body goes
/// into `lp` after `exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhileLoop {
    pub block: NodeId,
    pub lp: NodeId,
    pub exit: NodeId,
}

impl Codegen {
    pub fn build_if(&mut self, parent: NodeId, result: IrType) -> Result<NodeId, CompileError> {
        self.emit(parent, NodeKind::If, Template::If, result)
    }

    /// Install the condition as the first child of an `if`, whenever the parser reaches it.
    pub fn attach_if_condition(&mut self, if_node: NodeId, cond: NodeId) -> Result<(), CompileError> {
        self.expect_kind(if_node, NodeKind::If, "if")?;
        let has_condition = self
            .tree
            .children(if_node)
            .first()
            .is_some_and(|c| !matches!(self.tree.node(*c).kind, NodeKind::Then | NodeKind::Else));
        if has_condition {
            return Err(self.structure("`if` already has a condition"));
        }
        self.tree.prepend_child(if_node, cond).map_err(|e| self.locate(e))
    }

    pub fn build_then(&mut self, if_node: NodeId) -> Result<NodeId, CompileError> {
        self.expect_kind(if_node, NodeKind::If, "then")?;
        if !self.tree.children_of_kind(if_node, NodeKind::Then).is_empty() {
            return Err(self.structure("`if` already has a `then` branch"));
        }
        let ty = self.tree.node(if_node).ty.clone();
        self.emit(if_node, NodeKind::Then, Template::Then, ty)
    }

    pub fn build_else(&mut self, if_node: NodeId) -> Result<NodeId, CompileError> {
        self.expect_kind(if_node, NodeKind::If, "else")?;
        if self.tree.children_of_kind(if_node, NodeKind::Then).is_empty() {
            return Err(self.structure("`else` without a `then` branch"));
        }
        if !self.tree.children_of_kind(if_node, NodeKind::Else).is_empty() {
            return Err(self.structure("`if` already has an `else` branch"));
        }
        let ty = self.tree.node(if_node).ty.clone();
        self.emit(if_node, NodeKind::Else, Template::Else, ty)
    }

    /// Emit the block / loop / exit-branch skeleton of a `while`.
    pub fn build_while(&mut self, parent: NodeId) -> Result<WhileLoop, CompileError> {
        let n = self.fresh_label();
        let block_label = format!("$block_{n}");
        let block = self.emit(parent, NodeKind::Block, Template::Block, IrType::None)?;
        self.tree.set_param(block, "label", ParamValue::Name(block_label.clone()));
        let lp = self.emit(block, NodeKind::Loop, Template::Loop, IrType::None)?;
        self.tree.set_param(lp, "label", ParamValue::Name(format!("$loop_{n}")));
        let exit = self.instr(lp, Template::BrIf, IrType::None)?;
        self.tree.set_param(exit, "label", ParamValue::Name(block_label));
        Ok(WhileLoop { block, lp, exit })
    }

    /// Guard the exit branch with the negated condition: the loop is left
    /// when `cond` is false.
    pub fn attach_while_condition(&mut self, skeleton: &WhileLoop, cond: NodeId) -> Result<NodeId, CompileError> {
        if !self.tree.children(skeleton.exit).is_empty() {
            return Err(self.structure("`while` already has a condition"));
        }
        let cond_ty = self.tree.node(cond).ty.clone();
        if !(cond_ty.is_integer() || cond_ty.is_class()) {
            return Err(self.error(format!("`while` condition must be an integer, got {cond_ty}")));
        }
        let negated = self.instr(skeleton.exit, Template::Operator(Opcode::Eqz), IrType::DEFAULT)?;
        self.reparent(cond, negated)?;
        Ok(negated)
    }

    /// Close the loop body with the back-edge to the loop label.
    pub fn finish_while(&mut self, skeleton: &WhileLoop) -> Result<NodeId, CompileError> {
        if self.tree.children(skeleton.exit).is_empty() {
            return Err(self.structure("`while` finished before its condition was attached"));
        }
        let label = self.label_of(skeleton.lp)?;
        let back_edge = self.instr(skeleton.lp, Template::Br, IrType::None)?;
        self.tree.set_param(back_edge, "label", ParamValue::Name(label));
        Ok(back_edge)
    }

    /// `break`: branch to the end of the nearest enclosing block.
    pub fn build_break(&mut self, parent: NodeId) -> Result<NodeId, CompileError> {
        let block = self.tree.enclosing_block(parent).map_err(|e| self.locate(e))?;
        self.branch_to(parent, block)
    }

    /// `next`: branch back to the head of the nearest enclosing loop.
    pub fn build_next(&mut self, parent: NodeId) -> Result<NodeId, CompileError> {
        let lp = self.tree.enclosing_loop(parent).map_err(|e| self.locate(e))?;
        self.branch_to(parent, lp)
    }

    fn branch_to(&mut self, parent: NodeId, target: NodeId) -> Result<NodeId, CompileError> {
        let label = self.label_of(target)?;
        let br = self.instr(parent, Template::Br, IrType::None)?;
        self.tree.set_param(br, "label", ParamValue::Name(label));
        Ok(br)
    }

    fn label_of(&self, node: NodeId) -> Result<String, CompileError> {
        self.tree
            .node(node)
            .label()
            .map(str::to_string)
            .ok_or_else(|| self.error(format!("node {node} has no label")))
    }

    /// `return`, with the value cast to the enclosing method's result type.
    pub fn build_return(&mut self, parent: NodeId, value: Option<NodeId>) -> Result<NodeId, CompileError> {
        let method = self.tree.enclosing_method(parent).map_err(|e| self.locate(e))?;
        let result = self.tree.node(method).ty.clone();
        let value = match (value, result.is_none()) {
            (Some(_), true) => return Err(self.error("cannot return a value from a method without result")),
            (None, false) => return Err(self.error(format!("missing return value of type {result}"))),
            (Some(v), false) => Some(self.cast(v, &result, true)?),
            (None, true) => None,
        };
        let ret = self.instr(parent, Template::Return, IrType::None)?;
        if let Some(v) = value {
            self.reparent(v, ret)?;
        }
        Ok(ret)
    }

    /// Discard the value an expression statement leaves behind.
    pub fn build_drop(&mut self, parent: NodeId, value: NodeId) -> Result<NodeId, CompileError> {
        if self.tree.node(value).ty.is_none() {
            return Err(self.error("cannot drop an expression without a value"));
        }
        let drop = self.instr(parent, Template::Drop, IrType::None)?;
        self.reparent(value, drop)?;
        Ok(drop)
    }

    fn expect_kind(&self, node: NodeId, kind: NodeKind, what: &str) -> Result<(), CompileError> {
        if self.tree.node(node).kind == kind {
            Ok(())
        } else {
            Err(self.structure(format!("`{what}` attached to a {:?} node", self.tree.node(node).kind)))
        }
    }
}
