use tracing::trace;

use crate::diagnostics::CompileError;
use crate::ir::{NodeId, NodeKind, ParamValue, Template};
use crate::ops::{Opcode, class_operator_symbols};
use crate::types::{CastOp, IrType, classify_cast, unify};

use super::Codegen;

impl Codegen {
    pub fn int_literal(&mut self, parent: NodeId, value: i64, ty: IrType) -> Result<NodeId, CompileError> {
        let in_range = match ty {
            IrType::I32 => (i32::MIN as i64..=u32::MAX as i64).contains(&value),
            IrType::I64 => true,
            _ => return Err(self.error(format!("integer literal {value} cannot have type {ty}"))),
        };
        if !in_range {
            return Err(self.error(format!("integer literal {value} does not fit in {ty}")));
        }
        let id = self.emit(parent, NodeKind::Const, Template::Const, ty)?;
        self.tree.set_param(id, "value", ParamValue::Int(value));
        Ok(id)
    }

    pub fn float_literal(&mut self, parent: NodeId, value: f64, ty: IrType) -> Result<NodeId, CompileError> {
        if !ty.is_float() {
            return Err(self.error(format!("float literal {value} cannot have type {ty}")));
        }
        let id = self.emit(parent, NodeKind::Const, Template::Const, ty)?;
        self.tree.set_param(id, "value", ParamValue::Float(value));
        Ok(id)
    }

    /// Constant holding the byte size of `class_name`, resolved at finalisation.
    pub(super) fn size_literal(&mut self, parent: NodeId, class_name: &str) -> Result<NodeId, CompileError> {
        let id = self.emit(parent, NodeKind::Const, Template::Const, IrType::DEFAULT)?;
        self.tree.set_param(id, "value", ParamValue::SizeOf(class_name.to_string()));
        Ok(id)
    }

    /// Convert `node` to `target`. Returns the node to use from now on: `node`
    /// itself when nothing is emitted, or the conversion node spliced above it.
    pub fn cast(&mut self, node: NodeId, target: &IrType, signed: bool) -> Result<NodeId, CompileError> {
        let from = self.tree.node(node).ty.clone();
        let op = classify_cast(&from, target, signed).map_err(|e| self.locate(e))?;
        trace!(%from, to = %target, ?op, "cast");
        let is_const = self.tree.node(node).kind == NodeKind::Const;
        match op {
            CastOp::Identity => Ok(node),
            CastOp::Reinterpret => {
                self.tree.node_mut(node).ty = target.clone();
                Ok(node)
            }
            CastOp::Extend { signed } if is_const => {
                // Literal: fold the conversion into the constant itself.
                self.fold_literal(node, target, |v| if signed { v as i32 as i64 } else { v as i32 as u32 as i64 });
                Ok(node)
            }
            CastOp::Wrap if is_const => {
                self.fold_literal(node, target, |v| v as i32 as i64);
                Ok(node)
            }
            CastOp::Extend { signed } => {
                let wrapper = self.tree.alloc(NodeKind::Instruction, Template::Extend, target.clone());
                self.tree.set_param(wrapper, "signed", ParamValue::Bool(signed));
                self.tree.insert_between(node, wrapper).map_err(|e| self.locate(e))?;
                Ok(wrapper)
            }
            CastOp::Wrap => {
                let wrapper = self.tree.alloc(NodeKind::Instruction, Template::Wrap, target.clone());
                self.tree.insert_between(node, wrapper).map_err(|e| self.locate(e))?;
                Ok(wrapper)
            }
        }
    }

    fn fold_literal(&mut self, node: NodeId, target: &IrType, convert: impl Fn(i64) -> i64) {
        let value = match self.tree.node(node).param("value") {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        };
        if let Some(v) = value {
            self.tree.set_param(node, "value", ParamValue::Int(convert(v)));
        }
        self.tree.node_mut(node).ty = target.clone();
    }

    /// Placeholder node for an operator; its type is settled by `attach_operands`.
    pub fn build_operator(&mut self, parent: NodeId, symbol: &str) -> Result<NodeId, CompileError> {
        let op = Opcode::from_symbol(symbol).map_err(|e| self.locate(e))?;
        trace!(symbol, ?op, "operator");
        self.instr(parent, Template::Operator(op), IrType::None)
    }

    /// Unify, cast and attach the receiver and optional argument of an operator.
    pub fn attach_operands(&mut self, op_node: NodeId, receiver: NodeId, args: &[NodeId]) -> Result<NodeId, CompileError> {
        let Template::Operator(op) = self.tree.node(op_node).template else {
            return Err(self.error(format!("node {op_node} is not an operator")));
        };
        if !self.tree.children(op_node).is_empty() {
            return Err(self.error(format!("operator `{}` already has operands", op.symbol())));
        }
        if args.len() != op.arity() {
            return Err(self.locate(CompileError::arity(op.symbol(), op.arity(), args.len())));
        }

        let receiver_ty = self.tree.node(receiver).ty.clone();
        if op.is_unary() {
            if let Some(class_name) = receiver_ty.class_name() {
                return Err(self.locate(CompileError::class_operator(
                    op.symbol(),
                    class_name,
                    class_operator_symbols(),
                )));
            }
            if !receiver_ty.is_integer() {
                return Err(self.error(format!("`{}` needs an integer operand, got {receiver_ty}", op.symbol())));
            }
            self.reparent(receiver, op_node)?;
            self.tree.node_mut(op_node).ty = IrType::DEFAULT;
            return Ok(op_node);
        }

        let arg = args[0];
        let arg_ty = self.tree.node(arg).ty.clone();
        let unified = unify(&[receiver_ty.clone(), arg_ty.clone()]).map_err(|e| self.locate(e))?;

        let mut receiver = self.cast(receiver, &unified, true)?;
        let mut arg = self.cast(arg, &unified, true)?;

        if let Some(class_name) = unified.class_name() {
            if !op.allowed_on_class() {
                return Err(self.locate(CompileError::class_operator(
                    op.symbol(),
                    class_name,
                    class_operator_symbols(),
                )));
            }
            // Pointer arithmetic: offsets count instances, not bytes.
            if op.is_additive() && arg_ty.is_native() {
                arg = self.scale_by_size(arg, &unified)?;
            } else if op == Opcode::Add && receiver_ty.is_native() {
                receiver = self.scale_by_size(receiver, &unified)?;
            } else if op == Opcode::Sub && receiver_ty.is_native() {
                return Err(self.error(format!("cannot subtract an instance of {class_name} from an offset")));
            }
        }

        self.reparent(receiver, op_node)?;
        self.reparent(arg, op_node)?;
        let result = if op.is_relational() { IrType::DEFAULT } else { unified };
        self.tree.node_mut(op_node).ty = result;
        Ok(op_node)
    }

    /// Splice `offset * sizeof(class)` above an instance-count operand.
    fn scale_by_size(&mut self, offset: NodeId, class_ty: &IrType) -> Result<NodeId, CompileError> {
        let Some(class_name) = class_ty.class_name() else {
            return Err(self.error(format!("cannot scale by the size of {class_ty}")));
        };
        let scale = self.tree.alloc(NodeKind::Instruction, Template::Operator(Opcode::Mul), class_ty.clone());
        self.tree.insert_between(offset, scale).map_err(|e| self.locate(e))?;
        self.size_literal(scale, class_name)?;
        Ok(scale)
    }
}
