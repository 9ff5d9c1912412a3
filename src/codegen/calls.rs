use tracing::debug;

use crate::diagnostics::CompileError;
use crate::ir::{NodeId, NodeKind, ParamValue, Template};
use crate::registry::{ClassVar, Constant, LocalVar, MethodKind};
use crate::types::IrType;

use super::Codegen;

impl Codegen {
    /// Create the method node for `name` on the class declared by `class_node`.
    ///
    /// Instance methods get the receiver as parameter 0, typed as the class.
    /// Declarations (params, result, locals) always precede the body.
    pub fn declare_method(
        &mut self,
        class_node: NodeId,
        name: &str,
        kind: MethodKind,
        params: &[(&str, IrType)],
        result: IrType,
    ) -> Result<NodeId, CompileError> {
        let class_name = self.class_name_of(class_node)?;
        let receiver_name = self.config.receiver_name.clone();
        if params.iter().any(|(p, _)| *p == receiver_name) {
            return Err(self.error(format!("parameter name `{receiver_name}` is reserved for the receiver")));
        }
        let descriptor = self.registry.find_or_create_method(&class_name, name, kind);
        if descriptor.has_body() {
            let msg = format!("method {} is already defined", descriptor.symbol());
            return Err(self.error(msg));
        }

        descriptor.params = params.iter().map(|(p, ty)| LocalVar::new(*p, ty.clone())).collect();
        descriptor.locals.clear();
        descriptor.return_type = result.clone();
        let symbol = descriptor.symbol();

        let method = self.emit(class_node, NodeKind::Method, Template::Method, result.clone())?;
        self.tree.set_param(method, "name", ParamValue::Name(symbol.clone()));
        self.tree.set_param(method, "class", ParamValue::Name(class_name.clone()));
        self.tree.set_param(method, "method", ParamValue::Name(name.to_string()));
        self.tree.set_param(method, "kind", ParamValue::Name(kind.to_string()));

        for (param, ty) in params {
            let decl = self.emit(method, NodeKind::Param, Template::Param, ty.clone())?;
            self.tree.set_param(decl, "name", ParamValue::Name(param.to_string()));
        }
        if !result.is_none() {
            self.emit(method, NodeKind::Result, Template::Result, result)?;
        }
        if kind == MethodKind::Instance {
            let receiver_ty = IrType::class(&class_name);
            let decl = self.tree.alloc(NodeKind::Param, Template::Param, receiver_ty.clone());
            self.tree.set_param(decl, "name", ParamValue::Name(receiver_name.clone()));
            self.tree.prepend_child(method, decl).map_err(|e| self.locate(e))?;
            if let Some(descriptor) = self.registry.method_mut(&class_name, name, kind) {
                descriptor.params.insert(0, LocalVar::new(receiver_name, receiver_ty));
            }
        }
        if let Some(descriptor) = self.registry.method_mut(&class_name, name, kind) {
            descriptor.node = Some(method);
        }
        debug!(method = %symbol, "method declared");
        Ok(method)
    }

    /// Declare a local in the method enclosing `at`. Redeclaring with the same
    /// type is a no-op.
    pub fn declare_local(&mut self, at: NodeId, name: &str, ty: IrType) -> Result<(), CompileError> {
        let (class_name, method_name, kind) = self.method_of(at)?;
        let method = self.tree.enclosing_method(at).map_err(|e| self.locate(e))?;
        let existing = self
            .registry
            .method(&class_name, &method_name, kind)
            .and_then(|m| m.variable(name))
            .map(|v| v.ty.clone());
        match existing {
            Some(existing) if existing == ty => return Ok(()),
            Some(existing) => {
                return Err(self.error(format!("variable `{name}` redeclared as {ty}, was {existing}")));
            }
            None => {}
        }

        let decl = self.tree.alloc(NodeKind::Local, Template::Local, ty.clone());
        self.tree.set_param(decl, "name", ParamValue::Name(name.to_string()));
        let slot = self
            .tree
            .children(method)
            .iter()
            .take_while(|c| self.tree.node(**c).is_declaration())
            .count();
        self.tree.insert_child(method, slot, decl).map_err(|e| self.locate(e))?;
        if let Some(descriptor) = self.registry.method_mut(&class_name, &method_name, kind) {
            descriptor.locals.push(LocalVar::new(name, ty));
        }
        Ok(())
    }

    fn variable_type(&self, at: NodeId, name: &str) -> Result<Option<IrType>, CompileError> {
        let (class_name, method_name, kind) = self.method_of(at)?;
        Ok(self
            .registry
            .method(&class_name, &method_name, kind)
            .and_then(|m| m.variable(name))
            .map(|v| v.ty.clone()))
    }

    pub fn local_get(&mut self, parent: NodeId, name: &str) -> Result<NodeId, CompileError> {
        let ty = self
            .variable_type(parent, name)?
            .ok_or_else(|| self.error(format!("unknown local variable `{name}`")))?;
        let id = self.instr(parent, Template::LocalGet, ty)?;
        self.tree.set_param(id, "name", ParamValue::Name(name.to_string()));
        Ok(id)
    }

    /// Store `value` into a local, declaring it with the value's type on first assignment.
    pub fn local_set(&mut self, parent: NodeId, name: &str, value: NodeId) -> Result<NodeId, CompileError> {
        let ty = match self.variable_type(parent, name)? {
            Some(ty) => ty,
            None => {
                let ty = self.tree.node(value).ty.clone();
                self.declare_local(parent, name, ty.clone())?;
                ty
            }
        };
        let value = self.cast(value, &ty, true)?;
        let id = self.instr(parent, Template::LocalSet, ty)?;
        self.tree.set_param(id, "name", ParamValue::Name(name.to_string()));
        self.reparent(value, id)?;
        Ok(id)
    }

    /// Read of the receiver inside an instance method.
    pub fn self_ref(&mut self, parent: NodeId) -> Result<NodeId, CompileError> {
        let (_, method_name, kind) = self.method_of(parent)?;
        if kind != MethodKind::Instance {
            return Err(self.structure(format!("`self` used in class method `{method_name}`")));
        }
        let class_node = self.tree.enclosing_class(parent).map_err(|e| self.locate(e))?;
        let class_name = self.class_name_of(class_node)?;
        let receiver_name = self.config.receiver_name.clone();
        let id = self.instr(parent, Template::LocalGet, IrType::class(class_name))?;
        self.tree.set_param(id, "name", ParamValue::Name(receiver_name));
        Ok(id)
    }

    pub fn declare_global(&mut self, name: &str, ty: IrType, mutable: bool) -> Result<(), CompileError> {
        self.registry
            .declare_global(name, ty, mutable)
            .map(|_| ())
            .map_err(|e| e.at(self.span))
    }

    pub fn global_get(&mut self, parent: NodeId, name: &str) -> Result<NodeId, CompileError> {
        let global = self
            .registry
            .global(name)
            .cloned()
            .ok_or_else(|| self.error(format!("unknown global `{name}`")))?;
        let id = self.instr(parent, Template::GlobalGet, global.ty)?;
        self.tree.set_param(id, "name", ParamValue::Name(name.to_string()));
        Ok(id)
    }

    pub fn global_set(&mut self, parent: NodeId, name: &str, value: NodeId) -> Result<NodeId, CompileError> {
        let global = self
            .registry
            .global(name)
            .cloned()
            .ok_or_else(|| self.error(format!("unknown global `{name}`")))?;
        if !global.mutable {
            return Err(self.error(format!("global `{name}` is immutable")));
        }
        let value = self.cast(value, &global.ty, true)?;
        let id = self.instr(parent, Template::GlobalSet, global.ty)?;
        self.tree.set_param(id, "name", ParamValue::Name(name.to_string()));
        self.reparent(value, id)?;
        Ok(id)
    }

    /// Reserve static storage for a class variable. Idempotent.
    pub fn declare_class_var(&mut self, class_node: NodeId, name: &str, ty: IrType) -> Result<u32, CompileError> {
        let class_name = self.class_name_of(class_node)?;
        if let Some(existing) = self.registry.class(&class_name).and_then(|c| c.class_vars.get(name)) {
            if existing.ty != ty {
                return Err(self.error(format!("class variable {class_name}::{name} redeclared as {ty}")));
            }
            return Ok(existing.address);
        }
        let address = self
            .data
            .reserve(format!("{class_name}::{name}"), ty.size())
            .map_err(|e| self.locate(e))?;
        debug!(class = %class_name, name, address, "class variable reserved");
        self.registry.find_or_create_class(&class_name).class_vars.insert(
            name.to_string(),
            ClassVar { name: name.to_string(), class_name, ty, address },
        );
        Ok(address)
    }

    fn class_var(&self, class_name: &str, name: &str) -> Result<ClassVar, CompileError> {
        self.registry
            .class(class_name)
            .and_then(|c| c.class_vars.get(name))
            .cloned()
            .ok_or_else(|| self.error(format!("unknown class variable {class_name}::{name}")))
    }

    pub fn class_var_get(&mut self, parent: NodeId, class_name: &str, name: &str) -> Result<NodeId, CompileError> {
        let var = self.class_var(class_name, name)?;
        self.load_static(parent, var.address, var.ty)
    }

    pub fn class_var_set(&mut self, parent: NodeId, class_name: &str, name: &str, value: NodeId) -> Result<NodeId, CompileError> {
        let var = self.class_var(class_name, name)?;
        self.store_static(parent, var.address, var.ty, value)
    }

    /// Reserve static storage for a constant. Idempotent.
    pub fn declare_constant(&mut self, class_name: &str, name: &str, ty: IrType) -> Result<u32, CompileError> {
        if let Some(existing) = self.registry.class(class_name).and_then(|c| c.constants.get(name)) {
            if existing.ty != ty {
                return Err(self.error(format!("constant {class_name}::{name} redeclared as {ty}")));
            }
            return Ok(existing.address);
        }
        let address = self
            .data
            .reserve(format!("{class_name}::{name}"), ty.size())
            .map_err(|e| self.locate(e))?;
        debug!(class = class_name, name, address, "constant reserved");
        self.registry.find_or_create_class(class_name).constants.insert(
            name.to_string(),
            Constant {
                name: name.to_string(),
                class_name: class_name.to_string(),
                ty,
                address,
                initialized: false,
            },
        );
        Ok(address)
    }

    fn constant(&self, class_name: &str, name: &str) -> Result<Constant, CompileError> {
        self.registry
            .class(class_name)
            .and_then(|c| c.constants.get(name))
            .cloned()
            .ok_or_else(|| self.error(format!("unknown constant {class_name}::{name}")))
    }

    pub fn constant_get(&mut self, parent: NodeId, class_name: &str, name: &str) -> Result<NodeId, CompileError> {
        let constant = self.constant(class_name, name)?;
        self.load_static(parent, constant.address, constant.ty)
    }

    /// Initialise a constant. Only the first write is accepted.
    pub fn constant_set(&mut self, parent: NodeId, class_name: &str, name: &str, value: NodeId) -> Result<NodeId, CompileError> {
        let constant = self.constant(class_name, name)?;
        if constant.initialized {
            return Err(self.error(format!("constant {class_name}::{name} is already initialized")));
        }
        let id = self.store_static(parent, constant.address, constant.ty, value)?;
        if let Some(c) = self
            .registry
            .class_mut(class_name)
            .and_then(|c| c.constants.get_mut(name))
        {
            c.initialized = true;
        }
        Ok(id)
    }

    fn load_static(&mut self, parent: NodeId, address: u32, ty: IrType) -> Result<NodeId, CompileError> {
        let id = self.instr(parent, Template::Load, ty)?;
        self.tree.set_param(id, "offset", ParamValue::Int(0));
        self.int_literal(id, address as i64, IrType::DEFAULT)?;
        Ok(id)
    }

    fn store_static(&mut self, parent: NodeId, address: u32, ty: IrType, value: NodeId) -> Result<NodeId, CompileError> {
        let value = self.cast(value, &ty, true)?;
        let id = self.instr(parent, Template::Store, ty)?;
        self.tree.set_param(id, "offset", ParamValue::Int(0));
        self.int_literal(id, address as i64, IrType::DEFAULT)?;
        self.reparent(value, id)?;
        Ok(id)
    }

    fn attribute_accessor(&self, receiver: NodeId, name: &str, setter: bool) -> Result<(String, String, IrType), CompileError> {
        let receiver_ty = &self.tree.node(receiver).ty;
        let class_name = receiver_ty
            .class_name()
            .ok_or_else(|| self.error(format!("instance variable `{name}` accessed on non-class value of type {receiver_ty}")))?;
        let attr = self
            .registry
            .class(class_name)
            .and_then(|c| c.attribute(name))
            .ok_or_else(|| self.error(format!("class {class_name} has no attribute `{name}`")))?;
        let accessor = if setter { attr.setter.clone() } else { attr.getter.clone() };
        Ok((class_name.to_string(), accessor, attr.ty.clone()))
    }

    /// Instance-variable read: a call to the attribute's getter.
    pub fn ivar_get(&mut self, parent: NodeId, receiver: NodeId, name: &str) -> Result<NodeId, CompileError> {
        let (class_name, getter, _) = self.attribute_accessor(receiver, name, false)?;
        self.resolve_call(parent, &class_name, &getter, MethodKind::Instance, &[receiver])
    }

    /// Instance-variable write: a call to the attribute's setter.
    pub fn ivar_set(&mut self, parent: NodeId, receiver: NodeId, name: &str, value: NodeId) -> Result<NodeId, CompileError> {
        let (class_name, setter, ty) = self.attribute_accessor(receiver, name, true)?;
        let value = self.cast(value, &ty, true)?;
        self.resolve_call(parent, &class_name, &setter, MethodKind::Instance, &[receiver, value])
    }

    /// Emit a call, creating the callee's descriptor if this is a forward reference.
    ///
    /// `args` include the receiver for instance methods. When the callee is
    /// already declared, arguments are checked against and cast to its parameters.
    pub fn resolve_call(
        &mut self,
        parent: NodeId,
        class_name: &str,
        method_name: &str,
        kind: MethodKind,
        args: &[NodeId],
    ) -> Result<NodeId, CompileError> {
        let descriptor = self.registry.find_or_create_method(class_name, method_name, kind);
        let symbol = descriptor.symbol();
        let return_type = descriptor.return_type.clone();
        let declared = descriptor.has_body().then(|| descriptor.params.clone());

        let mut args = args.to_vec();
        if let Some(params) = declared {
            if params.len() != args.len() {
                return Err(self.error(format!(
                    "{symbol} expects {} argument(s), got {}",
                    params.len(),
                    args.len()
                )));
            }
            for (arg, param) in args.iter_mut().zip(params.iter()) {
                *arg = self.cast(*arg, &param.ty, true)?;
            }
        }

        let call = self.instr(parent, Template::Call, return_type)?;
        self.tree.set_param(call, "name", ParamValue::Name(symbol));
        for arg in args {
            self.reparent(arg, call)?;
        }
        Ok(call)
    }
}
