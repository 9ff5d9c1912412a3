use tracing::debug;

use crate::diagnostics::CompileError;
use crate::ir::{NodeId, NodeKind, ParamValue, Template};
use crate::registry::{AttributeDescriptor, MethodKind};
use crate::types::IrType;

use super::Codegen;

const CONSTRUCTOR: &str = "new";
const INITIALIZER: &str = "initialize";

impl Codegen {
    /// Find or create the class `name`, returning its class node.
    ///
    /// The `new` class method is registered right away (without a body) so a
    /// user-written constructor is detected before one is synthesised.
    pub fn declare_class(&mut self, name: &str) -> Result<NodeId, CompileError> {
        if let Some(node) = self.registry.class(name).and_then(|c| c.node) {
            return Ok(node);
        }
        let node = self.emit_class_node(name)?;
        let descriptor = self.registry.find_or_create_method(name, CONSTRUCTOR, MethodKind::Class);
        if !descriptor.has_body() {
            descriptor.return_type = IrType::class(name);
        }
        debug!(class = name, "class declared");
        Ok(node)
    }

    /// Register a primitive class backed by a native type, e.g. `I64`.
    pub fn declare_native_class(&mut self, name: &str, ty: IrType) -> Result<NodeId, CompileError> {
        if !ty.is_native() {
            return Err(self.error(format!("native class {name} must be backed by a native type, got {ty}")));
        }
        if let Some(class) = self.registry.class(name) {
            if class.node.is_some() && !class.native {
                return Err(self.error(format!("class {name} is already declared as a regular class")));
            }
            if let Some(node) = class.node {
                return Ok(node);
            }
        }
        let node = self.emit_class_node(name)?;
        let class = self.registry.find_or_create_class(name);
        class.native = true;
        class.ty = ty;
        debug!(class = name, "native class declared");
        Ok(node)
    }

    fn emit_class_node(&mut self, name: &str) -> Result<NodeId, CompileError> {
        let root = self.tree.root();
        let node = self.emit(root, NodeKind::Class, Template::Class, IrType::class(name))?;
        self.tree.set_param(node, "name", ParamValue::Name(name.to_string()));
        self.registry.find_or_create_class(name).node = Some(node);
        Ok(node)
    }

    /// Append an attribute to the class layout and return its byte offset.
    pub fn declare_attribute(&mut self, class_node: NodeId, name: &str, ty: IrType) -> Result<u32, CompileError> {
        let class_name = self.class_name_of(class_node)?;
        if !(ty.is_native() || ty.is_class()) {
            return Err(self.error(format!("attribute {class_name}.{name} cannot have type {ty}")));
        }
        let span = self.span;
        let class = self.registry.find_or_create_class(&class_name);
        if class.native {
            return Err(CompileError::codegen(format!("native class {class_name} cannot have attributes")).at(span));
        }
        let attr = class.add_attribute(name, ty).map_err(|e| e.at(span))?.clone();
        debug!(class = %class_name, attribute = name, offset = attr.offset, size = attr.ty.size(), "attribute laid out");

        // Accessor calls compiled before `compile_attributes` are typed from these.
        for accessor in [&attr.getter, &attr.setter] {
            let descriptor = self.registry.find_or_create_method(&class_name, accessor, MethodKind::Instance);
            if !descriptor.has_body() {
                descriptor.return_type = attr.ty.clone();
            }
        }
        Ok(attr.offset)
    }

    /// Byte size of a class as laid out so far.
    pub fn class_size(&self, class_name: &str) -> Result<u32, CompileError> {
        self.registry
            .size_of(class_name)
            .ok_or_else(|| self.error(format!("unknown class {class_name}")))
    }

    /// Generate getters and setters for attributes that have none yet, and the
    /// class size-accessor. Running it again only covers new attributes.
    pub fn compile_attributes(&mut self, class_node: NodeId) -> Result<(), CompileError> {
        let class_name = self.class_name_of(class_node)?;
        let pending: Vec<AttributeDescriptor> = self
            .registry
            .class(&class_name)
            .map(|c| c.attributes.iter().filter(|a| !a.accessors_generated).cloned().collect())
            .unwrap_or_default();

        for attr in pending {
            if !self.has_body(&class_name, &attr.getter, MethodKind::Instance) {
                self.synthesize_getter(class_node, &attr)?;
            }
            if !self.has_body(&class_name, &attr.setter, MethodKind::Instance) {
                self.synthesize_setter(class_node, &attr)?;
            }
            if let Some(a) = self
                .registry
                .class_mut(&class_name)
                .and_then(|c| c.attributes.iter_mut().find(|a| a.name == attr.name))
            {
                a.accessors_generated = true;
            }
        }

        let size_method = self.config.size_method.clone();
        if !self.has_body(&class_name, &size_method, MethodKind::Class) {
            let method = self.declare_method(class_node, &size_method, MethodKind::Class, &[], IrType::DEFAULT)?;
            self.size_literal(method, &class_name)?;
            self.mark_synthetic(&class_name, &size_method, MethodKind::Class);
            debug!(class = %class_name, "size accessor synthesised");
        }
        Ok(())
    }

    fn has_body(&self, class_name: &str, method: &str, kind: MethodKind) -> bool {
        self.registry
            .method(class_name, method, kind)
            .is_some_and(|m| m.has_body())
    }

    fn mark_synthetic(&mut self, class_name: &str, method: &str, kind: MethodKind) {
        if let Some(m) = self.registry.method_mut(class_name, method, kind) {
            m.synthetic = true;
        }
    }

    fn synthesize_getter(&mut self, class_node: NodeId, attr: &AttributeDescriptor) -> Result<NodeId, CompileError> {
        let class_name = self.class_name_of(class_node)?;
        let method = self.declare_method(class_node, &attr.getter, MethodKind::Instance, &[], attr.ty.clone())?;
        let load = self.instr(method, Template::Load, attr.ty.clone())?;
        self.tree.set_param(load, "offset", ParamValue::Int(attr.offset as i64));
        self.self_ref(load)?;
        self.mark_synthetic(&class_name, &attr.getter, MethodKind::Instance);
        debug!(class = %class_name, getter = %attr.getter, offset = attr.offset, "getter synthesised");
        Ok(method)
    }

    fn synthesize_setter(&mut self, class_node: NodeId, attr: &AttributeDescriptor) -> Result<NodeId, CompileError> {
        let class_name = self.class_name_of(class_node)?;
        let method = self.declare_method(
            class_node,
            &attr.setter,
            MethodKind::Instance,
            &[(attr.name.as_str(), attr.ty.clone())],
            attr.ty.clone(),
        )?;
        let store = self.instr(method, Template::Store, attr.ty.clone())?;
        self.tree.set_param(store, "offset", ParamValue::Int(attr.offset as i64));
        self.self_ref(store)?;
        self.local_get(store, &attr.name)?;
        self.local_get(method, &attr.name)?;
        self.mark_synthetic(&class_name, &attr.setter, MethodKind::Instance);
        debug!(class = %class_name, setter = %attr.setter, offset = attr.offset, "setter synthesised");
        Ok(method)
    }

    /// Synthesise an empty `initialize` unless the class is native or the user wrote one.
    pub fn synthesize_initializer(&mut self, class_node: NodeId) -> Result<Option<NodeId>, CompileError> {
        let class_name = self.class_name_of(class_node)?;
        if self.is_native(&class_name) || self.has_body(&class_name, INITIALIZER, MethodKind::Instance) {
            return Ok(None);
        }
        let method = self.declare_method(class_node, INITIALIZER, MethodKind::Instance, &[], IrType::None)?;
        self.mark_synthetic(&class_name, INITIALIZER, MethodKind::Instance);
        debug!(class = %class_name, "initializer synthesised");
        Ok(Some(method))
    }

    /// Synthesise `new` unless the class is native or the user wrote one.
    ///
    /// The constructor takes the same parameters as `initialize`, obtains a
    /// block of the class's size from the allocator (address 0 for a class
    /// without attributes, which nothing may dereference), calls `initialize`
    /// on it with every argument and returns it.
    pub fn synthesize_constructor(&mut self, class_node: NodeId) -> Result<Option<NodeId>, CompileError> {
        let class_name = self.class_name_of(class_node)?;
        if self.is_native(&class_name) || self.has_body(&class_name, CONSTRUCTOR, MethodKind::Class) {
            return Ok(None);
        }
        let args: Vec<(String, IrType)> = self
            .registry
            .method(&class_name, INITIALIZER, MethodKind::Instance)
            .map(|m| m.explicit_params().iter().map(|p| (p.name.clone(), p.ty.clone())).collect())
            .unwrap_or_default();
        let params: Vec<(&str, IrType)> = args.iter().map(|(n, ty)| (n.as_str(), ty.clone())).collect();
        let class_ty = IrType::class(&class_name);
        let method = self.declare_method(class_node, CONSTRUCTOR, MethodKind::Class, &params, class_ty.clone())?;

        let instance = self.config.receiver_name.clone();
        self.declare_local(method, &instance, class_ty)?;
        let size = self.class_size(&class_name)?;
        let address = if size == 0 {
            self.fix_size(&class_name, 0, CONSTRUCTOR.to_string());
            self.int_literal(method, 0, IrType::DEFAULT)?
        } else {
            let allocator_class = self.config.allocator_class.clone();
            let allocator_method = self.config.allocator_method.clone();
            let bytes = self.size_literal(method, &class_name)?;
            self.resolve_call(method, &allocator_class, &allocator_method, MethodKind::Class, &[bytes])?
        };
        self.local_set(method, &instance, address)?;

        let mut call_args = vec![self.local_get(method, &instance)?];
        for (name, _) in &args {
            call_args.push(self.local_get(method, name)?);
        }
        let init = self.resolve_call(method, &class_name, INITIALIZER, MethodKind::Instance, &call_args)?;
        if !self.tree.node(init).ty.is_none() {
            self.build_drop(method, init)?;
        }
        self.local_get(method, &instance)?;

        self.mark_synthetic(&class_name, CONSTRUCTOR, MethodKind::Class);
        debug!(class = %class_name, size, "constructor synthesised");
        Ok(Some(method))
    }

    fn is_native(&self, class_name: &str) -> bool {
        self.registry.class(class_name).is_some_and(|c| c.native)
    }

    /// Reserve a zero-filled static block for one instance and return its
    /// address as a class-typed constant. A class without attributes gets
    /// address 0, which is never dereferenced since it has nothing to access.
    pub fn static_allocate(&mut self, parent: NodeId, class_name: &str) -> Result<NodeId, CompileError> {
        let size = self.class_size(class_name)?;
        let address = if size == 0 {
            0
        } else {
            let label = format!("{}_{}", self.config.static_label_prefix, self.next_static);
            self.next_static += 1;
            let address = self.data.reserve(label.clone(), size).map_err(|e| self.locate(e))?;
            debug!(class = class_name, %label, address, size, "static block reserved");
            address
        };
        self.fix_size(class_name, size, format!("static instance at {address}"));
        let literal = self.int_literal(parent, address as i64, IrType::DEFAULT)?;
        self.cast(literal, &IrType::class(class_name), true)
    }
}
