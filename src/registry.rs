use std::collections::HashMap;

use serde::Serialize;

use crate::diagnostics::CompileError;
use crate::ir::NodeId;
use crate::types::IrType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MethodKind {
    Instance,
    Class,
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodKind::Instance => write!(f, "instance"),
            MethodKind::Class => write!(f, "class"),
        }
    }
}

/// Method parameter or local variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalVar {
    pub name: String,
    pub ty: IrType,
}

impl LocalVar {
    pub fn new(name: impl Into<String>, ty: IrType) -> Self {
        Self { name: name.into(), ty }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalVar {
    pub name: String,
    pub ty: IrType,
    pub mutable: bool,
}

/// Static storage owned by a class, at a fixed data-segment address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassVar {
    pub name: String,
    pub class_name: String,
    pub ty: IrType,
    pub address: u32,
}

/// Write-once static storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constant {
    pub name: String,
    pub class_name: String,
    pub ty: IrType,
    pub address: u32,
    pub initialized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub ty: IrType,
    /// Byte offset from the start of the instance.
    pub offset: u32,
    pub getter: String,
    pub setter: String,
    pub accessors_generated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub class_name: String,
    pub kind: MethodKind,
    /// Instance methods keep their receiver in slot 0.
    pub params: Vec<LocalVar>,
    pub locals: Vec<LocalVar>,
    pub return_type: IrType,
    /// Method node once the body has been declared.
    pub node: Option<NodeId>,
    pub synthetic: bool,
}

impl MethodDescriptor {
    fn new(class_name: &str, name: &str, kind: MethodKind, receiver_name: &str) -> Self {
        let params = match kind {
            MethodKind::Instance => vec![LocalVar::new(receiver_name, IrType::class(class_name))],
            MethodKind::Class => Vec::new(),
        };
        Self {
            name: name.to_string(),
            class_name: class_name.to_string(),
            kind,
            params,
            locals: Vec::new(),
            return_type: IrType::DEFAULT,
            node: None,
            synthetic: false,
        }
    }

    /// Symbol the emitter uses: `$Point::new` for class methods, `$Point#x` for instance methods.
    pub fn symbol(&self) -> String {
        method_symbol(&self.class_name, &self.name, self.kind)
    }

    pub fn has_body(&self) -> bool {
        self.node.is_some()
    }

    /// Parameters written by the user, without the receiver.
    pub fn explicit_params(&self) -> &[LocalVar] {
        match self.kind {
            MethodKind::Instance => self.params.get(1..).unwrap_or(&[]),
            MethodKind::Class => &self.params,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&LocalVar> {
        self.params
            .iter()
            .chain(self.locals.iter())
            .find(|v| v.name == name)
    }
}

pub fn method_symbol(class_name: &str, name: &str, kind: MethodKind) -> String {
    match kind {
        MethodKind::Class => format!("${class_name}::{name}"),
        MethodKind::Instance => format!("${class_name}#{name}"),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDescriptor {
    pub name: String,
    /// Backing type: the class itself, or a native type for primitive classes.
    pub ty: IrType,
    pub native: bool,
    pub attributes: Vec<AttributeDescriptor>,
    pub methods: HashMap<String, MethodDescriptor>,
    pub class_vars: HashMap<String, ClassVar>,
    pub constants: HashMap<String, Constant>,
    pub node: Option<NodeId>,
}

impl ClassDescriptor {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: IrType::class(name),
            native: false,
            attributes: Vec::new(),
            methods: HashMap::new(),
            class_vars: HashMap::new(),
            constants: HashMap::new(),
            node: None,
        }
    }

    /// Sum of the sizes of all attributes declared so far.
    pub fn size(&self) -> u32 {
        self.attributes.iter().map(|a| a.ty.size()).sum()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Declare an attribute at the end of the layout. Redeclaring with the
    /// same type returns the existing descriptor.
    pub fn add_attribute(&mut self, name: &str, ty: IrType) -> Result<&AttributeDescriptor, CompileError> {
        if let Some(index) = self.attributes.iter().position(|a| a.name == name) {
            let existing = &self.attributes[index];
            if existing.ty != ty {
                return Err(CompileError::codegen(format!(
                    "attribute {}.{} redeclared as {ty}, was {}",
                    self.name, name, existing.ty
                )));
            }
            return Ok(&self.attributes[index]);
        }
        let offset = self.size();
        self.attributes.push(AttributeDescriptor {
            name: name.to_string(),
            ty,
            offset,
            getter: name.to_string(),
            setter: format!("{name}="),
            accessors_generated: false,
        });
        Ok(&self.attributes[self.attributes.len() - 1])
    }

    pub fn method(&self, name: &str, kind: MethodKind) -> Option<&MethodDescriptor> {
        self.methods.get(&method_key(name, kind))
    }

    pub fn method_mut(&mut self, name: &str, kind: MethodKind) -> Option<&mut MethodDescriptor> {
        self.methods.get_mut(&method_key(name, kind))
    }
}

fn method_key(name: &str, kind: MethodKind) -> String {
    method_symbol("", name, kind)
}

/// Every class, method and global seen during one compilation.
#[derive(Debug, Serialize)]
pub struct Registry {
    receiver_name: String,
    classes: HashMap<String, ClassDescriptor>,
    globals: HashMap<String, GlobalVar>,
}

impl Registry {
    pub fn new(receiver_name: impl Into<String>) -> Self {
        Self {
            receiver_name: receiver_name.into(),
            classes: HashMap::new(),
            globals: HashMap::new(),
        }
    }

    pub fn receiver_name(&self) -> &str {
        &self.receiver_name
    }

    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut ClassDescriptor> {
        self.classes.get_mut(name)
    }

    pub fn find_or_create_class(&mut self, name: &str) -> &mut ClassDescriptor {
        self.classes
            .entry(name.to_string())
            .or_insert_with(|| ClassDescriptor::new(name))
    }

    /// Classes sorted by name.
    pub fn classes(&self) -> Vec<&ClassDescriptor> {
        let mut classes: Vec<_> = self.classes.values().collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        classes
    }

    pub fn size_of(&self, class_name: &str) -> Option<u32> {
        self.classes.get(class_name).map(|c| c.size())
    }

    pub fn method(&self, class_name: &str, name: &str, kind: MethodKind) -> Option<&MethodDescriptor> {
        self.classes.get(class_name)?.method(name, kind)
    }

    pub fn method_mut(&mut self, class_name: &str, name: &str, kind: MethodKind) -> Option<&mut MethodDescriptor> {
        self.classes.get_mut(class_name)?.method_mut(name, kind)
    }

    /// Look up a method, creating it (and its class) on first reference.
    pub fn find_or_create_method(&mut self, class_name: &str, name: &str, kind: MethodKind) -> &mut MethodDescriptor {
        let receiver_name = self.receiver_name.clone();
        let class = self.find_or_create_class(class_name);
        class
            .methods
            .entry(method_key(name, kind))
            .or_insert_with(|| MethodDescriptor::new(class_name, name, kind, &receiver_name))
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVar> {
        self.globals.get(name)
    }

    pub fn declare_global(&mut self, name: &str, ty: IrType, mutable: bool) -> Result<&GlobalVar, CompileError> {
        if let Some(existing) = self.globals.get(name) {
            if existing.ty != ty || existing.mutable != mutable {
                return Err(CompileError::codegen(format!(
                    "global ${name} redeclared with a different signature"
                )));
            }
        }
        Ok(self.globals.entry(name.to_string()).or_insert_with(|| GlobalVar {
            name: name.to_string(),
            ty,
            mutable,
        }))
    }

    pub fn globals(&self) -> Vec<&GlobalVar> {
        let mut globals: Vec<_> = self.globals.values().collect();
        globals.sort_by(|a, b| a.name.cmp(&b.name));
        globals
    }
}
