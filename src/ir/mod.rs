//! Arena-backed IR tree.
//!
//! Nodes live in a single `Vec` and refer to each other by `NodeId`, so
//! reparenting or splicing a node never invalidates ids held elsewhere.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::CompileError;
use crate::ops::Opcode;
use crate::types::IrType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural role of a node. Upward lookups test against this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Module,
    Class,
    Method,
    Param,
    Result,
    Local,
    Instruction,
    /// Literal constant; the only kind whose type a folding cast may rewrite.
    Const,
    Block,
    Loop,
    If,
    Then,
    Else,
}

/// Emission template: how the downstream emitter renders the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Template {
    Module,
    Class,
    Method,
    Param,
    Result,
    Local,
    Const,
    Operator(Opcode),
    Extend,
    Wrap,
    Load,
    Store,
    LocalGet,
    LocalSet,
    GlobalGet,
    GlobalSet,
    Call,
    Block,
    Loop,
    Br,
    BrIf,
    If,
    Then,
    Else,
    Return,
    Drop,
    Nop,
}

/// Value of a named emission parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Name(String),
    /// Byte size of a class, resolved by `Codegen::finalize` once every class is laid out.
    SizeOf(String),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Name(v) => write!(f, "{v}"),
            ParamValue::SizeOf(class) => write!(f, "sizeof({class})"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub template: Template,
    pub params: BTreeMap<&'static str, ParamValue>,
    pub ty: IrType,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        match self.params.get("name") {
            Some(ParamValue::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self.params.get("label") {
            Some(ParamValue::Name(label)) => Some(label),
            _ => None,
        }
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self.kind, NodeKind::Param | NodeKind::Result | NodeKind::Local)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IrTree {
    nodes: Vec<Node>,
}

impl Default for IrTree {
    fn default() -> Self {
        Self::new()
    }
}

impl IrTree {
    /// A tree holding only the module root.
    pub fn new() -> Self {
        let mut tree = IrTree { nodes: Vec::new() };
        tree.alloc(NodeKind::Module, Template::Module, IrType::None);
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Create a detached node.
    pub fn alloc(&mut self, kind: NodeKind, template: Template, ty: IrType) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            template,
            params: BTreeMap::new(),
            ty,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn set_param(&mut self, id: NodeId, key: &'static str, value: ParamValue) {
        self.node_mut(id).params.insert(key, value);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), CompileError> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), CompileError> {
        self.insert_child(parent, 0, child)
    }

    /// Attach `child` at `index` among `parent`'s children, detaching it from
    /// wherever it currently hangs.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), CompileError> {
        if self.is_ancestor_or_self(child, parent) {
            return Err(CompileError::structure(format!(
                "cannot attach node {child} beneath itself (target {parent})"
            )));
        }
        self.detach(child);
        let children = &mut self.node_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        Ok(())
    }

    /// Move an existing subtree so it becomes the last child of `new_parent`.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) -> Result<(), CompileError> {
        self.append_child(new_parent, node)
    }

    /// Splice the detached node `wrapper` between `node` and its parent: the
    /// wrapper takes `node`'s slot and `node` becomes its first child.
    pub fn insert_between(&mut self, node: NodeId, wrapper: NodeId) -> Result<(), CompileError> {
        if self.parent(wrapper).is_some() {
            return Err(CompileError::structure(format!("node {wrapper} is already attached")));
        }
        if self.is_ancestor_or_self(node, wrapper) {
            return Err(CompileError::structure(format!(
                "cannot wrap node {node} in its own descendant {wrapper}"
            )));
        }
        if let Some(parent) = self.parent(node) {
            let slot = self.slot_of(parent, node);
            self.node_mut(parent).children[slot] = wrapper;
            self.node_mut(wrapper).parent = Some(parent);
            self.node_mut(node).parent = None;
        }
        self.insert_child(wrapper, 0, node)
    }

    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.node_mut(node).parent.take() {
            self.node_mut(parent).children.retain(|c| *c != node);
        }
    }

    fn slot_of(&self, parent: NodeId, child: NodeId) -> usize {
        self.children(parent)
            .iter()
            .position(|c| *c == child)
            .unwrap_or(0)
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == candidate {
                return true;
            }
            match self.parent(node) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Nearest node of `kind`, starting at `from` itself and walking parent links.
    pub fn ancestor(&self, from: NodeId, kind: NodeKind) -> Option<NodeId> {
        let mut current = Some(from);
        while let Some(id) = current {
            if self.node(id).kind == kind {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    pub fn enclosing_method(&self, from: NodeId) -> Result<NodeId, CompileError> {
        self.ancestor(from, NodeKind::Method)
            .ok_or_else(|| CompileError::structure("no enclosing method"))
    }

    pub fn enclosing_class(&self, from: NodeId) -> Result<NodeId, CompileError> {
        self.ancestor(from, NodeKind::Class)
            .ok_or_else(|| CompileError::structure("no enclosing class"))
    }

    pub fn enclosing_loop(&self, from: NodeId) -> Result<NodeId, CompileError> {
        self.ancestor(from, NodeKind::Loop)
            .ok_or_else(|| CompileError::structure("`next` used outside of a loop"))
    }

    pub fn enclosing_block(&self, from: NodeId) -> Result<NodeId, CompileError> {
        self.ancestor(from, NodeKind::Block)
            .ok_or_else(|| CompileError::structure("`break` used outside of a block"))
    }

    /// Pre-order walk of the subtree rooted at `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Child nodes of `id` with the given kind, in order.
    pub fn children_of_kind(&self, id: NodeId, kind: NodeKind) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.node(*c).kind == kind)
            .collect()
    }
}
