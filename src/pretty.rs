use crate::diagnostics::CompileError;
use crate::ir::{IrTree, NodeId, ParamValue, Template};
use crate::types::IrType;

/// Render an IR tree as folded s-expressions, one node per line.
///
/// Output is meant for debugging and snapshot tests. It follows the shape of
/// the text format of a stack VM but is not guaranteed to assemble.
pub fn render(tree: &IrTree) -> String {
    let mut pp = PrettyPrinter::new(tree);
    pp.emit_node(tree.root());
    pp.buf
}

/// Render the subtree rooted at `id`.
pub fn render_node(tree: &IrTree, id: NodeId) -> String {
    let mut pp = PrettyPrinter::new(tree);
    pp.emit_node(id);
    pp.buf
}

/// Serialize the whole tree, parameters and types included, as JSON.
pub fn to_json(tree: &IrTree) -> Result<String, CompileError> {
    serde_json::to_string_pretty(tree).map_err(|e| CompileError::codegen(format!("failed to serialize IR: {e}")))
}

struct PrettyPrinter<'a> {
    tree: &'a IrTree,
    buf: String,
    indent: usize,
}

impl<'a> PrettyPrinter<'a> {
    fn new(tree: &'a IrTree) -> Self {
        Self {
            tree,
            buf: String::new(),
            indent: 0,
        }
    }

    fn write(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    fn newline(&mut self) {
        self.buf.push('\n');
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buf.push_str("  ");
        }
    }

    // ── Nodes ────────────────────────────────────────────────────────

    fn emit_node(&mut self, id: NodeId) {
        let head = self.head(id);
        self.write_indent();
        self.write("(");
        self.write(&head);
        self.indent += 1;
        for child in self.tree.children(id) {
            self.newline();
            self.emit_node(*child);
        }
        self.indent -= 1;
        self.write(")");
    }

    fn head(&self, id: NodeId) -> String {
        let node = self.tree.node(id);
        let name = || node.name().unwrap_or("?").to_string();
        let label = || node.label().unwrap_or("?").to_string();
        let offset = || node.param("offset").map(ToString::to_string).unwrap_or_else(|| "0".to_string());

        match node.template {
            Template::Module => "module".to_string(),
            Template::Class => format!("class ${}", name()),
            Template::Method => format!("func {}", name()),
            Template::Param => format!("param ${} {}", name(), node.ty),
            Template::Result => format!("result {}", node.ty),
            Template::Local => format!("local ${} {}", name(), node.ty),
            Template::Const => {
                let value = node.param("value").map(ToString::to_string).unwrap_or_default();
                format!("{}.const {value}", node.ty.machine())
            }
            Template::Operator(op) => op.mnemonic(&self.operand_type(id)),
            Template::Extend => {
                let signed = matches!(node.param("signed"), Some(ParamValue::Bool(true)));
                format!("i64.extend_i32_{}", if signed { "s" } else { "u" })
            }
            Template::Wrap => "i32.wrap_i64".to_string(),
            Template::Load => format!("{}.load offset={}", node.ty.machine(), offset()),
            Template::Store => format!("{}.store offset={}", node.ty.machine(), offset()),
            Template::LocalGet => format!("local.get ${}", name()),
            Template::LocalSet => format!("local.set ${}", name()),
            Template::GlobalGet => format!("global.get ${}", name()),
            Template::GlobalSet => format!("global.set ${}", name()),
            Template::Call => format!("call {}", name()),
            Template::Block => format!("block {}", label()),
            Template::Loop => format!("loop {}", label()),
            Template::Br => format!("br {}", label()),
            Template::BrIf => format!("br_if {}", label()),
            Template::If if node.ty.is_none() => "if".to_string(),
            Template::If => format!("if (result {})", node.ty.machine()),
            Template::Then => "then".to_string(),
            Template::Else => "else".to_string(),
            Template::Return => "return".to_string(),
            Template::Drop => "drop".to_string(),
            Template::Nop => "nop".to_string(),
        }
    }

    /// Operand type of an operator: its first operand, or the result type
    /// while the operands are still missing.
    fn operand_type(&self, id: NodeId) -> IrType {
        self.tree
            .children(id)
            .first()
            .map(|c| self.tree.node(*c).ty.clone())
            .unwrap_or_else(|| self.tree.node(id).ty.clone())
    }
}
