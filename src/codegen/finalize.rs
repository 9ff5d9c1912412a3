use tracing::debug;

use crate::diagnostics::CompileError;
use crate::ir::{NodeId, ParamValue, Template};

use super::Codegen;

impl Codegen {
    /// Second phase, run once every class body has been compiled.
    ///
    /// Resolves class-size references to integers and rejects operator
    /// placeholders and `while` exits that were never completed. Also fails
    /// when a class grew after a null constructor or a static instance was
    /// built from its earlier size. Running it again is harmless.
    pub fn finalize(&mut self) -> Result<(), CompileError> {
        for fixed in &self.fixed_sizes {
            let size = self.class_size(&fixed.class_name)?;
            if size != fixed.size {
                return Err(self.error(format!(
                    "class {} is {size} bytes but its {} was built for {} bytes",
                    fixed.class_name, fixed.what, fixed.size
                )));
            }
        }

        let mut resolved = Vec::new();
        for id in self.tree.ids() {
            let node = self.tree.node(id);
            match node.template {
                Template::Operator(op) if node.children().is_empty() => {
                    return Err(self.error(format!("operator `{}` ({id}) never received operands", op.symbol())));
                }
                Template::BrIf if node.children().is_empty() && node.parent().is_some() => {
                    return Err(self.structure(format!("`while` exit {id} has no condition")));
                }
                _ => {}
            }
            for (key, value) in &node.params {
                if let ParamValue::SizeOf(class_name) = value {
                    let size = self.class_size(class_name)?;
                    resolved.push((id, *key, size));
                }
            }
        }

        let count = resolved.len();
        for (id, key, size) in resolved {
            self.tree.set_param(id, key, ParamValue::Int(size as i64));
        }
        debug!(nodes = self.tree.len(), sizes_resolved = count, data_end = self.data.end(), "finalized");
        Ok(())
    }

    /// Nodes whose parameters still hold unresolved size references.
    pub fn pending_sizes(&self) -> Vec<NodeId> {
        self.tree
            .ids()
            .filter(|id| {
                self.tree
                    .node(*id)
                    .params
                    .values()
                    .any(|v| matches!(v, ParamValue::SizeOf(_)))
            })
            .collect()
    }
}
