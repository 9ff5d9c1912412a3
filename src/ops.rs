use serde::Serialize;

use crate::diagnostics::CompileError;
use crate::types::IrType;

/// Low-level opcode an operator symbol resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Eq,
    Ne,
    LtS,
    LtU,
    LeS,
    LeU,
    GtS,
    GtU,
    GeS,
    GeU,
    /// Logical negation: compares the single operand against zero.
    Eqz,
}

const SYMBOLS: &[(&str, Opcode)] = &[
    ("+", Opcode::Add),
    ("-", Opcode::Sub),
    ("*", Opcode::Mul),
    ("/", Opcode::DivS),
    ("div_u", Opcode::DivU),
    ("%", Opcode::RemS),
    ("rem_u", Opcode::RemU),
    ("&", Opcode::And),
    ("&&", Opcode::And),
    ("|", Opcode::Or),
    ("||", Opcode::Or),
    ("^", Opcode::Xor),
    ("<<", Opcode::Shl),
    (">>", Opcode::ShrS),
    ("shr_u", Opcode::ShrU),
    ("==", Opcode::Eq),
    ("!=", Opcode::Ne),
    ("<", Opcode::LtS),
    ("lt_u", Opcode::LtU),
    ("<=", Opcode::LeS),
    ("le_u", Opcode::LeU),
    (">", Opcode::GtS),
    ("gt_u", Opcode::GtU),
    (">=", Opcode::GeS),
    ("ge_u", Opcode::GeU),
    ("!", Opcode::Eqz),
];

impl Opcode {
    pub fn from_symbol(symbol: &str) -> Result<Opcode, CompileError> {
        SYMBOLS
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, op)| *op)
            .ok_or_else(|| CompileError::unknown_operator(symbol))
    }

    /// Canonical source spelling, used in diagnostics.
    pub fn symbol(self) -> &'static str {
        SYMBOLS
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(s, _)| *s)
            .unwrap_or("?")
    }

    pub fn is_unary(self) -> bool {
        self == Opcode::Eqz
    }

    pub fn is_additive(self) -> bool {
        matches!(self, Opcode::Add | Opcode::Sub)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Opcode::Eq
                | Opcode::Ne
                | Opcode::LtS
                | Opcode::LtU
                | Opcode::LeS
                | Opcode::LeU
                | Opcode::GtS
                | Opcode::GtU
                | Opcode::GeS
                | Opcode::GeU
        )
    }

    /// Operators that make sense on class-typed (address) receivers.
    pub fn allowed_on_class(self) -> bool {
        self.is_additive() || self.is_relational()
    }

    /// Arguments expected besides the receiver.
    pub fn arity(self) -> usize {
        if self.is_unary() { 0 } else { 1 }
    }

    /// Instruction mnemonic for operands of type `operand`, e.g. `i32.lt_s` or `f64.lt`.
    pub fn mnemonic(self, operand: &IrType) -> String {
        let base = match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::DivS => "div_s",
            Opcode::DivU => "div_u",
            Opcode::RemS => "rem_s",
            Opcode::RemU => "rem_u",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::ShrS => "shr_s",
            Opcode::ShrU => "shr_u",
            Opcode::Eq => "eq",
            Opcode::Ne => "ne",
            Opcode::LtS => "lt_s",
            Opcode::LtU => "lt_u",
            Opcode::LeS => "le_s",
            Opcode::LeU => "le_u",
            Opcode::GtS => "gt_s",
            Opcode::GtU => "gt_u",
            Opcode::GeS => "ge_s",
            Opcode::GeU => "ge_u",
            Opcode::Eqz => "eqz",
        };
        let base = if operand.is_float() {
            base.trim_end_matches("_s").trim_end_matches("_u")
        } else {
            base
        };
        format!("{}.{}", operand.machine(), base)
    }
}

/// Human-readable list of the operators legal on class receivers.
pub fn class_operator_symbols() -> String {
    let mut seen: Vec<&str> = Vec::new();
    for (symbol, op) in SYMBOLS {
        if op.allowed_on_class() && !seen.contains(symbol) {
            seen.push(symbol);
        }
    }
    seen.join(", ")
}
