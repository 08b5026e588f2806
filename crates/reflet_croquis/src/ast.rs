//! Expression AST.

use compact_str::CompactString;

use reflet_carton::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    LtEq,
    GtEq,
    /// Loose equality (numeric coercion, `null == undefined`).
    Eq,
    NotEq,
    /// Strict equality (no coercion).
    StrictEq,
    StrictNotEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(CompactString),
    Member(Box<Expr>, CompactString),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
}

impl Expr {
    /// The root identifier an access chain hangs off, if this is a plain
    /// identifier / member / index chain.
    pub fn root_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name.as_str()),
            Expr::Member(base, _) | Expr::Index(base, _) => base.root_ident(),
            _ => None,
        }
    }
}

/// A statement: either a bare expression or a single assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign(Expr, Expr),
}
