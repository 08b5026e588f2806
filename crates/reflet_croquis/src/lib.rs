//! Croquis - Expression sketches for Reflet.
//!
//! Template bindings are small trusted expressions (`count + 1`,
//! `user.name`, `items[index]`, `toggle(item)`); this crate turns them
//! into an AST and interprets them against an explicit scope, instead of
//! generating and executing code the way the source runtime did.
//!
//! The language covers: literals (numbers, strings, booleans, `null`,
//! `undefined`, array literals), identifiers, member and index access,
//! calls, unary `!`/`-`, the arithmetic/comparison/equality operators,
//! `&&`/`||` (value-returning, short-circuit), the ternary, and — on the
//! statement path only — a single assignment.

mod assign;
mod ast;
mod errors;
mod eval;
mod lexer;
mod parser;

pub use assign::{assign_value, compile_assignment, Assignment};
pub use ast::{BinaryOp, Expr, Stmt, UnaryOp};
pub use errors::ExpressionError;
pub use eval::{evaluate, evaluate_callable, evaluate_expr, Scope};
pub use parser::{parse_expression, parse_statement};
